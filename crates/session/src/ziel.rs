//! SprachZiel – die konsumierte Wiedergabe-Capability (Relay-Modus)
//!
//! Im Kanal-zu-Kanal-Relay-Modus wird die gemischte Ausgabe zusaetzlich in
//! einen Ziel-Sprachkanal eingespielt. Die eigentliche Verbindungs- und
//! Wiedergabe-Logik liegt ausserhalb dieses Systems; ein Ziel ist aus Sicht
//! des Relays nur ein weiterer Konsument des Opus-Taps.

use async_trait::async_trait;

use hearsay_core::{KanalId, Result};
use hearsay_stream::HoererStrom;

/// Capability: tritt einem Ziel-Sprachkanal bei
#[async_trait]
pub trait SprachZiel: Send + Sync + 'static {
    /// Tritt dem Ziel-Kanal bei und gibt die Wiedergabe-Verbindung zurueck
    async fn beitreten(&self, kanal: KanalId) -> Result<Box<dyn ZielVerbindung>>;
}

/// Eine stehende Wiedergabe-Verbindung zu einem Ziel-Kanal
#[async_trait]
pub trait ZielVerbindung: Send + Sync {
    /// Spielt den Opus-Strom mit Lautstaerke-Skalierung (0.0–1.0) ab
    ///
    /// Der Strom endet, wenn der Tap der Session entfernt wird.
    async fn abspielen(&self, strom: HoererStrom, lautstaerke: f32) -> Result<()>;

    /// Trennt die Verbindung (idempotent)
    fn trennen(&self);
}
