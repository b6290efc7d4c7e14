//! SprachQuelle – die konsumierte Empfangs-Capability
//!
//! Die eigentliche Verbindungs-Etablierung zur Sprach-Plattform ist nicht
//! Teil dieses Systems. Hier steht nur der Vertrag: ein Abonnement liefert
//! pro Scope einen Strom von [`QuellEreignis`]sen.

use async_trait::async_trait;
use tokio::sync::mpsc;

use hearsay_core::{QuellEreignis, Result, ScopeId};

/// Capability: liefert pro Scope einen Ereignis-Strom der Sprecher
///
/// Das Ende des Stroms (Sender fallengelassen) gilt als unerwarteter
/// Verbindungsverlust, sofern nicht zuvor [`QuellEreignis::Getrennt`]
/// gesendet wurde.
#[async_trait]
pub trait SprachQuelle: Send + Sync + 'static {
    /// Abonniert den Quell-Kanal des Scopes
    async fn abonnieren(&self, scope: ScopeId) -> Result<mpsc::Receiver<QuellEreignis>>;
}
