//! Anbindung an die Sprach-Plattform
//!
//! Die konkreten Capabilities ([`SprachQuelle`], `SprachZiel`) werden vom
//! einbettenden System bereitgestellt – die Verbindungs-Etablierung selbst
//! ist kein Teil des Relays. Der hier enthaltene Stub lehnt Session-Starts
//! mit einem typisierten Fehler ab, solange kein Adapter verdrahtet ist.

use async_trait::async_trait;
use tokio::sync::mpsc;

use hearsay_core::{HearsayError, QuellEreignis, Result, ScopeId};
use hearsay_ingest::SprachQuelle;

/// Platzhalter-Quelle ohne Plattform-Anbindung
///
/// Laesst den HTTP-Server normal laufen; jeder Session-Start schlaegt mit
/// `QuelleUngueltig` fehl, bis ein echter Adapter eingesetzt wird.
pub struct UnkonfigurierteQuelle;

#[async_trait]
impl SprachQuelle for UnkonfigurierteQuelle {
    async fn abonnieren(&self, scope: ScopeId) -> Result<mpsc::Receiver<QuellEreignis>> {
        Err(HearsayError::QuelleUngueltig(format!(
            "kein Plattform-Adapter fuer {scope} konfiguriert"
        )))
    }
}
