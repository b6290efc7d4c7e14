//! Fehlertypen fuer die Audio-Grundlagen

use thiserror::Error;

/// Alle moeglichen Fehler der Audio-Schicht
#[derive(Debug, Error)]
pub enum KodekFehler {
    #[error("Codec-Fehler: {0}")]
    CodecFehler(String),

    #[error("Konfigurationsfehler: {0}")]
    Konfiguration(String),

    #[error("Unerwarteter Fehler: {0}")]
    Anyhow(#[from] anyhow::Error),
}

pub type KodekResult<T> = Result<T, KodekFehler>;

impl From<KodekFehler> for hearsay_core::HearsayError {
    fn from(e: KodekFehler) -> Self {
        hearsay_core::HearsayError::Codec(e.to_string())
    }
}
