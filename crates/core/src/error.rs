//! Fehlertypen fuer Hearsay
//!
//! Zentraler Fehler-Enum der alle moeglichen Fehlerzustaende abdeckt.
//! Untermodule koennen eigene Fehler definieren und via `#[from]` konvertieren.

use thiserror::Error;

use crate::types::ScopeId;

/// Globaler Result-Alias fuer Hearsay
pub type Result<T> = std::result::Result<T, HearsayError>;

/// Alle moeglichen Fehler im Hearsay-System
#[derive(Debug, Error)]
pub enum HearsayError {
    // --- Verbindung & Netzwerk ---
    #[error("Verbindung fehlgeschlagen: {0}")]
    Verbindung(String),

    #[error("Verbindung getrennt: {0}")]
    Getrennt(String),

    #[error("Zeitlimit ueberschritten: {0}")]
    Zeitlimit(String),

    // --- Session-Lebenszyklus ---
    #[error("Session fuer {0} ist bereits aktiv")]
    SessionBereitsAktiv(ScopeId),

    #[error("Keine aktive Session fuer {0}")]
    SessionNichtAktiv(ScopeId),

    #[error("Ungueltige Quelle: {0}")]
    QuelleUngueltig(String),

    #[error("Ungueltiges Ziel: {0}")]
    ZielUngueltig(String),

    // --- Audio ---
    #[error("Codec-Fehler: {0}")]
    Codec(String),

    // --- Konfiguration ---
    #[error("Konfigurationsfehler: {0}")]
    Konfiguration(String),

    // --- Intern ---
    #[error("Interner Fehler: {0}")]
    Intern(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl HearsayError {
    /// Erstellt einen internen Fehler aus einer beliebigen Nachricht
    pub fn intern(msg: impl Into<String>) -> Self {
        Self::Intern(msg.into())
    }

    /// Gibt true zurueck wenn der Fehler wiederholbar sein koennte
    pub fn ist_wiederholbar(&self) -> bool {
        matches!(
            self,
            Self::Zeitlimit(_) | Self::Verbindung(_) | Self::Getrennt(_)
        )
    }
}
