//! Gemeinsame Identifikationstypen fuer Hearsay
//!
//! Alle IDs verwenden das Newtype-Pattern um Verwechslungen zwischen
//! verschiedenen ID-Arten zur Compilezeit auszuschliessen.
//!
//! `ScopeId` und `SprecherId` kommen von der externen Sprach-Plattform
//! und sind daher numerisch; `HoererId` wird lokal vergeben (UUID v4).

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Eindeutige Scope-ID – identifiziert den Quell-Kanal und damit die Session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ScopeId(pub u64);

impl ScopeId {
    /// Gibt den inneren Zahlenwert zurueck
    pub fn inner(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for ScopeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "scope:{}", self.0)
    }
}

impl std::str::FromStr for ScopeId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        s.parse::<u64>().map(Self)
    }
}

impl From<u64> for ScopeId {
    fn from(v: u64) -> Self {
        Self(v)
    }
}

/// Eindeutige Sprecher-ID (vergeben von der Sprach-Plattform)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SprecherId(pub u64);

impl SprecherId {
    /// Gibt den inneren Zahlenwert zurueck
    pub fn inner(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for SprecherId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "sprecher:{}", self.0)
    }
}

impl From<u64> for SprecherId {
    fn from(v: u64) -> Self {
        Self(v)
    }
}

/// Eindeutige Kanal-ID eines Sprach-Ziels (Relay-Modus)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KanalId(pub u64);

impl KanalId {
    /// Gibt den inneren Zahlenwert zurueck
    pub fn inner(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for KanalId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "kanal:{}", self.0)
    }
}

impl From<u64> for KanalId {
    fn from(v: u64) -> Self {
        Self(v)
    }
}

/// Eindeutige Hoerer-ID – ein verbundener Konsument eines Taps
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HoererId(pub Uuid);

impl HoererId {
    /// Erstellt eine neue zufaellige HoererId
    pub fn neu() -> Self {
        Self(Uuid::new_v4())
    }

    /// Gibt die innere UUID zurueck
    pub fn inner(&self) -> Uuid {
        self.0
    }
}

impl Default for HoererId {
    fn default() -> Self {
        Self::neu()
    }
}

impl std::fmt::Display for HoererId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "hoerer:{}", self.0)
    }
}

/// Ausgabeformat eines Transport-Taps
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamFormat {
    /// Opus-komprimierte Pakete
    Opus,
    /// Rohes lineares PCM (s16le)
    Pcm,
}

impl std::fmt::Display for StreamFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StreamFormat::Opus => write!(f, "opus"),
            StreamFormat::Pcm => write!(f, "pcm"),
        }
    }
}
