//! hearsay-core – Gemeinsame Typen, Traits und Fehlertypen
//!
//! Dieses Crate stellt die fundamentalen Bausteine bereit, die von allen
//! anderen Hearsay-Crates gemeinsam genutzt werden.

pub mod error;
pub mod event;
pub mod types;

// Re-Exporte fuer bequemen Zugriff
pub use error::{HearsayError, Result};
pub use event::{MixSenke, QuellEreignis};
pub use types::{HoererId, KanalId, ScopeId, SprecherId, StreamFormat};
