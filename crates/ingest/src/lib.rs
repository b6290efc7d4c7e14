//! hearsay-ingest – Quell-Ingest
//!
//! Abonniert den Quell-Kanal einer Session, filtert auf erlaubte Sprecher,
//! dekodiert deren Opus-Pakete und reicht die PCM-Puffer an die Misch-Senke
//! weiter. Pro Sprecher laeuft eine eigene Route mit eigenem Decoder, die
//! sich nach 100 ms ohne Pakete selbst schliesst.
//!
//! ## Module
//! - [`quelle`] – die konsumierte [`SprachQuelle`]-Capability
//! - [`empfaenger`] – der [`QuellEmpfaenger`] mit den Sprecher-Routen

pub mod empfaenger;
pub mod quelle;

pub use empfaenger::{IngestKonfig, QuellEmpfaenger, TrennungsMelder};
pub use quelle::SprachQuelle;
