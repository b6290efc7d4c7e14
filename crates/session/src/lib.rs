//! hearsay-session – Session-Orchestrierung
//!
//! Der [`SessionVerwalter`] besitzt das Register aller aktiven Sessions und
//! ist die einzige Komponente mit stufen-uebergreifendem Wissen: er verdrahtet
//! Ingest → Mischwerk → Transcoding-Zweige → Transport-Taps, erzwingt die
//! Ein-Session-pro-Scope-Invariante und baut in definierter Reihenfolge ab.
//!
//! ## Module
//! - [`zweige`] – die beiden Transcoding-Zweige (Opus-Encoder, Roh-PCM)
//! - [`ziel`] – die konsumierte [`SprachZiel`]-Capability (Relay-Modus)
//! - [`verwalter`] – Registry und Lebenszyklus

pub mod verwalter;
pub mod ziel;
pub mod zweige;

pub use verwalter::{SessionKonfig, SessionVerwalter};
pub use ziel::{SprachZiel, ZielVerbindung};
pub use zweige::{encoder_zweig_starten, roh_zweig_starten, ZweigGriff};
