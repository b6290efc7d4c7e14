//! hearsay-mix – Mischwerk
//!
//! Kombiniert die dekodierten Puffer aller gerade sprechenden Quellen auf
//! eine einzelne Mono-Zeitachse. Ein fester Takt (20 ms) erzeugt pro Tick
//! genau einen Ausgabe-Frame – auch bei voelliger Stille, denn der
//! Transport haengt an einer lueckenlosen Kadenz.
//!
//! ## Module
//! - [`mischung`] – die reine Misch-Mathematik (Mittelwert, Clamping)
//! - [`quelle`] – pro-Sprecher-Zustand ([`AktiveQuelle`])
//! - [`werk`] – das taktgesteuerte [`MixWerk`]

pub mod mischung;
pub mod quelle;
pub mod werk;

pub use quelle::AktiveQuelle;
pub use werk::{MixKonfig, MixWerk};
