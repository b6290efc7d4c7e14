//! hearsay-stream – Transport- und Fan-out-Senke
//!
//! Pro Session und Format existiert ein Tap: ein lebendes Schreib-Ende,
//! das jeden eingehenden Datenblock an alle verbundenen Hoerer verteilt.
//! Jeder Hoerer hat seine eigene begrenzte Queue – ein langsamer Hoerer
//! verliert nur eigene Daten und bremst weder Tap noch andere Hoerer.
//!
//! ## Module
//! - [`tap`] – [`TapRegister`], Schreib-Enden und Hoerer-Anschluesse
//! - [`http`] – Axum-Endpunkte (`/stream/{id}`, `/stream/{id}/pcm`, `/health`)

pub mod http;
pub mod tap;

pub use http::{pcm_stream_url, stream_router, stream_url, StreamZustand};
pub use tap::{HoererAnschluss, HoererStrom, TapPaar, TapRegister, TapSchreiber};
