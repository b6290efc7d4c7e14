//! hearsay-audio – Audio-Grundlagen fuer Hearsay
//!
//! - Opus Encoding/Decoding (audiopus) auf einer i16-PCM-API
//! - Audio-Profil (Abtastrate, Kanaele, Frame-Dauer, Bitrate)
//! - PCM-Frame-Typ fuer genau einen Misch-Takt

pub mod codec;
pub mod error;
pub mod frame;
pub mod profil;

// Bequeme Re-Exporte der wichtigsten Typen
pub use codec::{OpusDecoder, OpusEncoder};
pub use error::{KodekFehler, KodekResult};
pub use frame::PcmFrame;
pub use profil::{Abtastrate, AudioProfil, FrameDauer, KanalZahl};
