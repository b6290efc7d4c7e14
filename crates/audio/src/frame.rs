//! PCM-Frame – genau ein Misch-Takt Audio
//!
//! Ein `PcmFrame` enthaelt immer exakt `samples_pro_frame` Samples des
//! Profils (nie partiell). Das Mischwerk erzeugt pro Takt genau einen
//! Frame; Transcoding und Transport verlassen sich auf die feste Groesse.

use bytes::Bytes;

use crate::profil::AudioProfil;

/// Ein vollstaendiger PCM-Frame (signed 16-bit, interleaved)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PcmFrame {
    samples: Vec<i16>,
}

impl PcmFrame {
    /// Erstellt einen Stille-Frame (alle Samples 0) fuer das gegebene Profil
    pub fn stille(profil: &AudioProfil) -> Self {
        Self {
            samples: vec![0i16; profil.samples_pro_frame()],
        }
    }

    /// Erstellt einen Frame aus fertig gemischten Samples
    ///
    /// Die Laenge muss der Frame-Groesse des Profils entsprechen –
    /// das Mischwerk garantiert das, hier wird es nur noch geprueft.
    pub fn aus_samples(samples: Vec<i16>, profil: &AudioProfil) -> Self {
        debug_assert_eq!(
            samples.len(),
            profil.samples_pro_frame(),
            "PcmFrame muss exakt einen Takt umfassen"
        );
        Self { samples }
    }

    /// Gibt die Samples zurueck
    pub fn samples(&self) -> &[i16] {
        &self.samples
    }

    /// Anzahl der Samples
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// True wenn der Frame keine Samples enthaelt
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// True wenn alle Samples 0 sind
    pub fn ist_stille(&self) -> bool {
        self.samples.iter().all(|&s| s == 0)
    }

    /// Serialisiert den Frame als s16le-Bytes
    pub fn als_bytes(&self) -> Bytes {
        let mut buf = Vec::with_capacity(self.samples.len() * 2);
        for s in &self.samples {
            buf.extend_from_slice(&s.to_le_bytes());
        }
        Bytes::from(buf)
    }
}
