//! Audio-Profil fuer die Misch- und Relay-Pipeline
//!
//! Definiert Abtastrate, Kanalzahl, Frame-Dauer und Encoder-Parameter.
//! Das Profil bestimmt die abgeleiteten Frame-Groessen, auf die sich
//! Mischwerk, Transcoding und Transport verlassen.

use serde::{Deserialize, Serialize};

use crate::error::KodekFehler;

/// Abtastrate fuer Opus
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Abtastrate {
    /// 8 kHz – Schmalband (Telefon-Qualitaet)
    Hz8000 = 8000,
    /// 16 kHz – Breitband (gute Sprach-Qualitaet)
    Hz16000 = 16000,
    /// 24 kHz – Superbreitband
    Hz24000 = 24000,
    /// 48 kHz – Vollband (Standard der Sprach-Plattform)
    #[default]
    Hz48000 = 48000,
}

/// Anzahl der Audio-Kanaele
///
/// Die Misch-Zeitachse ist mono; Stereo existiert nur fuer kuenftige
/// Quell-Formate.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KanalZahl {
    /// Mono (1 Kanal)
    #[default]
    Mono = 1,
    /// Stereo (2 Kanaele)
    Stereo = 2,
}

/// Frame-Dauer in Millisekunden (ein Misch-Takt)
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameDauer {
    /// 10 ms
    Ms10 = 10,
    /// 20 ms – Standard (Takt des Mischwerks)
    #[default]
    Ms20 = 20,
    /// 40 ms
    Ms40 = 40,
}

impl FrameDauer {
    /// Gibt die Frame-Dauer in Millisekunden zurueck
    pub fn als_ms(&self) -> u64 {
        *self as u64
    }

    /// Berechnet die Anzahl der Samples pro Frame und Kanal
    pub fn samples_pro_frame(&self, abtastrate: Abtastrate) -> usize {
        (*self as usize) * (abtastrate as usize) / 1000
    }
}

/// Vollstaendiges Audio-Profil der Relay-Pipeline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioProfil {
    /// Abtastrate
    pub abtastrate: Abtastrate,
    /// Anzahl der Kanaele
    pub kanaele: KanalZahl,
    /// Frame-Dauer (= Takt des Mischwerks)
    pub frame_dauer: FrameDauer,
    /// Ziel-Bitrate des Encoders in kbps (6–510)
    pub bitrate_kbps: u16,
    /// Encoder-Komplexitaet (0–10)
    pub komplexitaet: u8,
    /// Variable Bitrate aktivieren
    pub vbr: bool,
}

impl Default for AudioProfil {
    fn default() -> Self {
        Self {
            abtastrate: Abtastrate::Hz48000,
            kanaele: KanalZahl::Mono,
            frame_dauer: FrameDauer::Ms20,
            bitrate_kbps: 64,
            komplexitaet: 9,
            vbr: true,
        }
    }
}

impl AudioProfil {
    /// Validiert die Profil-Parameter
    pub fn validieren(&self) -> Result<(), KodekFehler> {
        if self.bitrate_kbps < 6 || self.bitrate_kbps > 510 {
            return Err(KodekFehler::Konfiguration(format!(
                "Bitrate muss zwischen 6 und 510 kbps liegen (war: {})",
                self.bitrate_kbps
            )));
        }
        if self.komplexitaet > 10 {
            return Err(KodekFehler::Konfiguration(format!(
                "Komplexitaet muss zwischen 0 und 10 liegen (war: {})",
                self.komplexitaet
            )));
        }
        Ok(())
    }

    /// Samples pro Frame ueber alle Kanaele
    pub fn samples_pro_frame(&self) -> usize {
        self.frame_dauer.samples_pro_frame(self.abtastrate) * self.kanaele as usize
    }

    /// Bytes pro Frame (s16le: 2 Bytes pro Sample)
    pub fn bytes_pro_frame(&self) -> usize {
        self.samples_pro_frame() * 2
    }

    /// Frame-Dauer als `std::time::Duration`
    pub fn takt(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.frame_dauer.als_ms())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_profil_frame_groessen() {
        let profil = AudioProfil::default();
        // 20ms bei 48kHz mono = 960 Samples = 1920 Bytes
        assert_eq!(profil.samples_pro_frame(), 960);
        assert_eq!(profil.bytes_pro_frame(), 1920);
        assert_eq!(profil.takt(), std::time::Duration::from_millis(20));
    }

    #[test]
    fn frame_dauer_samples_berechnung() {
        // 10ms bei 16kHz = 160 Samples
        assert_eq!(FrameDauer::Ms10.samples_pro_frame(Abtastrate::Hz16000), 160);
        // 40ms bei 48kHz = 1920 Samples
        assert_eq!(FrameDauer::Ms40.samples_pro_frame(Abtastrate::Hz48000), 1920);
    }

    #[test]
    fn stereo_verdoppelt_samples() {
        let profil = AudioProfil {
            kanaele: KanalZahl::Stereo,
            ..AudioProfil::default()
        };
        assert_eq!(profil.samples_pro_frame(), 1920);
    }

    #[test]
    fn validieren_bitrate_grenzen() {
        let mut profil = AudioProfil::default();
        assert!(profil.validieren().is_ok());

        profil.bitrate_kbps = 5;
        assert!(profil.validieren().is_err());

        profil.bitrate_kbps = 511;
        assert!(profil.validieren().is_err());
    }

    #[test]
    fn validieren_komplexitaet() {
        let profil = AudioProfil {
            komplexitaet: 11,
            ..AudioProfil::default()
        };
        assert!(profil.validieren().is_err());
    }

    #[test]
    fn profil_ist_serde_kompatibel() {
        let profil = AudioProfil::default();
        let json = serde_json::to_string(&profil).unwrap();
        let zurueck: AudioProfil = serde_json::from_str(&json).unwrap();
        assert_eq!(profil, zurueck);
    }
}
