//! Opus Encoder/Decoder Wrapper
//!
//! Kapselt audiopus und stellt eine einfache i16-PCM basierte API bereit
//! (das Mischwerk arbeitet auf signed 16-bit Samples).
//! Nutzt `AudioProfil` fuer Konfiguration.

use audiopus::{
    coder::{Decoder, Encoder},
    Application, Channels, SampleRate,
};
use bytes::Bytes;
use tracing::debug;

use crate::error::{KodekFehler, KodekResult};
use crate::profil::{Abtastrate, AudioProfil, KanalZahl};

/// Opus-Encoder: kodiert i16-PCM zu Opus-Bytes
pub struct OpusEncoder {
    encoder: Encoder,
    profil: AudioProfil,
    frame_size: usize,
}

impl OpusEncoder {
    /// Erstellt einen neuen Encoder mit dem gegebenen Profil
    pub fn neu(profil: AudioProfil) -> KodekResult<Self> {
        profil.validieren()?;

        let sample_rate = rate_zu_audiopus(profil.abtastrate);
        let channels = kanaele_zu_audiopus(profil.kanaele);

        let mut encoder = Encoder::new(sample_rate, channels, Application::Voip)
            .map_err(|e| KodekFehler::CodecFehler(e.to_string()))?;

        encoder
            .set_bitrate(audiopus::Bitrate::BitsPerSecond(
                (profil.bitrate_kbps as i32) * 1000,
            ))
            .map_err(|e| KodekFehler::CodecFehler(e.to_string()))?;

        encoder
            .set_complexity(profil.komplexitaet)
            .map_err(|e| KodekFehler::CodecFehler(e.to_string()))?;

        encoder
            .set_vbr(profil.vbr)
            .map_err(|e| KodekFehler::CodecFehler(e.to_string()))?;

        let frame_size = profil.samples_pro_frame();

        debug!(
            "OpusEncoder erstellt: {}kbps, {:?}, frame_size={}",
            profil.bitrate_kbps, profil.abtastrate, frame_size
        );

        Ok(Self {
            encoder,
            profil,
            frame_size,
        })
    }

    /// Kodiert einen PCM-Frame (i16, interleaved) zu Opus-Bytes
    ///
    /// Die Eingabe muss exakt `frame_size()` Samples lang sein.
    pub fn kodieren(&mut self, pcm: &[i16]) -> KodekResult<Bytes> {
        if pcm.len() != self.frame_size {
            return Err(KodekFehler::Konfiguration(format!(
                "PCM-Frame muss {} Samples lang sein, war {}",
                self.frame_size,
                pcm.len()
            )));
        }

        // Puffer: max. 4000 Bytes reicht fuer alle Opus-Frames
        let mut output = vec![0u8; 4000];
        let written = self
            .encoder
            .encode(pcm, &mut output)
            .map_err(|e| KodekFehler::CodecFehler(e.to_string()))?;

        output.truncate(written);
        Ok(Bytes::from(output))
    }

    /// Gibt die erwartete Frame-Groesse in Samples zurueck
    pub fn frame_size(&self) -> usize {
        self.frame_size
    }

    /// Gibt das zugrundeliegende Profil zurueck
    pub fn profil(&self) -> &AudioProfil {
        &self.profil
    }
}

/// Opus-Decoder: dekodiert Opus-Bytes zu i16-PCM
///
/// Pro Sprecher-Stream wird ein eigener Decoder benoetigt (Opus-Decoder
/// tragen Stream-Zustand).
pub struct OpusDecoder {
    decoder: Decoder,
    kanaele: KanalZahl,
    frame_size: usize,
}

impl OpusDecoder {
    /// Erstellt einen neuen Decoder fuer das gegebene Profil
    pub fn neu(profil: &AudioProfil) -> KodekResult<Self> {
        let sr = rate_zu_audiopus(profil.abtastrate);
        let ch = kanaele_zu_audiopus(profil.kanaele);

        let decoder =
            Decoder::new(sr, ch).map_err(|e| KodekFehler::CodecFehler(e.to_string()))?;

        let frame_size = profil.samples_pro_frame();

        debug!(
            "OpusDecoder erstellt: {:?} {:?} frame_size={}",
            profil.abtastrate, profil.kanaele, frame_size
        );

        Ok(Self {
            decoder,
            kanaele: profil.kanaele,
            frame_size,
        })
    }

    /// Dekodiert Opus-Bytes zu i16-PCM
    ///
    /// Gibt hoechstens einen Frame an Samples zurueck; kuerzere Pakete
    /// ergeben entsprechend kuerzere Puffer.
    pub fn dekodieren(&mut self, opus_daten: &[u8]) -> KodekResult<Vec<i16>> {
        let mut output = vec![0i16; self.frame_size];
        let dekodiert = self
            .decoder
            .decode(Some(opus_daten), &mut output, false)
            .map_err(|e| KodekFehler::CodecFehler(e.to_string()))?;

        output.truncate(dekodiert * self.kanaele as usize);
        Ok(output)
    }

    /// Gibt die erwartete Frame-Groesse in Samples zurueck
    pub fn frame_size(&self) -> usize {
        self.frame_size
    }
}

// ---------------------------------------------------------------------------
// Konvertierungs-Hilfsfunktionen
// ---------------------------------------------------------------------------

fn rate_zu_audiopus(rate: Abtastrate) -> SampleRate {
    match rate {
        Abtastrate::Hz8000 => SampleRate::Hz8000,
        Abtastrate::Hz16000 => SampleRate::Hz16000,
        Abtastrate::Hz24000 => SampleRate::Hz24000,
        Abtastrate::Hz48000 => SampleRate::Hz48000,
    }
}

fn kanaele_zu_audiopus(ch: KanalZahl) -> Channels {
    match ch {
        KanalZahl::Mono => Channels::Mono,
        KanalZahl::Stereo => Channels::Stereo,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encoder_standard_profil() {
        let enc = OpusEncoder::neu(AudioProfil::default());
        assert!(enc.is_ok(), "Standard-Encoder sollte erstellbar sein");
        // 20ms bei 48kHz mono = 960 Samples
        assert_eq!(enc.unwrap().frame_size(), 960);
    }

    #[test]
    fn decoder_standard_profil() {
        let dec = OpusDecoder::neu(&AudioProfil::default());
        assert!(dec.is_ok());
        assert_eq!(dec.unwrap().frame_size(), 960);
    }

    #[test]
    fn encoder_falsche_frame_groesse_fehler() {
        let mut enc = OpusEncoder::neu(AudioProfil::default()).unwrap();
        // 960 Samples erwartet, aber 100 uebergeben
        let result = enc.kodieren(&vec![0i16; 100]);
        assert!(result.is_err());
    }

    #[test]
    fn encoder_ungueltiges_profil() {
        let profil = AudioProfil {
            bitrate_kbps: 5, // Ungueltig
            ..AudioProfil::default()
        };
        assert!(OpusEncoder::neu(profil).is_err());
    }

    #[test]
    fn encoder_decoder_roundtrip() {
        let profil = AudioProfil::default();
        let mut enc = OpusEncoder::neu(profil.clone()).unwrap();
        let mut dec = OpusDecoder::neu(&profil).unwrap();

        let frame_size = enc.frame_size();
        let pcm_in: Vec<i16> = (0..frame_size)
            .map(|i| ((i as f32 * 0.05).sin() * 8000.0) as i16)
            .collect();

        let kodiert = enc.kodieren(&pcm_in).expect("Encoding sollte funktionieren");
        assert!(!kodiert.is_empty());

        let dekodiert = dec.dekodieren(&kodiert).expect("Decoding sollte funktionieren");
        assert_eq!(dekodiert.len(), frame_size);
    }
}
