//! Transcoding-Zweige – unabhaengige Konsumenten des Misch-Ausgangs
//!
//! Zweig A kodiert PCM zu Opus und befuellt den Opus-Tap; Zweig B reicht
//! PCM unveraendert (als s16le-Bytes) an den PCM-Tap weiter. Jeder Zweig
//! haengt an seiner eigenen begrenzten Frame-Queue – ein Fehler oder Stau
//! im einen Zweig beruehrt den anderen nie.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};

use hearsay_audio::{AudioProfil, KodekResult, OpusEncoder, PcmFrame};

/// Kapazitaet der Frame-Queue pro Zweig
///
/// 16 Frames ≈ 320 ms Vorlauf; ein Zweig, der laenger haengt, verliert
/// Frames statt das Mischwerk zu stauen.
pub const ZWEIG_QUEUE_GROESSE: usize = 16;

/// Griff auf einen laufenden Transcoding-Zweig
///
/// `stoppen` beendet den Zweig-Task sofort; mehrfaches Stoppen ist erlaubt.
pub struct ZweigGriff {
    stopp: parking_lot::Mutex<Option<oneshot::Sender<()>>>,
}

impl ZweigGriff {
    fn neu(stopp_tx: oneshot::Sender<()>) -> Self {
        Self {
            stopp: parking_lot::Mutex::new(Some(stopp_tx)),
        }
    }

    /// Stoppt den Zweig (idempotent)
    pub fn stoppen(&self) {
        if let Some(tx) = self.stopp.lock().take() {
            let _ = tx.send(());
        }
    }
}

/// Startet den Encoder-Zweig: PCM-Frames → Opus → Tap
///
/// Schlaegt fehl, wenn der Encoder nicht erstellbar ist (Session-Start
/// bricht dann mit Rollback ab). Kodier-Fehler zur Laufzeit werden geloggt
/// und der Frame uebersprungen – der Zweig laeuft weiter.
pub fn encoder_zweig_starten(
    profil: AudioProfil,
    mut frames: mpsc::Receiver<Arc<PcmFrame>>,
    schreiber: hearsay_stream::TapSchreiber,
) -> KodekResult<ZweigGriff> {
    let mut encoder = OpusEncoder::neu(profil)?;
    let (stopp_tx, mut stopp_rx) = oneshot::channel::<()>();

    tokio::spawn(async move {
        tracing::debug!(scope = %schreiber.scope(), "Encoder-Zweig gestartet");

        loop {
            tokio::select! {
                frame = frames.recv() => {
                    match frame {
                        Some(frame) => match encoder.kodieren(frame.samples()) {
                            Ok(opus) => schreiber.schreiben(opus),
                            Err(e) => {
                                tracing::warn!(
                                    scope = %schreiber.scope(),
                                    fehler = %e,
                                    "Kodier-Fehler – Frame uebersprungen"
                                );
                            }
                        },
                        None => break,
                    }
                }

                _ = &mut stopp_rx => break,
            }
        }

        tracing::debug!(scope = %schreiber.scope(), "Encoder-Zweig beendet");
    });

    Ok(ZweigGriff::neu(stopp_tx))
}

/// Startet den Roh-Zweig: PCM-Frames → s16le-Bytes → Tap
pub fn roh_zweig_starten(
    mut frames: mpsc::Receiver<Arc<PcmFrame>>,
    schreiber: hearsay_stream::TapSchreiber,
) -> ZweigGriff {
    let (stopp_tx, mut stopp_rx) = oneshot::channel::<()>();

    tokio::spawn(async move {
        tracing::debug!(scope = %schreiber.scope(), "Roh-Zweig gestartet");

        loop {
            tokio::select! {
                frame = frames.recv() => {
                    match frame {
                        Some(frame) => schreiber.schreiben(frame.als_bytes()),
                        None => break,
                    }
                }

                _ = &mut stopp_rx => break,
            }
        }

        tracing::debug!(scope = %schreiber.scope(), "Roh-Zweig beendet");
    });

    ZweigGriff::neu(stopp_tx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use hearsay_core::{ScopeId, StreamFormat};
    use hearsay_stream::TapRegister;

    fn test_frame(wert: i16) -> Arc<PcmFrame> {
        let profil = AudioProfil::default();
        Arc::new(PcmFrame::aus_samples(
            vec![wert; profil.samples_pro_frame()],
            &profil,
        ))
    }

    #[tokio::test]
    async fn roh_zweig_schreibt_s16le_bytes() {
        let register = TapRegister::default();
        let paar = register.tap_erstellen(ScopeId(1));
        let mut hoerer = register.verbinden(ScopeId(1), StreamFormat::Pcm).unwrap();

        let (tx, rx) = mpsc::channel(ZWEIG_QUEUE_GROESSE);
        let griff = roh_zweig_starten(rx, paar.pcm);

        tx.send(test_frame(0x0102)).await.unwrap();

        let block = tokio::time::timeout(
            std::time::Duration::from_secs(1),
            hoerer.strom.naechster(),
        )
        .await
        .expect("Block muss ankommen")
        .expect("Stream darf nicht enden");

        assert_eq!(block.len(), 1920, "Ein Frame = 1920 Bytes s16le");
        assert_eq!(&block[0..2], &[0x02, 0x01]);

        griff.stoppen();
    }

    #[tokio::test]
    async fn encoder_zweig_liefert_opus_bloecke() {
        let register = TapRegister::default();
        let paar = register.tap_erstellen(ScopeId(1));
        let mut hoerer = register.verbinden(ScopeId(1), StreamFormat::Opus).unwrap();

        let (tx, rx) = mpsc::channel(ZWEIG_QUEUE_GROESSE);
        let griff = encoder_zweig_starten(AudioProfil::default(), rx, paar.opus)
            .expect("Encoder-Zweig muss starten");

        tx.send(test_frame(1000)).await.unwrap();

        let block = tokio::time::timeout(
            std::time::Duration::from_secs(1),
            hoerer.strom.naechster(),
        )
        .await
        .expect("Block muss ankommen")
        .expect("Stream darf nicht enden");

        assert!(!block.is_empty(), "Opus-Block darf nicht leer sein");
        assert!(block.len() < 1920, "Opus muss kleiner als Roh-PCM sein");

        griff.stoppen();
    }

    #[tokio::test]
    async fn encoder_zweig_mit_ungueltigem_profil_schlaegt_fehl() {
        let register = TapRegister::default();
        let paar = register.tap_erstellen(ScopeId(1));

        let profil = AudioProfil {
            bitrate_kbps: 5,
            ..AudioProfil::default()
        };
        let (_tx, rx) = mpsc::channel::<Arc<PcmFrame>>(ZWEIG_QUEUE_GROESSE);
        assert!(encoder_zweig_starten(profil, rx, paar.opus).is_err());
    }

    #[tokio::test]
    async fn zweig_stoppen_ist_idempotent() {
        let register = TapRegister::default();
        let paar = register.tap_erstellen(ScopeId(1));

        let (_tx, rx) = mpsc::channel::<Arc<PcmFrame>>(ZWEIG_QUEUE_GROESSE);
        let griff = roh_zweig_starten(rx, paar.pcm);

        griff.stoppen();
        griff.stoppen();
    }
}
