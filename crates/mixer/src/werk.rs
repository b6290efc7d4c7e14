//! MixWerk – taktgesteuertes Mischen aller aktiven Quellen
//!
//! Ein einzelner Takt-Task (20 ms Periode) ist der einzige Produzent von
//! Ausgabe-Frames; kein anderer Pfad erzeugt welche. Pro Tick entsteht
//! exakt ein Frame – Stille, wenn keine frische Quelle vorliegt. Die
//! Weitergabe an die Zweige erfolgt nicht-blockierend (`try_send`), ein
//! langsamer Zweig verliert Frames statt den Takt anzuhalten.
//!
//! Thread-safe und `Clone`-faehig (innerer Arc).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::{mpsc, oneshot};
use tokio::time::MissedTickBehavior;

use hearsay_audio::{AudioProfil, PcmFrame};
use hearsay_core::{MixSenke, SprecherId};

use crate::mischung::abmischen;
use crate::quelle::AktiveQuelle;

// ---------------------------------------------------------------------------
// Konfiguration
// ---------------------------------------------------------------------------

/// Konfiguration des Mischwerks
#[derive(Debug, Clone)]
pub struct MixKonfig {
    /// Audio-Profil (bestimmt Takt und Frame-Groesse)
    pub profil: AudioProfil,
    /// Frische-Fenster: aeltere Quellen gelten als momentan still
    pub frische_fenster: Duration,
}

impl Default for MixKonfig {
    fn default() -> Self {
        Self {
            profil: AudioProfil::default(),
            frische_fenster: Duration::from_millis(100),
        }
    }
}

// ---------------------------------------------------------------------------
// MixWerk
// ---------------------------------------------------------------------------

/// Das Mischwerk einer Session
#[derive(Clone)]
pub struct MixWerk {
    inner: Arc<MixWerkInner>,
}

struct MixWerkInner {
    konfig: MixKonfig,
    /// Aktive Quellen, indexiert nach SprecherId
    quellen: DashMap<SprecherId, AktiveQuelle>,
    /// Laeuft der Takt-Task gerade?
    laeuft: AtomicBool,
    /// Stopp-Signal fuer den Takt-Task
    stopp: parking_lot::Mutex<Option<oneshot::Sender<()>>>,
}

impl MixWerk {
    /// Erstellt ein neues Mischwerk (noch ohne laufenden Takt)
    pub fn neu(konfig: MixKonfig) -> Self {
        Self {
            inner: Arc::new(MixWerkInner {
                konfig,
                quellen: DashMap::new(),
                laeuft: AtomicBool::new(false),
                stopp: parking_lot::Mutex::new(None),
            }),
        }
    }

    /// Startet den Takt-Task
    ///
    /// Jeder Tick mischt die frischen Quellen ab und reicht den Frame an
    /// alle `ausgaenge` weiter. `MissedTickBehavior::Burst` holt nach einem
    /// Aussetzer verpasste Ticks nach, damit die Emissionsrate ueber jedes
    /// Zeitfenster bei einem Frame pro Takt bleibt.
    pub fn starten(&self, ausgaenge: Vec<mpsc::Sender<Arc<PcmFrame>>>) {
        if self.inner.laeuft.swap(true, Ordering::SeqCst) {
            tracing::warn!("MixWerk laeuft bereits – starten ignoriert");
            return;
        }

        let (stopp_tx, mut stopp_rx) = oneshot::channel::<()>();
        *self.inner.stopp.lock() = Some(stopp_tx);

        let werk = self.clone();
        tokio::spawn(async move {
            let mut takt = tokio::time::interval(werk.inner.konfig.profil.takt());
            takt.set_missed_tick_behavior(MissedTickBehavior::Burst);

            tracing::info!(
                takt_ms = werk.inner.konfig.profil.frame_dauer.als_ms(),
                "Misch-Takt gestartet"
            );

            loop {
                tokio::select! {
                    _ = takt.tick() => {
                        let frame = Arc::new(werk.takt_abmischen());

                        for ausgang in &ausgaenge {
                            match ausgang.try_send(Arc::clone(&frame)) {
                                Ok(()) => {}
                                Err(mpsc::error::TrySendError::Full(_)) => {
                                    tracing::warn!("Zweig-Queue voll – Frame verworfen");
                                }
                                Err(mpsc::error::TrySendError::Closed(_)) => {
                                    tracing::trace!("Zweig-Queue geschlossen");
                                }
                            }
                        }
                    }

                    _ = &mut stopp_rx => {
                        break;
                    }
                }
            }

            tracing::info!("Misch-Takt beendet");
        });
    }

    /// Stoppt den Takt-Task und leert alle Quellen
    ///
    /// Mehrfaches Stoppen ist erlaubt und wirkungslos.
    pub fn stoppen(&self) {
        if let Some(tx) = self.inner.stopp.lock().take() {
            let _ = tx.send(());
        }
        self.inner.laeuft.store(false, Ordering::SeqCst);
        self.inner.quellen.clear();
    }

    /// Gibt die Anzahl der aktuell verfolgten Quellen zurueck
    pub fn quellen_anzahl(&self) -> usize {
        self.inner.quellen.len()
    }

    /// Laeuft der Takt-Task gerade?
    pub fn ist_aktiv(&self) -> bool {
        self.inner.laeuft.load(Ordering::SeqCst)
    }

    // -----------------------------------------------------------------------
    // Interne Hilfsfunktionen
    // -----------------------------------------------------------------------

    /// Mischt einen Tick ab: frische Quellen mitteln, sonst Stille
    ///
    /// Die Puffer werden kopiert, damit waehrend der Misch-Mathematik keine
    /// Shard-Locks der Map gehalten werden.
    fn takt_abmischen(&self) -> PcmFrame {
        let fenster = self.inner.konfig.frische_fenster;
        let profil = &self.inner.konfig.profil;

        let beitraege: Vec<Vec<i16>> = self
            .inner
            .quellen
            .iter()
            .filter(|eintrag| eintrag.ist_frisch(fenster))
            .map(|eintrag| eintrag.puffer.clone())
            .collect();

        if beitraege.is_empty() {
            return PcmFrame::stille(profil);
        }

        let refs: Vec<&[i16]> = beitraege.iter().map(|p| p.as_slice()).collect();
        let mut samples = vec![0i16; profil.samples_pro_frame()];
        abmischen(&refs, &mut samples);

        PcmFrame::aus_samples(samples, profil)
    }
}

impl MixSenke for MixWerk {
    /// Ersetzt den Puffer eines Sprechers (nur bei laufendem Werk verfolgt)
    fn quelle_aktualisieren(&self, sprecher: SprecherId, samples: Vec<i16>) {
        if !self.inner.laeuft.load(Ordering::SeqCst) {
            return;
        }

        match self.inner.quellen.entry(sprecher) {
            dashmap::mapref::entry::Entry::Occupied(mut eintrag) => {
                eintrag.get_mut().aktualisieren(samples);
            }
            dashmap::mapref::entry::Entry::Vacant(eintrag) => {
                tracing::debug!(sprecher = %sprecher, "Neue Misch-Quelle");
                eintrag.insert(AktiveQuelle::neu(sprecher, samples));
            }
        }
    }

    /// Entfernt den Eintrag eines Sprechers (idempotent)
    fn quelle_entfernen(&self, sprecher: SprecherId) {
        if self.inner.quellen.remove(&sprecher).is_some() {
            tracing::debug!(sprecher = %sprecher, "Misch-Quelle entfernt");
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
