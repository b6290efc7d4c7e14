//! QuellEmpfaenger – Ereignis-Schleife und Sprecher-Routen
//!
//! Konsumiert den Ereignis-Strom eines Quell-Abonnements. Pro erlaubtem
//! Sprecher, der zu sprechen beginnt, wird eine Route geoeffnet: ein
//! eigener Task mit eigenem Opus-Decoder und begrenzter Paket-Queue, der
//! sich nach `stille_timeout` ohne Pakete selbst schliesst.
//!
//! Eine Route endet mit genau einem von drei Abschluessen: regulaer
//! beendet, fehlgeschlagen (Dekodier-/Stream-Fehler) oder abgeloest
//! (der Sprecher hat waehrenddessen eine neue Route erhalten). Nur die
//! ersten beiden entfernen die Quelle aus der Misch-Senke.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use dashmap::DashMap;
use tokio::sync::{mpsc, oneshot};

use hearsay_audio::{AudioProfil, OpusDecoder};
use hearsay_core::{MixSenke, QuellEreignis, Result, ScopeId, SprecherId};

use crate::quelle::SprachQuelle;

/// Meldung eines unerwarteten Verbindungsverlusts an den Orchestrator
pub type TrennungsMelder = Box<dyn Fn(ScopeId) + Send + Sync>;

// ---------------------------------------------------------------------------
// Konfiguration
// ---------------------------------------------------------------------------

/// Konfiguration des Quell-Ingest
#[derive(Debug, Clone)]
pub struct IngestKonfig {
    /// Audio-Profil fuer die Sprecher-Decoder
    pub profil: AudioProfil,
    /// Stille-Dauer, nach der sich eine Sprecher-Route schliesst
    pub stille_timeout: Duration,
    /// Kapazitaet der Paket-Queue pro Sprecher
    pub paket_queue_groesse: usize,
}

impl Default for IngestKonfig {
    fn default() -> Self {
        Self {
            profil: AudioProfil::default(),
            stille_timeout: Duration::from_millis(100),
            paket_queue_groesse: 32,
        }
    }
}

// ---------------------------------------------------------------------------
// QuellEmpfaenger
// ---------------------------------------------------------------------------

/// Abschluss-Grund einer Sprecher-Route
#[derive(Debug)]
enum RoutenAbschluss {
    /// Stream regulaer beendet (Ende-Ereignis oder Stoppen)
    Beendet,
    /// `stille_timeout` ohne Pakete
    Stille,
    /// Dekodier- oder Stream-Fehler
    Fehlgeschlagen,
}

/// Eine offene Sprecher-Route
struct SprecherRoute {
    /// Paket-Queue zur Dekodier-Task
    tx: mpsc::Sender<Bytes>,
    /// Generation – unterscheidet abgeloeste von aktuellen Routen
    generation: u64,
}

/// Der Quell-Ingest einer Session
pub struct QuellEmpfaenger {
    inner: Arc<IngestInner>,
}

struct IngestInner {
    konfig: IngestKonfig,
    scope: ScopeId,
    erlaubte: HashSet<SprecherId>,
    senke: Arc<dyn MixSenke>,
    /// Offene Routen, indexiert nach SprecherId
    routen: DashMap<SprecherId, SprecherRoute>,
    naechste_generation: AtomicU64,
    stopp: parking_lot::Mutex<Option<oneshot::Sender<()>>>,
    melder: TrennungsMelder,
}

impl QuellEmpfaenger {
    /// Abonniert den Scope und startet die Ereignis-Schleife
    ///
    /// Pakete erlaubter Sprecher fliessen dekodiert in `senke`; beim Ende
    /// eines Sprecher-Streams wird dessen Quelle aus der Senke entfernt.
    /// `melder` wird bei unerwartetem Verbindungsverlust aufgerufen.
    pub async fn starten(
        scope: ScopeId,
        erlaubte: HashSet<SprecherId>,
        senke: Arc<dyn MixSenke>,
        quelle: &dyn SprachQuelle,
        konfig: IngestKonfig,
        melder: TrennungsMelder,
    ) -> Result<Self> {
        let mut ereignisse = quelle.abonnieren(scope).await?;

        let (stopp_tx, mut stopp_rx) = oneshot::channel::<()>();
        let inner = Arc::new(IngestInner {
            konfig,
            scope,
            erlaubte,
            senke,
            routen: DashMap::new(),
            naechste_generation: AtomicU64::new(0),
            stopp: parking_lot::Mutex::new(Some(stopp_tx)),
            melder,
        });

        let schleife = Arc::clone(&inner);
        tokio::spawn(async move {
            tracing::info!(scope = %schleife.scope, "Quell-Ingest gestartet");

            loop {
                tokio::select! {
                    ereignis = ereignisse.recv() => {
                        match ereignis {
                            Some(QuellEreignis::SprechBeginn { sprecher }) => {
                                sprech_beginn(&schleife, sprecher);
                            }
                            Some(QuellEreignis::AudioPaket { sprecher, daten }) => {
                                paket_weiterreichen(&schleife, sprecher, daten);
                            }
                            Some(QuellEreignis::SprechEnde { sprecher }) => {
                                route_schliessen(&schleife, sprecher, None);
                            }
                            Some(QuellEreignis::QuellFehler { sprecher, grund }) => {
                                route_schliessen(&schleife, sprecher, Some(grund));
                            }
                            Some(QuellEreignis::Getrennt) | None => {
                                tracing::warn!(
                                    scope = %schleife.scope,
                                    "Quell-Verbindung verloren – Session wird gemeldet"
                                );
                                (schleife.melder)(schleife.scope);
                                break;
                            }
                        }
                    }

                    _ = &mut stopp_rx => {
                        break;
                    }
                }
            }

            tracing::info!(scope = %schleife.scope, "Quell-Ingest beendet");
        });

        Ok(Self { inner })
    }

    /// Stoppt den Ingest und bereinigt alle Sprecher-Routen
    ///
    /// Mehrfaches Stoppen ist erlaubt und wirkungslos.
    pub fn stoppen(&self) {
        if let Some(tx) = self.inner.stopp.lock().take() {
            let _ = tx.send(());
        }

        let sprecher: Vec<SprecherId> = self.inner.routen.iter().map(|e| *e.key()).collect();
        self.inner.routen.clear();
        for s in sprecher {
            self.inner.senke.quelle_entfernen(s);
        }
    }

    /// Gibt die Anzahl der offenen Sprecher-Routen zurueck
    pub fn routen_anzahl(&self) -> usize {
        self.inner.routen.len()
    }
}

// ---------------------------------------------------------------------------
// Routen-Verwaltung
// ---------------------------------------------------------------------------

/// Oeffnet die Route eines Sprechers (sofern erlaubt)
fn sprech_beginn(inner: &Arc<IngestInner>, sprecher: SprecherId) {
    if !inner.erlaubte.contains(&sprecher) {
        tracing::debug!(sprecher = %sprecher, "Sprecher nicht erlaubt – ignoriert");
        return;
    }

    let mut decoder = match OpusDecoder::neu(&inner.konfig.profil) {
        Ok(d) => d,
        Err(e) => {
            tracing::error!(sprecher = %sprecher, fehler = %e, "Decoder nicht erstellbar");
            return;
        }
    };

    let (tx, mut rx) = mpsc::channel::<Bytes>(inner.konfig.paket_queue_groesse);
    let generation = inner.naechste_generation.fetch_add(1, Ordering::Relaxed);

    // insert ersetzt eine evtl. noch offene alte Route – deren Task endet
    // mit geschlossener Queue und gilt dann als abgeloest
    inner.routen.insert(sprecher, SprecherRoute { tx, generation });
    tracing::debug!(sprecher = %sprecher, generation, "Sprecher-Route geoeffnet");

    let route = Arc::clone(inner);
    tokio::spawn(async move {
        let abschluss = loop {
            match tokio::time::timeout(route.konfig.stille_timeout, rx.recv()).await {
                Ok(Some(daten)) => match decoder.dekodieren(&daten) {
                    Ok(samples) => route.senke.quelle_aktualisieren(sprecher, samples),
                    Err(e) => {
                        tracing::warn!(
                            sprecher = %sprecher,
                            fehler = %e,
                            "Dekodier-Fehler – Route wird geschlossen"
                        );
                        break RoutenAbschluss::Fehlgeschlagen;
                    }
                },
                Ok(None) => break RoutenAbschluss::Beendet,
                Err(_) => break RoutenAbschluss::Stille,
            }
        };

        route_abschliessen(&route, sprecher, generation, abschluss);
    });
}

/// Reicht ein Paket an die offene Route des Sprechers weiter
fn paket_weiterreichen(inner: &Arc<IngestInner>, sprecher: SprecherId, daten: Bytes) {
    let Some(route) = inner.routen.get(&sprecher) else {
        tracing::trace!(sprecher = %sprecher, "Paket ohne offene Route – verworfen");
        return;
    };

    match route.tx.try_send(daten) {
        Ok(()) => {}
        Err(mpsc::error::TrySendError::Full(_)) => {
            tracing::warn!(sprecher = %sprecher, "Paket-Queue voll – Paket verworfen");
        }
        Err(mpsc::error::TrySendError::Closed(_)) => {
            tracing::debug!(sprecher = %sprecher, "Paket-Queue bereits geschlossen");
        }
    }
}

/// Schliesst die Route eines Sprechers (Ende- oder Fehler-Ereignis)
fn route_schliessen(inner: &Arc<IngestInner>, sprecher: SprecherId, fehler: Option<String>) {
    if let Some(grund) = fehler {
        tracing::warn!(sprecher = %sprecher, grund = %grund, "Sprecher-Stream fehlgeschlagen");
    }

    // Entfernen laesst die Paket-Queue fallen; die Dekodier-Task endet
    // daraufhin und raeumt die Misch-Quelle auf
    inner.routen.remove(&sprecher);
}

/// Abschluss einer Dekodier-Task: Quelle entfernen, sofern nicht abgeloest
fn route_abschliessen(
    inner: &Arc<IngestInner>,
    sprecher: SprecherId,
    generation: u64,
    abschluss: RoutenAbschluss,
) {
    let aktuelle_generation = inner.routen.get(&sprecher).map(|r| r.generation);

    match aktuelle_generation {
        Some(g) if g != generation => {
            // Abgeloest: eine neue Route ist bereits aktiv – nichts entfernen
            tracing::trace!(sprecher = %sprecher, generation, "Route abgeloest");
        }
        Some(_) => {
            inner.routen.remove(&sprecher);
            inner.senke.quelle_entfernen(sprecher);
            tracing::debug!(sprecher = %sprecher, ?abschluss, "Sprecher-Route geschlossen");
        }
        None => {
            // Eintrag wurde bereits entfernt (Ende-Ereignis oder Stoppen) –
            // das Entfernen aus der Senke ist idempotent
            inner.senke.quelle_entfernen(sprecher);
            tracing::debug!(sprecher = %sprecher, ?abschluss, "Sprecher-Route geschlossen");
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use hearsay_audio::OpusEncoder;
    use std::sync::atomic::AtomicBool;

    /// Misch-Senke, die alle Aufrufe aufzeichnet
    #[derive(Default)]
    struct TestSenke {
        aktualisiert: parking_lot::Mutex<Vec<(SprecherId, usize)>>,
        entfernt: parking_lot::Mutex<Vec<SprecherId>>,
    }

    impl MixSenke for TestSenke {
        fn quelle_aktualisieren(&self, sprecher: SprecherId, samples: Vec<i16>) {
            self.aktualisiert.lock().push((sprecher, samples.len()));
        }

        fn quelle_entfernen(&self, sprecher: SprecherId) {
            self.entfernt.lock().push(sprecher);
        }
    }

    /// Quelle, die einen vorbereiteten Ereignis-Kanal ausgibt
    struct TestQuelle {
        rx: parking_lot::Mutex<Option<mpsc::Receiver<QuellEreignis>>>,
    }

    impl TestQuelle {
        fn neu() -> (Self, mpsc::Sender<QuellEreignis>) {
            let (tx, rx) = mpsc::channel(32);
            (
                Self {
                    rx: parking_lot::Mutex::new(Some(rx)),
                },
                tx,
            )
        }
    }

    #[async_trait]
    impl SprachQuelle for TestQuelle {
        async fn abonnieren(&self, _scope: ScopeId) -> Result<mpsc::Receiver<QuellEreignis>> {
            Ok(self
                .rx
                .lock()
                .take()
                .expect("TestQuelle nur einmal abonnierbar"))
        }
    }

    /// Erzeugt ein echtes Opus-Paket (960 Samples Sinus)
    fn opus_paket() -> Bytes {
        let mut enc = OpusEncoder::neu(AudioProfil::default()).unwrap();
        let pcm: Vec<i16> = (0..960).map(|i| ((i as f32 * 0.1).sin() * 4000.0) as i16).collect();
        enc.kodieren(&pcm).unwrap()
    }

    async fn empfaenger_mit(
        erlaubte: &[u64],
        quelle: &TestQuelle,
        senke: Arc<TestSenke>,
    ) -> QuellEmpfaenger {
        QuellEmpfaenger::starten(
            ScopeId(1),
            erlaubte.iter().map(|&id| SprecherId(id)).collect(),
            senke,
            quelle,
            IngestKonfig::default(),
            Box::new(|_| {}),
        )
        .await
        .expect("Ingest muss starten")
    }

    #[tokio::test(start_paused = true)]
    async fn erlaubter_sprecher_fliesst_zur_senke() {
        let (quelle, tx) = TestQuelle::neu();
        let senke = Arc::new(TestSenke::default());
        let empfaenger = empfaenger_mit(&[7], &quelle, Arc::clone(&senke)).await;

        tx.send(QuellEreignis::SprechBeginn {
            sprecher: SprecherId(7),
        })
        .await
        .unwrap();
        tx.send(QuellEreignis::AudioPaket {
            sprecher: SprecherId(7),
            daten: opus_paket(),
        })
        .await
        .unwrap();

        tokio::time::sleep(Duration::from_millis(10)).await;

        let aktualisiert = senke.aktualisiert.lock();
        assert_eq!(aktualisiert.len(), 1);
        assert_eq!(aktualisiert[0].0, SprecherId(7));
        assert_eq!(aktualisiert[0].1, 960, "Ein Frame = 960 Samples");

        empfaenger.stoppen();
    }

    #[tokio::test(start_paused = true)]
    async fn nicht_erlaubter_sprecher_ignoriert() {
        let (quelle, tx) = TestQuelle::neu();
        let senke = Arc::new(TestSenke::default());
        let empfaenger = empfaenger_mit(&[7], &quelle, Arc::clone(&senke)).await;

        tx.send(QuellEreignis::SprechBeginn {
            sprecher: SprecherId(99),
        })
        .await
        .unwrap();
        tx.send(QuellEreignis::AudioPaket {
            sprecher: SprecherId(99),
            daten: opus_paket(),
        })
        .await
        .unwrap();

        tokio::time::sleep(Duration::from_millis(10)).await;

        assert!(senke.aktualisiert.lock().is_empty());
        assert_eq!(empfaenger.routen_anzahl(), 0);

        empfaenger.stoppen();
    }

    #[tokio::test(start_paused = true)]
    async fn stille_schliesst_route() {
        let (quelle, tx) = TestQuelle::neu();
        let senke = Arc::new(TestSenke::default());
        let empfaenger = empfaenger_mit(&[7], &quelle, Arc::clone(&senke)).await;

        tx.send(QuellEreignis::SprechBeginn {
            sprecher: SprecherId(7),
        })
        .await
        .unwrap();
        tx.send(QuellEreignis::AudioPaket {
            sprecher: SprecherId(7),
            daten: opus_paket(),
        })
        .await
        .unwrap();

        // Deutlich laenger als das Stille-Timeout warten
        tokio::time::sleep(Duration::from_millis(250)).await;

        assert_eq!(empfaenger.routen_anzahl(), 0, "Route muss sich schliessen");
        assert!(
            senke.entfernt.lock().contains(&SprecherId(7)),
            "Quelle muss aus der Senke entfernt werden"
        );

        empfaenger.stoppen();
    }

    #[tokio::test(start_paused = true)]
    async fn sprech_ende_entfernt_quelle() {
        let (quelle, tx) = TestQuelle::neu();
        let senke = Arc::new(TestSenke::default());
        let empfaenger = empfaenger_mit(&[7], &quelle, Arc::clone(&senke)).await;

        tx.send(QuellEreignis::SprechBeginn {
            sprecher: SprecherId(7),
        })
        .await
        .unwrap();
        tx.send(QuellEreignis::AudioPaket {
            sprecher: SprecherId(7),
            daten: opus_paket(),
        })
        .await
        .unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;

        tx.send(QuellEreignis::SprechEnde {
            sprecher: SprecherId(7),
        })
        .await
        .unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert_eq!(empfaenger.routen_anzahl(), 0);
        assert!(senke.entfernt.lock().contains(&SprecherId(7)));

        empfaenger.stoppen();
    }

    #[tokio::test(start_paused = true)]
    async fn dekodier_fehler_isoliert_pro_sprecher() {
        let (quelle, tx) = TestQuelle::neu();
        let senke = Arc::new(TestSenke::default());
        let empfaenger = empfaenger_mit(&[1, 2], &quelle, Arc::clone(&senke)).await;

        for sprecher in [SprecherId(1), SprecherId(2)] {
            tx.send(QuellEreignis::SprechBeginn { sprecher }).await.unwrap();
        }

        // Sprecher 1 liefert Muell, Sprecher 2 ein gueltiges Paket
        tx.send(QuellEreignis::AudioPaket {
            sprecher: SprecherId(1),
            daten: Bytes::from_static(&[0xFF; 3]),
        })
        .await
        .unwrap();
        tx.send(QuellEreignis::AudioPaket {
            sprecher: SprecherId(2),
            daten: opus_paket(),
        })
        .await
        .unwrap();

        tokio::time::sleep(Duration::from_millis(10)).await;

        assert!(
            senke.entfernt.lock().contains(&SprecherId(1)),
            "Fehlerhafter Sprecher muss entfernt werden"
        );
        assert!(
            senke
                .aktualisiert
                .lock()
                .iter()
                .any(|(s, _)| *s == SprecherId(2)),
            "Anderer Sprecher darf nicht betroffen sein"
        );

        empfaenger.stoppen();
    }

    #[tokio::test(start_paused = true)]
    async fn getrennt_meldet_trennung() {
        let (quelle, tx) = TestQuelle::neu();
        let senke = Arc::new(TestSenke::default());

        let gemeldet = Arc::new(AtomicBool::new(false));
        let gemeldet2 = Arc::clone(&gemeldet);

        let empfaenger = QuellEmpfaenger::starten(
            ScopeId(1),
            HashSet::new(),
            senke,
            &quelle,
            IngestKonfig::default(),
            Box::new(move |scope| {
                assert_eq!(scope, ScopeId(1));
                gemeldet2.store(true, Ordering::SeqCst);
            }),
        )
        .await
        .unwrap();

        tx.send(QuellEreignis::Getrennt).await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert!(gemeldet.load(Ordering::SeqCst), "Melder muss aufgerufen werden");

        empfaenger.stoppen();
    }

    #[tokio::test(start_paused = true)]
    async fn stoppen_ist_idempotent() {
        let (quelle, tx) = TestQuelle::neu();
        let senke = Arc::new(TestSenke::default());
        let empfaenger = empfaenger_mit(&[7], &quelle, Arc::clone(&senke)).await;

        tx.send(QuellEreignis::SprechBeginn {
            sprecher: SprecherId(7),
        })
        .await
        .unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;

        empfaenger.stoppen();
        empfaenger.stoppen();

        assert_eq!(empfaenger.routen_anzahl(), 0);
        assert!(senke.entfernt.lock().contains(&SprecherId(7)));
    }
}
