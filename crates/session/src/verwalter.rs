//! SessionVerwalter – Registry und Lebenszyklus aller Relay-Sessions
//!
//! Pro Scope durchlaeuft eine Session die Phasen
//! `Idle -> Startet -> Aktiv -> Stoppt -> Idle`. Der Verwalter ist das
//! explizite Register (kein globaler Zustand): `starten` reserviert den
//! Scope, verdrahtet alle Stufen und registriert die fertige Session;
//! `stoppen` baut in definierter Reihenfolge ab. Jeder Fehler waehrend des
//! Aufbaus rollt bereits erstellte Stufen vollstaendig zurueck.
//!
//! Abbau-Reihenfolge: zuerst der Ingest (kein neuer Input in eine Pipeline,
//! die gerade zerlegt wird), dann die Zweige, dann das Mischwerk (keine
//! Schreibzugriffe auf bereits entfernte Senken), zuletzt die Taps.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::sync::mpsc;

use hearsay_audio::AudioProfil;
use hearsay_core::{HearsayError, KanalId, MixSenke, Result, ScopeId, SprecherId, StreamFormat};
use hearsay_ingest::{IngestKonfig, QuellEmpfaenger, SprachQuelle};
use hearsay_mix::{MixKonfig, MixWerk};
use hearsay_stream::TapRegister;

use crate::ziel::{SprachZiel, ZielVerbindung};
use crate::zweige::{encoder_zweig_starten, roh_zweig_starten, ZweigGriff, ZWEIG_QUEUE_GROESSE};

// ---------------------------------------------------------------------------
// Konfiguration
// ---------------------------------------------------------------------------

/// Konfiguration des Session-Verwalters
#[derive(Debug, Clone)]
pub struct SessionKonfig {
    /// Audio-Profil der gesamten Pipeline
    pub profil: AudioProfil,
    /// Frische-Fenster des Mischwerks
    pub frische_fenster: Duration,
    /// Stille-Dauer, nach der sich eine Sprecher-Route schliesst
    pub stille_timeout: Duration,
    /// Hartes Zeitlimit fuer Quell-Abonnement und Ziel-Beitritt
    pub verbindungs_timeout: Duration,
    /// Kapazitaet der Frame-Queue pro Transcoding-Zweig
    pub zweig_queue_groesse: usize,
    /// Kapazitaet der Paket-Queue pro Sprecher
    pub paket_queue_groesse: usize,
    /// Wiedergabe-Lautstaerke im Relay-Modus (0.0–1.0)
    pub lautstaerke: f32,
}

impl Default for SessionKonfig {
    fn default() -> Self {
        Self {
            profil: AudioProfil::default(),
            frische_fenster: Duration::from_millis(100),
            stille_timeout: Duration::from_millis(100),
            verbindungs_timeout: Duration::from_secs(5),
            zweig_queue_groesse: ZWEIG_QUEUE_GROESSE,
            paket_queue_groesse: 32,
            lautstaerke: 1.0,
        }
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// Eine aktive Relay-Session mit allen Stufen-Griffen
pub struct Session {
    /// Scope (= Quell-Kanal)
    pub scope: ScopeId,
    /// Erlaubte Sprecher
    pub erlaubte_sprecher: HashSet<SprecherId>,
    /// Erstellungszeitpunkt
    pub erstellt: DateTime<Utc>,
    ingest: QuellEmpfaenger,
    mischwerk: MixWerk,
    encoder_zweig: ZweigGriff,
    roh_zweig: ZweigGriff,
    ziel_verbindung: Option<Box<dyn ZielVerbindung>>,
}

impl Session {
    /// Baut die Session in definierter Reihenfolge ab
    fn abbauen(self, register: &TapRegister) {
        tracing::info!(scope = %self.scope, "Session wird abgebaut");

        self.ingest.stoppen();
        self.encoder_zweig.stoppen();
        self.roh_zweig.stoppen();
        self.mischwerk.stoppen();
        if let Some(verbindung) = &self.ziel_verbindung {
            verbindung.trennen();
        }
        register.tap_entfernen(self.scope);

        tracing::info!(scope = %self.scope, "Session beendet");
    }
}

/// Phase eines Registry-Eintrags
enum SessionEintrag {
    /// Aufbau laeuft – der Scope ist reserviert
    Startet,
    /// Session ist vollstaendig verdrahtet
    Aktiv(Session),
}

// ---------------------------------------------------------------------------
// SessionVerwalter
// ---------------------------------------------------------------------------

/// Verwalter aller Relay-Sessions
///
/// Thread-safe und `Clone`-faehig (innerer Arc).
#[derive(Clone)]
pub struct SessionVerwalter {
    inner: Arc<VerwalterInner>,
}

struct VerwalterInner {
    konfig: SessionKonfig,
    register: TapRegister,
    quelle: Arc<dyn SprachQuelle>,
    ziel: Option<Arc<dyn SprachZiel>>,
    /// Sessions, indexiert nach Scope
    sessions: DashMap<ScopeId, SessionEintrag>,
}

impl SessionVerwalter {
    /// Erstellt einen neuen Verwalter
    ///
    /// `ziel` ist nur im Kanal-zu-Kanal-Relay-Modus gesetzt.
    pub fn neu(
        konfig: SessionKonfig,
        register: TapRegister,
        quelle: Arc<dyn SprachQuelle>,
        ziel: Option<Arc<dyn SprachZiel>>,
    ) -> Self {
        Self {
            inner: Arc::new(VerwalterInner {
                konfig,
                register,
                quelle,
                ziel,
                sessions: DashMap::new(),
            }),
        }
    }

    /// Startet eine Session fuer den Scope
    ///
    /// Schlaegt fehl wenn bereits eine Session existiert (kein implizites
    /// Ersetzen). Bei jedem Aufbau-Fehler werden alle bereits erstellten
    /// Stufen zurueckgerollt, bevor der Fehler zurueckkehrt.
    pub async fn starten(
        &self,
        scope: ScopeId,
        erlaubte_sprecher: HashSet<SprecherId>,
        ziel_kanal: Option<KanalId>,
    ) -> Result<()> {
        // Scope reservieren – verhindert auch parallelen Doppelstart
        match self.inner.sessions.entry(scope) {
            dashmap::mapref::entry::Entry::Occupied(_) => {
                return Err(HearsayError::SessionBereitsAktiv(scope));
            }
            dashmap::mapref::entry::Entry::Vacant(eintrag) => {
                eintrag.insert(SessionEintrag::Startet);
            }
        }

        tracing::info!(
            scope = %scope,
            sprecher = erlaubte_sprecher.len(),
            relay = ziel_kanal.is_some(),
            "Session startet"
        );

        match self.aufbauen(scope, &erlaubte_sprecher, ziel_kanal).await {
            Ok(session) => {
                self.inner
                    .sessions
                    .insert(scope, SessionEintrag::Aktiv(session));
                tracing::info!(scope = %scope, "Session aktiv");
                Ok(())
            }
            Err(e) => {
                self.inner.sessions.remove(&scope);
                tracing::warn!(scope = %scope, fehler = %e, "Session-Start fehlgeschlagen");
                Err(e)
            }
        }
    }

    /// Stoppt die Session eines Scopes (keine Aktion wenn keine existiert)
    pub fn stoppen(&self, scope: ScopeId) {
        let eintrag = match self.inner.sessions.entry(scope) {
            dashmap::mapref::entry::Entry::Occupied(eintrag) => {
                if matches!(eintrag.get(), SessionEintrag::Startet) {
                    tracing::warn!(scope = %scope, "Session startet noch – stoppen uebersprungen");
                    return;
                }
                eintrag.remove()
            }
            dashmap::mapref::entry::Entry::Vacant(_) => {
                tracing::debug!(scope = %scope, "stoppen ohne aktive Session – keine Aktion");
                return;
            }
        };

        if let SessionEintrag::Aktiv(session) = eintrag {
            session.abbauen(&self.inner.register);
        }
    }

    /// Stoppt alle aktiven Sessions (Shutdown-Pfad)
    pub fn stoppen_alle(&self) {
        for scope in self.aktive_sessions() {
            self.stoppen(scope);
        }
    }

    /// Gibt die Scopes aller aktiven Sessions zurueck
    pub fn aktive_sessions(&self) -> Vec<ScopeId> {
        let mut scopes: Vec<ScopeId> = self
            .inner
            .sessions
            .iter()
            .filter(|e| matches!(e.value(), SessionEintrag::Aktiv(_)))
            .map(|e| *e.key())
            .collect();
        scopes.sort();
        scopes
    }

    /// Prueft ob fuer den Scope eine aktive Session existiert
    pub fn ist_aktiv(&self, scope: ScopeId) -> bool {
        self.inner
            .sessions
            .get(&scope)
            .map(|e| matches!(e.value(), SessionEintrag::Aktiv(_)))
            .unwrap_or(false)
    }

    // -----------------------------------------------------------------------
    // Interner Aufbau
    // -----------------------------------------------------------------------

    /// Verdrahtet alle Stufen einer Session
    async fn aufbauen(
        &self,
        scope: ScopeId,
        erlaubte_sprecher: &HashSet<SprecherId>,
        ziel_kanal: Option<KanalId>,
    ) -> Result<Session> {
        let konfig = &self.inner.konfig;
        let register = &self.inner.register;

        // Stufe 1: Taps + Mischwerk + Zweig-Queues
        let taps = register.tap_erstellen(scope);
        let mischwerk = MixWerk::neu(MixKonfig {
            profil: konfig.profil.clone(),
            frische_fenster: konfig.frische_fenster,
        });
        let (encoder_tx, encoder_rx) = mpsc::channel(konfig.zweig_queue_groesse);
        let (roh_tx, roh_rx) = mpsc::channel(konfig.zweig_queue_groesse);

        // Stufe 2: Transcoding-Zweige
        let encoder_zweig = match encoder_zweig_starten(konfig.profil.clone(), encoder_rx, taps.opus)
        {
            Ok(zweig) => zweig,
            Err(e) => {
                register.tap_entfernen(scope);
                return Err(e.into());
            }
        };
        let roh_zweig = roh_zweig_starten(roh_rx, taps.pcm);

        // Stufe 3: Misch-Takt an beide Zweige anschliessen
        mischwerk.starten(vec![encoder_tx, roh_tx]);

        // Stufe 4: Ingest mit hartem Bereitschafts-Zeitlimit
        let melder = {
            let verwalter = self.clone();
            Box::new(move |betroffener_scope: ScopeId| {
                tracing::warn!(
                    scope = %betroffener_scope,
                    "Verbindungsverlust – Session wird vollstaendig beendet"
                );
                verwalter.stoppen(betroffener_scope);
            })
        };
        let senke: Arc<dyn MixSenke> = Arc::new(mischwerk.clone());
        let ingest_konfig = IngestKonfig {
            profil: konfig.profil.clone(),
            stille_timeout: konfig.stille_timeout,
            paket_queue_groesse: konfig.paket_queue_groesse,
        };

        let ingest = match tokio::time::timeout(
            konfig.verbindungs_timeout,
            QuellEmpfaenger::starten(
                scope,
                erlaubte_sprecher.clone(),
                senke,
                self.inner.quelle.as_ref(),
                ingest_konfig,
                melder,
            ),
        )
        .await
        {
            Ok(Ok(ingest)) => ingest,
            Ok(Err(e)) => {
                rueckbau(register, scope, &mischwerk, &[&encoder_zweig, &roh_zweig], None);
                return Err(e);
            }
            Err(_) => {
                rueckbau(register, scope, &mischwerk, &[&encoder_zweig, &roh_zweig], None);
                return Err(HearsayError::Zeitlimit(format!(
                    "Quell-Abonnement fuer {scope} nicht rechtzeitig bereit"
                )));
            }
        };

        // Stufe 5: optionales Relay-Ziel (ein weiterer Hoerer des Opus-Taps)
        let mut ziel_verbindung = None;
        if let Some(kanal) = ziel_kanal {
            match self.ziel_verbinden(scope, kanal).await {
                Ok(verbindung) => ziel_verbindung = Some(verbindung),
                Err(e) => {
                    rueckbau(
                        register,
                        scope,
                        &mischwerk,
                        &[&encoder_zweig, &roh_zweig],
                        Some(&ingest),
                    );
                    return Err(e);
                }
            }
        }

        Ok(Session {
            scope,
            erlaubte_sprecher: erlaubte_sprecher.clone(),
            erstellt: Utc::now(),
            ingest,
            mischwerk,
            encoder_zweig,
            roh_zweig,
            ziel_verbindung,
        })
    }

    /// Tritt dem Ziel-Kanal bei und startet die Wiedergabe
    async fn ziel_verbinden(
        &self,
        scope: ScopeId,
        kanal: KanalId,
    ) -> Result<Box<dyn ZielVerbindung>> {
        let konfig = &self.inner.konfig;

        let Some(ziel) = &self.inner.ziel else {
            return Err(HearsayError::ZielUngueltig(
                "kein Sprach-Ziel konfiguriert".into(),
            ));
        };

        let verbindung =
            match tokio::time::timeout(konfig.verbindungs_timeout, ziel.beitreten(kanal)).await {
                Ok(Ok(verbindung)) => verbindung,
                Ok(Err(e)) => return Err(e),
                Err(_) => {
                    return Err(HearsayError::Zeitlimit(format!(
                        "Beitritt zu {kanal} nicht rechtzeitig abgeschlossen"
                    )));
                }
            };

        let Some(anschluss) = self.inner.register.verbinden(scope, StreamFormat::Opus) else {
            verbindung.trennen();
            return Err(HearsayError::intern("Opus-Tap fehlt beim Ziel-Anschluss"));
        };

        if let Err(e) = verbindung.abspielen(anschluss.strom, konfig.lautstaerke).await {
            verbindung.trennen();
            return Err(e);
        }

        tracing::info!(scope = %scope, kanal = %kanal, "Relay-Wiedergabe gestartet");
        Ok(verbindung)
    }
}

/// Rollt einen teilweise aufgebauten Session-Stand zurueck
fn rueckbau(
    register: &TapRegister,
    scope: ScopeId,
    mischwerk: &MixWerk,
    zweige: &[&ZweigGriff],
    ingest: Option<&QuellEmpfaenger>,
) {
    if let Some(ingest) = ingest {
        ingest.stoppen();
    }
    for zweig in zweige {
        zweig.stoppen();
    }
    mischwerk.stoppen();
    register.tap_entfernen(scope);
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
