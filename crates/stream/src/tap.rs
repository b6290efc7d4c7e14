//! Tap-Register – Weiterleitung gemischter Audio-Daten an Hoerer
//!
//! Das `TapRegister` verwaltet alle lebenden Taps und verteilt jeden
//! geschriebenen Datenblock an die privaten Queues aller verbundenen
//! Hoerer (Fan-out-Stil).
//!
//! ## Design-Entscheidungen
//! - DashMap fuer lock-free concurrent access auf Taps und Hoerer-Listen
//! - Tokio mpsc-Queues pro Hoerer (kein direktes Netzwerk-Schreiben im Tap)
//! - Nicht-blockierendes `try_send`: volle Queue verwirft nur fuer diesen
//!   Hoerer, geschlossene Queue entfernt den Eintrag
//!
//! Daten, die vor dem Verbinden eines Hoerers geschrieben wurden, erreichen
//! ihn nie – ein Anschluss liefert den Stream ab Verbindungszeitpunkt.

use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

use bytes::Bytes;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::sync::mpsc;

use hearsay_core::{HoererId, ScopeId, StreamFormat};

/// Standard-Kapazitaet der Queue pro Hoerer (Datenbloecke)
pub const HOERER_QUEUE_GROESSE: usize = 256;

// ---------------------------------------------------------------------------
// Hoerer
// ---------------------------------------------------------------------------

/// Ein verbundener Hoerer eines Taps
struct Hoerer {
    /// Hoerer-ID
    id: HoererId,
    /// Verbindungszeitpunkt
    verbunden_seit: DateTime<Utc>,
    /// Private Queue: Datenbloecke werden hier hineingelegt
    tx: mpsc::Sender<Bytes>,
    /// Anzahl verworfener Bloecke (Queue voll)
    verworfen: AtomicU64,
}

// ---------------------------------------------------------------------------
// Tap
// ---------------------------------------------------------------------------

/// Ein lebender Tap – Hoerer-Liste eines (Scope, Format)-Paars
struct Tap {
    /// Hoerer, indexiert nach HoererId
    hoerer: DashMap<HoererId, Hoerer>,
}

impl Tap {
    fn neu() -> Self {
        Self {
            hoerer: DashMap::new(),
        }
    }

    /// Verteilt einen Datenblock an alle Hoerer
    ///
    /// `Bytes` ist billig klonbar (Referenzzaehlung, kein Memcpy).
    /// Gibt die Anzahl der erfolgreichen Zustellungen zurueck.
    fn verteilen(&self, daten: &Bytes) -> usize {
        let mut zugestellt = 0usize;
        let mut geschlossen: Vec<HoererId> = Vec::new();

        self.hoerer.iter().for_each(|eintrag| {
            match eintrag.tx.try_send(daten.clone()) {
                Ok(()) => zugestellt += 1,
                Err(mpsc::error::TrySendError::Full(_)) => {
                    let bisher = eintrag.verworfen.fetch_add(1, Ordering::Relaxed);
                    if bisher == 0 {
                        tracing::warn!(
                            hoerer = %eintrag.id,
                            "Hoerer-Queue voll – Daten werden verworfen"
                        );
                    }
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    geschlossen.push(eintrag.id);
                }
            }
        });

        // Erst nach der Iteration entfernen (kein Entfernen im Shard-Lock)
        for id in geschlossen {
            if self.hoerer.remove(&id).is_some() {
                tracing::debug!(hoerer = %id, "Hoerer-Queue geschlossen – Eintrag entfernt");
            }
        }

        zugestellt
    }
}

// ---------------------------------------------------------------------------
// TapRegister
// ---------------------------------------------------------------------------

/// Zentrales Register aller lebenden Taps
///
/// Thread-safe und `Clone`-faehig (innerer Arc).
#[derive(Clone)]
pub struct TapRegister {
    inner: Arc<TapRegisterInner>,
}

struct TapRegisterInner {
    /// Lebende Taps, indexiert nach (Scope, Format)
    taps: DashMap<(ScopeId, StreamFormat), Arc<Tap>>,
    /// Queue-Kapazitaet pro Hoerer
    queue_groesse: usize,
}

impl TapRegister {
    /// Erstellt ein neues leeres Register
    pub fn neu(queue_groesse: usize) -> Self {
        Self {
            inner: Arc::new(TapRegisterInner {
                taps: DashMap::new(),
                queue_groesse,
            }),
        }
    }

    /// Erstellt die beiden Taps einer Session und gibt die Schreib-Enden zurueck
    ///
    /// Ein evtl. bestehendes Tap-Paar wird ersetzt; dessen Hoerer-Queues
    /// fallen und die zugehoerigen Streams enden.
    pub fn tap_erstellen(&self, scope: ScopeId) -> TapPaar {
        let opus = Arc::new(Tap::neu());
        let pcm = Arc::new(Tap::neu());

        self.inner
            .taps
            .insert((scope, StreamFormat::Opus), Arc::clone(&opus));
        self.inner
            .taps
            .insert((scope, StreamFormat::Pcm), Arc::clone(&pcm));

        tracing::info!(scope = %scope, "Tap-Paar erstellt");

        TapPaar {
            opus: TapSchreiber {
                scope,
                format: StreamFormat::Opus,
                tap: opus,
            },
            pcm: TapSchreiber {
                scope,
                format: StreamFormat::Pcm,
                tap: pcm,
            },
        }
    }

    /// Verbindet einen neuen Hoerer mit einem Tap
    ///
    /// Gibt `None` zurueck wenn fuer den Scope kein Tap lebt. Der Hoerer
    /// erhaelt nur Daten, die nach diesem Aufruf geschrieben werden.
    pub fn verbinden(&self, scope: ScopeId, format: StreamFormat) -> Option<HoererAnschluss> {
        let tap = self
            .inner
            .taps
            .get(&(scope, format))
            .map(|t| Arc::clone(&t))?;

        let id = HoererId::neu();
        let verbunden_seit = Utc::now();
        let (tx, rx) = mpsc::channel(self.inner.queue_groesse);

        tap.hoerer.insert(
            id,
            Hoerer {
                id,
                verbunden_seit,
                tx,
                verworfen: AtomicU64::new(0),
            },
        );

        tracing::info!(scope = %scope, format = %format, hoerer = %id, "Hoerer verbunden");

        Some(HoererAnschluss {
            id,
            format,
            verbunden_seit,
            strom: HoererStrom {
                rx,
                _wache: HoererWache {
                    register: self.clone(),
                    scope,
                    format,
                    id,
                },
            },
        })
    }

    /// Entfernt das Tap-Paar eines Scopes (idempotent)
    ///
    /// Alle Hoerer-Queues fallen, die zugehoerigen Streams enden.
    pub fn tap_entfernen(&self, scope: ScopeId) {
        let mut entfernt = false;
        for format in [StreamFormat::Opus, StreamFormat::Pcm] {
            entfernt |= self.inner.taps.remove(&(scope, format)).is_some();
        }
        if entfernt {
            tracing::info!(scope = %scope, "Tap-Paar entfernt");
        }
    }

    /// Gibt die Scope-IDs aller lebenden Taps zurueck (Diagnose)
    pub fn aktive_taps(&self) -> Vec<ScopeId> {
        let mut scopes: Vec<ScopeId> = self.inner.taps.iter().map(|e| e.key().0).collect();
        scopes.sort();
        scopes.dedup();
        scopes
    }

    /// Anzahl der verbundenen Hoerer eines Scopes (beide Formate)
    pub fn hoerer_anzahl(&self, scope: ScopeId) -> usize {
        [StreamFormat::Opus, StreamFormat::Pcm]
            .iter()
            .filter_map(|format| self.inner.taps.get(&(scope, *format)))
            .map(|tap| tap.hoerer.len())
            .sum()
    }

    // -----------------------------------------------------------------------
    // Interne Hilfsfunktionen
    // -----------------------------------------------------------------------

    /// Entfernt einen Hoerer (von der Anschluss-Wache aufgerufen)
    fn hoerer_trennen(&self, scope: ScopeId, format: StreamFormat, id: HoererId) {
        let Some(tap) = self.inner.taps.get(&(scope, format)) else {
            return; // Tap bereits entfernt
        };

        if let Some((_, hoerer)) = tap.hoerer.remove(&id) {
            tracing::info!(
                scope = %scope,
                format = %format,
                hoerer = %id,
                verworfen = hoerer.verworfen.load(Ordering::Relaxed),
                verbunden_seit = %hoerer.verbunden_seit,
                "Hoerer getrennt"
            );
        }
    }
}

impl Default for TapRegister {
    fn default() -> Self {
        Self::neu(HOERER_QUEUE_GROESSE)
    }
}

// ---------------------------------------------------------------------------
// Schreib- und Lese-Enden
// ---------------------------------------------------------------------------

/// Die beiden Schreib-Enden einer Session (Opus + PCM)
pub struct TapPaar {
    pub opus: TapSchreiber,
    pub pcm: TapSchreiber,
}

/// Schreib-Ende eines Taps – wird von den Transcoding-Zweigen befuellt
pub struct TapSchreiber {
    scope: ScopeId,
    format: StreamFormat,
    tap: Arc<Tap>,
}

impl TapSchreiber {
    /// Verteilt einen Datenblock an alle verbundenen Hoerer
    pub fn schreiben(&self, daten: Bytes) {
        let zugestellt = self.tap.verteilen(&daten);
        tracing::trace!(
            scope = %self.scope,
            format = %self.format,
            bytes = daten.len(),
            hoerer = zugestellt,
            "Block verteilt"
        );
    }

    /// Scope dieses Schreib-Endes
    pub fn scope(&self) -> ScopeId {
        self.scope
    }

    /// Format dieses Schreib-Endes
    pub fn format(&self) -> StreamFormat {
        self.format
    }
}

/// Ein verbundener Hoerer-Anschluss (Lese-Ende)
pub struct HoererAnschluss {
    /// Hoerer-ID
    pub id: HoererId,
    /// Format des Taps
    pub format: StreamFormat,
    /// Verbindungszeitpunkt
    pub verbunden_seit: DateTime<Utc>,
    /// Der eigentliche Datenstrom
    pub strom: HoererStrom,
}

/// Datenstrom eines Hoerers
///
/// Beim Fallenlassen (z.B. Client-Disconnect beim HTTP-Streaming) meldet
/// die eingebaute Wache den Hoerer sofort beim Register ab.
pub struct HoererStrom {
    rx: mpsc::Receiver<Bytes>,
    _wache: HoererWache,
}

impl HoererStrom {
    /// Empfaengt den naechsten Block (None wenn der Tap entfernt wurde)
    pub async fn naechster(&mut self) -> Option<Bytes> {
        self.rx.recv().await
    }

    /// Nicht-blockierender Empfang (fuer Tests und Diagnose)
    pub fn versuch_empfangen(&mut self) -> Option<Bytes> {
        self.rx.try_recv().ok()
    }
}

impl tokio_stream::Stream for HoererStrom {
    type Item = std::result::Result<Bytes, std::convert::Infallible>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx).map(|opt| opt.map(Ok))
    }
}

/// Abmelde-Wache eines Hoerers
struct HoererWache {
    register: TapRegister,
    scope: ScopeId,
    format: StreamFormat,
    id: HoererId,
}

impl Drop for HoererWache {
    fn drop(&mut self) {
        self.register.hoerer_trennen(self.scope, self.format, self.id);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn block(wert: u8) -> Bytes {
        Bytes::from(vec![wert; 4])
    }

    #[test]
    fn verbinden_ohne_tap_gibt_none() {
        let register = TapRegister::default();
        assert!(register
            .verbinden(ScopeId(1), StreamFormat::Opus)
            .is_none());
    }

    #[tokio::test]
    async fn fan_out_an_mehrere_hoerer() {
        let register = TapRegister::default();
        let paar = register.tap_erstellen(ScopeId(1));

        let mut a = register.verbinden(ScopeId(1), StreamFormat::Opus).unwrap();
        let mut b = register.verbinden(ScopeId(1), StreamFormat::Opus).unwrap();
        assert_ne!(a.id, b.id);

        paar.opus.schreiben(block(0xAA));

        assert_eq!(a.strom.versuch_empfangen(), Some(block(0xAA)));
        assert_eq!(b.strom.versuch_empfangen(), Some(block(0xAA)));
    }

    #[tokio::test]
    async fn kein_replay_vor_verbindung() {
        let register = TapRegister::default();
        let paar = register.tap_erstellen(ScopeId(1));

        paar.opus.schreiben(block(0x01));
        paar.opus.schreiben(block(0x02));

        let mut spaeter = register.verbinden(ScopeId(1), StreamFormat::Opus).unwrap();
        paar.opus.schreiben(block(0x03));

        // Nur der Block nach dem Verbinden kommt an
        assert_eq!(spaeter.strom.versuch_empfangen(), Some(block(0x03)));
        assert_eq!(spaeter.strom.versuch_empfangen(), None);
    }

    #[tokio::test]
    async fn zweiter_hoerer_stoert_ersten_nicht() {
        let register = TapRegister::default();
        let paar = register.tap_erstellen(ScopeId(1));

        let mut erster = register.verbinden(ScopeId(1), StreamFormat::Opus).unwrap();
        paar.opus.schreiben(block(0x01));

        let mut zweiter = register.verbinden(ScopeId(1), StreamFormat::Opus).unwrap();
        paar.opus.schreiben(block(0x02));

        // Der erste sieht beide Bloecke in Reihenfolge, der zweite nur den neuen
        assert_eq!(erster.strom.versuch_empfangen(), Some(block(0x01)));
        assert_eq!(erster.strom.versuch_empfangen(), Some(block(0x02)));
        assert_eq!(zweiter.strom.versuch_empfangen(), Some(block(0x02)));
        assert_eq!(zweiter.strom.versuch_empfangen(), None);
    }

    #[tokio::test]
    async fn formate_sind_getrennt() {
        let register = TapRegister::default();
        let paar = register.tap_erstellen(ScopeId(1));

        let mut opus = register.verbinden(ScopeId(1), StreamFormat::Opus).unwrap();
        let mut pcm = register.verbinden(ScopeId(1), StreamFormat::Pcm).unwrap();

        paar.opus.schreiben(block(0x0A));
        paar.pcm.schreiben(block(0x0B));

        assert_eq!(opus.strom.versuch_empfangen(), Some(block(0x0A)));
        assert_eq!(pcm.strom.versuch_empfangen(), Some(block(0x0B)));
        assert_eq!(opus.strom.versuch_empfangen(), None);
    }

    #[tokio::test]
    async fn hoerer_trennung_raeumt_sofort_auf() {
        let register = TapRegister::default();
        let _paar = register.tap_erstellen(ScopeId(1));

        let anschluss = register.verbinden(ScopeId(1), StreamFormat::Opus).unwrap();
        assert_eq!(register.hoerer_anzahl(ScopeId(1)), 1);

        drop(anschluss);
        assert_eq!(
            register.hoerer_anzahl(ScopeId(1)),
            0,
            "Trennung muss den Eintrag sofort entfernen"
        );
    }

    #[tokio::test]
    async fn wiederholtes_verbinden_und_trennen_leckt_nicht() {
        let register = TapRegister::default();
        let _paar = register.tap_erstellen(ScopeId(1));

        for _ in 0..50 {
            let anschluss = register.verbinden(ScopeId(1), StreamFormat::Pcm).unwrap();
            drop(anschluss);
        }

        assert_eq!(register.hoerer_anzahl(ScopeId(1)), 0);
    }

    #[tokio::test]
    async fn tap_entfernen_beendet_hoerer_streams() {
        let register = TapRegister::default();
        let _paar = register.tap_erstellen(ScopeId(1));

        let mut anschluss = register.verbinden(ScopeId(1), StreamFormat::Opus).unwrap();
        register.tap_entfernen(ScopeId(1));

        assert_eq!(anschluss.strom.naechster().await, None, "Stream muss enden");
        assert!(register.aktive_taps().is_empty());
    }

    #[tokio::test]
    async fn tap_entfernen_ist_idempotent() {
        let register = TapRegister::default();
        register.tap_entfernen(ScopeId(99));

        let _paar = register.tap_erstellen(ScopeId(1));
        register.tap_entfernen(ScopeId(1));
        register.tap_entfernen(ScopeId(1));

        assert!(register.aktive_taps().is_empty());
    }

    #[tokio::test]
    async fn voller_hoerer_verliert_nur_eigene_daten() {
        let register = TapRegister::neu(2);
        let paar = register.tap_erstellen(ScopeId(1));

        let mut langsam = register.verbinden(ScopeId(1), StreamFormat::Opus).unwrap();
        let mut schnell = register.verbinden(ScopeId(1), StreamFormat::Opus).unwrap();

        let mut schnell_erhalten = 0;
        for i in 0..5u8 {
            paar.opus.schreiben(block(i));
            // Der schnelle Hoerer liest laufend, der langsame nie
            if schnell.strom.versuch_empfangen().is_some() {
                schnell_erhalten += 1;
            }
        }

        assert_eq!(schnell_erhalten, 5, "Schneller Hoerer erhaelt alles");

        // Der langsame hat nur seine Queue-Kapazitaet
        let mut langsam_erhalten = 0;
        while langsam.strom.versuch_empfangen().is_some() {
            langsam_erhalten += 1;
        }
        assert_eq!(langsam_erhalten, 2);
    }

    #[tokio::test]
    async fn aktive_taps_listet_scopes() {
        let register = TapRegister::default();
        let _a = register.tap_erstellen(ScopeId(1));
        let _b = register.tap_erstellen(ScopeId(2));

        let aktive = register.aktive_taps();
        assert_eq!(aktive, vec![ScopeId(1), ScopeId(2)]);
    }
}
