//! Ereignis-Modell der Quell-Seite und die Misch-Senken-Schnittstelle
//!
//! `QuellEreignis` ist der Strom, den die konsumierte Sprach-Plattform pro
//! Scope liefert (Sprech-Beginn/-Ende, komprimierte Pakete, Fehler).
//! `MixSenke` ist die Nahtstelle zwischen Ingest und Mischwerk: Ingest
//! schreibt dekodierte Puffer hinein, das Mischwerk besitzt den Inhalt.

use bytes::Bytes;

use crate::types::SprecherId;

/// Ereignisse eines Quell-Abonnements
///
/// Wird von der `SprachQuelle`-Capability geliefert. Pro Sprecher bildet
/// die Sequenz `SprechBeginn -> AudioPaket* -> SprechEnde` einen
/// Teil-Stream; `Getrennt` beendet das gesamte Abonnement.
#[derive(Debug, Clone)]
pub enum QuellEreignis {
    /// Ein Sprecher hat zu sprechen begonnen
    SprechBeginn { sprecher: SprecherId },
    /// Ein komprimiertes Audio-Paket eines Sprechers
    AudioPaket { sprecher: SprecherId, daten: Bytes },
    /// Der Teil-Stream eines Sprechers ist regulaer beendet
    SprechEnde { sprecher: SprecherId },
    /// Der Teil-Stream eines Sprechers ist mit Fehler beendet
    QuellFehler { sprecher: SprecherId, grund: String },
    /// Die unterliegende Verbindung wurde zerstoert (fatal fuer die Session)
    Getrennt,
}

/// Senke fuer dekodierte Sprecher-Puffer
///
/// Implementiert vom Mischwerk. Ingest ruft `quelle_aktualisieren` fuer
/// jeden dekodierten Frame und `quelle_entfernen` beim Ende des
/// Teil-Streams. Beide Aufrufe muessen nicht-blockierend sein.
pub trait MixSenke: Send + Sync + 'static {
    /// Ersetzt den Puffer eines Sprechers und aktualisiert den Zeitstempel
    fn quelle_aktualisieren(&self, sprecher: SprecherId, samples: Vec<i16>);

    /// Entfernt den Eintrag eines Sprechers (idempotent)
    fn quelle_entfernen(&self, sprecher: SprecherId);
}
