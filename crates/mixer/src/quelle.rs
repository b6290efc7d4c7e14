//! Pro-Sprecher-Zustand des Mischwerks

use std::time::Duration;

use hearsay_core::SprecherId;
use tokio::time::Instant;

/// Eine aktive Misch-Quelle – der zuletzt dekodierte Puffer eines Sprechers
///
/// Wird bei Sprech-Beginn angelegt, bei jedem dekodierten Frame ersetzt und
/// beim Ende des Sprecher-Streams entfernt. Das Mischwerk selbst entfernt
/// nie – veraltete Eintraege werden beim Abmischen nur uebergangen.
#[derive(Debug, Clone)]
pub struct AktiveQuelle {
    /// Sprecher-ID
    pub sprecher: SprecherId,
    /// Zuletzt empfangener PCM-Puffer
    pub puffer: Vec<i16>,
    /// Zeitpunkt der letzten Aktualisierung
    pub letzte_aktualisierung: Instant,
    /// Anzahl empfangener Pakete
    pub pakete: u64,
}

impl AktiveQuelle {
    /// Erstellt eine neue Quelle mit erstem Puffer
    pub fn neu(sprecher: SprecherId, puffer: Vec<i16>) -> Self {
        Self {
            sprecher,
            puffer,
            letzte_aktualisierung: Instant::now(),
            pakete: 1,
        }
    }

    /// Ersetzt den Puffer und aktualisiert den Zeitstempel
    pub fn aktualisieren(&mut self, puffer: Vec<i16>) {
        self.puffer = puffer;
        self.letzte_aktualisierung = Instant::now();
        self.pakete += 1;
    }

    /// Prueft ob die Quelle innerhalb des Frische-Fensters liegt
    pub fn ist_frisch(&self, fenster: Duration) -> bool {
        self.letzte_aktualisierung.elapsed() <= fenster
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn neue_quelle_ist_frisch() {
        let q = AktiveQuelle::neu(SprecherId(1), vec![1, 2, 3]);
        assert!(q.ist_frisch(Duration::from_millis(100)));
        assert_eq!(q.pakete, 1);
    }

    #[test]
    fn aktualisieren_ersetzt_puffer_und_zaehlt() {
        let mut q = AktiveQuelle::neu(SprecherId(1), vec![1]);
        q.aktualisieren(vec![9, 9]);
        assert_eq!(q.puffer, vec![9, 9]);
        assert_eq!(q.pakete, 2);
    }

    #[test]
    fn frische_ablauf() {
        let q = AktiveQuelle::neu(SprecherId(1), vec![1]);
        std::thread::sleep(Duration::from_millis(15));
        assert!(!q.ist_frisch(Duration::from_millis(10)));
        assert!(q.ist_frisch(Duration::from_secs(5)));
    }
}
