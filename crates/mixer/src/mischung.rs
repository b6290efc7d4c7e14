//! Reine Misch-Mathematik
//!
//! Getrennt vom Takt-Task, damit die Kernfunktion ohne Timer testbar
//! bleibt. Das Verfahren ist eine einfache Mittelwert-Mischung: pro
//! Sample-Index werden die signierten Werte aller beitragenden Puffer
//! summiert, durch die Anzahl der Beitraege an diesem Index geteilt und
//! auf den gueltigen i16-Bereich begrenzt. Das opfert etwas Lautheit,
//! schliesst aber Integer-Ueberlauf-Verzerrung aus.

/// Mischt die Beitraege in den Ausgabe-Puffer
///
/// Ein Puffer, der kuerzer als der Ausgabe-Frame ist, traegt nur zu den
/// Indizes bei, die er abdeckt; die Teiler-Anzahl sinkt entsprechend.
/// Indizes ohne jeden Beitrag bleiben 0 (Stille). Die Summe laeuft in
/// i32, damit auch viele Vollpegel-Quellen nicht ueberlaufen.
pub fn abmischen(beitraege: &[&[i16]], ausgabe: &mut [i16]) {
    ausgabe.fill(0);

    if beitraege.is_empty() {
        return;
    }

    for (i, ziel) in ausgabe.iter_mut().enumerate() {
        let mut summe: i32 = 0;
        let mut anzahl: i32 = 0;

        for puffer in beitraege {
            if let Some(&s) = puffer.get(i) {
                summe += s as i32;
                anzahl += 1;
            }
        }

        if anzahl > 0 {
            *ziel = (summe / anzahl).clamp(i16::MIN as i32, i16::MAX as i32) as i16;
        }
    }
}
