//! In-Process-Zaehlerspeicher
//!
//! Wird verwendet, wenn kein Redis konfiguriert ist, und in Tests. Zaehler
//! gelten nur fuer diesen Prozess.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use zugang_core::Uhr;

use super::{ZaehlerFehler, ZaehlerSpeicher, ZaehlerStand};

#[derive(Debug, Clone, Copy)]
struct Fenster {
    anzahl: u64,
    endet_am: DateTime<Utc>,
}

/// Zaehler mit festen Fenstern in einer `DashMap`
pub struct SpeicherZaehler {
    fenster: DashMap<String, Fenster>,
    uhr: Arc<dyn Uhr>,
}

impl SpeicherZaehler {
    pub fn neu(uhr: Arc<dyn Uhr>) -> Self {
        Self {
            fenster: DashMap::new(),
            uhr,
        }
    }

    /// Entfernt abgelaufene Fenster und gibt deren Anzahl zurueck
    pub fn bereinigen(&self) -> usize {
        let jetzt = self.uhr.jetzt();
        let vorher = self.fenster.len();
        self.fenster.retain(|_, f| f.endet_am > jetzt);
        vorher.saturating_sub(self.fenster.len())
    }

    pub fn len(&self) -> usize {
        self.fenster.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fenster.is_empty()
    }
}

#[async_trait]
impl ZaehlerSpeicher for SpeicherZaehler {
    async fn erhoehen(
        &self,
        schluessel: &str,
        fenster: Duration,
    ) -> Result<ZaehlerStand, ZaehlerFehler> {
        let laenge = chrono::Duration::from_std(fenster)
            .map_err(|e| ZaehlerFehler::Antwort(format!("Fensterlaenge: {e}")))?;
        let jetzt = self.uhr.jetzt();

        // Der Entry-Guard sperrt den Shard; Erhoehen und Fensterwechsel sind atomar
        let mut eintrag = self
            .fenster
            .entry(schluessel.to_string())
            .or_insert(Fenster {
                anzahl: 0,
                endet_am: jetzt + laenge,
            });
        if eintrag.endet_am <= jetzt {
            *eintrag = Fenster {
                anzahl: 0,
                endet_am: jetzt + laenge,
            };
        }
        eintrag.anzahl += 1;

        let verbleibend = (eintrag.endet_am - jetzt).to_std().unwrap_or_default();
        Ok(ZaehlerStand {
            anzahl: eintrag.anzahl,
            verbleibend,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use zugang_core::ManuelleUhr;

    #[tokio::test]
    async fn ablauf_wird_nur_beim_ersten_erhoehen_gesetzt() {
        let uhr = Arc::new(ManuelleUhr::neu(
            Utc.with_ymd_and_hms(2026, 1, 1, 12, 0, 0).unwrap(),
        ));
        let z = SpeicherZaehler::neu(uhr.clone());
        let fenster = Duration::from_secs(60);

        let a = z.erhoehen("k", fenster).await.unwrap();
        assert_eq!(a.anzahl, 1);
        assert_eq!(a.verbleibend, fenster);

        uhr.vorstellen(chrono::Duration::seconds(30));
        let b = z.erhoehen("k", fenster).await.unwrap();
        assert_eq!(b.anzahl, 2);
        assert_eq!(b.verbleibend, Duration::from_secs(30));
    }

    #[tokio::test]
    async fn bereinigen_entfernt_abgelaufene_fenster() {
        let uhr = Arc::new(ManuelleUhr::neu(
            Utc.with_ymd_and_hms(2026, 1, 1, 12, 0, 0).unwrap(),
        ));
        let z = SpeicherZaehler::neu(uhr.clone());
        z.erhoehen("kurz", Duration::from_secs(10)).await.unwrap();
        z.erhoehen("lang", Duration::from_secs(600)).await.unwrap();

        uhr.vorstellen(chrono::Duration::seconds(11));
        assert_eq!(z.bereinigen(), 1);
        assert_eq!(z.len(), 1);
    }

    #[tokio::test]
    async fn gleichzeitige_erhoehungen_gehen_nicht_verloren() {
        let uhr = Arc::new(ManuelleUhr::default());
        let z = Arc::new(SpeicherZaehler::neu(uhr));

        let mut tasks = Vec::new();
        for _ in 0..50 {
            let z = z.clone();
            tasks.push(tokio::spawn(async move {
                z.erhoehen("gemeinsam", Duration::from_secs(60)).await.unwrap();
            }));
        }
        for t in tasks {
            t.await.unwrap();
        }

        let stand = z.erhoehen("gemeinsam", Duration::from_secs(60)).await.unwrap();
        assert_eq!(stand.anzahl, 51);
    }
}
