//! Zeitquelle fuer Ablaufpruefungen
//!
//! Alle Komponenten fragen die aktuelle Zeit ueber [`Uhr`] ab. Im Betrieb
//! ist das die Systemzeit, in Tests eine manuell gestellte Uhr, damit
//! Ablaufgrenzen ohne `sleep` geprueft werden koennen.

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;

/// Liefert die aktuelle Wall-Clock-Zeit
pub trait Uhr: Send + Sync {
    fn jetzt(&self) -> DateTime<Utc>;
}

/// Systemzeit
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemUhr;

impl Uhr for SystemUhr {
    fn jetzt(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manuell gestellte Uhr fuer Tests
#[derive(Debug)]
pub struct ManuelleUhr {
    zeit: Mutex<DateTime<Utc>>,
}

impl ManuelleUhr {
    pub fn neu(start: DateTime<Utc>) -> Self {
        Self {
            zeit: Mutex::new(start),
        }
    }

    /// Stellt die Uhr um `dauer` vor
    pub fn vorstellen(&self, dauer: Duration) {
        let mut zeit = self.zeit.lock();
        *zeit += dauer;
    }

    pub fn setzen(&self, zeit: DateTime<Utc>) {
        *self.zeit.lock() = zeit;
    }
}

impl Default for ManuelleUhr {
    fn default() -> Self {
        Self::neu(Utc::now())
    }
}

impl Uhr for ManuelleUhr {
    fn jetzt(&self) -> DateTime<Utc> {
        *self.zeit.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manuelle_uhr_vorstellen() {
        let start = Utc::now();
        let uhr = ManuelleUhr::neu(start);
        assert_eq!(uhr.jetzt(), start);

        uhr.vorstellen(Duration::seconds(90));
        assert_eq!(uhr.jetzt(), start + Duration::seconds(90));
    }

    #[test]
    fn system_uhr_laeuft() {
        let vorher = Utc::now();
        let jetzt = SystemUhr.jetzt();
        assert!(jetzt >= vorher);
    }
}
