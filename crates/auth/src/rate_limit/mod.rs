//! Rate Limiter mit festem Zeitfenster
//!
//! Zaehlt Anfragen pro Client in einem gemeinsamen Zaehlerspeicher.
//! Eine Anfrage ist erlaubt, solange der Zaehler nach dem Erhoehen den
//! Schwellwert nicht ueberschreitet. Faellt der Speicher aus, wird die
//! Anfrage durchgelassen (fail-open).

mod redis_zaehler;
mod speicher;

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use thiserror::Error;

pub use self::redis_zaehler::RedisZaehler;
pub use self::speicher::SpeicherZaehler;

use crate::error::{AuthError, AuthResult};

/// Praefix fuer alle Zaehler-Schluessel
pub const SCHLUESSEL_PRAEFIX: &str = "rate_limit:";

/// Konfiguration fuer den Rate Limiter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitKonfig {
    /// Maximale Anfragen pro Fenster und Client
    pub anfragen_pro_fenster: u64,
    /// Laenge des Zeitfensters
    pub fenster: Duration,
}

impl Default for RateLimitKonfig {
    fn default() -> Self {
        Self {
            anfragen_pro_fenster: 100,
            fenster: Duration::from_secs(60),
        }
    }
}

/// Ergebnis einer Zulassungspruefung
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Zulassung {
    Erlaubt,
    Abgelehnt { retry_after_secs: u64 },
}

/// Zaehlerstand nach einem Erhoehen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ZaehlerStand {
    /// Zaehler inklusive der aktuellen Anfrage
    pub anzahl: u64,
    /// Restlaufzeit des aktuellen Fensters
    pub verbleibend: Duration,
}

/// Fehler eines Zaehlerspeichers
#[derive(Debug, Error)]
pub enum ZaehlerFehler {
    #[error("Redis-Fehler: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Unerwartete Antwort: {0}")]
    Antwort(String),
}

/// Gemeinsamer Zaehlerspeicher
///
/// `erhoehen` muss atomar sein und die Ablaufzeit nur beim ersten
/// Erhoehen eines Schluessels setzen.
#[async_trait]
pub trait ZaehlerSpeicher: Send + Sync {
    async fn erhoehen(&self, schluessel: &str, fenster: Duration)
        -> Result<ZaehlerStand, ZaehlerFehler>;
}

/// Rate Limiter pro Client-Kennung (in der Regel die IP-Adresse)
pub struct RateLimiter {
    konfig: RateLimitKonfig,
    speicher: Arc<dyn ZaehlerSpeicher>,
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("konfig", &self.konfig)
            .finish_non_exhaustive()
    }
}

impl RateLimiter {
    pub fn neu(konfig: RateLimitKonfig, speicher: Arc<dyn ZaehlerSpeicher>) -> Self {
        Self { konfig, speicher }
    }

    pub fn konfig(&self) -> &RateLimitKonfig {
        &self.konfig
    }

    /// Zaehlt eine Anfrage des Clients und entscheidet ueber die Zulassung
    pub async fn zulassen(&self, client: &str) -> Zulassung {
        let schluessel = format!("{SCHLUESSEL_PRAEFIX}{client}");

        let stand = match self.speicher.erhoehen(&schluessel, self.konfig.fenster).await {
            Ok(stand) => stand,
            Err(e) => {
                tracing::warn!(client_ip = %client, fehler = %e, "Rate-Limit-Speicher nicht erreichbar, Anfrage zugelassen");
                return Zulassung::Erlaubt;
            }
        };

        if stand.anzahl <= self.konfig.anfragen_pro_fenster {
            Zulassung::Erlaubt
        } else {
            let retry_after_secs = aufrunden_sekunden(stand.verbleibend);
            tracing::debug!(
                client_ip = %client,
                anzahl = stand.anzahl,
                retry_after_secs,
                "Rate Limit ueberschritten"
            );
            Zulassung::Abgelehnt { retry_after_secs }
        }
    }

    /// Wie [`zulassen`](Self::zulassen), als `AuthResult`
    pub async fn pruefen(&self, client: &str) -> AuthResult<()> {
        match self.zulassen(client).await {
            Zulassung::Erlaubt => Ok(()),
            Zulassung::Abgelehnt { retry_after_secs } => {
                Err(AuthError::RateLimitUeberschritten { retry_after_secs })
            }
        }
    }
}

/// Restlaufzeit in ganzen Sekunden, mindestens 1
fn aufrunden_sekunden(dauer: Duration) -> u64 {
    let ms = dauer.as_millis() as u64;
    ms.div_ceil(1000).max(1)
}
