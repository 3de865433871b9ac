//! Redis-Zaehlerspeicher
//!
//! Teilt die Zaehler zwischen mehreren Server-Instanzen. Erhoehen, Ablauf
//! setzen und Restlaufzeit lesen laufen in einem Lua-Skript und damit
//! atomar auf dem Redis-Server.

use std::time::Duration;

use async_trait::async_trait;
use redis::{aio::ConnectionManager, Client, Script};

use super::{ZaehlerFehler, ZaehlerSpeicher, ZaehlerStand};

/// INCR, PEXPIRE nur beim ersten Erhoehen, dann PTTL.
/// Ein Schluessel ohne Ablauf (z.B. nach Absturz zwischen INCR und PEXPIRE)
/// bekommt ihn nachtraeglich.
const ERHOEHEN_SKRIPT: &str = r"
local anzahl = redis.call('INCR', KEYS[1])
if anzahl == 1 then
    redis.call('PEXPIRE', KEYS[1], ARGV[1])
end
local ttl = redis.call('PTTL', KEYS[1])
if ttl < 0 then
    redis.call('PEXPIRE', KEYS[1], ARGV[1])
    ttl = tonumber(ARGV[1])
end
return {anzahl, ttl}
";

/// Zaehlerspeicher ueber eine Redis-Verbindung
#[derive(Clone)]
pub struct RedisZaehler {
    verbindung: ConnectionManager,
    skript: Script,
}

impl std::fmt::Debug for RedisZaehler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisZaehler").finish_non_exhaustive()
    }
}

impl RedisZaehler {
    /// Verbindet sich mit Redis; der Manager stellt Verbindungen selbst wieder her
    pub async fn verbinden(url: &str) -> Result<Self, ZaehlerFehler> {
        let client = Client::open(url)?;
        let verbindung = ConnectionManager::new(client).await?;
        tracing::info!("Redis-Zaehlerspeicher verbunden");
        Ok(Self {
            verbindung,
            skript: Script::new(ERHOEHEN_SKRIPT),
        })
    }
}

#[async_trait]
impl ZaehlerSpeicher for RedisZaehler {
    async fn erhoehen(
        &self,
        schluessel: &str,
        fenster: Duration,
    ) -> Result<ZaehlerStand, ZaehlerFehler> {
        let mut verbindung = self.verbindung.clone();
        let fenster_ms = fenster.as_millis().max(1) as u64;

        let (anzahl, ttl_ms): (i64, i64) = self
            .skript
            .key(schluessel)
            .arg(fenster_ms)
            .invoke_async(&mut verbindung)
            .await?;

        if anzahl < 1 {
            return Err(ZaehlerFehler::Antwort(format!("Zaehlerstand {anzahl}")));
        }

        Ok(ZaehlerStand {
            anzahl: anzahl as u64,
            verbleibend: Duration::from_millis(ttl_ms.max(0) as u64),
        })
    }
}
