//! Zugang Server – Einstiegspunkt
//!
//! Reihenfolge: Konfiguration (Datei, dann `ZUGANG_*`), Logging, Pruefung,
//! Start. Eine ungueltige Konfiguration beendet den Prozess, bevor Datenbank
//! oder Port angefasst werden.

use anyhow::{Context, Result};
use zugang_server::{config::ServerConfig, Server};

/// Standardpfad, falls `ZUGANG_CONFIG` nicht gesetzt ist
const STANDARD_CONFIG_PFAD: &str = "config.toml";

#[tokio::main]
async fn main() -> Result<()> {
    let config_pfad =
        std::env::var("ZUGANG_CONFIG").unwrap_or_else(|_| STANDARD_CONFIG_PFAD.into());
    let config = ServerConfig::laden_mit_umgebung(&config_pfad)?;

    logging_initialisieren(&config.logging.level, &config.logging.format);

    config
        .validieren()
        .with_context(|| format!("Konfiguration '{config_pfad}' ist ungueltig"))?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %config_pfad,
        adresse = %config.bind_adresse(),
        redis = config.redis.url.is_some(),
        proxies = config.netzwerk.vertrauenswuerdige_proxies.len(),
        "Zugang Server wird initialisiert"
    );

    Server::neu(config).starten().await
}

/// tracing-subscriber mit Level aus der Konfiguration; `RUST_LOG` hat Vorrang
fn logging_initialisieren(level: &str, format: &str) {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let basis = fmt().with_env_filter(filter).with_target(true);

    if format == "json" {
        basis.json().with_thread_ids(true).init();
    } else {
        basis.init();
    }
}
