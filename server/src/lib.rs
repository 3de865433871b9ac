//! zugang-server – Bibliotheks-Root
//!
//! Deklariert die Server-Module und verdrahtet Speicher, Dienste und
//! HTTP-Schnittstelle.

pub mod config;

use std::{net::SocketAddr, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use config::ServerConfig;
use zugang_api::AppState;
use zugang_auth::{
    session::BEREINIGUNGS_INTERVALL, AuthService, RateLimiter, RedisZaehler, SessionStore,
    SpeicherZaehler, ZaehlerSpeicher,
};
use zugang_core::{SystemUhr, Uhr};
use zugang_db::SqliteDb;

/// Haelt den laufenden Server-Zustand zusammen
pub struct Server {
    pub config: ServerConfig,
}

impl Server {
    /// Erstellt einen neuen Server aus der gegebenen Konfiguration
    pub fn neu(config: ServerConfig) -> Self {
        Self { config }
    }

    /// Startet alle Server-Subsysteme und laeuft bis zum Shutdown-Signal
    ///
    /// Reihenfolge:
    /// 1. Datenbankverbindung herstellen (inkl. Migrationen)
    /// 2. Rate-Limit-Zaehler waehlen (Redis oder In-Process)
    /// 3. Auth-Service und Session-Bereinigung starten
    /// 4. REST-API starten
    /// 5. Auf Ctrl-C / SIGTERM warten
    pub async fn starten(self) -> Result<()> {
        let auth_konfig = self.config.auth_konfig()?;
        let rate_limit_konfig = self.config.rate_limit_konfig()?;
        let adresse: SocketAddr = self
            .config
            .bind_adresse()
            .parse()
            .with_context(|| format!("Ungueltige Bind-Adresse '{}'", self.config.bind_adresse()))?;

        tracing::info!(url = %self.config.datenbank.url, "Datenbankverbindung wird hergestellt");
        let db = Arc::new(
            SqliteDb::oeffnen(&self.config.datenbank_konfig())
                .await
                .context("Datenbank konnte nicht geoeffnet werden")?,
        );

        let uhr: Arc<dyn Uhr> = Arc::new(SystemUhr);
        let (zaehler, zaehler_bereinigung) = self.zaehler_waehlen(&uhr, rate_limit_konfig.fenster).await;
        let rate_limiter = Arc::new(RateLimiter::neu(rate_limit_konfig, zaehler));

        let auth = Arc::new(
            AuthService::neu(auth_konfig, db.clone(), db.clone(), uhr)
                .context("Auth-Service konnte nicht erstellt werden")?,
        );
        let session_bereinigung =
            SessionStore::bereinigung_starten(auth.session_store(), BEREINIGUNGS_INTERVALL);

        let app = zugang_api::router(
            AppState::neu(auth, rate_limiter)
                .mit_proxies(self.config.netzwerk.vertrauenswuerdige_proxies.iter().copied()),
        );
        let listener = tokio::net::TcpListener::bind(adresse)
            .await
            .with_context(|| format!("Port {adresse} konnte nicht gebunden werden"))?;
        tracing::info!(adresse = %adresse, "REST-API bereit");

        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown_signal())
        .await?;

        tracing::info!("Shutdown-Signal empfangen, Server wird beendet");
        session_bereinigung.abort();
        if let Some(handle) = zaehler_bereinigung {
            handle.abort();
        }
        db.schliessen().await;
        Ok(())
    }

    /// Redis wenn konfiguriert und erreichbar, sonst In-Process-Zaehler
    ///
    /// Der In-Process-Zaehler bekommt einen Task, der abgelaufene Fenster
    /// entfernt.
    async fn zaehler_waehlen(
        &self,
        uhr: &Arc<dyn Uhr>,
        fenster: Duration,
    ) -> (Arc<dyn ZaehlerSpeicher>, Option<tokio::task::JoinHandle<()>>) {
        if let Some(url) = &self.config.redis.url {
            match RedisZaehler::verbinden(url).await {
                Ok(redis) => return (Arc::new(redis), None),
                Err(e) => {
                    tracing::error!(fehler = %e, "Redis nicht erreichbar, verwende In-Process-Zaehler");
                }
            }
        } else {
            tracing::info!("Kein Redis konfiguriert, Rate-Limit-Zaehler gelten pro Prozess");
        }

        let speicher = Arc::new(SpeicherZaehler::neu(Arc::clone(uhr)));
        let bereinigen = Arc::clone(&speicher);
        let handle = tokio::spawn(async move {
            let mut takt = tokio::time::interval(fenster);
            loop {
                takt.tick().await;
                let entfernt = bereinigen.bereinigen();
                if entfernt > 0 {
                    tracing::debug!(anzahl = entfernt, "Abgelaufene Rate-Limit-Fenster bereinigt");
                }
            }
        });
        (speicher, Some(handle))
    }
}

/// Wartet auf Ctrl-C oder (unter Unix) SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(fehler = %e, "Ctrl-C-Handler konnte nicht installiert werden");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let sigterm = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(fehler = %e, "SIGTERM-Handler konnte nicht installiert werden");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let sigterm = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = sigterm => {},
    }
}
