//! SQLite-Verbindungspool
//!
//! Datei-Datenbanken laufen im WAL-Modus, damit Leser die Rotation von
//! Sessions nicht blockieren. Fremdschluessel sind immer aktiv, sonst
//! greift das Loeschen der Sessions eines Benutzers nicht.

use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};

use crate::error::DbError;
use crate::repository::DatabaseConfig;

/// Wartezeit auf gesperrte Datenbankdateien
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// SQLite-Datenbank hinter einem sqlx-Pool
#[derive(Debug, Clone)]
pub struct SqliteDb {
    pub(crate) pool: SqlitePool,
}

impl SqliteDb {
    /// Oeffnet (oder erstellt) die Datenbank und bringt das Schema auf Stand
    pub async fn oeffnen(config: &DatabaseConfig) -> Result<Self, DbError> {
        let journal = if config.sqlite_wal {
            SqliteJournalMode::Wal
        } else {
            SqliteJournalMode::Delete
        };
        let optionen = SqliteConnectOptions::from_str(&config.url)?
            .create_if_missing(true)
            .journal_mode(journal)
            .busy_timeout(BUSY_TIMEOUT)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_verbindungen.max(1))
            .acquire_timeout(Duration::from_secs(config.acquire_timeout_sek))
            .connect_with(optionen)
            .await?;

        tracing::info!(
            url = %config.url,
            wal = config.sqlite_wal,
            max_verbindungen = config.max_verbindungen,
            "SQLite-Pool geoeffnet"
        );
        Self::mit_schema(pool).await
    }

    /// Fluechtige Datenbank fuer Tests
    ///
    /// Eine einzige, dauerhaft gehaltene Verbindung: jede neue Verbindung
    /// zu `:memory:` saehe eine eigene, leere Datenbank.
    pub async fn in_memory() -> Result<Self, DbError> {
        let optionen = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .min_connections(1)
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(optionen)
            .await?;
        Self::mit_schema(pool).await
    }

    async fn mit_schema(pool: SqlitePool) -> Result<Self, DbError> {
        let db = Self { pool };
        db.migrationen_ausfuehren().await?;
        Ok(db)
    }

    /// Fuehrt alle ausstehenden Migrationen aus `migrations/` aus
    pub async fn migrationen_ausfuehren(&self) -> Result<(), DbError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        tracing::debug!("Datenbank-Schema aktuell");
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Schliesst den Pool; weitere Abfragen schlagen danach fehl
    pub async fn schliessen(&self) {
        self.pool.close().await;
        tracing::info!("SQLite-Pool geschlossen");
    }
}
