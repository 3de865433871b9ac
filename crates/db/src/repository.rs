//! Repository-Trait-Definitionen
//!
//! Das Repository-Pattern entkoppelt die Geschaeftslogik von der konkreten
//! Datenbank-Implementierung. Die Vertraege sind bewusst schmal: genau die
//! atomaren Operationen, auf die sich der Auth-Service verlaesst.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use zugang_core::UserId;

use crate::error::DbError;
use crate::models::{BenutzerRecord, NeueSession, NeuerBenutzer, SessionRecord, SessionRotation};

/// Result-Alias fuer Repository-Operationen
pub type DbResult<T> = Result<T, DbError>;

/// Konfiguration fuer die Datenbankverbindung
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// Verbindungs-URL (z.B. "sqlite://zugang.db")
    pub url: String,
    /// Maximale Anzahl gleichzeitiger Verbindungen im Pool
    pub max_verbindungen: u32,
    /// Zeitlimit fuer den Bezug einer Verbindung aus dem Pool
    pub acquire_timeout_sek: u64,
    /// Ob WAL-Modus bei SQLite aktiviert werden soll
    pub sqlite_wal: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://zugang.db".into(),
            max_verbindungen: 5,
            acquire_timeout_sek: 5,
            sqlite_wal: true,
        }
    }
}

/// Repository fuer Benutzer-Datenzugriffe
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Legt einen Benutzer an.
    ///
    /// Die Eindeutigkeit der E-Mail wird hier entschieden: ein Duplikat
    /// liefert `DbError::Eindeutigkeit`, auch wenn eine vorherige Pruefung
    /// die Adresse noch als frei gesehen hat.
    async fn create(&self, data: NeuerBenutzer<'_>) -> DbResult<BenutzerRecord>;

    async fn get_by_id(&self, id: UserId) -> DbResult<Option<BenutzerRecord>>;

    /// Punktabfrage ueber die normalisierte E-Mail
    async fn get_by_email(&self, email: &str) -> DbResult<Option<BenutzerRecord>>;
}

/// Repository fuer Refresh-Sessions
#[async_trait]
pub trait SessionRepository: Send + Sync {
    /// Legt eine Session an; ein bereits vergebener Token-Hash liefert
    /// `DbError::Eindeutigkeit`.
    async fn create(&self, data: NeueSession<'_>) -> DbResult<SessionRecord>;

    /// Findet eine Session ueber den Token-Hash, nur wenn `expires_at > jetzt`
    async fn find_active(
        &self,
        refresh_token_hash: &str,
        jetzt: DateTime<Utc>,
    ) -> DbResult<Option<SessionRecord>>;

    /// Ersetzt Token-Hash und Ablaufzeit derselben Zeile atomar.
    ///
    /// Liefert `DbError::NichtGefunden` wenn `alter_hash` nicht mehr aktuell
    /// oder die Session abgelaufen ist. Von zwei gleichzeitigen Rotationen
    /// mit demselben alten Hash gewinnt genau eine.
    async fn rotate(&self, rotation: SessionRotation<'_>) -> DbResult<SessionRecord>;

    /// Loescht die Session zum Token-Hash. `false` wenn keine existierte.
    async fn delete_by_token(&self, refresh_token_hash: &str) -> DbResult<bool>;

    /// Loescht alle abgelaufenen Sessions und gibt deren Anzahl zurueck
    async fn delete_expired(&self, jetzt: DateTime<Utc>) -> DbResult<u64>;
}
