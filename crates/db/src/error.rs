//! Fehlertypen fuer das Datenbank-Crate

use thiserror::Error;

/// Datenbank-Fehlertypen
#[derive(Debug, Error)]
pub enum DbError {
    #[error("Datensatz nicht gefunden: {0}")]
    NichtGefunden(String),

    #[error("Eindeutigkeitsverletzung: {0}")]
    Eindeutigkeit(String),

    #[error("Ungueltige Daten: {0}")]
    UngueltigeDaten(String),

    #[error("Datenbank nicht erreichbar: {0}")]
    NichtVerfuegbar(String),

    #[error("SQLx-Fehler: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("Migration-Fehler: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Interner DB-Fehler: {0}")]
    Intern(String),
}

impl DbError {
    pub fn nicht_gefunden(msg: impl Into<String>) -> Self {
        Self::NichtGefunden(msg.into())
    }

    pub fn intern(msg: impl Into<String>) -> Self {
        Self::Intern(msg.into())
    }

    /// Gibt true zurueck wenn es sich um einen Eindeutigkeitsfehler handelt
    pub fn ist_eindeutigkeit(&self) -> bool {
        match self {
            Self::Eindeutigkeit(_) => true,
            Self::Sqlx(e) => e
                .as_database_error()
                .is_some_and(|db| db.is_unique_violation()),
            _ => false,
        }
    }

    /// Uebersetzt einen SQLx-Fehler; Unique-Verletzungen werden zu `Eindeutigkeit`
    pub(crate) fn aus_sqlx(e: sqlx::Error, kontext: impl Into<String>) -> Self {
        let db_fehler = e.as_database_error();
        if db_fehler.is_some_and(|db| db.is_unique_violation()) {
            return Self::Eindeutigkeit(kontext.into());
        }
        if db_fehler.is_some_and(|db| db.is_foreign_key_violation()) {
            return Self::UngueltigeDaten(kontext.into());
        }
        match e {
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                Self::NichtVerfuegbar(e.to_string())
            }
            other => Self::Sqlx(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eindeutigkeit_erkennung() {
        assert!(DbError::Eindeutigkeit("email".into()).ist_eindeutigkeit());
        assert!(!DbError::nicht_gefunden("x").ist_eindeutigkeit());
        assert!(!DbError::Sqlx(sqlx::Error::RowNotFound).ist_eindeutigkeit());
    }

    #[test]
    fn pool_timeout_ist_nicht_verfuegbar() {
        let e = DbError::aus_sqlx(sqlx::Error::PoolTimedOut, "users");
        assert!(matches!(e, DbError::NichtVerfuegbar(_)));
    }
}
