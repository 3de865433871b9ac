//! SQLite-Backend-Implementierungen fuer alle Repository-Traits

pub mod pool;
pub mod sessions;
pub mod users;

pub use pool::SqliteDb;

use chrono::{DateTime, TimeZone, Utc};

use crate::error::DbError;
use crate::repository::DbResult;

/// Parst einen RFC3339-Zeitstempel aus einer Spalte
pub(crate) fn zeit_parsen(spalte: &str, wert: &str) -> DbResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(wert)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| DbError::intern(format!("Ungueltige {spalte} '{wert}': {e}")))
}

/// Wandelt Unix-Millisekunden zurueck in einen Zeitstempel
pub(crate) fn millis_parsen(spalte: &str, wert: i64) -> DbResult<DateTime<Utc>> {
    Utc.timestamp_millis_opt(wert)
        .single()
        .ok_or_else(|| DbError::intern(format!("Ungueltige {spalte} '{wert}'")))
}
