//! zugang-db – Datenbank-Abstraktion
//!
//! Dieses Crate stellt das Repository-Pattern bereit: schmale Lese- und
//! Schreib-Vertraege fuer Benutzer und Sessions, eine SQLite-Implementierung
//! fuer den Betrieb und eine In-Memory-Implementierung fuer Tests.

pub mod error;
pub mod memory;
pub mod models;
pub mod repository;
pub mod sqlite;

pub use error::DbError;
pub use memory::InMemoryDb;
pub use repository::{DatabaseConfig, DbResult, SessionRepository, UserRepository};
pub use sqlite::SqliteDb;
