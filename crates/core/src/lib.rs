//! zugang-core – Gemeinsame Typen und Ports
//!
//! Dieses Crate stellt die Bausteine bereit, die von allen anderen
//! Zugang-Crates gemeinsam genutzt werden: ID-Typen, den Client-Kontext
//! einer Anfrage und die Uhr als austauschbare Zeitquelle.

pub mod kontext;
pub mod types;
pub mod uhr;

// Re-Exporte fuer bequemen Zugriff
pub use kontext::ClientKontext;
pub use types::{SessionId, UserId};
pub use uhr::{ManuelleUhr, SystemUhr, Uhr};
