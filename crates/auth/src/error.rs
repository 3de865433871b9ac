//! Fehlertypen fuer den Auth-Service
//!
//! Speicher- und Kryptografiefehler werden hier in wenige, fuer Aufrufer
//! unbedenkliche Arten uebersetzt. Die Ursache bleibt als `source` fuer
//! das Logging erhalten, erscheint aber nie in der Fehlermeldung.

use thiserror::Error;
use zugang_db::DbError;

use crate::token::TokenFehler;

/// Alle moeglichen Fehler im Auth-Service
#[derive(Debug, Error)]
pub enum AuthError {
    // --- Eingaben ---
    #[error("Ungueltige E-Mail-Adresse")]
    EmailUngueltig,

    #[error("Passwort zu schwach: {0}")]
    PasswortZuSchwach(String),

    #[error("Ungueltige Eingabe: {0}")]
    Validierung(String),

    // --- Authentifizierung ---
    #[error("Ungueltige Anmeldedaten")]
    UngueltigeAnmeldedaten,

    #[error("Ungueltiger Refresh-Token")]
    UngueltigerRefreshToken,

    #[error("Access-Token ungueltig: {0}")]
    AccessToken(#[from] TokenFehler),

    // --- Benutzerverwaltung ---
    #[error("Benutzer existiert bereits")]
    BenutzerExistiert,

    // --- Rate Limit ---
    #[error("Rate Limit ueberschritten: bitte warte {retry_after_secs} Sekunden")]
    RateLimitUeberschritten { retry_after_secs: u64 },

    // --- Infrastruktur ---
    #[error("Speicher nicht verfuegbar")]
    SpeicherNichtVerfuegbar(#[source] DbError),

    #[error("Kryptografiefehler")]
    Kryptografie(String),

    #[error("Konfigurationsfehler: {0}")]
    Konfiguration(String),

    #[error("Interner Fehler")]
    Intern(String),
}

impl AuthError {
    pub fn intern(msg: impl Into<String>) -> Self {
        Self::Intern(msg.into())
    }

    /// Gibt true zurueck wenn der Fehler ein Server-Problem ist und nicht
    /// durch die Eingabe des Aufrufers verursacht wurde
    pub fn ist_intern(&self) -> bool {
        matches!(
            self,
            Self::SpeicherNichtVerfuegbar(_)
                | Self::Kryptografie(_)
                | Self::Konfiguration(_)
                | Self::Intern(_)
        )
    }

    /// Detailtext fuer Logs; enthaelt die Ursache, nie fuer Aufrufer bestimmt
    pub fn detail(&self) -> String {
        match self {
            Self::SpeicherNichtVerfuegbar(e) => format!("Speicher nicht verfuegbar: {e}"),
            Self::Kryptografie(d) => format!("Kryptografiefehler: {d}"),
            Self::Intern(d) => format!("Interner Fehler: {d}"),
            other => other.to_string(),
        }
    }
}

impl From<DbError> for AuthError {
    fn from(e: DbError) -> Self {
        Self::SpeicherNichtVerfuegbar(e)
    }
}

/// Result-Alias fuer den Auth-Service
pub type AuthResult<T> = Result<T, AuthError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn speicherfehler_verraet_keine_details() {
        let e = AuthError::from(DbError::intern("disk I/O error at /var/lib/zugang.db"));
        assert_eq!(e.to_string(), "Speicher nicht verfuegbar");
        assert!(e.detail().contains("disk I/O error"));
        assert!(e.ist_intern());
    }

    #[test]
    fn kryptofehler_ist_generisch() {
        let e = AuthError::Kryptografie("salt generation failed".into());
        assert!(!e.to_string().contains("salt"));
        assert!(e.ist_intern());
    }

    #[test]
    fn eingabefehler_sind_nicht_intern() {
        assert!(!AuthError::UngueltigeAnmeldedaten.ist_intern());
        assert!(!AuthError::BenutzerExistiert.ist_intern());
        assert!(!AuthError::RateLimitUeberschritten { retry_after_secs: 3 }.ist_intern());
    }
}
