//! Datenbankmodelle fuer Zugang
//!
//! Diese Typen repraesentieren Datensaetze aus der Datenbank.
//! Sie sind von den Domain-Typen getrennt und dienen als reine Datenuebertragungsobjekte.

use chrono::{DateTime, Utc};
use serde::Serialize;
use zugang_core::{ClientKontext, SessionId, UserId};

// ---------------------------------------------------------------------------
// Benutzer
// ---------------------------------------------------------------------------

/// Benutzer-Datensatz aus der Datenbank
///
/// Der Passwort-Hash wird nie nach aussen serialisiert.
#[derive(Debug, Clone, Serialize)]
pub struct BenutzerRecord {
    pub id: UserId,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub is_verified: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Daten zum Erstellen eines neuen Benutzers
#[derive(Debug, Clone)]
pub struct NeuerBenutzer<'a> {
    /// Bereits normalisierte E-Mail-Adresse
    pub email: &'a str,
    pub password_hash: &'a str,
    pub erstellt_am: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Sessions
// ---------------------------------------------------------------------------

/// Eine aktive Refresh-Session
#[derive(Debug, Clone, Serialize)]
pub struct SessionRecord {
    pub id: SessionId,
    pub user_id: UserId,
    #[serde(skip_serializing)]
    pub refresh_token_hash: String,
    pub user_agent: String,
    pub ip_adresse: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl SessionRecord {
    /// Eine Session ist gueltig solange `expires_at > jetzt`
    pub fn ist_gueltig(&self, jetzt: DateTime<Utc>) -> bool {
        self.expires_at > jetzt
    }
}

/// Daten zum Erstellen einer neuen Session
#[derive(Debug, Clone)]
pub struct NeueSession<'a> {
    pub user_id: UserId,
    pub refresh_token_hash: &'a str,
    pub kontext: &'a ClientKontext,
    pub expires_at: DateTime<Utc>,
    pub erstellt_am: DateTime<Utc>,
}

/// Daten fuer die Rotation einer Session
///
/// Die Rotation greift nur, wenn `alter_hash` noch aktuell ist und die
/// Session zum Zeitpunkt `jetzt` nicht abgelaufen ist.
#[derive(Debug, Clone)]
pub struct SessionRotation<'a> {
    pub id: SessionId,
    pub alter_hash: &'a str,
    pub neuer_hash: &'a str,
    pub neues_ablaufdatum: DateTime<Utc>,
    pub jetzt: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn passwort_hash_wird_nicht_serialisiert() {
        let user = BenutzerRecord {
            id: UserId::new(),
            email: "alice@example.com".into(),
            password_hash: "$argon2id$geheim".into(),
            is_verified: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let json = serde_json::to_string(&user).unwrap();
        assert!(!json.contains("password_hash"));
        assert!(!json.contains("geheim"));
        assert!(json.contains("alice@example.com"));
    }

    #[test]
    fn session_gueltigkeit_grenze() {
        let jetzt = Utc::now();
        let session = SessionRecord {
            id: SessionId::new(),
            user_id: UserId::new(),
            refresh_token_hash: "h".into(),
            user_agent: String::new(),
            ip_adresse: String::new(),
            expires_at: jetzt,
            created_at: jetzt - Duration::hours(1),
        };
        // expires_at == jetzt ist bereits abgelaufen
        assert!(!session.ist_gueltig(jetzt));
        assert!(session.ist_gueltig(jetzt - Duration::milliseconds(1)));
    }
}
