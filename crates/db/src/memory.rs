//! In-Memory-Implementierung aller Repository-Traits
//!
//! Bildet dieselben Garantien wie das SQLite-Backend nach (eindeutige
//! E-Mail, eindeutiger Token-Hash, Rotation nur bei aktuellem Hash) und
//! dient als Fake-Speicher in Tests. Mit [`InMemoryDb::ausfall_simulieren`]
//! laesst sich ein nicht erreichbarer Speicher nachstellen.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use zugang_core::{SessionId, UserId};

use crate::error::DbError;
use crate::models::{BenutzerRecord, NeueSession, NeuerBenutzer, SessionRecord, SessionRotation};
use crate::repository::{DbResult, SessionRepository, UserRepository};

#[derive(Debug, Default)]
pub struct InMemoryDb {
    benutzer: Mutex<HashMap<UserId, BenutzerRecord>>,
    sessions: Mutex<HashMap<SessionId, SessionRecord>>,
    ausgefallen: AtomicBool,
}

impl InMemoryDb {
    pub fn neu() -> Self {
        Self::default()
    }

    /// Schaltet den simulierten Ausfall ein oder aus
    pub fn ausfall_simulieren(&self, ausgefallen: bool) {
        self.ausgefallen.store(ausgefallen, Ordering::SeqCst);
    }

    /// Anzahl gespeicherter Sessions, abgelaufene eingeschlossen
    pub fn anzahl_sessions(&self) -> usize {
        self.sessions.lock().len()
    }

    fn verfuegbar(&self) -> DbResult<()> {
        if self.ausgefallen.load(Ordering::SeqCst) {
            return Err(DbError::NichtVerfuegbar("simulierter Ausfall".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl UserRepository for InMemoryDb {
    async fn create(&self, data: NeuerBenutzer<'_>) -> DbResult<BenutzerRecord> {
        self.verfuegbar()?;
        let mut benutzer = self.benutzer.lock();
        if benutzer.values().any(|u| u.email == data.email) {
            return Err(DbError::Eindeutigkeit(format!(
                "E-Mail '{}' bereits vergeben",
                data.email
            )));
        }
        let record = BenutzerRecord {
            id: UserId::new(),
            email: data.email.to_string(),
            password_hash: data.password_hash.to_string(),
            is_verified: false,
            created_at: data.erstellt_am,
            updated_at: data.erstellt_am,
        };
        benutzer.insert(record.id, record.clone());
        Ok(record)
    }

    async fn get_by_id(&self, id: UserId) -> DbResult<Option<BenutzerRecord>> {
        self.verfuegbar()?;
        Ok(self.benutzer.lock().get(&id).cloned())
    }

    async fn get_by_email(&self, email: &str) -> DbResult<Option<BenutzerRecord>> {
        self.verfuegbar()?;
        Ok(self
            .benutzer
            .lock()
            .values()
            .find(|u| u.email == email)
            .cloned())
    }
}

#[async_trait]
impl SessionRepository for InMemoryDb {
    async fn create(&self, data: NeueSession<'_>) -> DbResult<SessionRecord> {
        self.verfuegbar()?;
        if !self.benutzer.lock().contains_key(&data.user_id) {
            return Err(DbError::UngueltigeDaten(format!(
                "Benutzer {} existiert nicht",
                data.user_id
            )));
        }
        let mut sessions = self.sessions.lock();
        if sessions
            .values()
            .any(|s| s.refresh_token_hash == data.refresh_token_hash)
        {
            return Err(DbError::Eindeutigkeit("Refresh-Token bereits vergeben".into()));
        }
        let record = SessionRecord {
            id: SessionId::new(),
            user_id: data.user_id,
            refresh_token_hash: data.refresh_token_hash.to_string(),
            user_agent: data.kontext.user_agent.clone(),
            ip_adresse: data.kontext.ip_adresse.clone(),
            expires_at: data.expires_at,
            created_at: data.erstellt_am,
        };
        sessions.insert(record.id, record.clone());
        Ok(record)
    }

    async fn find_active(
        &self,
        refresh_token_hash: &str,
        jetzt: DateTime<Utc>,
    ) -> DbResult<Option<SessionRecord>> {
        self.verfuegbar()?;
        Ok(self
            .sessions
            .lock()
            .values()
            .find(|s| s.refresh_token_hash == refresh_token_hash && s.ist_gueltig(jetzt))
            .cloned())
    }

    async fn rotate(&self, rotation: SessionRotation<'_>) -> DbResult<SessionRecord> {
        self.verfuegbar()?;
        let mut sessions = self.sessions.lock();
        if sessions
            .values()
            .any(|s| s.refresh_token_hash == rotation.neuer_hash)
        {
            return Err(DbError::Eindeutigkeit("Refresh-Token bereits vergeben".into()));
        }
        match sessions.get_mut(&rotation.id) {
            Some(s) if s.refresh_token_hash == rotation.alter_hash && s.ist_gueltig(rotation.jetzt) => {
                s.refresh_token_hash = rotation.neuer_hash.to_string();
                s.expires_at = rotation.neues_ablaufdatum;
                Ok(s.clone())
            }
            _ => Err(DbError::nicht_gefunden(format!(
                "Session {} (bereits rotiert oder abgelaufen)",
                rotation.id
            ))),
        }
    }

    async fn delete_by_token(&self, refresh_token_hash: &str) -> DbResult<bool> {
        self.verfuegbar()?;
        let mut sessions = self.sessions.lock();
        let vorher = sessions.len();
        sessions.retain(|_, s| s.refresh_token_hash != refresh_token_hash);
        Ok(sessions.len() < vorher)
    }

    async fn delete_expired(&self, jetzt: DateTime<Utc>) -> DbResult<u64> {
        self.verfuegbar()?;
        let mut sessions = self.sessions.lock();
        let vorher = sessions.len();
        sessions.retain(|_, s| s.ist_gueltig(jetzt));
        Ok((vorher - sessions.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use zugang_core::ClientKontext;

    async fn benutzer_anlegen(db: &InMemoryDb, email: &str) -> BenutzerRecord {
        UserRepository::create(
            db,
            NeuerBenutzer {
                email,
                password_hash: "hash",
                erstellt_am: Utc::now(),
            },
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn doppelte_email_ist_eindeutigkeitsfehler() {
        let db = InMemoryDb::neu();
        benutzer_anlegen(&db, "a@example.com").await;
        let err = UserRepository::create(
            &db,
            NeuerBenutzer {
                email: "a@example.com",
                password_hash: "anders",
                erstellt_am: Utc::now(),
            },
        )
        .await
        .unwrap_err();
        assert!(err.ist_eindeutigkeit());
    }

    #[tokio::test]
    async fn rotation_nur_mit_aktuellem_hash() {
        let db = InMemoryDb::neu();
        let user = benutzer_anlegen(&db, "rot@example.com").await;
        let jetzt = Utc::now();
        let kontext = ClientKontext::default();

        let session = SessionRepository::create(
            &db,
            NeueSession {
                user_id: user.id,
                refresh_token_hash: "alt",
                kontext: &kontext,
                expires_at: jetzt + Duration::days(7),
                erstellt_am: jetzt,
            },
        )
        .await
        .unwrap();

        let rotation = SessionRotation {
            id: session.id,
            alter_hash: "alt",
            neuer_hash: "neu",
            neues_ablaufdatum: jetzt + Duration::days(8),
            jetzt,
        };
        let rotiert = db.rotate(rotation.clone()).await.unwrap();
        assert_eq!(rotiert.refresh_token_hash, "neu");

        let zweite = db
            .rotate(SessionRotation {
                neuer_hash: "neu2",
                ..rotation
            })
            .await;
        assert!(matches!(zweite, Err(DbError::NichtGefunden(_))));
        assert_eq!(db.anzahl_sessions(), 1);
    }

    #[tokio::test]
    async fn simulierter_ausfall() {
        let db = InMemoryDb::neu();
        db.ausfall_simulieren(true);
        let ergebnis = db.get_by_email("x@example.com").await;
        assert!(matches!(ergebnis, Err(DbError::NichtVerfuegbar(_))));
    }
}
