//! SQLite-Implementierung des SessionRepository
//!
//! Die Rotation ist ein einzelnes bedingtes UPDATE: nur die Zeile, deren
//! Token-Hash noch dem alten Wert entspricht, wird ersetzt. Eine zweite
//! Rotation mit demselben alten Hash findet keine Zeile mehr.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;
use zugang_core::{SessionId, UserId};

use crate::error::DbError;
use crate::models::{NeueSession, SessionRecord, SessionRotation};
use crate::repository::{DbResult, SessionRepository};
use crate::sqlite::{millis_parsen, pool::SqliteDb, zeit_parsen};

const SESSION_SPALTEN: &str =
    "id, user_id, refresh_token_hash, user_agent, ip_address, expires_at, created_at";

#[async_trait]
impl SessionRepository for SqliteDb {
    async fn create(&self, data: NeueSession<'_>) -> DbResult<SessionRecord> {
        let id = SessionId::new();

        sqlx::query(
            "INSERT INTO sessions (id, user_id, refresh_token_hash, user_agent, ip_address, expires_at, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(id.to_string())
        .bind(data.user_id.to_string())
        .bind(data.refresh_token_hash)
        .bind(&data.kontext.user_agent)
        .bind(&data.kontext.ip_adresse)
        .bind(data.expires_at.timestamp_millis())
        .bind(data.erstellt_am.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| DbError::aus_sqlx(e, "Refresh-Token bereits vergeben"))?;

        Ok(SessionRecord {
            id,
            user_id: data.user_id,
            refresh_token_hash: data.refresh_token_hash.to_string(),
            user_agent: data.kontext.user_agent.clone(),
            ip_adresse: data.kontext.ip_adresse.clone(),
            expires_at: data.expires_at,
            created_at: data.erstellt_am,
        })
    }

    async fn find_active(
        &self,
        refresh_token_hash: &str,
        jetzt: DateTime<Utc>,
    ) -> DbResult<Option<SessionRecord>> {
        let sql = format!(
            "SELECT {SESSION_SPALTEN} FROM sessions WHERE refresh_token_hash = ? AND expires_at > ?"
        );
        let row = sqlx::query(&sql)
            .bind(refresh_token_hash)
            .bind(jetzt.timestamp_millis())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| DbError::aus_sqlx(e, "sessions"))?;

        row.map(|r| row_to_session(&r)).transpose()
    }

    async fn rotate(&self, rotation: SessionRotation<'_>) -> DbResult<SessionRecord> {
        let sql = format!(
            "UPDATE sessions SET refresh_token_hash = ?, expires_at = ?
             WHERE id = ? AND refresh_token_hash = ? AND expires_at > ?
             RETURNING {SESSION_SPALTEN}"
        );
        let row = sqlx::query(&sql)
            .bind(rotation.neuer_hash)
            .bind(rotation.neues_ablaufdatum.timestamp_millis())
            .bind(rotation.id.to_string())
            .bind(rotation.alter_hash)
            .bind(rotation.jetzt.timestamp_millis())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| DbError::aus_sqlx(e, "Refresh-Token bereits vergeben"))?;

        match row {
            Some(r) => row_to_session(&r),
            None => Err(DbError::nicht_gefunden(format!(
                "Session {} (bereits rotiert oder abgelaufen)",
                rotation.id
            ))),
        }
    }

    async fn delete_by_token(&self, refresh_token_hash: &str) -> DbResult<bool> {
        let affected = sqlx::query("DELETE FROM sessions WHERE refresh_token_hash = ?")
            .bind(refresh_token_hash)
            .execute(&self.pool)
            .await
            .map_err(|e| DbError::aus_sqlx(e, "sessions"))?
            .rows_affected();
        Ok(affected > 0)
    }

    async fn delete_expired(&self, jetzt: DateTime<Utc>) -> DbResult<u64> {
        let affected = sqlx::query("DELETE FROM sessions WHERE expires_at <= ?")
            .bind(jetzt.timestamp_millis())
            .execute(&self.pool)
            .await
            .map_err(|e| DbError::aus_sqlx(e, "sessions"))?
            .rows_affected();
        Ok(affected)
    }
}

fn row_to_session(row: &sqlx::sqlite::SqliteRow) -> DbResult<SessionRecord> {
    use sqlx::Row as _;

    let id_str: String = row.try_get("id")?;
    let id = Uuid::parse_str(&id_str)
        .map_err(|e| DbError::intern(format!("Ungueltige UUID '{id_str}': {e}")))?;
    let user_id_str: String = row.try_get("user_id")?;
    let user_id = Uuid::parse_str(&user_id_str)
        .map_err(|e| DbError::intern(format!("Ungueltige UUID '{user_id_str}': {e}")))?;

    let expires_at: i64 = row.try_get("expires_at")?;
    let created_at: String = row.try_get("created_at")?;

    Ok(SessionRecord {
        id: SessionId(id),
        user_id: UserId(user_id),
        refresh_token_hash: row.try_get("refresh_token_hash")?,
        user_agent: row.try_get("user_agent")?,
        ip_adresse: row.try_get("ip_address")?,
        expires_at: millis_parsen("expires_at", expires_at)?,
        created_at: zeit_parsen("created_at", &created_at)?,
    })
}
