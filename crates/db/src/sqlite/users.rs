//! SQLite-Implementierung des UserRepository

use async_trait::async_trait;
use uuid::Uuid;
use zugang_core::UserId;

use crate::error::DbError;
use crate::models::{BenutzerRecord, NeuerBenutzer};
use crate::repository::{DbResult, UserRepository};
use crate::sqlite::{pool::SqliteDb, zeit_parsen};

#[async_trait]
impl UserRepository for SqliteDb {
    async fn create(&self, data: NeuerBenutzer<'_>) -> DbResult<BenutzerRecord> {
        let id = UserId::new();
        let jetzt_str = data.erstellt_am.to_rfc3339();

        sqlx::query(
            "INSERT INTO users (id, email, password_hash, is_verified, created_at, updated_at)
             VALUES (?, ?, ?, 0, ?, ?)",
        )
        .bind(id.to_string())
        .bind(data.email)
        .bind(data.password_hash)
        .bind(&jetzt_str)
        .bind(&jetzt_str)
        .execute(&self.pool)
        .await
        .map_err(|e| DbError::aus_sqlx(e, format!("E-Mail '{}' bereits vergeben", data.email)))?;

        Ok(BenutzerRecord {
            id,
            email: data.email.to_string(),
            password_hash: data.password_hash.to_string(),
            is_verified: false,
            created_at: data.erstellt_am,
            updated_at: data.erstellt_am,
        })
    }

    async fn get_by_id(&self, id: UserId) -> DbResult<Option<BenutzerRecord>> {
        let row = sqlx::query(
            "SELECT id, email, password_hash, is_verified, created_at, updated_at
             FROM users WHERE id = ?",
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| DbError::aus_sqlx(e, "users"))?;

        row.map(|r| row_to_benutzer(&r)).transpose()
    }

    async fn get_by_email(&self, email: &str) -> DbResult<Option<BenutzerRecord>> {
        let row = sqlx::query(
            "SELECT id, email, password_hash, is_verified, created_at, updated_at
             FROM users WHERE email = ?",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| DbError::aus_sqlx(e, "users"))?;

        row.map(|r| row_to_benutzer(&r)).transpose()
    }
}

fn row_to_benutzer(row: &sqlx::sqlite::SqliteRow) -> DbResult<BenutzerRecord> {
    use sqlx::Row as _;

    let id_str: String = row.try_get("id")?;
    let id = Uuid::parse_str(&id_str)
        .map_err(|e| DbError::intern(format!("Ungueltige UUID '{id_str}': {e}")))?;

    let created_at: String = row.try_get("created_at")?;
    let updated_at: String = row.try_get("updated_at")?;
    let is_verified: i64 = row.try_get("is_verified")?;

    Ok(BenutzerRecord {
        id: UserId(id),
        email: row.try_get("email")?,
        password_hash: row.try_get("password_hash")?,
        is_verified: is_verified != 0,
        created_at: zeit_parsen("created_at", &created_at)?,
        updated_at: zeit_parsen("updated_at", &updated_at)?,
    })
}
