//! UserRepository gegen eine In-Memory-SQLite-Datenbank

use chrono::{DateTime, SubsecRound, Utc};
use zugang_db::{models::NeuerBenutzer, SqliteDb, UserRepository};

fn anlegen<'a>(email: &'a str, hash: &'a str, zeit: DateTime<Utc>) -> NeuerBenutzer<'a> {
    NeuerBenutzer {
        email,
        password_hash: hash,
        erstellt_am: zeit,
    }
}

#[tokio::test]
async fn angelegter_benutzer_ist_per_id_und_email_auffindbar() {
    let db = SqliteDb::in_memory().await.unwrap();
    let jetzt = Utc::now().trunc_subsecs(3);

    let neu = UserRepository::create(&db, anlegen("alice@example.com", "$argon2id$a", jetzt))
        .await
        .unwrap();
    assert!(!neu.is_verified, "neue Konten sind unverifiziert");
    assert_eq!(neu.created_at, neu.updated_at);

    let per_id = db.get_by_id(neu.id).await.unwrap().unwrap();
    let per_email = db.get_by_email("alice@example.com").await.unwrap().unwrap();
    assert_eq!(per_id.id, neu.id);
    assert_eq!(per_email.id, neu.id);
    assert_eq!(per_id.password_hash, "$argon2id$a");
    assert_eq!(per_id.created_at, jetzt);
}

#[tokio::test]
async fn unbekannte_benutzer_liefern_none() {
    let db = SqliteDb::in_memory().await.unwrap();
    assert!(db.get_by_email("niemand@example.com").await.unwrap().is_none());
    assert!(db
        .get_by_id(zugang_core::UserId::new())
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn doppelte_email_scheitert_am_unique_constraint() {
    let db = SqliteDb::in_memory().await.unwrap();
    let jetzt = Utc::now();

    UserRepository::create(&db, anlegen("carol@example.com", "h1", jetzt))
        .await
        .unwrap();
    let err = UserRepository::create(&db, anlegen("carol@example.com", "h2", jetzt))
        .await
        .unwrap_err();

    assert!(err.ist_eindeutigkeit(), "Erwartet Eindeutigkeitsfehler, erhalten: {err}");
    // Der erste Hash bleibt unveraendert
    let gespeichert = db.get_by_email("carol@example.com").await.unwrap().unwrap();
    assert_eq!(gespeichert.password_hash, "h1");
}
