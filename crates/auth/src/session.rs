//! Session-Store fuer Refresh-Tokens
//!
//! Eine Session ist ein widerrufbarer Refresh-Grant. Der Klartext-Token
//! verlaesst den Store nur einmal, bei Erstellung oder Rotation; gespeichert
//! wird ausschliesslich sein SHA-256-Hash. Jeder Refresh-Token ist genau
//! einmal verwendbar: nach erfolgreicher Rotation findet der alte Token
//! keine Session mehr.

use std::{sync::Arc, time::Duration};

use chrono::Duration as ChronoDuration;
use sha2::{Digest, Sha256};
use tokio::task::JoinHandle;
use zugang_core::{ClientKontext, Uhr, UserId};
use zugang_db::{
    models::{NeueSession, SessionRecord, SessionRotation},
    DbError, SessionRepository,
};

use crate::error::{AuthError, AuthResult};
use crate::token::TokenAussteller;

/// Maximale Versuche bei einer Token-Kollision
const MAX_KOLLISIONS_VERSUCHE: usize = 3;

/// Intervall fuer die Bereinigung abgelaufener Sessions: 15 Minuten
pub const BEREINIGUNGS_INTERVALL: Duration = Duration::from_secs(15 * 60);

/// SHA-256 eines Refresh-Tokens als Hex-String
pub fn refresh_token_hashen(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

/// Eine neu erstellte oder rotierte Session samt Klartext-Token
#[derive(Debug, Clone)]
pub struct NeueRefreshSession {
    pub session: SessionRecord,
    /// Nur hier im Klartext; geht an den Client und wird nicht gespeichert
    pub refresh_token: String,
}

/// Session-Store ueber einem [`SessionRepository`]
pub struct SessionStore {
    repo: Arc<dyn SessionRepository>,
    tokens: Arc<TokenAussteller>,
    uhr: Arc<dyn Uhr>,
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore").finish_non_exhaustive()
    }
}

impl SessionStore {
    /// Refresh-Tokens stellt `tokens` aus
    pub fn neu(
        repo: Arc<dyn SessionRepository>,
        tokens: Arc<TokenAussteller>,
        uhr: Arc<dyn Uhr>,
    ) -> Self {
        Self { repo, tokens, uhr }
    }

    /// Erstellt eine neue Session mit frischem Refresh-Token
    pub async fn erstellen(
        &self,
        user_id: UserId,
        kontext: &ClientKontext,
        ttl: ChronoDuration,
    ) -> AuthResult<NeueRefreshSession> {
        let tokens = Arc::clone(&self.tokens);
        self.erstellen_mit(user_id, kontext, ttl, move || tokens.refresh_ausstellen())
            .await
    }

    /// Wie [`erstellen`](Self::erstellen), mit eigenem Token-Generator
    ///
    /// Bei einer Kollision wird mit einem neuen Token erneut versucht,
    /// hoechstens dreimal.
    pub async fn erstellen_mit<G>(
        &self,
        user_id: UserId,
        kontext: &ClientKontext,
        ttl: ChronoDuration,
        mut generator: G,
    ) -> AuthResult<NeueRefreshSession>
    where
        G: FnMut() -> String + Send,
    {
        for versuch in 1..=MAX_KOLLISIONS_VERSUCHE {
            let refresh_token = generator();
            let hash = refresh_token_hashen(&refresh_token);
            let jetzt = self.uhr.jetzt();

            let ergebnis = self
                .repo
                .create(NeueSession {
                    user_id,
                    refresh_token_hash: &hash,
                    kontext,
                    expires_at: jetzt + ttl,
                    erstellt_am: jetzt,
                })
                .await;

            match ergebnis {
                Ok(session) => {
                    tracing::debug!(
                        user_id = %user_id,
                        session_id = %session.id,
                        "Neue Session erstellt"
                    );
                    return Ok(NeueRefreshSession {
                        session,
                        refresh_token,
                    });
                }
                Err(e) if e.ist_eindeutigkeit() => {
                    tracing::warn!(user_id = %user_id, versuch, "Refresh-Token-Kollision");
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(AuthError::intern(format!(
            "Kein eindeutiger Refresh-Token nach {MAX_KOLLISIONS_VERSUCHE} Versuchen"
        )))
    }

    /// Findet die aktive Session zu einem Refresh-Token
    ///
    /// Unbekannte und abgelaufene Tokens liefern `UngueltigerRefreshToken`.
    pub async fn aktive_finden(&self, refresh_token: &str) -> AuthResult<SessionRecord> {
        let hash = refresh_token_hashen(refresh_token);
        self.repo
            .find_active(&hash, self.uhr.jetzt())
            .await?
            .ok_or(AuthError::UngueltigerRefreshToken)
    }

    /// Ersetzt den Refresh-Token einer Session und verlaengert ihre Laufzeit
    ///
    /// Die neue Ablaufzeit ist `jetzt + ttl`. Wurde die Session inzwischen
    /// rotiert, widerrufen oder ist sie abgelaufen, schlaegt die Rotation mit
    /// `UngueltigerRefreshToken` fehl.
    pub async fn rotieren(
        &self,
        session: &SessionRecord,
        ttl: ChronoDuration,
    ) -> AuthResult<NeueRefreshSession> {
        for versuch in 1..=MAX_KOLLISIONS_VERSUCHE {
            let refresh_token = self.tokens.refresh_ausstellen();
            let neuer_hash = refresh_token_hashen(&refresh_token);
            let jetzt = self.uhr.jetzt();

            let ergebnis = self
                .repo
                .rotate(SessionRotation {
                    id: session.id,
                    alter_hash: &session.refresh_token_hash,
                    neuer_hash: &neuer_hash,
                    neues_ablaufdatum: jetzt + ttl,
                    jetzt,
                })
                .await;

            match ergebnis {
                Ok(rotiert) => {
                    tracing::debug!(
                        user_id = %rotiert.user_id,
                        session_id = %rotiert.id,
                        "Session rotiert"
                    );
                    return Ok(NeueRefreshSession {
                        session: rotiert,
                        refresh_token,
                    });
                }
                Err(DbError::NichtGefunden(_)) => {
                    tracing::warn!(
                        user_id = %session.user_id,
                        session_id = %session.id,
                        "Refresh-Token bereits verbraucht oder Session beendet (moegliche Wiederverwendung)"
                    );
                    return Err(AuthError::UngueltigerRefreshToken);
                }
                Err(e) if e.ist_eindeutigkeit() => {
                    tracing::warn!(session_id = %session.id, versuch, "Refresh-Token-Kollision bei Rotation");
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(AuthError::intern(format!(
            "Kein eindeutiger Refresh-Token nach {MAX_KOLLISIONS_VERSUCHE} Versuchen"
        )))
    }

    /// Loescht die Session zum Refresh-Token
    ///
    /// Gibt `false` zurueck wenn keine Session existierte; das ist kein Fehler.
    pub async fn widerrufen(&self, refresh_token: &str) -> AuthResult<bool> {
        let hash = refresh_token_hashen(refresh_token);
        let geloescht = self.repo.delete_by_token(&hash).await?;
        if geloescht {
            tracing::debug!("Session widerrufen");
        }
        Ok(geloescht)
    }

    /// Entfernt alle abgelaufenen Sessions
    pub async fn abgelaufene_bereinigen(&self) -> AuthResult<u64> {
        Ok(self.repo.delete_expired(self.uhr.jetzt()).await?)
    }

    /// Startet den periodischen Bereinigungs-Task
    pub fn bereinigung_starten(store: Arc<Self>, intervall: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut takt = tokio::time::interval(intervall);
            // Erster Tick kommt sofort
            takt.tick().await;
            loop {
                takt.tick().await;
                match store.abgelaufene_bereinigen().await {
                    Ok(0) => {}
                    Ok(anzahl) => {
                        tracing::info!(anzahl, "Abgelaufene Sessions bereinigt");
                    }
                    Err(e) => {
                        tracing::warn!(fehler = %e.detail(), "Session-Bereinigung fehlgeschlagen");
                    }
                }
            }
        })
    }
}
