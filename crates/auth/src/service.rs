//! Auth-Service fuer Zugang
//!
//! Zentraler Einstiegspunkt fuer Registrierung, Anmeldung, Token-Erneuerung
//! und Abmeldung. Haelt keinen eigenen veraenderlichen Zustand; alle
//! Nebenlaeufigkeit wird von den Speichern entschieden (Unique-Constraint
//! beim Anlegen, atomare Rotation).

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use zugang_core::{ClientKontext, Uhr};
use zugang_db::{
    models::{BenutzerRecord, NeuerBenutzer},
    SessionRepository, UserRepository,
};

use crate::{
    error::{AuthError, AuthResult},
    konfig::AuthKonfig,
    password::PasswortHasher,
    session::SessionStore,
    token::{AccessClaims, TokenAussteller},
    validation::{email_normalisieren, email_pruefen, passwort_pruefen},
};

/// Ergebnis einer erfolgreichen Anmeldung
#[derive(Debug, Clone, Serialize)]
pub struct Anmeldung {
    pub benutzer: BenutzerRecord,
    pub access_token: String,
    pub refresh_token: String,
    pub access_laeuft_ab_am: DateTime<Utc>,
}

/// Neues Token-Paar nach einer Erneuerung
#[derive(Debug, Clone, Serialize)]
pub struct TokenPaar {
    pub access_token: String,
    pub refresh_token: String,
    pub access_laeuft_ab_am: DateTime<Utc>,
}

/// Auth-Service
pub struct AuthService {
    users: Arc<dyn UserRepository>,
    sessions: Arc<SessionStore>,
    hasher: Arc<PasswortHasher>,
    tokens: Arc<TokenAussteller>,
    konfig: AuthKonfig,
    uhr: Arc<dyn Uhr>,
}

impl std::fmt::Debug for AuthService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthService")
            .field("hasher", &self.hasher)
            .field("tokens", &self.tokens)
            .finish_non_exhaustive()
    }
}

impl AuthService {
    /// Erstellt den Service; prueft Schluessel und Hash-Parameter
    pub fn neu(
        konfig: AuthKonfig,
        users: Arc<dyn UserRepository>,
        sessions: Arc<dyn SessionRepository>,
        uhr: Arc<dyn Uhr>,
    ) -> AuthResult<Self> {
        if konfig.refresh_lebensdauer <= chrono::Duration::zero() {
            return Err(AuthError::Konfiguration(
                "Refresh-Lebensdauer muss positiv sein".into(),
            ));
        }
        let tokens = Arc::new(TokenAussteller::neu(&konfig, uhr.clone())?);
        let hasher = Arc::new(PasswortHasher::neu(&konfig.hash)?);
        let sessions = Arc::new(SessionStore::neu(sessions, Arc::clone(&tokens), uhr.clone()));

        Ok(Self {
            users,
            sessions,
            hasher,
            tokens,
            konfig,
            uhr,
        })
    }

    /// Der Session-Store, z.B. fuer den Bereinigungs-Task
    pub fn session_store(&self) -> Arc<SessionStore> {
        Arc::clone(&self.sessions)
    }

    /// Registriert einen neuen, noch unverifizierten Benutzer
    pub async fn registrieren(
        &self,
        email: &str,
        passwort: &str,
        kontext: &ClientKontext,
    ) -> AuthResult<BenutzerRecord> {
        let email = email_pruefen(email)?;
        passwort_pruefen(passwort, &self.konfig.passwort_richtlinie)?;

        if self.users.get_by_email(&email).await?.is_some() {
            return Err(AuthError::BenutzerExistiert);
        }

        let passwort_hash = self.hashen(passwort).await?;

        // Bei einem Wettlauf entscheidet der Unique-Constraint
        let benutzer = self
            .users
            .create(NeuerBenutzer {
                email: &email,
                password_hash: &passwort_hash,
                erstellt_am: self.uhr.jetzt(),
            })
            .await
            .map_err(|e| {
                if e.ist_eindeutigkeit() {
                    AuthError::BenutzerExistiert
                } else {
                    e.into()
                }
            })?;

        tracing::info!(
            user_id = %benutzer.id,
            client_ip = %kontext.ip_adresse,
            "Neuer Benutzer registriert"
        );

        Ok(benutzer)
    }

    /// Meldet einen Benutzer an und erstellt eine neue Session
    ///
    /// Unbekannte E-Mail und falsches Passwort liefern denselben Fehler.
    pub async fn anmelden(
        &self,
        email: &str,
        passwort: &str,
        kontext: &ClientKontext,
    ) -> AuthResult<Anmeldung> {
        let email = email_normalisieren(email);

        let Some(benutzer) = self.users.get_by_email(&email).await? else {
            // Gleiche Rechenzeit wie bei falschem Passwort
            let hasher = Arc::clone(&self.hasher);
            let passwort = passwort.to_owned();
            tokio::task::spawn_blocking(move || hasher.dummy_verifizieren(&passwort))
                .await
                .map_err(|e| AuthError::intern(format!("Hash-Task: {e}")))?;
            tracing::warn!(client_ip = %kontext.ip_adresse, "Fehlgeschlagener Login-Versuch");
            return Err(AuthError::UngueltigeAnmeldedaten);
        };

        if !self.verifizieren(passwort, &benutzer.password_hash).await? {
            tracing::warn!(
                user_id = %benutzer.id,
                client_ip = %kontext.ip_adresse,
                "Fehlgeschlagener Login-Versuch"
            );
            return Err(AuthError::UngueltigeAnmeldedaten);
        }

        let access = self.tokens.access_ausstellen(benutzer.id)?;
        let neu = self
            .sessions
            .erstellen(benutzer.id, kontext, self.konfig.refresh_lebensdauer)
            .await?;

        tracing::info!(
            user_id = %benutzer.id,
            session_id = %neu.session.id,
            client_ip = %kontext.ip_adresse,
            "Benutzer angemeldet"
        );

        Ok(Anmeldung {
            benutzer,
            access_token: access.token,
            refresh_token: neu.refresh_token,
            access_laeuft_ab_am: access.laeuft_ab_am,
        })
    }

    /// Tauscht einen Refresh-Token gegen ein neues Token-Paar
    ///
    /// Der alte Refresh-Token ist danach ungueltig. Die Session laeuft ab
    /// jetzt wieder die volle Refresh-Lebensdauer.
    pub async fn erneuern(&self, refresh_token: &str) -> AuthResult<TokenPaar> {
        if refresh_token.is_empty() {
            return Err(AuthError::UngueltigerRefreshToken);
        }

        let session = self.sessions.aktive_finden(refresh_token).await?;
        // Erst rotieren: ein Access-Token entsteht nur fuer den Gewinner
        let rotiert = self
            .sessions
            .rotieren(&session, self.konfig.refresh_lebensdauer)
            .await?;
        let access = self.tokens.access_ausstellen(rotiert.session.user_id)?;

        tracing::debug!(
            user_id = %rotiert.session.user_id,
            session_id = %rotiert.session.id,
            "Tokens erneuert"
        );

        Ok(TokenPaar {
            access_token: access.token,
            refresh_token: rotiert.refresh_token,
            access_laeuft_ab_am: access.laeuft_ab_am,
        })
    }

    /// Beendet die Session zum Refresh-Token
    ///
    /// Benoetigt keinen gueltigen Access-Token. Unbekannte Tokens sind kein
    /// Fehler.
    pub async fn abmelden(&self, refresh_token: &str) -> AuthResult<()> {
        if refresh_token.trim().is_empty() {
            return Err(AuthError::Validierung("refresh_token fehlt".into()));
        }
        let geloescht = self.sessions.widerrufen(refresh_token).await?;
        tracing::debug!(geloescht, "Abmeldung");
        Ok(())
    }

    /// Prueft einen Access-Token ohne Speicherzugriff
    pub fn access_validieren(&self, token: &str) -> AuthResult<AccessClaims> {
        Ok(self.tokens.access_validieren(token)?)
    }

    async fn hashen(&self, passwort: &str) -> AuthResult<String> {
        let hasher = Arc::clone(&self.hasher);
        let passwort = passwort.to_owned();
        tokio::task::spawn_blocking(move || hasher.hashen(&passwort))
            .await
            .map_err(|e| AuthError::intern(format!("Hash-Task: {e}")))?
    }

    async fn verifizieren(&self, passwort: &str, hash: &str) -> AuthResult<bool> {
        let hasher = Arc::clone(&self.hasher);
        let passwort = passwort.to_owned();
        let hash = hash.to_owned();
        tokio::task::spawn_blocking(move || hasher.verifizieren(&passwort, &hash))
            .await
            .map_err(|e| AuthError::intern(format!("Hash-Task: {e}")))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use zugang_core::ManuelleUhr;
    use zugang_db::InMemoryDb;

    use crate::konfig::HashKonfig;
    use crate::token::TokenFehler;

    struct Umgebung {
        db: Arc<InMemoryDb>,
        uhr: Arc<ManuelleUhr>,
        service: AuthService,
    }

    fn umgebung() -> Umgebung {
        let db = Arc::new(InMemoryDb::neu());
        let uhr = Arc::new(ManuelleUhr::neu(
            Utc.with_ymd_and_hms(2026, 1, 1, 12, 0, 0).unwrap(),
        ));
        let mut konfig = AuthKonfig::neu("test-secret");
        konfig.hash = HashKonfig {
            kosten: 1,
            speicher_kib: 8,
            parallelismus: 1,
        };
        let service = AuthService::neu(konfig, db.clone(), db.clone(), uhr.clone()).unwrap();
        Umgebung { db, uhr, service }
    }

    fn kontext() -> ClientKontext {
        ClientKontext::neu("test-agent", "127.0.0.1")
    }

    #[tokio::test]
    async fn vollstaendiger_ablauf_mit_rotation() {
        let u = umgebung();
        let benutzer = u
            .service
            .registrieren("alice@example.com", "Passw0rd!", &kontext())
            .await
            .unwrap();
        assert_eq!(benutzer.email, "alice@example.com");
        assert!(!benutzer.is_verified);
        assert!(benutzer.password_hash.starts_with("$argon2id$"));

        let anmeldung = u
            .service
            .anmelden("alice@example.com", "Passw0rd!", &kontext())
            .await
            .unwrap();
        assert_eq!(anmeldung.benutzer.id, benutzer.id);
        let claims = u.service.access_validieren(&anmeldung.access_token).unwrap();
        assert_eq!(claims.user_id().unwrap(), benutzer.id);

        let r0 = anmeldung.refresh_token;
        let paar1 = u.service.erneuern(&r0).await.unwrap();
        assert_ne!(paar1.refresh_token, r0);

        assert!(matches!(
            u.service.erneuern(&r0).await,
            Err(AuthError::UngueltigerRefreshToken)
        ));
        let paar2 = u.service.erneuern(&paar1.refresh_token).await.unwrap();
        assert_ne!(paar2.refresh_token, paar1.refresh_token);
        assert_eq!(u.db.anzahl_sessions(), 1);
    }

    #[tokio::test]
    async fn doppelte_registrierung_ignoriert_gross_klein() {
        let u = umgebung();
        u.service
            .registrieren("bob@example.com", "Passw0rd!", &kontext())
            .await
            .unwrap();
        let ergebnis = u
            .service
            .registrieren("  BOB@Example.com ", "Anders1234", &kontext())
            .await;
        assert!(matches!(ergebnis, Err(AuthError::BenutzerExistiert)));
    }

    #[tokio::test]
    async fn anmeldung_ist_case_insensitiv() {
        let u = umgebung();
        u.service
            .registrieren("Carol@Example.com", "Passw0rd!", &kontext())
            .await
            .unwrap();
        assert!(u
            .service
            .anmelden("CAROL@example.COM", "Passw0rd!", &kontext())
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn falsches_passwort_und_unbekannter_benutzer_gleicher_fehler() {
        let u = umgebung();
        u.service
            .registrieren("alice@example.com", "Passw0rd!", &kontext())
            .await
            .unwrap();

        let falsch = u
            .service
            .anmelden("alice@example.com", "Falsch123", &kontext())
            .await
            .unwrap_err();
        let unbekannt = u
            .service
            .anmelden("niemand@example.com", "Passw0rd!", &kontext())
            .await
            .unwrap_err();

        assert!(matches!(falsch, AuthError::UngueltigeAnmeldedaten));
        assert!(matches!(unbekannt, AuthError::UngueltigeAnmeldedaten));
        assert_eq!(falsch.to_string(), unbekannt.to_string());
    }

    #[tokio::test]
    async fn eingaben_werden_geprueft() {
        let u = umgebung();
        assert!(matches!(
            u.service.registrieren("kein-at", "Passw0rd!", &kontext()).await,
            Err(AuthError::EmailUngueltig)
        ));
        assert!(matches!(
            u.service
                .registrieren("dave@example.com", "schwach", &kontext())
                .await,
            Err(AuthError::PasswortZuSchwach(_))
        ));
    }

    #[tokio::test]
    async fn abmelden_beendet_session() {
        let u = umgebung();
        u.service
            .registrieren("alice@example.com", "Passw0rd!", &kontext())
            .await
            .unwrap();
        let a = u
            .service
            .anmelden("alice@example.com", "Passw0rd!", &kontext())
            .await
            .unwrap();

        u.service.abmelden(&a.refresh_token).await.unwrap();
        // Zweites Abmelden ist kein Fehler
        u.service.abmelden(&a.refresh_token).await.unwrap();
        assert!(matches!(
            u.service.erneuern(&a.refresh_token).await,
            Err(AuthError::UngueltigerRefreshToken)
        ));
        assert!(matches!(
            u.service.abmelden("").await,
            Err(AuthError::Validierung(_))
        ));
    }

    #[tokio::test]
    async fn abmelden_mit_abgelaufenem_access_token() {
        let u = umgebung();
        u.service
            .registrieren("alice@example.com", "Passw0rd!", &kontext())
            .await
            .unwrap();
        let a = u
            .service
            .anmelden("alice@example.com", "Passw0rd!", &kontext())
            .await
            .unwrap();

        u.uhr.vorstellen(Duration::hours(1));
        assert!(matches!(
            u.service.access_validieren(&a.access_token),
            Err(AuthError::AccessToken(TokenFehler::Abgelaufen))
        ));
        assert!(u.service.abmelden(&a.refresh_token).await.is_ok());
        assert_eq!(u.db.anzahl_sessions(), 0);
    }

    #[tokio::test]
    async fn erneuern_verlaengert_ab_jetzt() {
        let u = umgebung();
        u.service
            .registrieren("alice@example.com", "Passw0rd!", &kontext())
            .await
            .unwrap();
        let a = u
            .service
            .anmelden("alice@example.com", "Passw0rd!", &kontext())
            .await
            .unwrap();

        // Kurz vor Ablauf erneuern: danach wieder volle 7 Tage
        u.uhr.vorstellen(Duration::days(7) - Duration::minutes(1));
        let paar = u.service.erneuern(&a.refresh_token).await.unwrap();
        u.uhr.vorstellen(Duration::days(6));
        assert!(u.service.erneuern(&paar.refresh_token).await.is_ok());
    }

    #[tokio::test]
    async fn abgelaufene_session_kann_nicht_erneuert_werden() {
        let u = umgebung();
        u.service
            .registrieren("alice@example.com", "Passw0rd!", &kontext())
            .await
            .unwrap();
        let a = u
            .service
            .anmelden("alice@example.com", "Passw0rd!", &kontext())
            .await
            .unwrap();

        u.uhr.vorstellen(Duration::days(7));
        assert!(matches!(
            u.service.erneuern(&a.refresh_token).await,
            Err(AuthError::UngueltigerRefreshToken)
        ));
    }

    #[tokio::test]
    async fn gleichzeitige_erneuerung_nur_einer_gewinnt() {
        let u = umgebung();
        u.service
            .registrieren("alice@example.com", "Passw0rd!", &kontext())
            .await
            .unwrap();
        let a = u
            .service
            .anmelden("alice@example.com", "Passw0rd!", &kontext())
            .await
            .unwrap();

        let service = Arc::new(u.service);
        let mut tasks = Vec::new();
        for _ in 0..8 {
            let service = Arc::clone(&service);
            let token = a.refresh_token.clone();
            tasks.push(tokio::spawn(async move { service.erneuern(&token).await }));
        }
        let mut erfolge = 0;
        for t in tasks {
            match t.await.unwrap() {
                Ok(_) => erfolge += 1,
                Err(AuthError::UngueltigerRefreshToken) => {}
                Err(e) => panic!("Unerwarteter Fehler: {e}"),
            }
        }
        assert_eq!(erfolge, 1);
    }

    #[tokio::test]
    async fn speicherausfall_ist_generischer_fehler() {
        let u = umgebung();
        u.db.ausfall_simulieren(true);
        let err = u
            .service
            .anmelden("alice@example.com", "Passw0rd!", &kontext())
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::SpeicherNichtVerfuegbar(_)));
        assert!(err.ist_intern());
        assert_eq!(err.to_string(), "Speicher nicht verfuegbar");
    }
}
