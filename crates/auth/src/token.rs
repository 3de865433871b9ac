//! Access- und Refresh-Tokens
//!
//! Access-Tokens sind HS256-signierte JWTs mit `sub`, `iat` und `exp`.
//! Sie werden ohne Speicherzugriff validiert und koennen vor Ablauf nicht
//! widerrufen werden. Refresh-Tokens sind opake Zufallswerte; ihre
//! Gueltigkeit ergibt sich allein aus dem Session-Store.

use std::sync::Arc;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{DateTime, Duration, TimeZone, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use rand::RngCore;
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use zugang_core::{Uhr, UserId};

use crate::error::{AuthError, AuthResult};
use crate::konfig::AuthKonfig;

/// Zufallsbytes pro Refresh-Token (256 Bit)
pub const REFRESH_TOKEN_BYTES: usize = 32;

/// Fehler bei der Validierung eines Access-Tokens
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenFehler {
    #[error("Signatur ungueltig")]
    UngueltigeSignatur,

    #[error("Token abgelaufen")]
    Abgelaufen,

    #[error("Token fehlformatiert")]
    Fehlformatiert,
}

/// Inhalt eines Access-Tokens
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessClaims {
    /// Benutzer-ID als UUID-String
    pub sub: String,
    /// Ausstellungszeitpunkt (Unix-Sekunden)
    pub iat: i64,
    /// Ablaufzeitpunkt (Unix-Sekunden)
    pub exp: i64,
}

impl AccessClaims {
    pub fn user_id(&self) -> Result<UserId, TokenFehler> {
        self.sub.parse().map_err(|_| TokenFehler::Fehlformatiert)
    }

    pub fn laeuft_ab_am(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_opt(self.exp, 0).single()
    }
}

/// Ein ausgestellter Access-Token mit seinem Ablaufzeitpunkt
#[derive(Debug, Clone)]
pub struct AccessToken {
    pub token: String,
    pub laeuft_ab_am: DateTime<Utc>,
}

/// Stellt Access-Tokens aus und validiert sie; erzeugt Refresh-Tokens
pub struct TokenAussteller {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    access_lebensdauer: Duration,
    uhr: Arc<dyn Uhr>,
}

impl std::fmt::Debug for TokenAussteller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenAussteller")
            .field("access_lebensdauer", &self.access_lebensdauer)
            .finish_non_exhaustive()
    }
}

impl TokenAussteller {
    /// Erstellt einen Aussteller; ein leerer Schluessel ist ein Konfigurationsfehler
    pub fn neu(konfig: &AuthKonfig, uhr: Arc<dyn Uhr>) -> AuthResult<Self> {
        let secret = konfig.jwt_secret.expose_secret().as_bytes();
        if secret.is_empty() {
            return Err(AuthError::Konfiguration(
                "JWT-Schluessel darf nicht leer sein".into(),
            ));
        }
        if konfig.access_lebensdauer <= Duration::zero() {
            return Err(AuthError::Konfiguration(
                "Access-Lebensdauer muss positiv sein".into(),
            ));
        }

        // Ablauf wird gegen die injizierte Uhr geprueft, nicht gegen die Systemzeit
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Ok(Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation,
            access_lebensdauer: konfig.access_lebensdauer,
            uhr,
        })
    }

    pub fn access_lebensdauer(&self) -> Duration {
        self.access_lebensdauer
    }

    /// Stellt einen Access-Token fuer den Benutzer aus
    pub fn access_ausstellen(&self, user_id: UserId) -> AuthResult<AccessToken> {
        let jetzt = self.uhr.jetzt();
        let laeuft_ab_am = jetzt + self.access_lebensdauer;
        let claims = AccessClaims {
            sub: user_id.to_string(),
            iat: jetzt.timestamp(),
            exp: laeuft_ab_am.timestamp(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| AuthError::Kryptografie(format!("Token-Signatur: {e}")))?;

        Ok(AccessToken {
            token,
            laeuft_ab_am,
        })
    }

    /// Prueft Signatur und Ablauf eines Access-Tokens
    pub fn access_validieren(&self, token: &str) -> Result<AccessClaims, TokenFehler> {
        let daten = decode::<AccessClaims>(token, &self.decoding, &self.validation).map_err(
            |e| match e.kind() {
                ErrorKind::InvalidSignature | ErrorKind::InvalidAlgorithm => {
                    TokenFehler::UngueltigeSignatur
                }
                ErrorKind::ExpiredSignature => TokenFehler::Abgelaufen,
                _ => TokenFehler::Fehlformatiert,
            },
        )?;

        let claims = daten.claims;
        if self.uhr.jetzt().timestamp() >= claims.exp {
            return Err(TokenFehler::Abgelaufen);
        }
        claims.user_id()?;
        Ok(claims)
    }

    /// Erzeugt einen neuen opaken Refresh-Token
    pub fn refresh_ausstellen(&self) -> String {
        refresh_token_generieren()
    }
}

/// 32 Zufallsbytes aus dem Betriebssystem, URL-sicher Base64-kodiert (43 Zeichen)
fn refresh_token_generieren() -> String {
    let mut bytes = [0u8; REFRESH_TOKEN_BYTES];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use zugang_core::ManuelleUhr;

    fn startzeit() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 1, 12, 0, 0).unwrap()
    }

    fn aussteller(secret: &str, uhr: Arc<ManuelleUhr>) -> TokenAussteller {
        TokenAussteller::neu(&AuthKonfig::neu(secret), uhr).unwrap()
    }

    #[test]
    fn token_round_trip() {
        let uhr = Arc::new(ManuelleUhr::neu(startzeit()));
        let a = aussteller("test-secret", uhr);
        let user_id = UserId::new();

        let token = a.access_ausstellen(user_id).unwrap();
        assert_eq!(token.laeuft_ab_am, startzeit() + Duration::minutes(15));

        let claims = a.access_validieren(&token.token).unwrap();
        assert_eq!(claims.user_id().unwrap(), user_id);
        assert_eq!(claims.iat, startzeit().timestamp());
        assert_eq!(claims.exp, claims.iat + 15 * 60);
    }

    #[test]
    fn token_kurz_vor_ablauf_gueltig_danach_abgelaufen() {
        let uhr = Arc::new(ManuelleUhr::neu(startzeit()));
        let a = aussteller("test-secret", uhr.clone());
        let token = a.access_ausstellen(UserId::new()).unwrap().token;

        uhr.vorstellen(Duration::minutes(15) - Duration::seconds(1));
        assert!(a.access_validieren(&token).is_ok());

        uhr.vorstellen(Duration::seconds(2));
        assert_eq!(a.access_validieren(&token), Err(TokenFehler::Abgelaufen));
    }

    #[test]
    fn fremder_schluessel_ergibt_ungueltige_signatur() {
        let uhr = Arc::new(ManuelleUhr::neu(startzeit()));
        let a = aussteller("schluessel-a", uhr.clone());
        let b = aussteller("schluessel-b", uhr);

        let token = a.access_ausstellen(UserId::new()).unwrap().token;
        assert_eq!(b.access_validieren(&token), Err(TokenFehler::UngueltigeSignatur));
    }

    #[test]
    fn manipulierter_payload_wird_erkannt() {
        let uhr = Arc::new(ManuelleUhr::neu(startzeit()));
        let a = aussteller("test-secret", uhr);
        let token = a.access_ausstellen(UserId::new()).unwrap().token;

        let teile: Vec<&str> = token.split('.').collect();
        let fremd = AccessClaims {
            sub: UserId::new().to_string(),
            iat: startzeit().timestamp(),
            exp: startzeit().timestamp() + 3600,
        };
        let payload = URL_SAFE_NO_PAD.encode(serde_json_bytes(&fremd));
        let manipuliert = format!("{}.{}.{}", teile[0], payload, teile[2]);

        assert_eq!(
            a.access_validieren(&manipuliert),
            Err(TokenFehler::UngueltigeSignatur)
        );
    }

    fn serde_json_bytes(claims: &AccessClaims) -> Vec<u8> {
        format!(
            r#"{{"sub":"{}","iat":{},"exp":{}}}"#,
            claims.sub, claims.iat, claims.exp
        )
        .into_bytes()
    }

    #[test]
    fn unsinn_ist_fehlformatiert() {
        let uhr = Arc::new(ManuelleUhr::neu(startzeit()));
        let a = aussteller("test-secret", uhr);
        assert_eq!(a.access_validieren("kein-jwt"), Err(TokenFehler::Fehlformatiert));
        assert_eq!(a.access_validieren(""), Err(TokenFehler::Fehlformatiert));
    }

    #[test]
    fn leerer_schluessel_wird_abgelehnt() {
        let uhr = Arc::new(ManuelleUhr::neu(startzeit()));
        let err = TokenAussteller::neu(&AuthKonfig::neu(""), uhr).unwrap_err();
        assert!(matches!(err, AuthError::Konfiguration(_)));
    }

    #[test]
    fn refresh_tokens_sind_lang_und_eindeutig() {
        let a = aussteller("test-secret", Arc::new(ManuelleUhr::neu(startzeit())));
        let tokens: HashSet<String> = (0..1000).map(|_| a.refresh_ausstellen()).collect();
        assert_eq!(tokens.len(), 1000);
        for t in &tokens {
            assert_eq!(t.len(), 43);
            assert!(t
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
        }
    }
}
