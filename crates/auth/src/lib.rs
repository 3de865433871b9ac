//! zugang-auth – Authentifizierung und Session-Lebenszyklus
//!
//! Dieses Crate implementiert:
//! - Passwort-Hashing mit Argon2id (konfigurierbare Kosten)
//! - Access-Tokens (signierte JWTs) und opake Refresh-Tokens
//! - Session-Store mit Einmal-Rotation der Refresh-Tokens
//! - Rate Limiter mit festem Zeitfenster (fail-open)
//! - AuthService (Registrierung, Anmeldung, Erneuerung, Abmeldung)

pub mod error;
pub mod konfig;
pub mod password;
pub mod rate_limit;
pub mod service;
pub mod session;
pub mod token;
pub mod validation;

// Bequeme Re-Exporte
pub use error::{AuthError, AuthResult};
pub use konfig::{AuthKonfig, HashKonfig, PasswortRichtlinie};
pub use password::PasswortHasher;
pub use rate_limit::{
    RateLimitKonfig, RateLimiter, RedisZaehler, SpeicherZaehler, ZaehlerFehler, ZaehlerSpeicher,
    ZaehlerStand, Zulassung,
};
pub use service::{Anmeldung, AuthService, TokenPaar};
pub use session::{NeueRefreshSession, SessionStore};
pub use token::{AccessClaims, AccessToken, TokenAussteller, TokenFehler};
