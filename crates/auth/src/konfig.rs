//! Konfiguration des Auth-Service
//!
//! Wird vom Server aus der Datei-/Umgebungskonfiguration gebaut und
//! explizit an die Komponenten uebergeben.

use chrono::Duration;
use secrecy::SecretString;

/// Standard-Lebensdauer eines Access-Tokens: 15 Minuten
pub const ACCESS_LEBENSDAUER_SEKUNDEN: i64 = 15 * 60;

/// Standard-Lebensdauer einer Refresh-Session: 7 Tage
pub const REFRESH_LEBENSDAUER_SEKUNDEN: i64 = 7 * 24 * 60 * 60;

/// Vollstaendige Auth-Konfiguration
#[derive(Debug, Clone)]
pub struct AuthKonfig {
    /// HMAC-Schluessel fuer Access-Tokens
    pub jwt_secret: SecretString,
    pub access_lebensdauer: Duration,
    pub refresh_lebensdauer: Duration,
    pub hash: HashKonfig,
    pub passwort_richtlinie: PasswortRichtlinie,
}

impl AuthKonfig {
    /// Erstellt eine Konfiguration mit Standardwerten und dem gegebenen Schluessel
    pub fn neu(jwt_secret: impl Into<String>) -> Self {
        Self {
            jwt_secret: SecretString::from(jwt_secret.into()),
            access_lebensdauer: Duration::seconds(ACCESS_LEBENSDAUER_SEKUNDEN),
            refresh_lebensdauer: Duration::seconds(REFRESH_LEBENSDAUER_SEKUNDEN),
            hash: HashKonfig::default(),
            passwort_richtlinie: PasswortRichtlinie::default(),
        }
    }
}

/// Argon2id-Parameter
///
/// `kosten` ist die Anzahl der Iterationen. Hashes sind selbstbeschreibend
/// (PHC-String), geaenderte Kosten machen bestehende Hashes nicht ungueltig.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HashKonfig {
    pub kosten: u32,
    pub speicher_kib: u32,
    pub parallelismus: u32,
}

impl Default for HashKonfig {
    fn default() -> Self {
        Self {
            kosten: 3,
            speicher_kib: 64 * 1024,
            parallelismus: 1,
        }
    }
}

/// Anforderungen an neue Passwoerter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasswortRichtlinie {
    pub min_laenge: usize,
    pub grossbuchstabe: bool,
    pub kleinbuchstabe: bool,
    pub ziffer: bool,
    pub sonderzeichen: bool,
}

impl Default for PasswortRichtlinie {
    fn default() -> Self {
        Self {
            min_laenge: 8,
            grossbuchstabe: true,
            kleinbuchstabe: true,
            ziffer: true,
            sonderzeichen: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    #[test]
    fn standardwerte() {
        let k = AuthKonfig::neu("geheim");
        assert_eq!(k.access_lebensdauer, Duration::minutes(15));
        assert_eq!(k.refresh_lebensdauer, Duration::days(7));
        assert_eq!(k.jwt_secret.expose_secret(), "geheim");
        assert_eq!(k.passwort_richtlinie.min_laenge, 8);
    }

    #[test]
    fn secret_erscheint_nicht_im_debug() {
        let k = AuthKonfig::neu("super-geheimer-schluessel");
        assert!(!format!("{k:?}").contains("super-geheimer-schluessel"));
    }
}
