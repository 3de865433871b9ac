//! Eingabepruefung fuer Registrierung und Anmeldung

use std::sync::OnceLock;

use regex::Regex;

use crate::error::{AuthError, AuthResult};
use crate::konfig::PasswortRichtlinie;

/// Maximale Laenge einer E-Mail-Adresse (RFC 5321)
const EMAIL_MAX_LAENGE: usize = 254;

fn email_regex() -> &'static Regex {
    static EMAIL: OnceLock<Regex> = OnceLock::new();
    EMAIL.get_or_init(|| {
        Regex::new(r"^[a-z0-9._%+\-]+@[a-z0-9](?:[a-z0-9\-]*[a-z0-9])?(?:\.[a-z0-9](?:[a-z0-9\-]*[a-z0-9])?)*\.[a-z]{2,}$")
            .expect("E-Mail-Regex ist statisch gueltig")
    })
}

/// Normalisiert eine E-Mail-Adresse: Leerraum entfernen, Kleinschreibung
pub fn email_normalisieren(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Normalisiert und prueft eine E-Mail-Adresse
///
/// Gibt die normalisierte Adresse zurueck, sonst `AuthError::EmailUngueltig`.
pub fn email_pruefen(email: &str) -> AuthResult<String> {
    let normalisiert = email_normalisieren(email);
    if normalisiert.len() > EMAIL_MAX_LAENGE || !email_regex().is_match(&normalisiert) {
        return Err(AuthError::EmailUngueltig);
    }
    Ok(normalisiert)
}

/// Prueft ein Passwort gegen die Richtlinie
///
/// Die Fehlermeldung nennt alle nicht erfuellten Anforderungen.
pub fn passwort_pruefen(passwort: &str, richtlinie: &PasswortRichtlinie) -> AuthResult<()> {
    let mut fehlend = Vec::new();

    if passwort.chars().count() < richtlinie.min_laenge {
        fehlend.push(format!("mindestens {} Zeichen", richtlinie.min_laenge));
    }
    if richtlinie.grossbuchstabe && !passwort.chars().any(char::is_uppercase) {
        fehlend.push("ein Grossbuchstabe".to_string());
    }
    if richtlinie.kleinbuchstabe && !passwort.chars().any(char::is_lowercase) {
        fehlend.push("ein Kleinbuchstabe".to_string());
    }
    if richtlinie.ziffer && !passwort.chars().any(|c| c.is_ascii_digit()) {
        fehlend.push("eine Ziffer".to_string());
    }
    if richtlinie.sonderzeichen && !passwort.chars().any(|c| !c.is_alphanumeric()) {
        fehlend.push("ein Sonderzeichen".to_string());
    }

    if fehlend.is_empty() {
        Ok(())
    } else {
        Err(AuthError::PasswortZuSchwach(format!(
            "benoetigt {}",
            fehlend.join(", ")
        )))
    }
}
