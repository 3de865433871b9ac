//! Passwort-Hashing mit Argon2id
//!
//! Stellt sichere Passwort-Hashfunktionen mit Argon2id bereit.
//! Die Parameter sind konfigurierbar; der PHC-String enthaelt Algorithmus,
//! Parameter und Salt, sodass die Verifikation immer mit den Parametern
//! des gespeicherten Hashes rechnet.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};

use crate::error::{AuthError, AuthResult};
use crate::konfig::HashKonfig;

/// Passwort-Hasher mit fest eingestellten Argon2id-Parametern
pub struct PasswortHasher {
    params: Params,
    /// Hash eines Zufallspassworts fuer Anmeldungen mit unbekannter E-Mail
    dummy_hash: String,
}

impl std::fmt::Debug for PasswortHasher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PasswortHasher")
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

impl PasswortHasher {
    /// Erstellt einen Hasher; ungueltige Parameter sind ein Konfigurationsfehler
    pub fn neu(konfig: &HashKonfig) -> AuthResult<Self> {
        let params = Params::new(
            konfig.speicher_kib,
            konfig.kosten,
            konfig.parallelismus,
            None, // output_len: Standard (32 Bytes)
        )
        .map_err(|e| AuthError::Konfiguration(format!("Argon2-Parameter ungueltig: {e}")))?;

        let mut hasher = Self {
            params,
            dummy_hash: String::new(),
        };
        let dummy = SaltString::generate(&mut OsRng);
        hasher.dummy_hash = hasher.hashen(dummy.as_str())?;
        Ok(hasher)
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }

    /// Hasht ein Passwort mit Argon2id und einem zufaelligen Salt
    ///
    /// Gibt den PHC-String zurueck (inkl. Algorithmus, Parameter und Salt).
    pub fn hashen(&self, passwort: &str) -> AuthResult<String> {
        let salt = SaltString::generate(&mut OsRng);

        self.argon2()
            .hash_password(passwort.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| AuthError::Kryptografie(format!("Passwort-Hashing: {e}")))
    }

    /// Verifiziert ein Passwort gegen einen gespeicherten PHC-Hash
    ///
    /// Gibt `true` zurueck wenn das Passwort korrekt ist.
    pub fn verifizieren(&self, passwort: &str, hash: &str) -> AuthResult<bool> {
        let parsed_hash = PasswordHash::new(hash)
            .map_err(|e| AuthError::Kryptografie(format!("Ungueltiges Hash-Format: {e}")))?;

        match self.argon2().verify_password(passwort.as_bytes(), &parsed_hash) {
            Ok(()) => Ok(true),
            Err(argon2::password_hash::Error::Password) => Ok(false),
            Err(e) => Err(AuthError::Kryptografie(e.to_string())),
        }
    }

    /// Rechnet eine Verifikation gegen den Dummy-Hash, Ergebnis wird verworfen.
    ///
    /// Haelt die Antwortzeit fuer unbekannte E-Mails auf dem Niveau eines
    /// falschen Passworts.
    pub fn dummy_verifizieren(&self, passwort: &str) {
        let _ = self.verifizieren(passwort, &self.dummy_hash);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn guenstig() -> HashKonfig {
        HashKonfig {
            kosten: 1,
            speicher_kib: 8,
            parallelismus: 1,
        }
    }

    #[test]
    fn passwort_hashen_und_verifizieren() {
        let hasher = PasswortHasher::neu(&guenstig()).unwrap();
        let passwort = "Sicheres_Passwort_123!";
        let hash = hasher.hashen(passwort).expect("Hashing fehlgeschlagen");

        assert!(
            hash.starts_with("$argon2id$"),
            "Hash muss mit $argon2id$ beginnen"
        );
        assert!(hash.contains("m=8,t=1,p=1"), "Parameter muessen im Hash stehen");

        let korrekt = hasher.verifizieren(passwort, &hash).expect("Verifikation fehlgeschlagen");
        assert!(korrekt, "Passwort muss korrekt verifiziert werden");
    }

    #[test]
    fn falsches_passwort_wird_abgelehnt() {
        let hasher = PasswortHasher::neu(&guenstig()).unwrap();
        let hash = hasher.hashen("richtiges_passwort").unwrap();

        let korrekt = hasher
            .verifizieren("falsches_passwort", &hash)
            .expect("Verifikation fehlgeschlagen");
        assert!(!korrekt, "Falsches Passwort muss abgelehnt werden");
    }

    #[test]
    fn gleiche_passwoerter_unterschiedliche_hashes() {
        let hasher = PasswortHasher::neu(&guenstig()).unwrap();
        let hash1 = hasher.hashen("gleiches_passwort").unwrap();
        let hash2 = hasher.hashen("gleiches_passwort").unwrap();

        assert_ne!(
            hash1, hash2,
            "Gleiche Passwoerter muessen verschiedene Hashes erzeugen (Salt)"
        );
    }

    #[test]
    fn hash_mit_anderen_kosten_bleibt_gueltig() {
        let alt = PasswortHasher::neu(&guenstig()).unwrap();
        let hash = alt.hashen("Passw0rd!").unwrap();

        let neu = PasswortHasher::neu(&HashKonfig {
            kosten: 2,
            speicher_kib: 16,
            parallelismus: 1,
        })
        .unwrap();
        assert!(neu.verifizieren("Passw0rd!", &hash).unwrap());
    }

    #[test]
    fn ungueltige_hash_format_gibt_fehler() {
        let hasher = PasswortHasher::neu(&guenstig()).unwrap();
        let ergebnis = hasher.verifizieren("passwort", "kein_gueltiger_hash");
        assert!(matches!(ergebnis, Err(AuthError::Kryptografie(_))));
    }

    #[test]
    fn ungueltige_parameter_sind_konfigurationsfehler() {
        let ergebnis = PasswortHasher::neu(&HashKonfig {
            kosten: 0,
            speicher_kib: 8,
            parallelismus: 1,
        });
        assert!(matches!(ergebnis, Err(AuthError::Konfiguration(_))));
    }
}
