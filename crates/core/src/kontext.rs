//! Client-Kontext einer Anfrage
//!
//! User-Agent und IP-Adresse werden nur informativ an der Session
//! gespeichert, sie sind nie Grundlage einer Autorisierung.

use serde::{Deserialize, Serialize};

/// Herkunft einer Anfrage
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientKontext {
    pub user_agent: String,
    pub ip_adresse: String,
}

impl ClientKontext {
    pub fn neu(user_agent: impl Into<String>, ip_adresse: impl Into<String>) -> Self {
        Self {
            user_agent: user_agent.into(),
            ip_adresse: ip_adresse.into(),
        }
    }
}
