//! Identifikationstypen fuer Zugang
//!
//! Newtypes ueber UUID v4, damit Benutzer- und Session-IDs zur
//! Compilezeit nicht verwechselt werden koennen. Serialisiert werden
//! sie als einfacher UUID-String.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            /// Neue zufaellige ID
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            pub fn inner(&self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                std::fmt::Display::fmt(&self.0, f)
            }
        }

        impl std::str::FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s).map(Self)
            }
        }

        impl From<Uuid> for $name {
            fn from(id: Uuid) -> Self {
                Self(id)
            }
        }
    };
}

uuid_id!(
    /// Besitzer von Sessions; lebt laenger als jede seiner Sessions
    UserId
);

uuid_id!(
    /// Identitaet einer Session; bleibt ueber Rotationen hinweg gleich
    SessionId
);
