//! Abbildung von Auth-Fehlern auf HTTP-Antworten
//!
//! Eingabefehler werden mit ihrem Grund gemeldet, Anmelde- und Tokenfehler
//! nur generisch. Interne Fehler werden hier mit allen Details geloggt;
//! der Aufrufer sieht nur "Interner Serverfehler".

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Json, Response},
};
use serde_json::json;
use thiserror::Error;
use zugang_auth::AuthError;

/// Fehler an der HTTP-Grenze
#[derive(Debug, Error)]
#[error(transparent)]
pub struct ApiFehler(#[from] pub AuthError);

impl ApiFehler {
    pub fn http_status(&self) -> StatusCode {
        match &self.0 {
            AuthError::EmailUngueltig
            | AuthError::PasswortZuSchwach(_)
            | AuthError::Validierung(_)
            | AuthError::BenutzerExistiert => StatusCode::BAD_REQUEST,
            AuthError::UngueltigeAnmeldedaten
            | AuthError::UngueltigerRefreshToken
            | AuthError::AccessToken(_) => StatusCode::UNAUTHORIZED,
            AuthError::RateLimitUeberschritten { .. } => StatusCode::TOO_MANY_REQUESTS,
            AuthError::SpeicherNichtVerfuegbar(_)
            | AuthError::Kryptografie(_)
            | AuthError::Konfiguration(_)
            | AuthError::Intern(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Nachricht fuer den Aufrufer; verraet keine internen Details
    pub fn oeffentliche_nachricht(&self) -> String {
        match &self.0 {
            AuthError::AccessToken(_) => "Ungueltiger oder abgelaufener Token".into(),
            AuthError::RateLimitUeberschritten { .. } => "Rate-Limit ueberschritten".into(),
            e if e.ist_intern() => "Interner Serverfehler".into(),
            e => e.to_string(),
        }
    }
}

impl IntoResponse for ApiFehler {
    fn into_response(self) -> Response {
        let status = self.http_status();
        if status.is_server_error() {
            tracing::error!(fehler = %self.0.detail(), "Anfrage fehlgeschlagen");
        }

        let mut fehler = json!({
            "code": status.as_u16(),
            "message": self.oeffentliche_nachricht(),
        });

        let retry_after = match self.0 {
            AuthError::RateLimitUeberschritten { retry_after_secs } => {
                fehler["retry_after_secs"] = json!(retry_after_secs);
                Some(retry_after_secs)
            }
            _ => None,
        };

        let mut antwort = (status, Json(json!({ "error": fehler }))).into_response();
        if let Some(sekunden) = retry_after {
            antwort
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(sekunden));
        }
        antwort
    }
}
