//! REST-Handler fuer die Auth-Endpunkte

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    Extension,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use zugang_auth::{AccessClaims, AuthError};
use zugang_db::models::BenutzerRecord;

use crate::{error::ApiFehler, guards::Client, state::AppState};

#[derive(Debug, Deserialize)]
pub struct ZugangsdatenBody {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct RefreshBody {
    pub refresh_token: String,
}

#[derive(Debug, Serialize)]
pub struct BenutzerAntwort {
    pub user: BenutzerRecord,
}

#[derive(Debug, Serialize)]
pub struct AnmeldeAntwort {
    pub user: BenutzerRecord,
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct TokenAntwort {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
}

/// Body-Fehler werden als Eingabefehler gemeldet
fn body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiFehler> {
    payload
        .map(|Json(inhalt)| inhalt)
        .map_err(|e| ApiFehler(AuthError::Validierung(e.body_text())))
}

/// POST /api/v1/auth/signup
pub async fn signup(
    State(state): State<AppState>,
    Client(kontext): Client,
    payload: Result<Json<ZugangsdatenBody>, JsonRejection>,
) -> Result<Response, ApiFehler> {
    let daten = body(payload)?;
    let user = state
        .auth
        .registrieren(&daten.email, &daten.password, &kontext)
        .await?;
    Ok((StatusCode::CREATED, Json(BenutzerAntwort { user })).into_response())
}

/// POST /api/v1/auth/login
pub async fn login(
    State(state): State<AppState>,
    Client(kontext): Client,
    payload: Result<Json<ZugangsdatenBody>, JsonRejection>,
) -> Result<Json<AnmeldeAntwort>, ApiFehler> {
    // Auch ein kaputter Body ergibt nur den generischen Anmeldefehler
    let daten = body(payload).map_err(|_| ApiFehler(AuthError::UngueltigeAnmeldedaten))?;
    let anmeldung = state
        .auth
        .anmelden(&daten.email, &daten.password, &kontext)
        .await?;
    Ok(Json(AnmeldeAntwort {
        user: anmeldung.benutzer,
        access_token: anmeldung.access_token,
        refresh_token: anmeldung.refresh_token,
        expires_at: anmeldung.access_laeuft_ab_am,
    }))
}

/// POST /api/v1/auth/refresh
pub async fn refresh(
    State(state): State<AppState>,
    payload: Result<Json<RefreshBody>, JsonRejection>,
) -> Result<Json<TokenAntwort>, ApiFehler> {
    let daten = body(payload).map_err(|_| ApiFehler(AuthError::UngueltigerRefreshToken))?;
    let paar = state.auth.erneuern(&daten.refresh_token).await?;
    Ok(Json(TokenAntwort {
        access_token: paar.access_token,
        refresh_token: paar.refresh_token,
        expires_at: paar.access_laeuft_ab_am,
    }))
}

/// POST /api/v1/auth/logout
pub async fn logout(
    State(state): State<AppState>,
    payload: Result<Json<RefreshBody>, JsonRejection>,
) -> Result<Json<serde_json::Value>, ApiFehler> {
    let daten = body(payload)?;
    state.auth.abmelden(&daten.refresh_token).await?;
    Ok(Json(json!({})))
}

/// GET /api/v1/user/me
pub async fn me(Extension(claims): Extension<AccessClaims>) -> impl IntoResponse {
    Json(json!({ "user_id": claims.sub }))
}

/// GET /health
pub async fn health() -> impl IntoResponse {
    (StatusCode::OK, Json(json!({ "status": "ok" })))
}
