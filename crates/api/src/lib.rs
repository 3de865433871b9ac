//! zugang-api – HTTP-Schnittstelle
//!
//! Routen:
//! - `POST /api/v1/auth/signup`, `/login`, `/refresh`, `/logout`
//! - `GET /api/v1/user/me` (Bearer-Token erforderlich)
//! - `GET /health`
//!
//! Alle Routen unter `/api/v1` laufen durch den Rate Limiter, geschuetzte
//! Routen zusaetzlich durch die Bearer-Pruefung.

pub mod error;
pub mod guards;
pub mod handlers;
pub mod state;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

pub use error::ApiFehler;
pub use state::AppState;

/// Erstellt den vollstaendigen Router
pub fn router(state: AppState) -> Router {
    let geschuetzt = Router::new()
        .route("/user/me", get(handlers::me))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            guards::auth_guard,
        ));

    let v1 = Router::new()
        .route("/auth/signup", post(handlers::signup))
        .route("/auth/login", post(handlers::login))
        .route("/auth/refresh", post(handlers::refresh))
        .route("/auth/logout", post(handlers::logout))
        .merge(geschuetzt)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            guards::rate_limit_guard,
        ));

    Router::new()
        .route("/health", get(handlers::health))
        .nest("/api/v1", v1)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
