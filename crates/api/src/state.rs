//! Gemeinsamer Axum-State

use std::{net::IpAddr, sync::Arc};

use zugang_auth::{AuthService, RateLimiter};

/// State aller Handler und Guards
#[derive(Clone)]
pub struct AppState {
    pub auth: Arc<AuthService>,
    pub rate_limiter: Arc<RateLimiter>,
    /// Nur von diesen Gegenstellen wird `X-Forwarded-For` uebernommen
    pub vertrauenswuerdige_proxies: Arc<[IpAddr]>,
}

impl AppState {
    /// State ohne vertrauenswuerdige Proxies
    pub fn neu(auth: Arc<AuthService>, rate_limiter: Arc<RateLimiter>) -> Self {
        Self {
            auth,
            rate_limiter,
            vertrauenswuerdige_proxies: Arc::from(Vec::new()),
        }
    }

    pub fn mit_proxies(mut self, proxies: impl IntoIterator<Item = IpAddr>) -> Self {
        self.vertrauenswuerdige_proxies = proxies.into_iter().collect();
        self
    }
}
