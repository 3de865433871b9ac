//! Axum-Middleware fuer Rate Limiting und Bearer-Authentifizierung

use std::net::{IpAddr, SocketAddr};

use axum::{
    async_trait,
    body::Body,
    extract::{ConnectInfo, FromRequestParts, State},
    http::{request::Parts, HeaderMap, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};
use zugang_auth::{AuthError, TokenFehler, Zulassung};
use zugang_core::ClientKontext;

use crate::{error::ApiFehler, state::AppState};

/// Ermittelt die Client-IP fuer Rate Limiting und Session-Kontext
///
/// Ist die Gegenstelle ein vertrauenswuerdiger Proxy, gilt der erste
/// `X-Forwarded-For`-Eintrag. Sonst zaehlt die Gegenstelle selbst; ohne
/// Verbindungsinformation ist die IP "unknown".
pub fn client_ip(
    headers: &HeaderMap,
    gegenstelle: Option<SocketAddr>,
    vertrauenswuerdige_proxies: &[IpAddr],
) -> String {
    let Some(peer) = gegenstelle.map(|a| a.ip()) else {
        return "unknown".to_string();
    };
    if !vertrauenswuerdige_proxies.contains(&peer) {
        return peer.to_string();
    }

    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.split(',').next())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| peer.to_string())
}

/// Extrahiert Bearer-Token aus Authorization-Header
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

fn gegenstelle(extensions: &axum::http::Extensions) -> Option<SocketAddr> {
    extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr)
}

/// Client-Kontext (User-Agent und IP) als Extractor
#[derive(Debug, Clone)]
pub struct Client(pub ClientKontext);

#[async_trait]
impl FromRequestParts<AppState> for Client {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let user_agent = parts
            .headers
            .get("user-agent")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        let ip = client_ip(
            &parts.headers,
            gegenstelle(&parts.extensions),
            &state.vertrauenswuerdige_proxies,
        );
        Ok(Self(ClientKontext::neu(user_agent, ip)))
    }
}

/// Rate Limiting pro Client-IP
pub async fn rate_limit_guard(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let ip = client_ip(
        req.headers(),
        gegenstelle(req.extensions()),
        &state.vertrauenswuerdige_proxies,
    );

    match state.rate_limiter.zulassen(&ip).await {
        Zulassung::Erlaubt => next.run(req).await,
        Zulassung::Abgelehnt { retry_after_secs } => {
            ApiFehler(AuthError::RateLimitUeberschritten { retry_after_secs }).into_response()
        }
    }
}

/// Prueft den Bearer-Token und legt die Claims als Extension ab
pub async fn auth_guard(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let Some(token) = bearer_token(req.headers()) else {
        return ApiFehler(AuthError::AccessToken(TokenFehler::Fehlformatiert)).into_response();
    };

    match state.auth.access_validieren(token) {
        Ok(claims) => {
            req.extensions_mut().insert(claims);
            next.run(req).await
        }
        Err(e) => {
            tracing::debug!(fehler = %e, "Access-Token abgelehnt");
            ApiFehler(e).into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn xff(wert: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static(wert));
        headers
    }

    #[test]
    fn client_ip_hinter_vertrauenswuerdigem_proxy() {
        let proxy: SocketAddr = "10.9.9.9:5000".parse().unwrap();
        let proxies = [proxy.ip()];
        assert_eq!(
            client_ip(&xff("192.168.1.1, 10.0.0.1"), Some(proxy), &proxies),
            "192.168.1.1"
        );
        // Proxy ohne Header: die Gegenstelle zaehlt
        assert_eq!(client_ip(&HeaderMap::new(), Some(proxy), &proxies), "10.9.9.9");
    }

    #[test]
    fn x_forwarded_for_von_fremder_gegenstelle_wird_ignoriert() {
        let peer: SocketAddr = "1.2.3.4:5555".parse().unwrap();
        let proxies: [IpAddr; 1] = ["10.9.9.9".parse().unwrap()];
        assert_eq!(client_ip(&xff("10.0.0.7"), Some(peer), &proxies), "1.2.3.4");
        assert_eq!(client_ip(&xff("10.0.0.7"), Some(peer), &[]), "1.2.3.4");
    }

    #[test]
    fn client_ip_ohne_quelle() {
        assert_eq!(client_ip(&HeaderMap::new(), None, &[]), "unknown");
        assert_eq!(client_ip(&xff("10.0.0.7"), None, &[]), "unknown");
    }

    #[test]
    fn bearer_token_extrahieren() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "authorization",
            HeaderValue::from_static("Bearer mein_token_123"),
        );
        assert_eq!(bearer_token(&headers), Some("mein_token_123"));
    }

    #[test]
    fn bearer_token_fehlt_oder_falsches_schema() {
        assert_eq!(bearer_token(&HeaderMap::new()), None);

        let mut headers = HeaderMap::new();
        headers.insert("authorization", HeaderValue::from_static("Basic abc"));
        assert_eq!(bearer_token(&headers), None);

        headers.insert("authorization", HeaderValue::from_static("Bearer "));
        assert_eq!(bearer_token(&headers), None);
    }
}
