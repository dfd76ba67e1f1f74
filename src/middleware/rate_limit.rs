use crate::error::AppError;
use axum::{
    body::Body,
    extract::ConnectInfo,
    http::{HeaderValue, Request, header},
    response::{IntoResponse, Response},
};
use governor::{clock::QuantaInstant, middleware::NoOpMiddleware};
use std::{
    net::{IpAddr, Ipv4Addr, SocketAddr},
    sync::Arc,
    time::Duration,
};
use tower_governor::{
    GovernorLayer,
    errors::GovernorError,
    governor::{GovernorConfig, GovernorConfigBuilder},
    key_extractor::KeyExtractor,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct IpKeyExtractor;

impl KeyExtractor for IpKeyExtractor {
    type Key = IpAddr;

    fn extract<T>(&self, req: &Request<T>) -> Result<Self::Key, GovernorError> {
        Ok(client_ip(req))
    }
}

/// Best guess at the client's address.
///
/// 1. `cf-connecting-ip` (Cloudflare)
/// 2. first entry of `x-forwarded-for`
/// 3. the peer address of the TCP connection (needs `into_make_service_with_connect_info`)
/// 4. localhost
fn client_ip<T>(req: &Request<T>) -> IpAddr {
    let headers = req.headers();

    if let Some(ip) = headers
        .get("cf-connecting-ip")
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.trim().parse::<IpAddr>().ok())
    {
        return ip;
    }

    if let Some(ip) = headers
        .get("x-forwarded-for")
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.split(',').next())
        .and_then(|s| s.trim().parse::<IpAddr>().ok())
    {
        return ip;
    }

    if let Some(ConnectInfo(peer)) = req.extensions().get::<ConnectInfo<SocketAddr>>() {
        return peer.ip();
    }

    // Only reachable when there is no connection info at all (e.g. in-process tests).
    IpAddr::V4(Ipv4Addr::LOCALHOST)
}

pub type IpRateConfig = GovernorConfig<IpKeyExtractor, NoOpMiddleware<QuantaInstant>>;
pub type IpRateLayer = GovernorLayer<IpKeyExtractor, NoOpMiddleware<QuantaInstant>, Body>;

fn ip_config(period: Duration, burst: u32) -> Arc<IpRateConfig> {
    Arc::new(
        GovernorConfigBuilder::default()
            .key_extractor(IpKeyExtractor)
            .period(period)
            .burst_size(burst)
            .finish()
            // Only `None` for a zero period or burst, and both are constants below.
            .expect("rate limit period and burst must be non-zero"),
    )
}

/// Login: 5 attempts per 15 minutes per IP. Brute-force protection.
pub fn create_login_config() -> Arc<IpRateConfig> {
    ip_config(Duration::from_secs(180), 5) // 180s * 5 = 15 mins
}

/// Registration: 10 accounts per hour per IP.
pub fn create_signup_config() -> Arc<IpRateConfig> {
    ip_config(Duration::from_secs(360), 10) // 360s * 10 = 1 hour
}

/// New threads and comments: 30 per minute per IP. Enough for a chatty human.
pub fn create_post_config() -> Arc<IpRateConfig> {
    ip_config(Duration::from_secs(2), 30)
}

/// Wraps a config in a layer whose rejections use our JSON error body.
pub fn limit(config: Arc<IpRateConfig>) -> IpRateLayer {
    GovernorLayer::new(config).error_handler(rate_limited)
}

/// Turns a governor rejection into the usual `{"error": ...}` response.
pub fn rate_limited(err: GovernorError) -> Response {
    match err {
        GovernorError::TooManyRequests { wait_time, .. } => {
            let mut response = AppError::RateLimited {
                retry_after_secs: wait_time,
            }
            .into_response();
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(wait_time));
            response
        }
        // `IpKeyExtractor` never fails, so these would be a bug on our side.
        other => AppError::Internal(anyhow::anyhow!("rate limiter failed: {other}")).into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::to_bytes, http::StatusCode};

    fn request() -> axum::http::request::Builder {
        Request::builder().uri("/")
    }

    #[test]
    fn prefers_cloudflare_header() {
        let req = request()
            .header("cf-connecting-ip", "203.0.113.7")
            .header("x-forwarded-for", "198.51.100.1")
            .body(())
            .unwrap();
        assert_eq!(client_ip(&req), "203.0.113.7".parse::<IpAddr>().unwrap());
    }

    #[test]
    fn takes_first_forwarded_address() {
        let req = request()
            .header("x-forwarded-for", "198.51.100.1, 10.0.0.1")
            .body(())
            .unwrap();
        assert_eq!(client_ip(&req), "198.51.100.1".parse::<IpAddr>().unwrap());
    }

    #[test]
    fn forwarded_header_wins_over_peer_address() {
        let mut req = request()
            .header("x-forwarded-for", "198.51.100.1")
            .body(())
            .unwrap();
        req.extensions_mut()
            .insert(ConnectInfo(SocketAddr::from(([10, 0, 0, 1], 4000))));
        assert_eq!(client_ip(&req), "198.51.100.1".parse::<IpAddr>().unwrap());
    }

    #[test]
    fn direct_peers_are_told_apart() {
        let mut first = request().body(()).unwrap();
        first
            .extensions_mut()
            .insert(ConnectInfo(SocketAddr::from(([198, 51, 100, 1], 50000))));
        let mut second = request().body(()).unwrap();
        second
            .extensions_mut()
            .insert(ConnectInfo(SocketAddr::from(([198, 51, 100, 2], 50000))));

        assert_eq!(client_ip(&first), "198.51.100.1".parse::<IpAddr>().unwrap());
        assert_eq!(client_ip(&second), "198.51.100.2".parse::<IpAddr>().unwrap());
    }

    #[test]
    fn falls_back_to_localhost() {
        let req = request()
            .header("x-forwarded-for", "not-an-ip")
            .body(())
            .unwrap();
        assert_eq!(client_ip(&req), IpAddr::V4(Ipv4Addr::LOCALHOST));
    }

    #[test]
    fn configs_build() {
        create_login_config();
        create_signup_config();
        create_post_config();
    }

    #[tokio::test]
    async fn rejection_uses_the_json_error_body() {
        let response = rate_limited(GovernorError::TooManyRequests {
            wait_time: 42,
            headers: None,
        });

        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()[header::RETRY_AFTER], "42");
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["error"], "Too many requests, please try again in 42 seconds");
    }
}
