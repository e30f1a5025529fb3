/// Rate Limiting System
use crate::{
    config::RateLimitSettings,
    error::{AppError, AppResult},
};
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter as GovernorLimiter,
};
use std::{num::NonZeroU32, sync::Arc, time::Duration};

type DirectLimiter = GovernorLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Which quota a request is charged against
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrafficClass {
    /// Auth endpoints and anything without credentials
    Unauthenticated,
    /// Requests carrying a bearer token
    Authenticated,
}

/// Rate limiter manager
#[derive(Clone)]
pub struct RateLimiter {
    enabled: bool,
    authenticated: Arc<DirectLimiter>,
    unauthenticated: Arc<DirectLimiter>,
}

impl RateLimiter {
    pub fn new(settings: &RateLimitSettings) -> Self {
        let burst = NonZeroU32::new(settings.burst_size).unwrap_or(NonZeroU32::MIN);

        let api_quota = Quota::per_second(NonZeroU32::new(settings.api_rps).unwrap_or(NonZeroU32::MIN))
            .allow_burst(burst);

        // Credential endpoints get a tighter burst to slow down guessing
        let auth_burst = NonZeroU32::new(settings.burst_size / 5).unwrap_or(NonZeroU32::MIN);
        let auth_quota = Quota::per_second(NonZeroU32::new(settings.auth_rps).unwrap_or(NonZeroU32::MIN))
            .allow_burst(auth_burst);

        Self {
            enabled: settings.enabled,
            authenticated: Arc::new(GovernorLimiter::direct(api_quota)),
            unauthenticated: Arc::new(GovernorLimiter::direct(auth_quota)),
        }
    }

    pub fn check(&self, class: TrafficClass) -> AppResult<()> {
        if !self.enabled {
            return Ok(());
        }

        let limiter = match class {
            TrafficClass::Authenticated => &self.authenticated,
            TrafficClass::Unauthenticated => &self.unauthenticated,
        };

        limiter.check().map_err(|_| AppError::RateLimitExceeded {
            retry_after: Duration::from_secs(1),
        })
    }
}

/// Classify a request by path and credentials
pub fn classify(request: &Request) -> TrafficClass {
    let is_auth_endpoint = request.uri().path().starts_with("/api/auth/");
    let has_auth_header = request.headers().contains_key("authorization");

    if is_auth_endpoint || !has_auth_header {
        TrafficClass::Unauthenticated
    } else {
        TrafficClass::Authenticated
    }
}

/// Rate limiting middleware
pub async fn rate_limit_middleware(
    State(ctx): State<crate::context::AppContext>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let class = classify(&request);

    if let Err(e) = ctx.rate_limiter.check(class) {
        tracing::warn!(path = %request.uri().path(), class = ?class, "Rate limit exceeded");
        return Err(e);
    }

    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    fn settings(enabled: bool, burst_size: u32) -> RateLimitSettings {
        RateLimitSettings {
            enabled,
            auth_rps: 1,
            api_rps: 1,
            burst_size,
        }
    }

    #[test]
    fn test_burst_limit() {
        let limiter = RateLimiter::new(&settings(true, 5));

        for _ in 0..5 {
            assert!(limiter.check(TrafficClass::Authenticated).is_ok());
        }
        assert!(matches!(
            limiter.check(TrafficClass::Authenticated),
            Err(AppError::RateLimitExceeded { .. })
        ));

        // Separate bucket with burst_size / 5
        assert!(limiter.check(TrafficClass::Unauthenticated).is_ok());
        assert!(limiter.check(TrafficClass::Unauthenticated).is_err());
    }

    #[test]
    fn test_disabled_never_limits() {
        let limiter = RateLimiter::new(&settings(false, 1));
        for _ in 0..100 {
            assert!(limiter.check(TrafficClass::Unauthenticated).is_ok());
        }
    }

    #[test]
    fn test_classify() {
        let login = Request::builder()
            .uri("/api/auth/login")
            .header("authorization", "Bearer x")
            .body(Body::empty())
            .unwrap();
        assert_eq!(classify(&login), TrafficClass::Unauthenticated);

        let events = Request::builder()
            .uri("/api/events")
            .header("authorization", "Bearer x")
            .body(Body::empty())
            .unwrap();
        assert_eq!(classify(&events), TrafficClass::Authenticated);

        let anonymous = Request::builder().uri("/api/events").body(Body::empty()).unwrap();
        assert_eq!(classify(&anonymous), TrafficClass::Unauthenticated);
    }
}
