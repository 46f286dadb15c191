use actix_web::{
    body::{EitherBody, MessageBody},
    dev::{ServiceRequest, ServiceResponse},
    middleware::Next,
    web, ResponseError,
};
use dashmap::DashMap;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::{config::AuthConfig, error::WardrobeError};

/// Sliding-window limiter keyed by client IP.
#[derive(Clone)]
pub struct RateLimiter {
    requests: Arc<DashMap<IpAddr, Vec<Instant>>>,
    max_requests: usize,
    window: Duration,
}

impl RateLimiter {
    pub fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            requests: Arc::new(DashMap::new()),
            max_requests,
            window,
        }
    }

    pub fn from_config(config: &AuthConfig) -> Self {
        Self::new(
            config.rate_limit_attempts,
            Duration::from_secs(config.rate_limit_window_secs),
        )
    }

    pub fn check_rate_limit(&self, ip: IpAddr) -> bool {
        let now = Instant::now();

        let mut entry = self.requests.entry(ip).or_default();

        entry.retain(|&timestamp| now.duration_since(timestamp) < self.window);

        if entry.len() >= self.max_requests {
            return false;
        }

        entry.push(now);
        true
    }

    pub fn cleanup_old_entries(&self) {
        let now = Instant::now();

        self.requests.retain(|_, timestamps| {
            timestamps.retain(|&timestamp| now.duration_since(timestamp) < self.window);
            !timestamps.is_empty()
        });
    }

    pub fn tracked_clients(&self) -> usize {
        self.requests.len()
    }
}

pub async fn rate_limit_middleware(
    req: ServiceRequest,
    next: Next<impl MessageBody>,
) -> Result<ServiceResponse<EitherBody<impl MessageBody>>, actix_web::Error> {
    // connections without a peer address share one bucket
    let ip = req
        .peer_addr()
        .map(|addr| addr.ip())
        .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED));

    let allowed = match req.app_data::<web::Data<RateLimiter>>() {
        Some(limiter) => limiter.check_rate_limit(ip),
        None => {
            log::error!("Rate limiter not registered");
            false
        }
    };

    if !allowed {
        log::warn!("Rate limit exceeded for IP: {}", ip);
        let response = WardrobeError::RateLimitExceeded.error_response();
        return Ok(req.into_response(response).map_into_right_body());
    }

    Ok(next.call(req).await?.map_into_left_body())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blocks_after_limit() {
        let limiter = RateLimiter::new(2, Duration::from_secs(60));
        let ip: IpAddr = "10.0.0.1".parse().unwrap();

        assert!(limiter.check_rate_limit(ip));
        assert!(limiter.check_rate_limit(ip));
        assert!(!limiter.check_rate_limit(ip));

        let other: IpAddr = "10.0.0.2".parse().unwrap();
        assert!(limiter.check_rate_limit(other));
    }

    #[test]
    fn window_expiry_frees_slots() {
        let limiter = RateLimiter::new(1, Duration::from_millis(20));
        let ip: IpAddr = "10.0.0.3".parse().unwrap();

        assert!(limiter.check_rate_limit(ip));
        assert!(!limiter.check_rate_limit(ip));
        std::thread::sleep(Duration::from_millis(30));
        assert!(limiter.check_rate_limit(ip));

        std::thread::sleep(Duration::from_millis(30));
        limiter.cleanup_old_entries();
        assert_eq!(limiter.tracked_clients(), 0);
    }
}
