//! Throttled JSON transport for generation backends
//!
//! Every outbound call waits on a per-minute governor quota shared by all
//! sessions. Calls are made exactly once; a 429 surfaces as
//! `GenerationError::RateLimited` and the session decides what to show.

use governor::{
    clock::DefaultClock, middleware::NoOpMiddleware, state::InMemoryState, state::NotKeyed, Quota,
    RateLimiter,
};
use nonzero_ext::nonzero;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::{Client, Response, StatusCode};
use serde::Serialize;
use std::num::NonZeroU32;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, warn};

use crate::providers::traits::GenerationError;

type DirectLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock, NoOpMiddleware>;

/// Fallback wait when a 429 carries no usable `Retry-After`
const DEFAULT_RETRY_AFTER_SECS: u64 = 60;

pub struct RateLimitedClient {
    http: Client,
    limiter: DirectLimiter,
    per_minute: NonZeroU32,
    sent: AtomicU64,
}

impl RateLimitedClient {
    /// `timeout` bounds the whole request. Image generation routinely takes
    /// tens of seconds.
    pub fn new(rate_limit_per_minute: u32, timeout: Duration) -> Result<Self, GenerationError> {
        let per_minute = NonZeroU32::new(rate_limit_per_minute).unwrap_or(nonzero!(1u32));

        let http = Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(10))
            .user_agent(concat!("mockup-forge/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(RateLimitedClient {
            http,
            limiter: RateLimiter::direct(Quota::per_minute(per_minute)),
            per_minute,
            sent: AtomicU64::new(0),
        })
    }

    pub fn rate_limit_per_minute(&self) -> u32 {
        self.per_minute.get()
    }

    /// Requests sent since startup
    pub fn requests_sent(&self) -> u64 {
        self.sent.load(Ordering::Relaxed)
    }

    /// POST `body` as JSON with extra `headers`, after waiting for quota
    pub async fn post_json<T>(
        &self,
        url: &str,
        headers: &[(&str, &str)],
        body: &T,
    ) -> Result<Response, GenerationError>
    where
        T: Serialize + ?Sized,
    {
        self.limiter.until_ready().await;
        let n = self.sent.fetch_add(1, Ordering::Relaxed) + 1;
        debug!(request_no = n, "Quota acquired, sending request");

        let request = headers
            .iter()
            .fold(self.http.post(url), |req, (k, v)| req.header(*k, *v))
            .json(body);

        let response = request.send().await?;

        if response.status() == StatusCode::TOO_MANY_REQUESTS {
            let retry_after_secs = retry_after(response.headers());
            warn!(retry_after_secs, "Generation backend rejected request with 429");
            return Err(GenerationError::RateLimited { retry_after_secs });
        }

        Ok(response)
    }
}

fn retry_after(headers: &HeaderMap) -> u64 {
    headers
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(DEFAULT_RETRY_AFTER_SECS)
}
