//! Sequential, jittered rate limiting around a single fetch operation.

use crate::error::{ErrorKind, Result};
use async_stream::stream;
use exn::ResultExt;
use futures::Stream;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

/// Bounds for the [`RateLimiter`]. Every `(min, max)` pair is inclusive and
/// sampled uniformly each time it is used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimits {
    /// Requests allowed between pauses, re-rolled every cycle.
    pub limit: (u32, u32),
    /// Pause length in seconds; a sub-second offset is added on top.
    pub duration: (u64, u64),
    /// Wait in seconds before retrying a rate-limited (429) request.
    pub backoff: (u64, u64),
    /// Retries of a rate-limited request before giving up.
    pub max_retries: u32,
}
impl Default for RateLimits {
    fn default() -> Self {
        Self {
            limit: (5, 10),
            duration: (10, 30),
            backoff: (30, 90),
            max_retries: 3,
        }
    }
}
impl RateLimits {
    /// The bounds are unusable if any range is inverted, or if no request
    /// would ever be allowed between pauses.
    pub fn is_valid(&self) -> bool {
        self.limit.0 >= 1
            && self.limit.0 <= self.limit.1
            && self.duration.0 <= self.duration.1
            && self.backoff.0 <= self.backoff.1
    }
}

/// Wraps a fetch operation and paces calls to it.
///
/// The limiter is strictly sequential: it is driven through `&mut self`, so
/// only one request can ever be in flight. After a randomly-chosen number of
/// requests it pauses for a jittered window. A request failing with
/// [`ErrorKind::RateLimited`] is retried, after a longer jittered backoff, up
/// to [`RateLimits::max_retries`] times; any other error is returned
/// immediately.
///
/// Cancellation is cooperative: the token is checked before every request
/// and interrupts any pause or backoff in progress.
#[derive(Debug)]
pub struct RateLimiter {
    limits: RateLimits,
    token: CancellationToken,
    /// Lifetime requests, including retries.
    count: u64,
    /// Requests since the last pause.
    rate: u32,
    /// Requests allowed before the next pause.
    threshold: u32,
}
impl RateLimiter {
    pub fn new(limits: RateLimits) -> Self {
        Self {
            limits,
            token: CancellationToken::new(),
            count: 0,
            rate: 0,
            threshold: sample(limits.limit),
        }
    }

    /// Requests allowed between pauses, as inclusive `(min, max)` bounds.
    pub fn with_limits(mut self, min: u32, max: u32) -> Self {
        self.limits.limit = (min, max);
        self.threshold = sample(self.limits.limit);
        self
    }

    /// Pause length in seconds, as inclusive `(min, max)` bounds.
    pub fn with_duration(mut self, min: u64, max: u64) -> Self {
        self.limits.duration = (min, max);
        self
    }

    /// 429 backoff in seconds, as inclusive `(min, max)` bounds.
    pub fn with_backoff(mut self, min: u64, max: u64) -> Self {
        self.limits.backoff = (min, max);
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.limits.max_retries = max_retries;
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.token = token;
        self
    }

    pub fn limits(&self) -> &RateLimits {
        &self.limits
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn rate(&self) -> u32 {
        self.rate
    }

    /// Run `op` once (plus any rate-limit retries), pausing first if this
    /// cycle's request allowance has been used up.
    #[instrument(level = "debug", skip_all, fields(count = self.count))]
    pub async fn fetch<T, F, Fut>(&mut self, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        if self.token.is_cancelled() {
            exn::bail!(ErrorKind::Cancelled);
        }
        if self.rate >= self.threshold {
            let pause = self.pause_duration();
            debug!(rate = self.rate, ?pause, "request allowance used up, pausing");
            self.sleep(pause).await?;
            self.rate = 0;
            self.threshold = sample(self.limits.limit);
        }

        let mut retries = 0;
        loop {
            self.count += 1;
            self.rate += 1;
            match op().await {
                Ok(value) => return Ok(value),
                Err(error) if matches!(&*error, ErrorKind::RateLimited) => {
                    if retries >= self.limits.max_retries {
                        warn!(retries, "still rate limited, giving up");
                        return Err(error).or_raise(|| ErrorKind::RetriesExhausted(retries));
                    }
                    retries += 1;
                    let backoff = Duration::from_secs(sample(self.limits.backoff));
                    warn!(retry = retries, ?backoff, "rate limited, backing off");
                    self.sleep(backoff).await?;
                },
                Err(error) => {
                    warn!(error = %error, "fetch failed");
                    return Err(error);
                },
            }
        }
    }

    /// Repeatedly [`fetch`](Self::fetch) with `op`, indefinitely.
    ///
    /// The stream ends after yielding the first error, or without yielding
    /// anything further once the token is cancelled. Nothing is fetched
    /// until the stream is polled.
    pub fn stream<'a, T, F, Fut>(&'a mut self, mut op: F) -> impl Stream<Item = Result<T>> + 'a
    where
        T: 'a,
        F: FnMut() -> Fut + 'a,
        Fut: Future<Output = Result<T>> + 'a,
    {
        stream!({
            loop {
                match self.fetch(&mut op).await {
                    Err(error) if matches!(&*error, ErrorKind::Cancelled) => break,
                    Err(error) => {
                        yield Err(error);
                        break;
                    },
                    Ok(value) => yield Ok(value),
                }
            }
        })
    }

    fn pause_duration(&self) -> Duration {
        let (min, max) = self.limits.duration;
        if max == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs(sample((min, max))) + Duration::from_millis(rand::random_range(0..1000))
    }

    async fn sleep(&self, duration: Duration) -> Result<()> {
        if duration.is_zero() {
            return Ok(());
        }
        tokio::select! {
            () = self.token.cancelled() => exn::bail!(ErrorKind::Cancelled),
            () = tokio::time::sleep(duration) => Ok(()),
        }
    }
}

fn sample<N>(bounds: (N, N)) -> N
where
    N: rand::distr::uniform::SampleUniform + PartialOrd + Copy,
{
    let (min, max) = bounds;
    if min >= max { min } else { rand::random_range(min..=max) }
}
