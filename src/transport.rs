//! Bounded retries beneath the dispatcher.
//!
//! [`RetryingTransport`] re-sends a request when the API answers `429 Too Many Requests`
//! or when the connection cannot be established, up to [`RetryPolicy::max_retries`]
//! extra attempts. Rate-limited attempts sleep for the `Retry-After` hint capped at
//! [`RetryPolicy::max_backoff`]; everything else uses exponential backoff. Once retries
//! run out the last response is handed back unchanged so the dispatcher can classify it.
//! Business errors (other 4xx, 5xx) are never retried.

// crates.io
use reqwest::{Request, Response, StatusCode};
// self
use crate::{
	_prelude::*,
	error::TransportError,
	http,
	obs::{self, RetryReason},
};

/// Retry ceiling and backoff settings.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
	/// Extra attempts after the first one.
	pub max_retries: u32,
	/// Upper bound for any single sleep, including `Retry-After` hints.
	pub max_backoff: Duration,
	/// First exponential backoff step; doubles on every attempt.
	pub backoff_base: Duration,
}
impl RetryPolicy {
	/// Default retry ceiling.
	pub const DEFAULT_MAX_RETRIES: u32 = 10;

	/// Policy that sends every request exactly once.
	pub const fn none() -> Self {
		Self { max_retries: 0, max_backoff: Duration::ZERO, backoff_base: Duration::ZERO }
	}

	/// Overrides the retry ceiling.
	pub fn with_max_retries(mut self, max_retries: u32) -> Self {
		self.max_retries = max_retries;

		self
	}

	/// Overrides the sleep cap.
	pub fn with_max_backoff(mut self, max_backoff: Duration) -> Self {
		self.max_backoff = max_backoff;

		self
	}

	/// Overrides the first backoff step.
	pub fn with_backoff_base(mut self, backoff_base: Duration) -> Self {
		self.backoff_base = backoff_base;

		self
	}

	/// Exponential delay for the zero-based `attempt`, capped at `max_backoff`.
	pub fn backoff(&self, attempt: u32) -> Duration {
		let delay = 2_i32
			.checked_pow(attempt)
			.and_then(|factor| self.backoff_base.checked_mul(factor))
			.map_or(self.max_backoff, |delay| delay.min(self.max_backoff));

		delay.max(Duration::ZERO)
	}

	/// Delay before retrying a rate-limited attempt.
	pub fn rate_limit_delay(&self, retry_after: Option<Duration>, attempt: u32) -> Duration {
		match retry_after {
			Some(hint) => hint.min(self.max_backoff).max(Duration::ZERO),
			None => self.backoff(attempt),
		}
	}
}
impl Default for RetryPolicy {
	fn default() -> Self {
		Self {
			max_retries: Self::DEFAULT_MAX_RETRIES,
			max_backoff: Duration::seconds(60),
			backoff_base: Duration::milliseconds(250),
		}
	}
}

/// HTTP client wrapper that applies a [`RetryPolicy`].
#[derive(Clone, Debug)]
pub struct RetryingTransport {
	client: ReqwestClient,
	policy: RetryPolicy,
}
impl RetryingTransport {
	/// Wraps `client` with `policy`.
	pub fn new(client: ReqwestClient, policy: RetryPolicy) -> Self {
		Self { client, policy }
	}

	/// Returns the wrapped client, used to build requests.
	pub fn client(&self) -> &ReqwestClient {
		&self.client
	}

	/// Returns the active policy.
	pub fn policy(&self) -> &RetryPolicy {
		&self.policy
	}

	/// Sends `request`, retrying rate-limited and unreachable attempts.
	///
	/// Requests whose body cannot be cloned are sent once.
	pub async fn send(&self, request: Request) -> Result<Response, TransportError> {
		let mut attempt = 0;

		loop {
			let Some(next) = request.try_clone() else {
				return self.client.execute(request).await.map_err(TransportError::from);
			};
			let retries_left = attempt < self.policy.max_retries;

			match self.client.execute(next).await {
				Ok(response) if response.status() == StatusCode::TOO_MANY_REQUESTS && retries_left => {
					let delay = self
						.policy
						.rate_limit_delay(http::parse_retry_after(response.headers()), attempt);

					obs::record_retry(RetryReason::RateLimited);
					pause(RetryReason::RateLimited, attempt, delay).await;
				},
				Ok(response) => return Ok(response),
				Err(e) if e.is_connect() && retries_left => {
					obs::record_retry(RetryReason::Connect);
					pause(RetryReason::Connect, attempt, self.policy.backoff(attempt)).await;
				},
				Err(e) => return Err(e.into()),
			}

			attempt += 1;
		}
	}
}

async fn pause(reason: RetryReason, attempt: u32, delay: Duration) {
	#[cfg(feature = "tracing")]
	tracing::debug!(reason = reason.as_str(), attempt, delay = %delay, "Retrying API request.");
	#[cfg(not(feature = "tracing"))]
	let _ = (reason, attempt);

	let delay = std::time::Duration::try_from(delay).unwrap_or_default();

	if !delay.is_zero() {
		tokio::time::sleep(delay).await;
	}
}
