//! Cached bearer token state and expiry checks.

// self
use crate::{
	_prelude::*,
	auth::{ScopeSet, TokenSecret},
};

/// Default margin subtracted from a token's lifetime before it is treated as expired.
pub const DEFAULT_REFRESH_SKEW: Duration = Duration::seconds(60);

/// Access token snapshot owned by a token provider.
///
/// A missing `expires_at` marks a token that never expires (caller-supplied static
/// tokens). Every other token is considered expired once fewer than `skew` remain, which
/// absorbs clock drift and the latency of the request that will carry it.
#[derive(Clone, PartialEq, Eq)]
pub struct TokenState {
	/// Bearer token sent to the API.
	pub access_token: TokenSecret,
	/// Absolute expiry instant, if the token expires.
	pub expires_at: Option<OffsetDateTime>,
	/// Refresh token returned alongside the access token, if any.
	pub refresh_token: Option<TokenSecret>,
	/// Scopes granted to the token, when the endpoint reported them.
	pub scopes: Option<ScopeSet>,
}
impl TokenState {
	/// Creates a never-expiring state for the provided access token.
	pub fn new(access_token: impl Into<TokenSecret>) -> Self {
		Self { access_token: access_token.into(), expires_at: None, refresh_token: None, scopes: None }
	}

	/// Sets an absolute expiry instant.
	pub fn with_expires_at(mut self, instant: OffsetDateTime) -> Self {
		self.expires_at = Some(instant);

		self
	}

	/// Sets the expiry relative to `issued_at`.
	pub fn with_expires_in(self, issued_at: OffsetDateTime, lifetime: Duration) -> Self {
		self.with_expires_at(issued_at + lifetime)
	}

	/// Attaches a refresh token.
	pub fn with_refresh_token(mut self, token: impl Into<TokenSecret>) -> Self {
		self.refresh_token = Some(token.into());

		self
	}

	/// Attaches the granted scopes.
	pub fn with_scopes(mut self, scopes: ScopeSet) -> Self {
		self.scopes = Some(scopes);

		self
	}

	/// Returns `true` when fewer than `skew` remain before expiry at `now`.
	pub fn is_expired_at(&self, now: OffsetDateTime, skew: Duration) -> bool {
		match self.expires_at {
			Some(expires_at) => expires_at - now < skew,
			None => false,
		}
	}

	/// Checks expiry against the current UTC clock.
	pub fn is_expired(&self, skew: Duration) -> bool {
		self.is_expired_at(OffsetDateTime::now_utc(), skew)
	}

	/// Formats the `Authorization` header value for this token.
	pub fn authorization_header(&self) -> String {
		format!("Bearer {}", self.access_token.expose())
	}
}
impl Debug for TokenState {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenState")
			.field("access_token", &"<redacted>")
			.field("expires_at", &self.expires_at)
			.field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
			.field("scopes", &self.scopes)
			.finish()
	}
}

/// Returns the cached header when `state` is present and still fresh at `now`.
pub(crate) fn fresh_header(
	state: Option<&TokenState>,
	now: OffsetDateTime,
	skew: Duration,
) -> Option<String> {
	state.filter(|state| !state.is_expired_at(now, skew)).map(TokenState::authorization_header)
}
