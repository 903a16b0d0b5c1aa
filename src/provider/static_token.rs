//! Caller-supplied bearer token that never refreshes.

// self
use crate::{
	_prelude::*,
	auth::{TokenSecret, TokenState},
	provider::{HeaderFuture, TokenProvider},
};

/// Wraps a fixed access token; the header is formatted without any I/O.
#[derive(Clone, Debug)]
pub struct StaticToken {
	state: TokenState,
}
impl StaticToken {
	/// Wraps `access_token` as a never-expiring token.
	pub fn new(access_token: impl Into<TokenSecret>) -> Self {
		Self { state: TokenState::new(access_token) }
	}

	/// Returns the wrapped token state.
	pub fn token_state(&self) -> &TokenState {
		&self.state
	}
}
impl TokenProvider for StaticToken {
	fn authorization_header(&self) -> HeaderFuture<'_> {
		let header = self.state.authorization_header();

		Box::pin(async move { Ok(header) })
	}
}
