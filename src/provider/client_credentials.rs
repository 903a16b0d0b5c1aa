//! App-only tokens from the `client_credentials` grant.
//!
//! The grant issues no refresh token, so an expired token is replaced by running the full
//! exchange again.

// self
use crate::{
	_prelude::*,
	auth::{DEFAULT_REFRESH_SKEW, TokenSecret, TokenState, state},
	config::Credentials,
	error::ConfigError,
	http,
	oauth::BasicFacade,
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	provider::{HeaderFuture, TokenProvider},
	service::ServiceDescriptor,
};

/// Client credentials provider with a cached, single-flight token.
pub struct ClientCredentials {
	descriptor: ServiceDescriptor,
	client_id: String,
	client_secret: TokenSecret,
	http_client: ReqwestClient,
	refresh_skew: Duration,
	state: RwLock<Option<TokenState>>,
	refresh_guard: AsyncMutex<()>,
}
impl ClientCredentials {
	/// Creates a provider with an empty token cache.
	pub fn new(descriptor: ServiceDescriptor, credentials: &Credentials) -> Result<Self> {
		Ok(Self {
			descriptor,
			client_id: credentials.client_id.clone(),
			client_secret: credentials.client_secret.clone(),
			http_client: http::token_client().map_err(ConfigError::from)?,
			refresh_skew: DEFAULT_REFRESH_SKEW,
			state: RwLock::new(None),
			refresh_guard: AsyncMutex::new(()),
		})
	}

	/// Overrides the refresh skew (defaults to [`DEFAULT_REFRESH_SKEW`]).
	pub fn with_refresh_skew(mut self, skew: Duration) -> Self {
		self.refresh_skew = skew;

		self
	}

	/// Replaces the HTTP client used for token endpoint calls.
	pub fn with_http_client(mut self, client: ReqwestClient) -> Self {
		self.http_client = client;

		self
	}

	/// Returns a snapshot of the cached token, if one has been issued.
	pub fn token_state(&self) -> Option<TokenState> {
		self.state.read().clone()
	}

	/// Returns a fresh token, exchanging credentials first when needed.
	pub async fn access_token(&self) -> Result<TokenState> {
		let cached = self.fresh_state();

		if let Some(state) = cached {
			return Ok(state);
		}

		let _singleflight = self.refresh_guard.lock().await;
		let cached = self.fresh_state();

		if let Some(state) = cached {
			return Ok(state);
		}

		let state = self.exchange().await?;

		*self.state.write() = Some(state.clone());

		Ok(state)
	}

	fn fresh_state(&self) -> Option<TokenState> {
		let now = OffsetDateTime::now_utc();

		self.state.read().as_ref().filter(|state| !state.is_expired_at(now, self.refresh_skew)).cloned()
	}

	async fn exchange(&self) -> Result<TokenState> {
		const KIND: FlowKind = FlowKind::ClientCredentials;

		let span = FlowSpan::new(KIND, "client_credentials");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span
			.instrument(async move {
				let facade = BasicFacade::from_descriptor(
					&self.descriptor,
					&self.client_id,
					self.client_secret.expose(),
					self.http_client.clone(),
				)?;

				facade.exchange_client_credentials().await
			})
			.await;

		match &result {
			Ok(_) => obs::record_flow_outcome(KIND, FlowOutcome::Success),
			Err(_) => obs::record_flow_outcome(KIND, FlowOutcome::Failure),
		}

		result
	}
}
impl TokenProvider for ClientCredentials {
	fn authorization_header(&self) -> HeaderFuture<'_> {
		Box::pin(async move {
			let cached = state::fresh_header(
				self.state.read().as_ref(),
				OffsetDateTime::now_utc(),
				self.refresh_skew,
			);

			match cached {
				Some(header) => Ok(header),
				None => self.access_token().await.map(|state| state.authorization_header()),
			}
		})
	}
}
impl Debug for ClientCredentials {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ClientCredentials")
			.field("client_id", &self.client_id)
			.field("token_endpoint", &self.descriptor.endpoints.token.as_str())
			.field("refresh_skew", &self.refresh_skew)
			.field("state", &*self.state.read())
			.finish()
	}
}

