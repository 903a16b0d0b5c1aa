//! User tokens from an authorization-code grant, kept alive with the refresh token.
//!
//! The provider owns the grant exclusively: the refresh token is only replaced by this
//! provider's own refresh, and only when the token endpoint rotates it. When a
//! [`TokenCache`] is attached, the `{client_id, client_secret, refresh_token}` triple is
//! written after every successful refresh. A failed write is logged and ignored because
//! the refreshed token is still usable for the current call.

// self
use crate::{
	_prelude::*,
	auth::{DEFAULT_REFRESH_SKEW, TokenSecret, TokenState, state},
	cache::{CacheError, CachedGrant, TokenCache},
	config::Credentials,
	error::{AuthError, ConfigError},
	http,
	oauth::BasicFacade,
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	provider::{AuthorizationSession, HeaderFuture, TokenProvider},
	service::ServiceDescriptor,
};

#[derive(Clone)]
struct GrantState {
	refresh_token: TokenSecret,
	token: Option<TokenState>,
}

/// Authorization-code provider with reactive, single-flight refresh.
pub struct AuthorizationCode {
	descriptor: ServiceDescriptor,
	client_id: String,
	client_secret: TokenSecret,
	http_client: ReqwestClient,
	refresh_skew: Duration,
	cache: Option<Arc<dyn TokenCache>>,
	grant: RwLock<GrantState>,
	refresh_guard: AsyncMutex<()>,
}
impl AuthorizationCode {
	/// Creates a provider from a refresh token, optionally seeded with a cached access token.
	///
	/// `access_token` and `expires_at` must be supplied together; passing only one of them
	/// fails with [`ConfigError::PartialAccessToken`].
	pub fn new(
		descriptor: ServiceDescriptor,
		credentials: &Credentials,
		refresh_token: impl Into<TokenSecret>,
		access_token: Option<TokenSecret>,
		expires_at: Option<OffsetDateTime>,
	) -> Result<Self> {
		let refresh_token = refresh_token.into();
		let token = match (access_token, expires_at) {
			(Some(access), Some(instant)) => Some(
				TokenState::new(access)
					.with_expires_at(instant)
					.with_refresh_token(refresh_token.clone()),
			),
			(None, None) => None,
			_ => return Err(ConfigError::PartialAccessToken.into()),
		};

		Ok(Self {
			descriptor,
			client_id: credentials.client_id.clone(),
			client_secret: credentials.client_secret.clone(),
			http_client: http::token_client().map_err(ConfigError::from)?,
			refresh_skew: DEFAULT_REFRESH_SKEW,
			cache: None,
			grant: RwLock::new(GrantState { refresh_token, token }),
			refresh_guard: AsyncMutex::new(()),
		})
	}

	/// Rebuilds a provider from a persisted grant; the first use triggers a refresh.
	///
	/// Returns `Ok(None)` when the cache is empty. The loaded provider keeps writing to
	/// the same cache.
	pub fn load(descriptor: ServiceDescriptor, cache: Arc<dyn TokenCache>) -> Result<Option<Self>> {
		let Some(grant) = cache.load()? else {
			return Ok(None);
		};
		let credentials = Credentials::new(grant.client_id, grant.client_secret);
		let provider = Self::new(descriptor, &credentials, grant.refresh_token, None, None)?;

		Ok(Some(provider.with_cache(cache)))
	}

	/// Exchanges an authorization code obtained through `session` for a seeded provider.
	///
	/// When `cache` is given the new grant is persisted right away, with the same
	/// best-effort policy used after refreshes.
	pub async fn exchange_code(
		descriptor: ServiceDescriptor,
		credentials: &Credentials,
		session: &AuthorizationSession,
		code: &str,
		cache: Option<Arc<dyn TokenCache>>,
	) -> Result<Self> {
		const KIND: FlowKind = FlowKind::AuthorizationCode;

		let span = FlowSpan::new(KIND, "exchange_code");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span
			.instrument(async move {
				let facade = BasicFacade::from_descriptor(
					&descriptor,
					&credentials.client_id,
					credentials.client_secret.expose(),
					http::token_client().map_err(ConfigError::from)?,
				)?;
				let token = facade
					.exchange_authorization_code(
						code,
						Some(session.pkce_verifier()),
						&session.redirect_uri,
					)
					.await?;
				let refresh_token =
					token.refresh_token.clone().ok_or(AuthError::MissingRefreshToken)?;
				let expires_at = token.expires_at;
				let mut provider = Self::new(
					descriptor,
					credentials,
					refresh_token,
					Some(token.access_token.clone()),
					expires_at,
				)?;

				provider.grant.get_mut().token = Some(token);

				if let Some(cache) = cache {
					provider = provider.with_cache(cache);
					provider.persist_best_effort().await;
				}

				Ok(provider)
			})
			.await;

		match &result {
			Ok(_) => obs::record_flow_outcome(KIND, FlowOutcome::Success),
			Err(_) => obs::record_flow_outcome(KIND, FlowOutcome::Failure),
		}

		result
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

	/// Attaches a cache that receives the grant after every successful refresh.
	pub fn with_cache(mut self, cache: Arc<dyn TokenCache>) -> Self {
		self.cache = Some(cache);

		self
	}

	/// Returns the application client ID.
	pub fn client_id(&self) -> &str {
		&self.client_id
	}

	/// Returns the refresh token currently held by the provider.
	pub fn refresh_token(&self) -> TokenSecret {
		self.grant.read().refresh_token.clone()
	}

	/// Returns a snapshot of the cached access token, if any.
	pub fn token_state(&self) -> Option<TokenState> {
		self.grant.read().token.clone()
	}

	/// Returns the grant triple persisted by [`TokenCache`] implementations.
	pub fn cached_grant(&self) -> CachedGrant {
		CachedGrant::new(self.client_id.clone(), self.client_secret.clone(), self.refresh_token())
	}

	/// Writes the grant to the attached cache on the blocking thread pool.
	///
	/// Does nothing when no cache is attached. Backends may touch the filesystem, so the
	/// write never runs on an executor thread.
	pub async fn persist(&self) -> Result<(), CacheError> {
		let Some(cache) = self.cache.clone() else {
			return Ok(());
		};
		let grant = self.cached_grant();

		tokio::task::spawn_blocking(move || cache.save(&grant))
			.await
			.map_err(|e| CacheError::Backend { message: e.to_string() })?
	}

	/// Returns a fresh token, refreshing first when needed.
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

		self.refresh().await
	}

	fn fresh_state(&self) -> Option<TokenState> {
		let now = OffsetDateTime::now_utc();

		self.grant
			.read()
			.token
			.as_ref()
			.filter(|state| !state.is_expired_at(now, self.refresh_skew))
			.cloned()
	}

	async fn refresh(&self) -> Result<TokenState> {
		const KIND: FlowKind = FlowKind::Refresh;

		let span = FlowSpan::new(KIND, "refresh");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span
			.instrument(async move {
				let current_refresh = self.refresh_token();
				let facade = BasicFacade::from_descriptor(
					&self.descriptor,
					&self.client_id,
					self.client_secret.expose(),
					self.http_client.clone(),
				)?;
				let mut token = facade.refresh_token(current_refresh.expose()).await?;
				let refresh_token = token.refresh_token.get_or_insert(current_refresh).clone();

				*self.grant.write() = GrantState { refresh_token, token: Some(token.clone()) };

				self.persist_best_effort().await;

				Ok(token)
			})
			.await;

		match &result {
			Ok(_) => obs::record_flow_outcome(KIND, FlowOutcome::Success),
			Err(_) => obs::record_flow_outcome(KIND, FlowOutcome::Failure),
		}

		result
	}

	async fn persist_best_effort(&self) {
		if let Err(e) = self.persist().await {
			#[cfg(feature = "tracing")]
			tracing::warn!(error = %e, "Failed to persist the authorization grant.");
			#[cfg(not(feature = "tracing"))]
			let _ = e;
		}
	}
}
impl TokenProvider for AuthorizationCode {
	fn authorization_header(&self) -> HeaderFuture<'_> {
		Box::pin(async move {
			let cached = state::fresh_header(
				self.grant.read().token.as_ref(),
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
impl Debug for AuthorizationCode {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		let grant = self.grant.read();

		f.debug_struct("AuthorizationCode")
			.field("client_id", &self.client_id)
			.field("token_endpoint", &self.descriptor.endpoints.token.as_str())
			.field("refresh_skew", &self.refresh_skew)
			.field("cache_attached", &self.cache.is_some())
			.field("refresh_token", &grant.refresh_token)
			.field("token", &grant.token)
			.finish()
	}
}
