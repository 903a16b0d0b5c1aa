//! Token endpoint facade over the `oauth2` crate.
//!
//! Every grant authenticates with HTTP Basic and posts an
//! `application/x-www-form-urlencoded` body. Following RFC 6749 section 2.3.1, the client
//! ID and secret are form-encoded before being joined and base64-encoded, so a secret
//! such as `se+cret` is sent as `base64("client:se%2Bcret")`. Credentials made of
//! unreserved characters (Spotify issues hex strings) encode identically to a raw
//! `base64(client_id:client_secret)`. Responses become [`TokenState`] values with
//! an absolute expiry; failures become [`AuthError`] values that keep the HTTP status
//! captured by the instrumented transport.

pub use oauth2;

// std
use std::{borrow::Cow, io};
// crates.io
use oauth2::{
	AuthType, AuthUrl, AuthorizationCode, ClientId, ClientSecret, EndpointNotSet, EndpointSet,
	HttpClientError, PkceCodeVerifier, RedirectUrl, RefreshToken, RequestTokenError,
	TokenResponse, TokenUrl,
	basic::{BasicClient, BasicErrorResponse, BasicRequestTokenError, BasicTokenResponse},
};
use reqwest::StatusCode;
// self
use crate::{
	_prelude::*,
	auth::{ScopeSet, TokenState},
	error::{AuthError, ConfigError},
	http::{InstrumentedHandle, ResponseMetadata, ResponseMetadataSlot},
	provider::GrantType,
	service::ServiceDescriptor,
};

type ConfiguredBasicClient =
	BasicClient<EndpointSet, EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointSet>;

/// Confidential client bound to one service descriptor.
#[derive(Clone)]
pub(crate) struct BasicFacade {
	oauth_client: ConfiguredBasicClient,
	http_client: ReqwestClient,
}
impl BasicFacade {
	pub(crate) fn from_descriptor(
		descriptor: &ServiceDescriptor,
		client_id: &str,
		client_secret: &str,
		http_client: ReqwestClient,
	) -> Result<Self, ConfigError> {
		let auth_url = AuthUrl::new(descriptor.endpoints.authorization.to_string())
			.map_err(|source| ConfigError::InvalidEndpoint { source })?;
		let token_url = TokenUrl::new(descriptor.endpoints.token.to_string())
			.map_err(|source| ConfigError::InvalidEndpoint { source })?;
		let oauth_client = BasicClient::new(ClientId::new(client_id.to_owned()))
			.set_client_secret(ClientSecret::new(client_secret.to_owned()))
			.set_auth_type(AuthType::BasicAuth)
			.set_auth_uri(auth_url)
			.set_token_uri(token_url);

		Ok(Self { oauth_client, http_client })
	}

	/// Runs `grant_type=client_credentials`.
	pub(crate) async fn exchange_client_credentials(&self) -> Result<TokenState> {
		const GRANT: GrantType = GrantType::ClientCredentials;

		let meta = ResponseMetadataSlot::default();
		let instrumented = InstrumentedHandle::new(self.http_client.clone(), meta.clone());
		let response = self
			.oauth_client
			.exchange_client_credentials()
			.request_async(&instrumented)
			.await
			.map_err(|err| map_request_error(GRANT, meta.take(), err))?;

		map_token_response(response)
	}

	/// Runs `grant_type=refresh_token`. The returned state carries a refresh token only
	/// when the endpoint rotated it.
	pub(crate) async fn refresh_token(&self, refresh_token: &str) -> Result<TokenState> {
		const GRANT: GrantType = GrantType::RefreshToken;

		let meta = ResponseMetadataSlot::default();
		let instrumented = InstrumentedHandle::new(self.http_client.clone(), meta.clone());
		let refresh_secret = RefreshToken::new(refresh_token.to_owned());
		let response = self
			.oauth_client
			.exchange_refresh_token(&refresh_secret)
			.request_async(&instrumented)
			.await
			.map_err(|err| map_request_error(GRANT, meta.take(), err))?;

		map_token_response(response)
	}

	/// Runs `grant_type=authorization_code`, attaching the PKCE verifier when present.
	pub(crate) async fn exchange_authorization_code(
		&self,
		code: &str,
		pkce_verifier: Option<&str>,
		redirect_uri: &Url,
	) -> Result<TokenState> {
		const GRANT: GrantType = GrantType::AuthorizationCode;

		let meta = ResponseMetadataSlot::default();
		let instrumented = InstrumentedHandle::new(self.http_client.clone(), meta.clone());
		let redirect_url = RedirectUrl::new(redirect_uri.to_string())
			.map_err(|source| ConfigError::InvalidEndpoint { source })?;
		let mut request = self
			.oauth_client
			.exchange_code(AuthorizationCode::new(code.to_owned()))
			.set_redirect_uri(Cow::Owned(redirect_url));

		if let Some(verifier) = pkce_verifier {
			request = request.set_pkce_verifier(PkceCodeVerifier::new(verifier.to_owned()));
		}

		let response = request
			.request_async(&instrumented)
			.await
			.map_err(|err| map_request_error(GRANT, meta.take(), err))?;

		map_token_response(response)
	}
}
impl Debug for BasicFacade {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("BasicFacade")
			.field("client_id", self.oauth_client.client_id())
			.field("token_uri", self.oauth_client.token_uri())
			.finish()
	}
}

fn map_token_response(response: BasicTokenResponse) -> Result<TokenState> {
	let expires_in = response.expires_in().ok_or(AuthError::MissingExpiresIn)?.as_secs();
	let expires_in = i64::try_from(expires_in).map_err(|_| AuthError::ExpiresInOutOfRange)?;

	if expires_in <= 0 {
		return Err(AuthError::NonPositiveExpiresIn.into());
	}

	let expires_at = OffsetDateTime::now_utc()
		.checked_add(Duration::seconds(expires_in))
		.ok_or(AuthError::ExpiresInOutOfRange)?;
	let mut state =
		TokenState::new(response.access_token().secret().as_str()).with_expires_at(expires_at);

	if let Some(refresh) = response.refresh_token() {
		state = state.with_refresh_token(refresh.secret().as_str());
	}
	if let Some(scopes) = response.scopes() {
		let granted = ScopeSet::new(
			scopes.iter().map(|scope| scope.as_str()).filter(|scope| !scope.is_empty()),
		)
		.map_err(ConfigError::from)?;

		state = state.with_scopes(granted);
	}

	Ok(state)
}

fn map_request_error(
	grant: GrantType,
	meta: Option<ResponseMetadata>,
	err: BasicRequestTokenError<HttpClientError<ReqwestError>>,
) -> Error {
	let status = meta.and_then(|value| value.status);

	match err {
		RequestTokenError::ServerResponse(response) =>
			AuthError::Rejected { grant, status, reason: server_reason(&response) }.into(),
		RequestTokenError::Parse(source, _body) => match status {
			Some(code) if !(200..300).contains(&code) =>
				AuthError::Rejected { grant, status, reason: canonical_reason(code) }.into(),
			_ => AuthError::MalformedResponse { grant, status, source }.into(),
		},
		RequestTokenError::Request(error) => map_transport_error(error),
		RequestTokenError::Other(message) =>
			AuthError::Rejected { grant, status, reason: message }.into(),
	}
}

fn map_transport_error(err: HttpClientError<ReqwestError>) -> Error {
	match err {
		HttpClientError::Reqwest(inner) => AuthError::network(*inner).into(),
		HttpClientError::Http(inner) => ConfigError::from(inner).into(),
		HttpClientError::Io(inner) => AuthError::network(inner).into(),
		HttpClientError::Other(message) => AuthError::network(io::Error::other(message)).into(),
		_ => AuthError::network(io::Error::other("Unknown HTTP client failure.")).into(),
	}
}

fn server_reason(response: &BasicErrorResponse) -> String {
	let code = response.error().as_ref();

	match response.error_description() {
		Some(description) => format!("{code}: {description}"),
		None => code.to_owned(),
	}
}

fn canonical_reason(status: u16) -> String {
	StatusCode::from_u16(status)
		.ok()
		.and_then(|code| code.canonical_reason())
		.unwrap_or("Unexpected status")
		.to_owned()
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn builds_basic_auth_client() {
		let descriptor = ServiceDescriptor::spotify().expect("Production descriptor should build.");
		let facade = BasicFacade::from_descriptor(
			&descriptor,
			"client-id",
			"secret",
			ReqwestClient::default(),
		)
		.expect("Facade should accept the production descriptor.");
		let rendered = format!("{facade:?}");

		assert!(rendered.contains("client-id"));
		assert!(!rendered.contains("secret"));
	}

	#[test]
	fn canonical_reason_falls_back_for_unknown_codes() {
		assert_eq!(canonical_reason(401), "Unauthorized");
		assert_eq!(canonical_reason(599), "Unexpected status");
	}

	#[test]
	fn parse_failures_split_on_status() {
		let source = serde_path_to_error::deserialize::<_, BasicTokenResponse>(
			&mut serde_json::Deserializer::from_str("{}"),
		)
		.expect_err("An empty object is not a token response.");
		let err = map_request_error(
			GrantType::ClientCredentials,
			Some(ResponseMetadata { status: Some(200), retry_after: None }),
			RequestTokenError::Parse(source, Vec::new()),
		);

		assert!(matches!(err, Error::Auth(AuthError::MalformedResponse { status: Some(200), .. })));

		let source = serde_path_to_error::deserialize::<_, BasicTokenResponse>(
			&mut serde_json::Deserializer::from_str("{}"),
		)
		.expect_err("An empty object is not a token response.");
		let err = map_request_error(
			GrantType::RefreshToken,
			Some(ResponseMetadata { status: Some(503), retry_after: None }),
			RequestTokenError::Parse(source, Vec::new()),
		);

		assert!(matches!(
			err,
			Error::Auth(AuthError::Rejected { status: Some(503), ref reason, .. })
				if reason == "Service Unavailable"
		));
	}
}
