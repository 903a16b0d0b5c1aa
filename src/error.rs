//! Error types shared by the token providers, the dispatcher, and the persistence layer.

// self
use crate::{_prelude::*, provider::GrantType};

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical error surfaced to endpoint wrappers.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Token exchange or refresh failed.
	#[error(transparent)]
	Auth(#[from] AuthError),
	/// The API answered `429 Too Many Requests` and the transport ran out of retries.
	#[error("Rate limit reached; retry after {}.", display_retry_after(.retry_after))]
	RateLimitReached {
		/// `Retry-After` hint from the last response, if supplied.
		retry_after: Option<Duration>,
	},
	/// Playback control call targeted a device that is absent or inactive.
	#[error("Playback device not found: {message}.")]
	DeviceNotFound {
		/// API-supplied message.
		message: String,
	},
	/// Generic 4xx response from the API.
	#[error("API returned HTTP {status}: {message}.")]
	Request {
		/// HTTP status code.
		status: u16,
		/// API-supplied message, empty when the response carried no body.
		message: String,
	},
	/// 5xx response from the API; no structured message is expected.
	#[error("API server failed with HTTP {status}.")]
	Server {
		/// HTTP status code.
		status: u16,
	},
	/// A successful response carried a body that could not be decoded.
	#[error("API response could not be decoded.")]
	Decode {
		/// HTTP status code of the response.
		status: u16,
		/// Structured decoding failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
	},
	/// Network failure while talking to the API.
	#[error(transparent)]
	Transport(#[from] TransportError),
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Token cache could not be read or written.
	#[error(transparent)]
	Cache(#[from] crate::cache::CacheError),
	/// Catalog reference could not be normalized.
	#[error(transparent)]
	Identifier(#[from] crate::catalog::IdentifierError),
	/// Local authorization callback failed.
	#[error(transparent)]
	Callback(#[from] crate::callback::CallbackError),
}

/// Token endpoint failures.
#[derive(Debug, ThisError)]
pub enum AuthError {
	/// Token endpoint answered with a non-success status.
	#[error("Token endpoint rejected the {grant} grant{}: {reason}.", display_status(.status))]
	Rejected {
		/// Grant that was attempted.
		grant: GrantType,
		/// HTTP status code, when available.
		status: Option<u16>,
		/// OAuth error code/description or the HTTP reason phrase.
		reason: String,
	},
	/// Token endpoint answered with JSON that does not match the token response shape.
	#[error("Token endpoint returned a malformed {grant} response.")]
	MalformedResponse {
		/// Grant that was attempted.
		grant: GrantType,
		/// HTTP status code, when available.
		status: Option<u16>,
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
	},
	/// Network failure while calling the token endpoint.
	#[error("Network error occurred while calling the token endpoint.")]
	Network {
		/// Transport-specific failure.
		#[source]
		source: BoxError,
	},
	/// Authorization code exchange returned no refresh token.
	#[error("Token endpoint response is missing refresh_token.")]
	MissingRefreshToken,
	/// Token endpoint response omitted `expires_in`.
	#[error("Token endpoint response is missing expires_in.")]
	MissingExpiresIn,
	/// Token endpoint returned an excessively large `expires_in`.
	#[error("The expires_in value exceeds the supported range.")]
	ExpiresInOutOfRange,
	/// Token endpoint returned a non-positive duration.
	#[error("The expires_in value must be positive.")]
	NonPositiveExpiresIn,
}
impl AuthError {
	/// Wraps a transport failure raised while calling the token endpoint.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Box::new(src) }
	}
}

/// Configuration and validation failures.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying builder failure.
		#[source]
		source: BoxError,
	},
	/// HTTP request construction failed.
	#[error(transparent)]
	HttpRequest(#[from] oauth2::http::Error),
	/// Service descriptor failed validation.
	#[error(transparent)]
	Descriptor(#[from] crate::service::DescriptorError),
	/// An endpoint could not be handed to the OAuth client.
	#[error("Endpoint URL is invalid.")]
	InvalidEndpoint {
		/// Underlying parsing failure.
		#[source]
		source: oauth2::url::ParseError,
	},
	/// A request path could not be joined onto the API base.
	#[error("Request URL `{url}` is invalid.")]
	InvalidRequestUrl {
		/// Offending URL text.
		url: String,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// Only one of a pre-seeded access token and its expiry was supplied.
	#[error("A pre-seeded access token requires its expiry as well, and vice versa.")]
	PartialAccessToken,
	/// A required credential was not provided.
	#[error("Missing credential: {name}.")]
	MissingCredential {
		/// Name of the missing setting.
		name: &'static str,
	},
	/// Redirect URI cannot be parsed.
	#[error("Redirect URI is invalid.")]
	InvalidRedirect {
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// Requested scopes cannot be normalized.
	#[error("Requested scopes are invalid.")]
	InvalidScope(#[from] crate::auth::ScopeValidationError),
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Transport-level failures (network, IO) raised while calling the API.
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling the API.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Request exceeded the configured timeout.
	#[error("Request timed out while calling the API.")]
	Timeout {
		/// Transport-specific timeout error.
		#[source]
		source: BoxError,
	},
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Box::new(src) }
	}
}
impl From<ReqwestError> for TransportError {
	fn from(e: ReqwestError) -> Self {
		if e.is_timeout() { Self::Timeout { source: Box::new(e) } } else { Self::network(e) }
	}
}

fn display_retry_after(retry_after: &Option<Duration>) -> String {
	match retry_after {
		Some(delay) => format!("{}s", delay.whole_seconds()),
		None => "an unspecified delay".into(),
	}
}

fn display_status(status: &Option<u16>) -> String {
	status.map(|code| format!(" with HTTP {code}")).unwrap_or_default()
}
