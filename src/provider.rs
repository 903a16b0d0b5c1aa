//! Token providers: the single capability the dispatcher needs from the auth subsystem.
//!
//! [`TokenProvider::authorization_header`] returns a `Bearer` header value that is valid
//! for at least the provider's refresh skew. The three variants differ in how they get
//! there:
//!
//! - [`StaticToken`] formats a caller-supplied token and never touches the network;
//! - [`ClientCredentials`] re-runs the `client_credentials` grant whenever its token
//!   expires;
//! - [`AuthorizationCode`] spends a refresh token, keeps the rotated one, and persists the
//!   grant to an optional [`TokenCache`](crate::cache::TokenCache).
//!
//! Refreshing variants are single-flight: concurrent callers that find the token stale
//! queue behind one async mutex, and whoever acquires it second re-checks the state
//! before calling the token endpoint. State is written only after a successful
//! exchange, so a failed or cancelled refresh leaves the previous token in place.

pub mod authorization_code;
pub mod client_credentials;
pub mod session;
pub mod static_token;

pub use authorization_code::AuthorizationCode;
pub use client_credentials::ClientCredentials;
pub use session::*;
pub use static_token::StaticToken;

// self
use crate::_prelude::*;

/// Boxed future returned by [`TokenProvider::authorization_header`].
pub type HeaderFuture<'a> = Pin<Box<dyn Future<Output = Result<String>> + 'a + Send>>;

/// Capability that yields a currently valid `Authorization` header value.
pub trait TokenProvider
where
	Self: Send + Sync,
{
	/// Returns `Bearer <token>`, refreshing first when the cached token is stale.
	fn authorization_header(&self) -> HeaderFuture<'_>;
}
impl<T> TokenProvider for Arc<T>
where
	T: ?Sized + TokenProvider,
{
	fn authorization_header(&self) -> HeaderFuture<'_> {
		T::authorization_header(self)
	}
}

/// OAuth 2.0 grant types used against the token endpoint.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantType {
	/// Authorization code exchange after user consent.
	AuthorizationCode,
	/// Refresh token grant for long-lived user sessions.
	RefreshToken,
	/// Client credentials grant for app-only tokens.
	ClientCredentials,
}
impl GrantType {
	/// Returns the RFC 6749 identifier for the grant type.
	pub const fn as_str(self) -> &'static str {
		match self {
			GrantType::AuthorizationCode => "authorization_code",
			GrantType::RefreshToken => "refresh_token",
			GrantType::ClientCredentials => "client_credentials",
		}
	}
}
impl Display for GrantType {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
