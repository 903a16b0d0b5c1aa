//! Application credentials loaded from the environment or any key lookup.

// std
use std::env;
// self
use crate::{_prelude::*, auth::TokenSecret, error::ConfigError};

/// Environment variable holding the application client ID.
pub const CLIENT_ID_VAR: &str = "SPOTIFY_CLIENT_ID";
/// Environment variable holding the application client secret.
pub const CLIENT_SECRET_VAR: &str = "SPOTIFY_CLIENT_SECRET";
/// Environment variable holding the registered redirect URI.
pub const REDIRECT_URI_VAR: &str = "SPOTIFY_REDIRECT_URI";

/// Registered application credentials.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
	/// Application client ID.
	pub client_id: String,
	/// Application client secret.
	pub client_secret: TokenSecret,
	/// Redirect URI registered for the authorization-code flow, if configured.
	pub redirect_uri: Option<Url>,
}
impl Credentials {
	/// Creates credentials without a redirect URI.
	pub fn new(client_id: impl Into<String>, client_secret: impl Into<TokenSecret>) -> Self {
		Self { client_id: client_id.into(), client_secret: client_secret.into(), redirect_uri: None }
	}

	/// Sets the redirect URI.
	pub fn with_redirect_uri(mut self, redirect_uri: Url) -> Self {
		self.redirect_uri = Some(redirect_uri);

		self
	}

	/// Reads [`CLIENT_ID_VAR`], [`CLIENT_SECRET_VAR`] and the optional
	/// [`REDIRECT_URI_VAR`] from the process environment.
	pub fn from_env() -> Result<Self, ConfigError> {
		Self::from_lookup(|key| env::var(key).ok())
	}

	/// Builds credentials from any key lookup; empty values count as missing.
	pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
	where
		F: Fn(&str) -> Option<String>,
	{
		let read = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
		let client_id =
			read(CLIENT_ID_VAR).ok_or(ConfigError::MissingCredential { name: CLIENT_ID_VAR })?;
		let client_secret = read(CLIENT_SECRET_VAR)
			.ok_or(ConfigError::MissingCredential { name: CLIENT_SECRET_VAR })?;
		let mut credentials = Self::new(client_id, client_secret);

		if let Some(raw) = read(REDIRECT_URI_VAR) {
			let redirect_uri =
				Url::parse(raw.trim()).map_err(|source| ConfigError::InvalidRedirect { source })?;

			credentials = credentials.with_redirect_uri(redirect_uri);
		}

		Ok(credentials)
	}
}
impl Debug for Credentials {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Credentials")
			.field("client_id", &self.client_id)
			.field("client_secret", &self.client_secret)
			.field("redirect_uri", &self.redirect_uri)
			.finish()
	}
}
