//! Service descriptor shared by the token providers and the dispatcher.
//!
//! A [`ServiceDescriptor`] names the accounts endpoints used for token exchanges, the
//! API base every relative request path is joined onto, and the URI scheme used for
//! catalog references. [`ServiceDescriptor::spotify`] returns the production values;
//! tests point the builder at a loopback mock server instead.

/// Builder API for assembling service descriptors.
pub mod builder;

pub use builder::*;

// self
use crate::{_prelude::*, catalog::IdentifierNormalizer};

/// Production authorize endpoint.
pub const SPOTIFY_AUTHORIZE_URL: &str = "https://accounts.spotify.com/authorize";
/// Production token endpoint.
pub const SPOTIFY_TOKEN_URL: &str = "https://accounts.spotify.com/api/token";
/// Production API base.
pub const SPOTIFY_API_BASE: &str = "https://api.spotify.com/v1/";

/// Endpoint set declared by a service descriptor.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceEndpoints {
	/// Authorize endpoint the user's browser is sent to.
	pub authorization: Url,
	/// Token endpoint used for exchanges and refreshes.
	pub token: Url,
	/// API base; always ends in `/`.
	pub api_base: Url,
}

/// Immutable service descriptor consumed by providers and the dispatcher.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceDescriptor {
	/// Endpoint definitions.
	pub endpoints: ServiceEndpoints,
	/// URI scheme used for catalog references.
	pub uri_scheme: String,
}
impl ServiceDescriptor {
	/// Creates an empty builder.
	pub fn builder() -> ServiceDescriptorBuilder {
		ServiceDescriptorBuilder::new()
	}

	/// Returns the production Spotify descriptor.
	pub fn spotify() -> Result<Self, DescriptorError> {
		Self::builder()
			.authorization_endpoint_str(SPOTIFY_AUTHORIZE_URL)?
			.token_endpoint_str(SPOTIFY_TOKEN_URL)?
			.api_base_str(SPOTIFY_API_BASE)?
			.build()
	}

	/// Returns an identifier normalizer bound to this descriptor's URI scheme.
	pub fn normalizer(&self) -> IdentifierNormalizer {
		IdentifierNormalizer::new(self.uri_scheme.clone())
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn spotify_descriptor_is_valid() {
		let descriptor = ServiceDescriptor::spotify().expect("Production descriptor should build.");

		assert_eq!(descriptor.endpoints.api_base.as_str(), SPOTIFY_API_BASE);
		assert_eq!(descriptor.endpoints.token.as_str(), SPOTIFY_TOKEN_URL);
		assert_eq!(descriptor.uri_scheme, "spotify");
		assert_eq!(descriptor.normalizer().scheme(), "spotify");
	}
}
