//! Persistence contract and built-in caches for authorization-code grants.
//!
//! Only the `{client_id, client_secret, refresh_token}` triple is persisted; access tokens
//! are cheap to re-derive and never leave the provider.

pub mod file;
pub mod memory;

pub use file::FileTokenCache;
pub use memory::MemoryTokenCache;

// self
use crate::{_prelude::*, auth::TokenSecret};

/// Persisted authorization-code grant.
///
/// Decoding requires exactly these three fields.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CachedGrant {
	/// Application client ID.
	pub client_id: String,
	/// Application client secret.
	pub client_secret: TokenSecret,
	/// Latest refresh token.
	pub refresh_token: TokenSecret,
}
impl CachedGrant {
	/// Creates a grant record.
	pub fn new(
		client_id: impl Into<String>,
		client_secret: impl Into<TokenSecret>,
		refresh_token: impl Into<TokenSecret>,
	) -> Self {
		Self {
			client_id: client_id.into(),
			client_secret: client_secret.into(),
			refresh_token: refresh_token.into(),
		}
	}
}
impl Debug for CachedGrant {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("CachedGrant")
			.field("client_id", &self.client_id)
			.field("client_secret", &self.client_secret)
			.field("refresh_token", &self.refresh_token)
			.finish()
	}
}

/// Storage backend for [`CachedGrant`] records.
///
/// Implementations are synchronous and may block. Providers call [`TokenCache::save`]
/// through `tokio::task::spawn_blocking`, so a slow disk never stalls the runtime.
pub trait TokenCache
where
	Self: Send + Sync,
{
	/// Persists or replaces the grant.
	fn save(&self, grant: &CachedGrant) -> Result<(), CacheError>;

	/// Loads the grant, returning `None` when nothing has been stored yet.
	fn load(&self) -> Result<Option<CachedGrant>, CacheError>;
}

/// Error type produced by [`TokenCache`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum CacheError {
	/// The stored payload could not be encoded or decoded.
	#[error("Serialization error: {message}.")]
	Serialization {
		/// Human-readable error payload.
		message: String,
	},
	/// Backend-level failure for the storage medium.
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
}
