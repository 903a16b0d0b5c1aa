//! Thread-safe in-memory [`TokenCache`] for local development and tests.

// self
use crate::{
	_prelude::*,
	cache::{CacheError, CachedGrant, TokenCache},
};

/// Keeps the grant in-process; clones share the same slot.
#[derive(Clone, Debug, Default)]
pub struct MemoryTokenCache(Arc<RwLock<Option<CachedGrant>>>);
impl MemoryTokenCache {
	/// Creates a cache pre-populated with `grant`.
	pub fn with_grant(grant: CachedGrant) -> Self {
		Self(Arc::new(RwLock::new(Some(grant))))
	}

	/// Returns the currently stored grant.
	pub fn snapshot(&self) -> Option<CachedGrant> {
		self.0.read().clone()
	}
}
impl TokenCache for MemoryTokenCache {
	fn save(&self, grant: &CachedGrant) -> Result<(), CacheError> {
		*self.0.write() = Some(grant.clone());

		Ok(())
	}

	fn load(&self) -> Result<Option<CachedGrant>, CacheError> {
		Ok(self.snapshot())
	}
}
