//! JSON file-backed [`TokenCache`].

// std
use std::{
	fs::{self, File},
	io::{ErrorKind, Write},
	path::{Path, PathBuf},
};
// self
use crate::cache::{CacheError, CachedGrant, TokenCache};

/// Persists the grant to a JSON file, replacing it atomically on every save.
#[derive(Clone, Debug)]
pub struct FileTokenCache {
	path: PathBuf,
}
impl FileTokenCache {
	/// Creates a cache at the provided path; nothing is touched until the first save or load.
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self { path: path.into() }
	}

	/// Returns the backing file path.
	pub fn path(&self) -> &Path {
		&self.path
	}

	fn ensure_parent_exists(&self) -> Result<(), CacheError> {
		if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
			fs::create_dir_all(parent).map_err(|e| CacheError::Backend {
				message: format!("Failed to create cache directory {}: {e}", parent.display()),
			})?;
		}

		Ok(())
	}
}
impl TokenCache for FileTokenCache {
	fn save(&self, grant: &CachedGrant) -> Result<(), CacheError> {
		self.ensure_parent_exists()?;

		let serialized = serde_json::to_vec_pretty(grant).map_err(|e| {
			CacheError::Serialization { message: format!("Failed to serialize grant: {e}") }
		})?;
		let mut tmp_path = self.path.clone();

		tmp_path.set_extension("tmp");

		{
			let mut file = File::create(&tmp_path).map_err(|e| CacheError::Backend {
				message: format!("Failed to create {}: {e}", tmp_path.display()),
			})?;

			file.write_all(&serialized).map_err(|e| CacheError::Backend {
				message: format!("Failed to write {}: {e}", tmp_path.display()),
			})?;
			file.sync_all().map_err(|e| CacheError::Backend {
				message: format!("Failed to sync {}: {e}", tmp_path.display()),
			})?;
		}

		fs::rename(&tmp_path, &self.path).map_err(|e| CacheError::Backend {
			message: format!("Failed to replace {}: {e}", self.path.display()),
		})
	}

	fn load(&self) -> Result<Option<CachedGrant>, CacheError> {
		let bytes = match fs::read(&self.path) {
			Ok(bytes) => bytes,
			Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
			Err(e) =>
				return Err(CacheError::Backend {
					message: format!("Failed to read {}: {e}", self.path.display()),
				}),
		};

		if bytes.is_empty() {
			return Ok(None);
		}

		serde_json::from_slice(&bytes).map(Some).map_err(|e| CacheError::Serialization {
			message: format!("Failed to parse {}: {e}", self.path.display()),
		})
	}
}
