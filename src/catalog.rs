//! Catalog item references: bare IDs, `scheme:type:id` URIs, and `.../type/id` URLs.
//!
//! Endpoint wrappers normalize every caller-supplied reference with
//! [`IdentifierNormalizer::to_bare_id`] before building request paths, and use
//! [`IdentifierNormalizer::to_uri`] for request bodies that expect URIs. A reference
//! whose declared type differs from the expected one is rejected.

// std
use std::ops::Deref;
// self
use crate::_prelude::*;

/// Default URI scheme for catalog references.
pub const DEFAULT_URI_SCHEME: &str = "spotify";

/// Errors returned while normalizing a catalog reference.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum IdentifierError {
	/// The reference was empty.
	#[error("Catalog reference cannot be empty.")]
	Empty,
	/// The reference contains whitespace.
	#[error("Catalog reference `{reference}` contains whitespace.")]
	ContainsWhitespace {
		/// Offending reference.
		reference: String,
	},
	/// The reference declares a different item type.
	#[error("Expected a {expected} reference but `{reference}` is a {found} reference.")]
	TypeMismatch {
		/// Type the caller asked for.
		expected: String,
		/// Type found in the reference.
		found: String,
		/// Offending reference.
		reference: String,
	},
	/// The reference is an http(s) URL without a type/id pair.
	#[error("Catalog reference `{reference}` is malformed.")]
	Malformed {
		/// Offending reference.
		reference: String,
	},
	/// The item type label is unknown.
	#[error("Unknown catalog item type `{0}`.")]
	UnknownType(String),
}

/// Catalog item kinds addressable by URI.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemType {
	/// Album.
	Album,
	/// Artist.
	Artist,
	/// Audiobook.
	Audiobook,
	/// Audiobook chapter.
	Chapter,
	/// Podcast episode.
	Episode,
	/// Playlist.
	Playlist,
	/// Podcast show.
	Show,
	/// Track.
	Track,
	/// User profile.
	User,
}
impl ItemType {
	/// Returns the label used in URIs and URLs.
	pub const fn as_str(self) -> &'static str {
		match self {
			ItemType::Album => "album",
			ItemType::Artist => "artist",
			ItemType::Audiobook => "audiobook",
			ItemType::Chapter => "chapter",
			ItemType::Episode => "episode",
			ItemType::Playlist => "playlist",
			ItemType::Show => "show",
			ItemType::Track => "track",
			ItemType::User => "user",
		}
	}
}
impl Display for ItemType {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
impl FromStr for ItemType {
	type Err = IdentifierError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Ok(match s {
			"album" => ItemType::Album,
			"artist" => ItemType::Artist,
			"audiobook" => ItemType::Audiobook,
			"chapter" => ItemType::Chapter,
			"episode" => ItemType::Episode,
			"playlist" => ItemType::Playlist,
			"show" => ItemType::Show,
			"track" => ItemType::Track,
			"user" => ItemType::User,
			other => return Err(IdentifierError::UnknownType(other.to_owned())),
		})
	}
}

/// Bare catalog identifier with the type/scheme decoration stripped.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CatalogId(String);
impl CatalogId {
	/// Returns the identifier as a string slice.
	pub fn as_str(&self) -> &str {
		&self.0
	}
}
impl Deref for CatalogId {
	type Target = str;

	fn deref(&self) -> &Self::Target {
		&self.0
	}
}
impl AsRef<str> for CatalogId {
	fn as_ref(&self) -> &str {
		&self.0
	}
}
impl From<CatalogId> for String {
	fn from(value: CatalogId) -> Self {
		value.0
	}
}
impl Debug for CatalogId {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "CatalogId({})", self.0)
	}
}
impl Display for CatalogId {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(&self.0)
	}
}

/// Parses catalog references and builds URIs for one URI scheme.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IdentifierNormalizer {
	scheme: String,
}
impl IdentifierNormalizer {
	/// Creates a normalizer for the provided URI scheme.
	pub fn new(scheme: impl Into<String>) -> Self {
		Self { scheme: scheme.into() }
	}

	/// Returns the URI scheme this normalizer produces.
	pub fn scheme(&self) -> &str {
		&self.scheme
	}

	/// Extracts the bare identifier from `reference`, validating its declared type.
	///
	/// Accepts `scheme:type:id` URIs of any scheme, http(s) URLs ending in `/type/id`,
	/// and bare IDs. Anything matching neither form is returned unchanged.
	pub fn to_bare_id(
		&self,
		expected: ItemType,
		reference: &str,
	) -> Result<CatalogId, IdentifierError> {
		if reference.is_empty() {
			return Err(IdentifierError::Empty);
		}
		if reference.chars().any(char::is_whitespace) {
			return Err(IdentifierError::ContainsWhitespace { reference: reference.to_owned() });
		}

		if let Some((kind, id)) = split_uri(reference) {
			return check_type(expected, kind, id, reference);
		}
		if let Some(url) = Url::parse(reference)
			.ok()
			.filter(|url| matches!(url.scheme(), "http" | "https"))
		{
			let segments = url
				.path_segments()
				.map(|segments| segments.filter(|s| !s.is_empty()).collect::<Vec<_>>())
				.unwrap_or_default();
			let [.., kind, id] = segments.as_slice() else {
				return Err(IdentifierError::Malformed { reference: reference.to_owned() });
			};

			return check_type(expected, kind, id, reference);
		}

		Ok(CatalogId(reference.to_owned()))
	}

	/// Builds a `scheme:type:id` URI from any accepted reference form.
	pub fn to_uri(&self, expected: ItemType, reference: &str) -> Result<String, IdentifierError> {
		let id = self.to_bare_id(expected, reference)?;

		Ok(format!("{}:{}:{}", self.scheme, expected.as_str(), id))
	}
}
impl Default for IdentifierNormalizer {
	fn default() -> Self {
		Self::new(DEFAULT_URI_SCHEME)
	}
}

// Any scheme is accepted; only the type field is checked.
fn split_uri(reference: &str) -> Option<(&str, &str)> {
	let mut fields = reference.split(':');
	let (scheme, kind, id) = (fields.next()?, fields.next()?, fields.next()?);

	if fields.next().is_some() || [scheme, kind, id].iter().any(|f| f.is_empty() || f.contains('/'))
	{
		return None;
	}

	Some((kind, id))
}

fn check_type(
	expected: ItemType,
	kind: &str,
	id: &str,
	reference: &str,
) -> Result<CatalogId, IdentifierError> {
	if kind != expected.as_str() {
		return Err(IdentifierError::TypeMismatch {
			expected: expected.as_str().to_owned(),
			found: kind.to_owned(),
			reference: reference.to_owned(),
		});
	}

	Ok(CatalogId(id.to_owned()))
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn normalizer() -> IdentifierNormalizer {
		IdentifierNormalizer::default()
	}

	#[test]
	fn uri_form_yields_bare_id() {
		let id = normalizer()
			.to_bare_id(ItemType::Track, "spotify:track:ABC123")
			.expect("Track URI should normalize.");

		assert_eq!(id.as_str(), "ABC123");
	}

	#[test]
	fn uri_type_mismatch_is_rejected() {
		let err = normalizer()
			.to_bare_id(ItemType::Track, "spotify:album:ABC123")
			.expect_err("Album URI must not pass as a track.");

		assert!(matches!(
			err,
			IdentifierError::TypeMismatch { ref expected, ref found, .. }
				if expected == "track" && found == "album"
		));
	}

	#[test]
	fn url_form_yields_bare_id() {
		let normalizer = normalizer();

		assert_eq!(
			normalizer
				.to_bare_id(ItemType::Track, "https://host/track/ABC123")
				.expect("Track URL should normalize.")
				.as_str(),
			"ABC123"
		);
		assert_eq!(
			normalizer
				.to_bare_id(ItemType::Playlist, "https://open.spotify.com/playlist/37i9dQ?si=f00")
				.expect("Playlist share URL should normalize.")
				.as_str(),
			"37i9dQ"
		);
		assert!(matches!(
			normalizer.to_bare_id(ItemType::Artist, "https://host/track/ABC123"),
			Err(IdentifierError::TypeMismatch { .. })
		));
		assert!(matches!(
			normalizer.to_bare_id(ItemType::Artist, "https://host/"),
			Err(IdentifierError::Malformed { .. })
		));
	}

	#[test]
	fn bare_ids_pass_through() {
		assert_eq!(
			normalizer()
				.to_bare_id(ItemType::Artist, "0OdUWJ0sBjDrqHygGUXeCF")
				.expect("Bare ID should pass through.")
				.as_str(),
			"0OdUWJ0sBjDrqHygGUXeCF"
		);
		assert_eq!(normalizer().to_bare_id(ItemType::Track, ""), Err(IdentifierError::Empty));
		assert!(matches!(
			normalizer().to_bare_id(ItemType::Track, "two words"),
			Err(IdentifierError::ContainsWhitespace { .. })
		));
	}

	#[test]
	fn foreign_scheme_is_accepted_and_unmatched_input_passes_through() {
		let normalizer = normalizer();

		assert_eq!(
			normalizer
				.to_bare_id(ItemType::Track, "service:track:ABC123")
				.expect("Any scheme should be accepted.")
				.as_str(),
			"ABC123"
		);
		assert!(matches!(
			normalizer.to_bare_id(ItemType::Track, "service:album:ABC123"),
			Err(IdentifierError::TypeMismatch { .. })
		));
		assert_eq!(
			normalizer
				.to_bare_id(ItemType::User, "spotify:user:me:playlist:x")
				.expect("A reference with extra fields is not a URI.")
				.as_str(),
			"spotify:user:me:playlist:x"
		);
		assert_eq!(
			normalizer
				.to_uri(ItemType::Track, "service:track:ABC123")
				.expect("Foreign URI should convert."),
			"spotify:track:ABC123"
		);
	}

	#[test]
	fn uri_round_trips() {
		let normalizer = normalizer();

		for (kind, uri) in [
			(ItemType::Track, "spotify:track:6rqhFgbbKwnb9MLmUQDhG6"),
			(ItemType::Album, "spotify:album:4aawyAB9vmqN3uQ7FjRGTy"),
			(ItemType::User, "spotify:user:plamere"),
		] {
			let id = normalizer.to_bare_id(kind, uri).expect("Fixture URI should normalize.");

			assert_eq!(normalizer.to_uri(kind, &id).expect("Bare ID should convert."), uri);
		}

		assert_eq!(
			normalizer
				.to_uri(ItemType::Track, "https://open.spotify.com/track/XYZ")
				.expect("URL should convert."),
			"spotify:track:XYZ"
		);
	}

	#[test]
	fn item_types_parse_from_labels() {
		assert_eq!("episode".parse::<ItemType>(), Ok(ItemType::Episode));
		assert!(matches!("genre".parse::<ItemType>(), Err(IdentifierError::UnknownType(_))));
	}
}
