//! Query parameter encoding.
//!
//! Endpoint wrappers hand the dispatcher a [`QueryParams`] map whose values may be absent,
//! scalar, or lists. [`QueryParams::encode`] flattens that map into wire-ready pairs:
//!
//! - an absent value is omitted;
//! - a list drops its absent elements and joins the rest with `,`;
//! - a scalar is used as-is;
//! - any value whose encoding ends up empty (an empty list, a list of only absent
//!   elements, an empty string) is omitted rather than sent as `key=`.

// self
use crate::_prelude::*;

/// A single query parameter value before encoding.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ParamValue {
	/// No value; the parameter is dropped.
	Absent,
	/// Scalar value, already stringified.
	Scalar(String),
	/// List of optional values joined with `,`.
	List(Vec<Option<String>>),
}
impl ParamValue {
	/// Encodes the value, returning `None` when it should be omitted.
	pub fn encode(&self) -> Option<String> {
		let encoded = match self {
			Self::Absent => return None,
			Self::Scalar(value) => value.clone(),
			Self::List(values) =>
				values.iter().flatten().map(String::as_str).collect::<Vec<_>>().join(","),
		};

		if encoded.is_empty() { None } else { Some(encoded) }
	}
}
impl From<&str> for ParamValue {
	fn from(value: &str) -> Self {
		Self::Scalar(value.to_owned())
	}
}
impl From<String> for ParamValue {
	fn from(value: String) -> Self {
		Self::Scalar(value)
	}
}
impl From<&String> for ParamValue {
	fn from(value: &String) -> Self {
		Self::Scalar(value.clone())
	}
}
impl From<bool> for ParamValue {
	fn from(value: bool) -> Self {
		Self::Scalar(value.to_string())
	}
}
impl<T> From<Option<T>> for ParamValue
where
	T: Into<ParamValue>,
{
	fn from(value: Option<T>) -> Self {
		value.map_or(Self::Absent, Into::into)
	}
}
impl From<Vec<&str>> for ParamValue {
	fn from(values: Vec<&str>) -> Self {
		Self::List(values.into_iter().map(|value| Some(value.to_owned())).collect())
	}
}
impl From<Vec<String>> for ParamValue {
	fn from(values: Vec<String>) -> Self {
		Self::List(values.into_iter().map(Some).collect())
	}
}
impl From<Vec<Option<&str>>> for ParamValue {
	fn from(values: Vec<Option<&str>>) -> Self {
		Self::List(values.into_iter().map(|value| value.map(str::to_owned)).collect())
	}
}
impl From<Vec<Option<String>>> for ParamValue {
	fn from(values: Vec<Option<String>>) -> Self {
		Self::List(values)
	}
}

macro_rules! impl_numeric_param {
	($($ty:ty),+ $(,)?) => {
		$(
			impl From<$ty> for ParamValue {
				fn from(value: $ty) -> Self {
					Self::Scalar(value.to_string())
				}
			}
		)+
	};
}

impl_numeric_param!(u8, u16, u32, u64, usize, i8, i16, i32, i64, f32, f64);

/// Ordered query parameter map handed to the dispatcher.
///
/// Insertion order is preserved so requests are reproducible; inserting an existing name
/// replaces its value in place.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct QueryParams(Vec<(String, ParamValue)>);
impl QueryParams {
	/// Creates an empty parameter map.
	pub fn new() -> Self {
		Self::default()
	}

	/// Adds or replaces a parameter, returning the map for chaining.
	pub fn with(mut self, name: impl Into<String>, value: impl Into<ParamValue>) -> Self {
		self.insert(name, value);

		self
	}

	/// Adds or replaces a parameter.
	pub fn insert(&mut self, name: impl Into<String>, value: impl Into<ParamValue>) {
		let name = name.into();
		let value = value.into();

		match self.0.iter_mut().find(|(existing, _)| *existing == name) {
			Some((_, slot)) => *slot = value,
			None => self.0.push((name, value)),
		}
	}

	/// Returns `true` when a parameter with this name was supplied, even if it encodes to
	/// nothing.
	pub fn contains_key(&self, name: &str) -> bool {
		self.0.iter().any(|(existing, _)| existing == name)
	}

	/// Returns the raw value for `name`.
	pub fn get(&self, name: &str) -> Option<&ParamValue> {
		self.0.iter().find(|(existing, _)| existing == name).map(|(_, value)| value)
	}

	/// Returns `true` if no parameters were supplied.
	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	/// Flattens the map into wire-ready pairs, dropping values that encode to nothing.
	pub fn encode(&self) -> Vec<(String, String)> {
		self.0
			.iter()
			.filter_map(|(name, value)| value.encode().map(|encoded| (name.clone(), encoded)))
			.collect()
	}

	/// Same as [`encode`](Self::encode), collected into a sorted map.
	pub fn encode_map(&self) -> BTreeMap<String, String> {
		self.encode().into_iter().collect()
	}
}
impl<K, V> FromIterator<(K, V)> for QueryParams
where
	K: Into<String>,
	V: Into<ParamValue>,
{
	fn from_iter<I>(iter: I) -> Self
	where
		I: IntoIterator<Item = (K, V)>,
	{
		let mut params = Self::new();

		for (name, value) in iter {
			params.insert(name, value);
		}

		params
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn encode_drops_absent_and_joins_lists() {
		let params = QueryParams::new()
			.with("a", ParamValue::Absent)
			.with("b", vec![Some("x"), None, Some("y")])
			.with("c", 5_i32);
		let encoded = params.encode_map();

		assert_eq!(encoded.len(), 2);
		assert!(!encoded.contains_key("a"));
		assert_eq!(encoded["b"], "x,y");
		assert_eq!(encoded["c"], "5");
	}

	#[test]
	fn empty_after_filtering_is_omitted() {
		let params = QueryParams::new()
			.with("empty_list", Vec::<String>::new())
			.with("only_absent", vec![None::<String>, None])
			.with("empty_scalar", "")
			.with("kept", "market");

		assert_eq!(params.encode(), vec![("kept".to_owned(), "market".to_owned())]);
		assert!(params.contains_key("only_absent"));
	}

	#[test]
	fn option_and_bool_conversions() {
		let params = QueryParams::new()
			.with("market", None::<&str>)
			.with("public", false)
			.with("limit", Some(20_u32));

		assert_eq!(
			params.encode(),
			vec![("public".to_owned(), "false".to_owned()), ("limit".to_owned(), "20".to_owned())]
		);
	}

	#[test]
	fn insert_replaces_in_place_and_keeps_order() {
		let mut params: QueryParams = [("ids", "a"), ("market", "SE")].into_iter().collect();

		params.insert("ids", "b");

		assert_eq!(
			params.encode(),
			vec![("ids".to_owned(), "b".to_owned()), ("market".to_owned(), "SE".to_owned())]
		);
	}
}
