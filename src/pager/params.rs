//! Query parameter set carried from page to page.

// self
use crate::_prelude::*;

/// Ordered multimap of query parameters.
///
/// Keys keep every value in insertion order so repeated parameters (`filter=a&filter=b`)
/// survive a round trip through a `next` link.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct QueryParams(BTreeMap<String, Vec<String>>);
impl QueryParams {
	/// Creates an empty set.
	pub fn new() -> Self {
		Self::default()
	}

	/// Extracts every query parameter of `url`.
	pub fn from_url(url: &Url) -> Self {
		url.query_pairs().collect()
	}

	/// Replaces every value of `key` with `value`.
	pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
		self.0.insert(key.into(), vec![value.into()]);
	}

	/// Builder-style [`insert`](Self::insert).
	pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
		self.insert(key, value);

		self
	}

	/// Appends `value` to the values of `key`.
	pub fn append(&mut self, key: impl Into<String>, value: impl Into<String>) {
		self.0.entry(key.into()).or_default().push(value.into());
	}

	/// First value of `key`.
	pub fn get(&self, key: &str) -> Option<&str> {
		self.0.get(key).and_then(|values| values.first()).map(String::as_str)
	}

	/// Every value of `key`.
	pub fn get_all(&self, key: &str) -> &[String] {
		self.0.get(key).map(Vec::as_slice).unwrap_or_default()
	}

	/// Returns `true` if `key` is present.
	pub fn contains_key(&self, key: &str) -> bool {
		self.0.contains_key(key)
	}

	/// Number of distinct keys.
	pub fn len(&self) -> usize {
		self.0.len()
	}

	/// Returns `true` if no parameter is set.
	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	/// Iterates `(key, value)` pairs, repeating keys with several values.
	pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
		self.0.iter().flat_map(|(key, values)| {
			values.iter().map(move |value| (key.as_str(), value.as_str()))
		})
	}

	/// Merges `newer` into `self`; every key present in `newer` replaces all of its old values.
	///
	/// Keys only present in `self` are kept.
	pub fn merge_override(&mut self, newer: QueryParams) {
		for (key, values) in newer.0 {
			self.0.insert(key, values);
		}
	}

	/// Returns `endpoint` with its query replaced by this set.
	pub fn apply_to(&self, endpoint: &Url) -> Url {
		let mut url = endpoint.clone();

		if self.is_empty() {
			url.set_query(None);
		} else {
			url.query_pairs_mut().clear().extend_pairs(self.iter());
		}

		url
	}
}
impl<K, V> FromIterator<(K, V)> for QueryParams
where
	K: Into<String>,
	V: Into<String>,
{
	fn from_iter<I>(iter: I) -> Self
	where
		I: IntoIterator<Item = (K, V)>,
	{
		let mut params = Self::new();

		for (key, value) in iter {
			params.append(key, value);
		}

		params
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn url(raw: &str) -> Url {
		Url::parse(raw).expect("URL fixture is valid.")
	}

	#[test]
	fn next_link_values_win_on_collision() {
		let mut params = QueryParams::new()
			.with("limit", "50")
			.with("cursor", "old")
			.with("filter[platform]", "IOS");

		params.merge_override(QueryParams::from_url(&url(
			"https://api.example.com/v1/apps?cursor=abc&limit=200",
		)));

		assert_eq!(params.get("cursor"), Some("abc"));
		assert_eq!(params.get("limit"), Some("200"));
		assert_eq!(params.get("filter[platform]"), Some("IOS"));
	}

	#[test]
	fn repeated_keys_are_replaced_as_a_whole() {
		let mut params: QueryParams =
			[("fields", "name"), ("fields", "bundleId")].into_iter().collect();

		assert_eq!(params.get_all("fields"), ["name", "bundleId"]);

		params.merge_override(QueryParams::from_url(&url("https://api/x?fields=sku")));

		assert_eq!(params.get_all("fields"), ["sku"]);
		assert!(params.get_all("missing").is_empty());
	}

	#[test]
	fn apply_to_encodes_and_replaces_the_query() {
		let endpoint = url("https://api.example.com/v1/apps?stale=1");
		let params = QueryParams::new().with("cursor", "a b&c").with("limit", "2");

		assert_eq!(
			params.apply_to(&endpoint).as_str(),
			"https://api.example.com/v1/apps?cursor=a+b%26c&limit=2"
		);
		assert_eq!(
			QueryParams::new().apply_to(&endpoint).as_str(),
			"https://api.example.com/v1/apps"
		);
	}
}
