//! Collection envelope `{data, links, meta}` returned by paginated endpoints.

// crates.io
use serde::de::DeserializeOwned;
// self
use crate::{_prelude::*, error::TraversalError};

/// One page of a collection.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page<T> {
	/// Items in server order.
	pub data: Vec<T>,
	/// Navigation links.
	#[serde(default)]
	pub links: PageLinks,
	/// Optional paging metadata.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub meta: Option<PageMeta>,
}
impl<T> Page<T>
where
	T: DeserializeOwned,
{
	/// Decodes a page body; `number` is the one-based page index used in errors.
	pub fn decode(number: usize, body: &[u8]) -> Result<Self, TraversalError> {
		let mut deserializer = serde_json::Deserializer::from_slice(body);

		serde_path_to_error::deserialize(&mut deserializer)
			.map_err(|source| TraversalError::MalformedPage { page: number, source })
	}
}

/// Navigation links of a page. Absent links deserialize as `None`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PageLinks {
	/// Link to the page itself.
	#[serde(rename = "self", skip_serializing_if = "Option::is_none")]
	pub self_link: Option<String>,
	/// Link to the first page.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub first: Option<String>,
	/// Link to the next page; absent or empty ends the traversal.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub next: Option<String>,
	/// Link to the previous page.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub prev: Option<String>,
	/// Link to the last page.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub last: Option<String>,
}
impl PageLinks {
	/// Returns the `next` link when it is present and not blank.
	pub fn next_link(&self) -> Option<&str> {
		self.next.as_deref().map(str::trim).filter(|link| !link.is_empty())
	}
}

/// Page metadata.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PageMeta {
	/// Paging details.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub paging: Option<Paging>,
}

/// Paging details reported by the server.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Paging {
	/// Page size applied by the server.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub limit: Option<u64>,
	/// Total number of items in the collection.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub total: Option<u64>,
	/// Opaque cursor of the next page.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub next_cursor: Option<String>,
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn envelope_decodes_links_and_paging() {
		let body = br#"{
			"data": [1, 2, 3],
			"links": {"self": "https://api/x", "next": "https://api/x?cursor=abc"},
			"meta": {"paging": {"limit": 3, "total": 5, "nextCursor": "abc"}}
		}"#;
		let page = Page::<u32>::decode(1, body).expect("Envelope should decode.");

		assert_eq!(page.data, vec![1, 2, 3]);
		assert_eq!(page.links.self_link.as_deref(), Some("https://api/x"));
		assert_eq!(page.links.next_link(), Some("https://api/x?cursor=abc"));
		assert_eq!(
			page.meta.and_then(|meta| meta.paging).and_then(|paging| paging.next_cursor),
			Some("abc".into())
		);
	}

	#[test]
	fn blank_next_and_missing_links_end_the_walk() {
		let page = Page::<u32>::decode(2, br#"{"data":[4,5],"links":{"next":""}}"#)
			.expect("Envelope should decode.");

		assert_eq!(page.links.next_link(), None);

		let page = Page::<u32>::decode(2, br#"{"data":[]}"#).expect("Envelope should decode.");

		assert_eq!(page.links, PageLinks::default());
	}

	#[test]
	fn wrong_shapes_report_page_and_path() {
		match Page::<u32>::decode(4, br#"{"data":[1,"two"]}"#) {
			Err(TraversalError::MalformedPage { page: 4, source }) =>
				assert_eq!(source.path().to_string(), "data[1]"),
			other => panic!("Unexpected result: {other:?}."),
		}
		assert!(Page::<u32>::decode(1, b"<html>").is_err());
	}
}
