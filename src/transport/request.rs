//! Resource request and response values carried through the authenticated transport.

// crates.io
use oauth2::{
	HttpRequest, HttpResponse,
	http::{
		HeaderMap, HeaderName, HeaderValue, Method, Request, StatusCode,
		header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
	},
};
use serde::de::DeserializeOwned;
// self
use crate::{_prelude::*, auth::TokenSecret, error::ConfigError};

/// Resource request rebuilt for every attempt so a refreshed bearer can be attached.
#[derive(Clone, Debug)]
pub struct ApiRequest {
	/// HTTP method.
	pub method: Method,
	/// Absolute URL including the query string.
	pub url: Url,
	/// Extra headers; `Authorization` is always overwritten.
	pub headers: HeaderMap,
	/// Request body.
	pub body: Vec<u8>,
}
impl ApiRequest {
	/// Creates a request without headers or body.
	pub fn new(method: Method, url: Url) -> Self {
		Self { method, url, headers: HeaderMap::new(), body: Vec::new() }
	}

	/// Creates a `GET` request.
	pub fn get(url: Url) -> Self {
		Self::new(Method::GET, url)
	}

	/// Adds or replaces a header.
	pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
		self.headers.insert(name, value);

		self
	}

	/// Serializes `payload` as the JSON body.
	pub fn with_json<T>(mut self, payload: &T) -> Result<Self, serde_json::Error>
	where
		T: ?Sized + Serialize,
	{
		self.body = serde_json::to_vec(payload)?;
		self.headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

		Ok(self)
	}

	/// Builds the wire request carrying `bearer`.
	pub(crate) fn to_http(&self, bearer: &TokenSecret) -> Result<HttpRequest, ConfigError> {
		let authorization = bearer.bearer_header()?;
		let mut request = Request::builder()
			.method(self.method.clone())
			.uri(self.url.as_str())
			.body(self.body.clone())?;
		let headers = request.headers_mut();

		headers.extend(self.headers.clone());
		headers.entry(ACCEPT).or_insert(HeaderValue::from_static("application/json"));
		headers.insert(AUTHORIZATION, authorization);

		Ok(request)
	}
}

/// Buffered resource response.
#[derive(Clone, Debug)]
pub struct ApiResponse {
	/// HTTP status.
	pub status: StatusCode,
	/// Response headers.
	pub headers: HeaderMap,
	/// Raw response body.
	pub body: Vec<u8>,
}
impl ApiResponse {
	/// Decodes the body as JSON, reporting the failing field path on error.
	pub fn json<T>(&self) -> Result<T, serde_path_to_error::Error<serde_json::Error>>
	where
		T: DeserializeOwned,
	{
		let mut deserializer = serde_json::Deserializer::from_slice(&self.body);

		serde_path_to_error::deserialize(&mut deserializer)
	}
}
impl From<HttpResponse> for ApiResponse {
	fn from(response: HttpResponse) -> Self {
		let (parts, body) = response.into_parts();

		Self { status: parts.status, headers: parts.headers, body }
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn bearer_overrides_caller_authorization() {
		let request = ApiRequest::get(
			Url::parse("https://api.example.com/v1/apps?limit=2").expect("URL fixture is valid."),
		)
		.with_header(AUTHORIZATION, HeaderValue::from_static("Basic stale"))
		.with_header(ACCEPT, HeaderValue::from_static("application/vnd.api+json"));
		let http = request.to_http(&TokenSecret::new("tok1")).expect("Request should build.");

		assert_eq!(http.uri(), "https://api.example.com/v1/apps?limit=2");
		assert_eq!(http.headers()[AUTHORIZATION], "Bearer tok1");
		assert!(http.headers()[AUTHORIZATION].is_sensitive());
		assert_eq!(http.headers()[ACCEPT], "application/vnd.api+json");
	}

	#[test]
	fn bearer_with_control_characters_is_rejected() {
		let request =
			ApiRequest::get(Url::parse("https://api.example.com/").expect("URL fixture is valid."));

		assert!(matches!(
			request.to_http(&TokenSecret::new("tok\n1")),
			Err(ConfigError::InvalidBearer(_))
		));
	}

	#[test]
	fn json_reports_field_paths() {
		let response = ApiResponse {
			status: StatusCode::OK,
			headers: HeaderMap::new(),
			body: br#"{"data":{"id":7}}"#.to_vec(),
		};
		let err = response
			.json::<BTreeMap<String, BTreeMap<String, String>>>()
			.expect_err("A number is not a string.");

		assert_eq!(err.path().to_string(), "data.id");
	}
}
