//! Transport primitives shared by the token exchange and resource calls.
//!
//! [`HttpTransport`] is the crate's only dependency on an HTTP stack. Requests and responses use
//! the `http` types re-exported by `oauth2` ([`HttpRequest`], [`HttpResponse`]) so custom
//! clients can be plugged in without depending on reqwest. Failures surface as
//! [`HttpClientError`] and are classified by a [`TransportErrorMapper`].

// std
#[cfg(feature = "reqwest")] use std::ops::Deref;
// crates.io
use oauth2::{
	HttpClientError, HttpRequest, HttpResponse,
	http::{HeaderMap, header::RETRY_AFTER},
};
use time::format_description::well_known::Rfc2822;
// self
use crate::{
	_prelude::*,
	error::{ConfigError, TransportError},
};

/// Boxed future returned by [`HttpTransport::execute`].
pub type HttpFuture<'a, E> =
	Pin<Box<dyn Future<Output = Result<HttpResponse, HttpClientError<E>>> + 'a + Send>>;

/// Abstraction over HTTP stacks capable of executing token exchanges and resource calls.
///
/// Implementations must be `Send + Sync + 'static` so a single transport can be shared (behind
/// `Arc<T>`) by the broker, the authenticated transport, and every concurrent traversal. The
/// returned future must be `Send` so callers can move traversals across executor threads.
///
/// Implementations must not follow redirects on behalf of the caller and must not apply their
/// own retry policy; both are decided by the layers above.
pub trait HttpTransport
where
	Self: 'static + Send + Sync,
{
	/// Concrete error emitted by the underlying transport.
	type TransportError: 'static + Send + Sync + StdError;

	/// Executes a single HTTP request and buffers the full response body.
	fn execute(&self, request: HttpRequest) -> HttpFuture<'_, Self::TransportError>;
}
impl<T> HttpTransport for Arc<T>
where
	T: ?Sized + HttpTransport,
{
	type TransportError = T::TransportError;

	fn execute(&self, request: HttpRequest) -> HttpFuture<'_, Self::TransportError> {
		(**self).execute(request)
	}
}

/// Maps HTTP transport failures into crate [`Error`] values.
pub trait TransportErrorMapper<E>
where
	Self: 'static + Send + Sync,
	E: 'static + Send + Sync + StdError,
{
	/// Converts an [`HttpClientError`] emitted while calling `target` into a crate error.
	fn map_transport_error(&self, target: &'static str, error: HttpClientError<E>) -> Error;
}

/// Mapper for arbitrary transports that treats every client failure as a network error.
#[derive(Clone, Debug, Default)]
pub struct GenericTransportErrorMapper;
impl<E> TransportErrorMapper<E> for GenericTransportErrorMapper
where
	E: 'static + Send + Sync + StdError,
{
	fn map_transport_error(&self, target: &'static str, error: HttpClientError<E>) -> Error {
		map_common_error(target, error)
	}
}

/// Default mapper for reqwest-backed transports.
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug, Default)]
pub struct ReqwestTransportErrorMapper;
#[cfg(feature = "reqwest")]
impl TransportErrorMapper<ReqwestError> for ReqwestTransportErrorMapper {
	fn map_transport_error(
		&self,
		target: &'static str,
		error: HttpClientError<ReqwestError>,
	) -> Error {
		match error {
			HttpClientError::Reqwest(inner) => map_reqwest_error(target, *inner),
			other => map_common_error(target, other),
		}
	}
}

/// Thin wrapper around [`ReqwestClient`] so shared HTTP behavior lives in one place.
///
/// The default client disables redirect following; token endpoints answer directly and a
/// redirected resource call would silently drop the bearer header. Configure any custom
/// [`ReqwestClient`] the same way.
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug)]
pub struct ReqwestHttpClient(pub ReqwestClient);
#[cfg(feature = "reqwest")]
impl ReqwestHttpClient {
	/// Builds the default client (rustls, no redirects).
	pub fn new() -> Result<Self, ConfigError> {
		let client = ReqwestClient::builder().redirect(reqwest::redirect::Policy::none()).build()?;

		Ok(Self(client))
	}

	/// Wraps an existing reqwest [`ReqwestClient`].
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}
}
#[cfg(feature = "reqwest")]
impl AsRef<ReqwestClient> for ReqwestHttpClient {
	fn as_ref(&self) -> &ReqwestClient {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl Deref for ReqwestHttpClient {
	type Target = ReqwestClient;

	fn deref(&self) -> &Self::Target {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl HttpTransport for ReqwestHttpClient {
	type TransportError = ReqwestError;

	fn execute(&self, request: HttpRequest) -> HttpFuture<'_, Self::TransportError> {
		let client = self.0.clone();

		Box::pin(async move {
			let response =
				client.execute(request.try_into().map_err(Box::new)?).await.map_err(Box::new)?;
			let status = response.status();
			let headers = response.headers().to_owned();
			let mut response_new =
				HttpResponse::new(response.bytes().await.map_err(Box::new)?.to_vec());

			*response_new.status_mut() = status;
			*response_new.headers_mut() = headers;

			Ok(response_new)
		})
	}
}

/// Reads a `Retry-After` hint, accepting delta-seconds or an RFC 2822 HTTP date.
///
/// Dates in the past yield `None`.
pub fn parse_retry_after(headers: &HeaderMap) -> Option<StdDuration> {
	let value = headers.get(RETRY_AFTER)?;
	let raw = value.to_str().ok()?.trim();

	if let Ok(secs) = raw.parse::<u64>() {
		return Some(StdDuration::from_secs(secs));
	}
	if let Ok(moment) = OffsetDateTime::parse(raw, &Rfc2822) {
		let delta = moment - OffsetDateTime::now_utc();

		if delta.is_positive() {
			return StdDuration::try_from(delta).ok();
		}
	}

	None
}

fn map_common_error<E>(target: &'static str, error: HttpClientError<E>) -> Error
where
	E: 'static + Send + Sync + StdError,
{
	match error {
		HttpClientError::Http(inner) => ConfigError::from(inner).into(),
		HttpClientError::Io(inner) => TransportError::Io(inner).into(),
		HttpClientError::Other(message) => TransportError::network(target, message).into(),
		HttpClientError::Reqwest(inner) => TransportError::network(target, inner).into(),
		_ => TransportError::network(target, "unknown HTTP client failure").into(),
	}
}

#[cfg(feature = "reqwest")]
fn map_reqwest_error(target: &'static str, error: ReqwestError) -> Error {
	if error.is_builder() {
		return ConfigError::from(error).into();
	}

	TransportError::network(target, error).into()
}
