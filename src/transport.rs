//! Bearer-authenticated resource calls with a single 401 re-authentication and bounded
//! transient retries.

pub mod request;
pub mod retry;

pub use request::*;
pub use retry::*;

// crates.io
use oauth2::http::StatusCode;
// self
use crate::{
	_prelude::*,
	auth::TokenSecret,
	broker::TokenBroker,
	error::{ApiError, AuthError, TransportError},
	http::{self, HttpTransport, TransportErrorMapper},
	obs::{self, CallKind, CallOutcome, CallSpan},
};

/// Logical target label used in transport errors raised by resource calls.
pub const RESOURCE_ENDPOINT_TARGET: &str = "resource endpoint";

/// Default per-call timeout for resource requests.
pub const DEFAULT_REQUEST_TIMEOUT: StdDuration = StdDuration::from_secs(30);

/// Issues resource requests with a bearer token obtained from a shared [`TokenBroker`].
///
/// Every attempt asks the broker for a token, so a refresh triggered by one caller is observed
/// by all others. A 401 invalidates the cached token and the request is re-issued exactly once;
/// a second 401 surfaces as [`AuthError::Unauthorized`]. Network failures, timeouts, 429, and
/// 5xx responses are retried under the [`RetryPolicy`].
pub struct AuthenticatedTransport<C, M>
where
	C: ?Sized + HttpTransport,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	broker: Arc<TokenBroker<C, M>>,
	retry: RetryPolicy,
	request_timeout: StdDuration,
}
impl<C, M> AuthenticatedTransport<C, M>
where
	C: ?Sized + HttpTransport,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Creates a transport that shares the broker's HTTP client and error mapper.
	pub fn new(broker: Arc<TokenBroker<C, M>>) -> Self {
		Self { broker, retry: RetryPolicy::default(), request_timeout: DEFAULT_REQUEST_TIMEOUT }
	}

	/// Overrides the retry policy.
	pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
		self.retry = retry;

		self
	}

	/// Overrides the per-call timeout.
	pub fn with_request_timeout(mut self, timeout: StdDuration) -> Self {
		self.request_timeout = timeout;

		self
	}

	/// Token broker backing the transport.
	pub fn broker(&self) -> &Arc<TokenBroker<C, M>> {
		&self.broker
	}

	/// Active retry policy.
	pub fn retry_policy(&self) -> &RetryPolicy {
		&self.retry
	}

	/// Issues a `GET` against `url`.
	pub async fn get(&self, url: Url) -> Result<ApiResponse> {
		self.send(&ApiRequest::get(url)).await
	}

	/// Issues `request`, returning the first 2xx response.
	pub async fn send(&self, request: &ApiRequest) -> Result<ApiResponse> {
		const KIND: CallKind = CallKind::ApiRequest;

		let span = CallSpan::new(KIND, "send");

		obs::record_call_outcome(KIND, CallOutcome::Attempt);

		let result = span.instrument(self.send_with_retries(request)).await;

		obs::record_call_result(KIND, &result);

		result
	}

	async fn send_with_retries(&self, request: &ApiRequest) -> Result<ApiResponse> {
		let mut retries = 0;
		let mut reauthenticated = false;

		loop {
			let failure = match self.send_once(request).await {
				Ok((_, response)) if response.status.is_success() => return Ok(response),
				Ok((rejected, response)) if response.status == StatusCode::UNAUTHORIZED => {
					let body = String::from_utf8_lossy(&response.body).into_owned();

					if reauthenticated {
						return Err(AuthError::Unauthorized { body }.into());
					}

					obs::warn_event(
						CallKind::ApiRequest,
						format_args!(
							"Request to {} was rejected with 401; refreshing the token.",
							request.url.path()
						),
					);
					self.broker.invalidate_if(&rejected).await;

					reauthenticated = true;

					continue;
				},
				Ok((_, response)) => Error::from(ApiError::from_body(
					response.status.as_u16(),
					&response.body,
					http::parse_retry_after(&response.headers),
				)),
				Err(e) => e,
			};

			retries += 1;

			if !failure.is_transient() || !self.retry.allows(retries) {
				return Err(failure);
			}

			let delay = self.retry.delay_for(retries, retry_after(&failure));

			obs::warn_event(
				CallKind::ApiRequest,
				format_args!("Retry {retries} in {delay:?} after a transient failure: {failure}."),
			);
			tokio::time::sleep(delay).await;
		}
	}

	async fn send_once(&self, request: &ApiRequest) -> Result<(TokenSecret, ApiResponse)> {
		let token = self.broker.get_token().await?;
		let http_request = request.to_http(&token)?;
		let timeout = self.request_timeout;

		match tokio::time::timeout(timeout, self.broker.http_client().execute(http_request)).await {
			Ok(Ok(response)) => Ok((token, ApiResponse::from(response))),
			Ok(Err(e)) => Err(self
				.broker
				.transport_mapper()
				.map_transport_error(RESOURCE_ENDPOINT_TARGET, e)),
			Err(_) =>
				Err(TransportError::Timeout { target: RESOURCE_ENDPOINT_TARGET, timeout }.into()),
		}
	}
}
impl<C, M> Debug for AuthenticatedTransport<C, M>
where
	C: ?Sized + HttpTransport,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("AuthenticatedTransport")
			.field("broker", &self.broker)
			.field("retry", &self.retry)
			.field("request_timeout", &self.request_timeout)
			.finish()
	}
}

fn retry_after(error: &Error) -> Option<StdDuration> {
	match error {
		Error::Api(err) => err.retry_after,
		Error::Auth(err) => err.retry_after(),
		_ => None,
	}
}
