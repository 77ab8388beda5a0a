//! Error taxonomy shared by the signer, broker, transport, and page walker.

// self
use crate::_prelude::*;

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Boxed error used for transport sources and page handler failures.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Credential material could not be parsed or signed.
	#[error(transparent)]
	Signing(#[from] SigningError),
	/// Bearer credential could not be obtained or was rejected.
	#[error(transparent)]
	Auth(#[from] AuthError),
	/// Transport failure (DNS, TCP, TLS, timeout).
	#[error(transparent)]
	Transport(#[from] TransportError),
	/// Resource endpoint answered with a non-2xx status.
	#[error(transparent)]
	Api(#[from] ApiError),
	/// Collection traversal aborted.
	#[error(transparent)]
	Traversal(#[from] TraversalError),
	/// A successful response body did not match the requested type.
	#[error("Response body could not be decoded.")]
	Decode {
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
	},
	/// A page handler returned an error and aborted the traversal.
	#[error("Page handler aborted the traversal.")]
	Handler {
		/// Error returned by the handler.
		#[source]
		source: BoxError,
	},
}
impl Error {
	/// Wraps a page handler failure.
	pub fn handler(src: impl Into<BoxError>) -> Self {
		Self::Handler { source: src.into() }
	}

	/// Returns `true` when the bounded retry policy may re-issue the failed call.
	///
	/// Authentication rejections, client-side API errors, and traversal failures are never
	/// transient.
	pub fn is_transient(&self) -> bool {
		match self {
			Self::Transport(_) => true,
			Self::Auth(err) => err.is_transient(),
			Self::Api(err) => err.is_transient(),
			_ => false,
		}
	}

	/// HTTP status attached to the failure, when one was observed.
	pub fn status(&self) -> Option<u16> {
		match self {
			Self::Auth(AuthError::ExchangeFailed { status, .. }) => Some(*status),
			Self::Auth(AuthError::Unauthorized { .. }) => Some(401),
			Self::Api(err) => Some(err.status),
			_ => None,
		}
	}
}

/// Configuration and validation failures.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// HTTP request construction failed.
	#[error(transparent)]
	HttpRequest(#[from] oauth2::http::Error),
	/// Bearer token cannot be encoded as a header value.
	#[error("Access token contains characters that are not valid in an HTTP header.")]
	InvalidBearer(#[from] oauth2::http::header::InvalidHeaderValue),
	/// A URL could not be parsed or joined.
	#[error("URL `{url}` is invalid.")]
	InvalidUrl {
		/// Offending input.
		url: String,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// Endpoints must use HTTPS outside of loopback hosts.
	#[error("The {endpoint} endpoint must use HTTPS: {url}.")]
	InsecureEndpoint {
		/// Which endpoint failed validation.
		endpoint: &'static str,
		/// Endpoint URL that failed validation.
		url: String,
	},
	/// Exchange mode was selected without a token endpoint.
	#[error("Missing token endpoint.")]
	MissingTokenEndpoint,
	/// Missing API base URL.
	#[error("Missing API base URL.")]
	MissingApiBase,
	/// Assertion lifetime falls outside `(0, ceiling]`.
	#[error("Assertion lifetime of {requested} is outside the allowed range (0, {ceiling}].")]
	AssertionLifetime {
		/// Requested lifetime.
		requested: Duration,
		/// Ceiling enforced by the assertion profile.
		ceiling: Duration,
	},
	/// Page limits must allow at least one page.
	#[error("The maximum page count must be at least one.")]
	ZeroPageLimit,
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}

	/// Wraps a URL parse failure with the offending input.
	pub fn invalid_url(url: impl Into<String>, source: url::ParseError) -> Self {
		Self::InvalidUrl { url: url.into(), source }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Failures raised while parsing key material or signing assertions.
#[derive(Debug, ThisError)]
pub enum SigningError {
	/// Private key is missing or cannot be parsed for its declared family.
	#[error("Private key is missing or invalid.")]
	InvalidKey {
		/// Underlying key parsing failure.
		#[source]
		source: jsonwebtoken::errors::Error,
	},
	/// Private key belongs to a family other than ECDSA or RSA.
	#[error("Private key type `{kind}` is not supported; expected ECDSA (ES256) or RSA (RS256).")]
	UnsupportedKeyType {
		/// Detected key family or algorithm label.
		kind: String,
	},
	/// Signing library rejected the claims or key.
	#[error("Failed to sign the client assertion.")]
	SignatureFailed {
		/// Underlying signing failure.
		#[source]
		source: jsonwebtoken::errors::Error,
	},
}

/// Failures raised while obtaining or using the bearer credential.
#[derive(Debug, ThisError)]
pub enum AuthError {
	/// Token endpoint answered with a non-2xx status.
	#[error("Token endpoint rejected the exchange with status {status}: {body}")]
	ExchangeFailed {
		/// HTTP status code.
		status: u16,
		/// Raw response body.
		body: String,
		/// OAuth `error` code when the body follows RFC 6749.
		oauth_error: Option<String>,
		/// Retry-After hint from upstream, if supplied.
		retry_after: Option<StdDuration>,
	},
	/// Token endpoint could not be reached.
	#[error("Token exchange failed before a response was received.")]
	TransportFailure(#[source] TransportError),
	/// Client assertion could not be produced.
	#[error("Client assertion could not be signed.")]
	SigningFailed(#[from] SigningError),
	/// Resource endpoint rejected a freshly obtained token.
	#[error("Request was rejected with 401 after refreshing the access token.")]
	Unauthorized {
		/// Raw body of the final 401 response.
		body: String,
	},
	/// Token endpoint answered 2xx with a payload that is not a token response.
	#[error("Token endpoint returned a malformed response.")]
	MalformedTokenResponse {
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
		/// HTTP status code.
		status: u16,
	},
	/// Token endpoint returned a non-positive or out-of-range `expires_in`.
	#[error("The expires_in value {value} is not a usable token lifetime.")]
	InvalidExpiresIn {
		/// Raw value returned by the endpoint.
		value: i64,
	},
}
impl AuthError {
	/// Returns `true` for exchange failures a bounded retry may recover from.
	pub fn is_transient(&self) -> bool {
		match self {
			Self::TransportFailure(_) => true,
			Self::ExchangeFailed { status, .. } => *status >= 500 || *status == 429,
			_ => false,
		}
	}

	/// Retry-After hint attached to the failure.
	pub fn retry_after(&self) -> Option<StdDuration> {
		match self {
			Self::ExchangeFailed { retry_after, .. } => *retry_after,
			_ => None,
		}
	}
}
impl From<TransportError> for AuthError {
	fn from(e: TransportError) -> Self {
		Self::TransportFailure(e)
	}
}

/// Transport-level failures (network, IO, timeout).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling {target}.")]
	Network {
		/// Logical call target (token endpoint, resource endpoint).
		target: &'static str,
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred during an HTTP call.")]
	Io(#[from] std::io::Error),
	/// Call did not complete within the configured per-call timeout.
	#[error("Call to {target} timed out after {timeout:?}.")]
	Timeout {
		/// Logical call target.
		target: &'static str,
		/// Per-call timeout that elapsed.
		timeout: StdDuration,
	},
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(target: &'static str, src: impl Into<BoxError>) -> Self {
		Self::Network { target, source: src.into() }
	}
}

/// Non-2xx response from a resource endpoint.
#[derive(Debug, ThisError)]
#[error("API request failed with status {status}{}.", summarize(.errors))]
pub struct ApiError {
	/// HTTP status code.
	pub status: u16,
	/// Structured error entries parsed from the body, if any.
	pub errors: Vec<ApiErrorDetail>,
	/// Raw response body.
	pub body: String,
	/// Retry-After hint from upstream, if supplied.
	pub retry_after: Option<StdDuration>,
}
impl ApiError {
	/// Builds an error from a response status and body, parsing `{"errors": [...]}` payloads.
	pub fn from_body(status: u16, body: &[u8], retry_after: Option<StdDuration>) -> Self {
		let errors = serde_json::from_slice::<ApiErrorBody>(body)
			.map(|parsed| parsed.errors)
			.unwrap_or_default();

		Self { status, errors, body: String::from_utf8_lossy(body).into_owned(), retry_after }
	}

	/// Returns `true` for server-side or throttling statuses.
	pub fn is_transient(&self) -> bool {
		self.status >= 500 || self.status == 429
	}
}

/// Single entry of a structured API error body.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiErrorDetail {
	/// Server-assigned error identifier.
	pub id: Option<String>,
	/// HTTP status rendered as a string.
	pub status: Option<String>,
	/// Machine-readable error code.
	pub code: Option<String>,
	/// Short summary.
	pub title: Option<String>,
	/// Human-readable explanation.
	pub detail: Option<String>,
}

#[derive(Deserialize)]
struct ApiErrorBody {
	errors: Vec<ApiErrorDetail>,
}

/// Failures that abort a collection traversal.
#[derive(Debug, ThisError)]
pub enum TraversalError {
	/// The server kept returning `next` links past the configured page cap.
	#[error("Traversal exceeded the limit of {limit} pages.")]
	PageLimitExceeded {
		/// Configured page cap.
		limit: usize,
	},
	/// `links.next` could not be resolved to a URL.
	#[error("Next link `{link}` is not a valid URL.")]
	MalformedNextLink {
		/// Raw link value.
		link: String,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// A page body did not match the collection envelope.
	#[error("Page {page} is not a valid collection envelope.")]
	MalformedPage {
		/// One-based page index.
		page: usize,
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
	},
	/// Cancellation was requested mid-traversal.
	#[error("Traversal was cancelled after {pages} pages.")]
	Cancelled {
		/// Pages fully fetched before cancellation.
		pages: usize,
	},
	/// The end-to-end deadline elapsed mid-traversal.
	#[error("Traversal exceeded its deadline of {deadline:?} after {pages} pages.")]
	DeadlineExceeded {
		/// Configured deadline.
		deadline: StdDuration,
		/// Pages fully fetched before the deadline.
		pages: usize,
	},
}

fn summarize(errors: &[ApiErrorDetail]) -> String {
	errors
		.first()
		.and_then(|first| first.detail.as_deref().or(first.title.as_deref()))
		.map(|message| format!(": {message}"))
		.unwrap_or_default()
}
