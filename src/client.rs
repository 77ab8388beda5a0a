//! Facade that wires one credential into a broker, an authenticated transport, and a page
//! walker so endpoint wrappers only deal in paths and parameters.

/// Validated client configuration and its builder.
pub mod config;

pub use config::*;

// crates.io
use serde::de::DeserializeOwned;
// self
use crate::{
	_prelude::*,
	auth::CredentialSigner,
	broker::TokenBroker,
	error::{BoxError, ConfigError},
	http::{HttpTransport, TransportErrorMapper},
	pager::{PageStream, PageWalker, QueryParams, TraversalRequest, TraversalSummary},
	transport::AuthenticatedTransport,
};
#[cfg(feature = "reqwest")]
use crate::http::{ReqwestHttpClient, ReqwestTransportErrorMapper};

#[cfg(feature = "reqwest")]
/// Client specialized for the crate's default reqwest transport stack.
pub type ReqwestApiClient = ApiClient<ReqwestHttpClient, ReqwestTransportErrorMapper>;

/// Authenticated API client sharing one token cache across single calls and traversals.
pub struct ApiClient<C, M>
where
	C: ?Sized + HttpTransport,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	config: ClientConfig,
	transport: Arc<AuthenticatedTransport<C, M>>,
	walker: PageWalker<C, M>,
}
impl<C, M> ApiClient<C, M>
where
	C: ?Sized + HttpTransport,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Creates a client that reuses the caller-provided transport + mapper pair.
	pub fn with_http_client(
		config: ClientConfig,
		signer: CredentialSigner,
		http_client: impl Into<Arc<C>>,
		mapper: impl Into<Arc<M>>,
	) -> Result<Self, ConfigError> {
		let broker = TokenBroker::with_http_client(
			signer,
			config.token_source.clone(),
			http_client,
			mapper,
		);

		Self::from_broker(config, broker)
	}

	/// Creates a client around an existing broker, applying the broker settings of `config`.
	///
	/// The broker keeps its own token source and clock.
	pub fn from_broker(
		config: ClientConfig,
		broker: TokenBroker<C, M>,
	) -> Result<Self, ConfigError> {
		let broker = Arc::new(broker.with_config(config.broker));
		let transport = Arc::new(
			AuthenticatedTransport::new(broker)
				.with_retry_policy(config.retry)
				.with_request_timeout(config.request_timeout),
		);
		let walker = PageWalker::new(transport.clone()).with_config(config.pager)?;

		Ok(Self { config, transport, walker })
	}

	/// Active configuration.
	pub fn config(&self) -> &ClientConfig {
		&self.config
	}

	/// Token broker shared by every call of this client.
	pub fn broker(&self) -> &Arc<TokenBroker<C, M>> {
		self.transport.broker()
	}

	/// Authenticated transport used for single calls.
	pub fn transport(&self) -> &Arc<AuthenticatedTransport<C, M>> {
		&self.transport
	}

	/// Page walker used for traversals.
	pub fn walker(&self) -> &PageWalker<C, M> {
		&self.walker
	}

	/// Resolves `path` beneath the API base URL. Absolute URLs are returned as-is.
	pub fn endpoint(&self, path: &str) -> Result<Url> {
		let relative = path.trim_start_matches('/');

		self.config
			.api_base
			.join(relative)
			.map_err(|source| ConfigError::invalid_url(path, source).into())
	}

	/// GETs a single resource and decodes its JSON body.
	pub async fn get<T>(&self, path: &str, params: QueryParams) -> Result<T>
	where
		T: DeserializeOwned,
	{
		let url = self.endpoint(path)?;
		let mut merged = QueryParams::from_url(&url);

		merged.merge_override(params);

		let response = self.transport.get(merged.apply_to(&url)).await?;

		response.json().map_err(|source| Error::Decode { source })
	}

	/// Describes a traversal of the collection at `path`.
	pub fn traversal(&self, path: &str, params: QueryParams) -> Result<TraversalRequest> {
		Ok(TraversalRequest::new(self.endpoint(path)?, params))
	}

	/// Collects every item of the collection at `path`.
	pub async fn fetch_all<T>(&self, path: &str, params: QueryParams) -> Result<Vec<T>>
	where
		T: DeserializeOwned,
	{
		self.walker.fetch_all(self.traversal(path, params)?).await
	}

	/// Hands each raw page of the collection at `path` to `handler`.
	pub async fn for_each_page<F, E>(
		&self,
		path: &str,
		params: QueryParams,
		handler: F,
	) -> Result<TraversalSummary>
	where
		F: Send + FnMut(&[u8]) -> Result<(), E>,
		E: Into<BoxError>,
	{
		self.walker.for_each_page(self.traversal(path, params)?, handler).await
	}

	/// Starts a lazy traversal of `request`.
	pub fn pages(&self, request: TraversalRequest) -> PageStream<C, M> {
		self.walker.pages(request)
	}
}
#[cfg(feature = "reqwest")]
impl ApiClient<ReqwestHttpClient, ReqwestTransportErrorMapper> {
	/// Creates a client backed by the default reqwest transport.
	pub fn new(config: ClientConfig, signer: CredentialSigner) -> Result<Self, ConfigError> {
		let http_client = ReqwestHttpClient::new()?;

		Self::with_http_client(config, signer, http_client, ReqwestTransportErrorMapper)
	}
}
impl<C, M> Debug for ApiClient<C, M>
where
	C: ?Sized + HttpTransport,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ApiClient")
			.field("config", &self.config)
			.field("transport", &self.transport)
			.finish()
	}
}
