//! Cursor/link pagination over `{data, links, meta}` collection envelopes.
//!
//! Every traversal GETs the endpoint with the current parameter set, follows `links.next` until
//! it is absent or blank, and merges the query parameters of each `next` link into the set it
//! carries forward (next-link values win). The walk is bounded by a page cap.
//!
//! Three consumption modes share one engine ([`PageStream`]):
//!
//! - [`PageWalker::fetch_all`] accumulates every item. It is all-or-nothing: any failure discards
//!   what was accumulated.
//! - [`PageWalker::for_each_page`] hands each raw page body to a handler. Pages already handed
//!   over stay delivered when a later page fails.
//! - [`PageWalker::pages`] returns the lazy stream itself.

pub mod page;
pub mod params;
pub mod stream;

pub use page::*;
pub use params::*;
pub use stream::*;

// crates.io
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;
// self
use crate::{
	_prelude::*,
	error::{BoxError, ConfigError},
	http::{HttpTransport, TransportErrorMapper},
	obs::{self, CallKind, CallOutcome, CallSpan},
	transport::AuthenticatedTransport,
};

/// Query parameter that carries the page size.
pub const PAGE_SIZE_PARAM: &str = "limit";

/// Walker-wide pagination defaults.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PagerConfig {
	/// Maximum pages per traversal.
	pub max_pages: usize,
	/// Page size sent as `limit` when the caller did not set one.
	pub page_size: Option<u32>,
}
impl PagerConfig {
	/// Default page cap.
	pub const DEFAULT_MAX_PAGES: usize = 1_000;

	/// Overrides the page cap.
	pub fn with_max_pages(mut self, max_pages: usize) -> Self {
		self.max_pages = max_pages;

		self
	}

	/// Sets the default page size.
	pub fn with_page_size(mut self, page_size: u32) -> Self {
		self.page_size = Some(page_size);

		self
	}

	/// Rejects a zero page cap.
	pub fn validate(&self) -> Result<(), ConfigError> {
		if self.max_pages == 0 {
			return Err(ConfigError::ZeroPageLimit);
		}

		Ok(())
	}
}
impl Default for PagerConfig {
	fn default() -> Self {
		Self { max_pages: Self::DEFAULT_MAX_PAGES, page_size: None }
	}
}

/// One collection traversal: endpoint, initial parameters, and per-call limits.
#[derive(Clone, Debug)]
pub struct TraversalRequest {
	/// Collection endpoint; its own query string seeds the parameter set.
	pub endpoint: Url,
	/// Initial parameters.
	pub params: QueryParams,
	/// Page cap overriding the walker default.
	pub max_pages: Option<usize>,
	/// End-to-end budget for the whole traversal.
	pub deadline: Option<StdDuration>,
	/// Cancellation signal.
	pub cancellation: Option<CancellationToken>,
}
impl TraversalRequest {
	/// Creates a traversal of `endpoint`; `params` override same-named parameters embedded in
	/// the endpoint URL.
	pub fn new(endpoint: Url, params: QueryParams) -> Self {
		let mut seeded = QueryParams::from_url(&endpoint);
		let mut endpoint = endpoint;

		endpoint.set_query(None);
		seeded.merge_override(params);

		Self { endpoint, params: seeded, max_pages: None, deadline: None, cancellation: None }
	}

	/// Overrides the page cap for this traversal.
	pub fn with_max_pages(mut self, max_pages: usize) -> Self {
		self.max_pages = Some(max_pages);

		self
	}

	/// Bounds the whole traversal, measured from the first page request.
	pub fn with_deadline(mut self, deadline: StdDuration) -> Self {
		self.deadline = Some(deadline);

		self
	}

	/// Attaches a cancellation token.
	pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
		self.cancellation = Some(token);

		self
	}
}

/// Totals reported by [`PageWalker::for_each_page`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TraversalSummary {
	/// Pages handed to the handler.
	pub pages: usize,
	/// Items across those pages.
	pub items: usize,
}

/// Drives paginated traversals through an [`AuthenticatedTransport`].
///
/// Walkers hold no per-traversal state, so one walker serves any number of concurrent
/// traversals that share only the broker's token cache.
pub struct PageWalker<C, M>
where
	C: ?Sized + HttpTransport,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	transport: Arc<AuthenticatedTransport<C, M>>,
	config: PagerConfig,
}
impl<C, M> PageWalker<C, M>
where
	C: ?Sized + HttpTransport,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Creates a walker with default limits.
	pub fn new(transport: Arc<AuthenticatedTransport<C, M>>) -> Self {
		Self { transport, config: PagerConfig::default() }
	}

	/// Replaces the walker limits.
	pub fn with_config(mut self, config: PagerConfig) -> Result<Self, ConfigError> {
		config.validate()?;

		self.config = config;

		Ok(self)
	}

	/// Active limits.
	pub fn config(&self) -> &PagerConfig {
		&self.config
	}

	/// Transport used for page requests.
	pub fn transport(&self) -> &Arc<AuthenticatedTransport<C, M>> {
		&self.transport
	}

	/// Starts a lazy traversal; no request is issued until the first pull.
	pub fn pages(&self, request: TraversalRequest) -> PageStream<C, M> {
		let max_pages = request.max_pages.unwrap_or(self.config.max_pages);
		let mut request = request;

		if let Some(size) =
			self.config.page_size.filter(|_| !request.params.contains_key(PAGE_SIZE_PARAM))
		{
			request.params.insert(PAGE_SIZE_PARAM, size.to_string());
		}

		PageStream::new(self.transport.clone(), request, max_pages)
	}

	/// Collects every item of every page in server order.
	///
	/// Any failure aborts the traversal and discards the items collected so far.
	pub async fn fetch_all<T>(&self, request: TraversalRequest) -> Result<Vec<T>>
	where
		T: DeserializeOwned,
	{
		const KIND: CallKind = CallKind::Traversal;

		let span = CallSpan::new(KIND, "fetch_all");

		obs::record_call_outcome(KIND, CallOutcome::Attempt);

		let mut stream = self.pages(request);
		let result: Result<Vec<T>> = span
			.instrument(async {
				let mut items = Vec::new();

				while let Some(page) = stream.next_page::<T>().await {
					items.extend(page?.data);
				}

				Ok(items)
			})
			.await;

		obs::record_call_result(KIND, &result);

		if let Err(e) = &result {
			obs::warn_event(
				KIND,
				format_args!("Traversal aborted after {} pages: {e}.", stream.state().pages),
			);
		}

		result
	}

	/// Invokes `handler` with each raw page body in order.
	///
	/// A handler error aborts the traversal with [`Error::Handler`]; pages already handled are
	/// not revisited.
	pub async fn for_each_page<F, E>(
		&self,
		request: TraversalRequest,
		mut handler: F,
	) -> Result<TraversalSummary>
	where
		F: Send + FnMut(&[u8]) -> Result<(), E>,
		E: Into<BoxError>,
	{
		const KIND: CallKind = CallKind::Traversal;

		let span = CallSpan::new(KIND, "for_each_page");

		obs::record_call_outcome(KIND, CallOutcome::Attempt);

		let mut stream = self.pages(request);
		let result: Result<TraversalSummary> = span
			.instrument(async {
				let mut summary = TraversalSummary::default();

				while let Some(page) = stream.next_raw().await {
					let page = page?;

					handler(&page.body).map_err(Error::handler)?;

					summary.pages += 1;
					summary.items += page.items;
				}

				Ok(summary)
			})
			.await;

		obs::record_call_result(KIND, &result);

		result
	}
}
impl<C, M> Debug for PageWalker<C, M>
where
	C: ?Sized + HttpTransport,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("PageWalker").field("config", &self.config).finish()
	}
}
