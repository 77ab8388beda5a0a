//! Pull-based page sequence backing every traversal mode.
//!
//! A [`PageStream`] issues the next request only when the caller asks for it. The sequence is
//! finite and not restartable: once it yields `None` or an error it stays exhausted.

// crates.io
use serde::de::{DeserializeOwned, IgnoredAny};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
// self
use crate::{
	_prelude::*,
	error::{ConfigError, TraversalError},
	http::{HttpTransport, TransportErrorMapper},
	obs::{self, CallKind},
	pager::{Page, PageLinks, PageMeta, QueryParams, TraversalRequest},
	transport::AuthenticatedTransport,
};

/// Per-traversal accumulator: the parameters of the next request and progress counters.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PaginationState {
	/// Parameters sent with the next request.
	pub params: QueryParams,
	/// Pages fetched so far.
	pub pages: usize,
	/// Items observed so far.
	pub items: usize,
}

/// Undecoded page handed to callers together with its navigation.
#[derive(Clone, Debug)]
pub struct RawPage {
	/// One-based page index.
	pub number: usize,
	/// URL the page was fetched from.
	pub url: Url,
	/// Raw response body.
	pub body: Vec<u8>,
	/// Navigation links.
	pub links: PageLinks,
	/// Paging metadata.
	pub meta: Option<PageMeta>,
	/// Number of items in `data`.
	pub items: usize,
}
impl RawPage {
	/// Decodes the body into a typed page.
	pub fn decode<T>(&self) -> Result<Page<T>, TraversalError>
	where
		T: DeserializeOwned,
	{
		Page::decode(self.number, &self.body)
	}
}

enum Cursor {
	Next,
	Done,
	Failed(Error),
}

/// Lazy, non-restartable sequence of pages from one traversal.
pub struct PageStream<C, M>
where
	C: ?Sized + HttpTransport,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	transport: Arc<AuthenticatedTransport<C, M>>,
	endpoint: Url,
	max_pages: usize,
	deadline: Option<StdDuration>,
	// Set on the first pull; `None` inside means the budget overflows the clock.
	deadline_at: Option<Option<Instant>>,
	cancellation: CancellationToken,
	state: PaginationState,
	cursor: Cursor,
}
impl<C, M> PageStream<C, M>
where
	C: ?Sized + HttpTransport,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	pub(crate) fn new(
		transport: Arc<AuthenticatedTransport<C, M>>,
		request: TraversalRequest,
		max_pages: usize,
	) -> Self {
		let TraversalRequest { endpoint, params, deadline, cancellation, .. } = request;
		let cursor = if max_pages == 0 {
			Cursor::Failed(ConfigError::ZeroPageLimit.into())
		} else {
			Cursor::Next
		};

		Self {
			transport,
			endpoint,
			max_pages,
			deadline,
			deadline_at: None,
			cancellation: cancellation.unwrap_or_else(CancellationToken::new),
			state: PaginationState { params, ..Default::default() },
			cursor,
		}
	}

	/// Progress so far.
	pub fn state(&self) -> &PaginationState {
		&self.state
	}

	/// Returns `true` once the stream yielded its last item.
	pub fn is_exhausted(&self) -> bool {
		matches!(self.cursor, Cursor::Done)
	}

	/// Fetches the next page without decoding its items.
	pub async fn next_raw(&mut self) -> Option<Result<RawPage>> {
		match std::mem::replace(&mut self.cursor, Cursor::Done) {
			Cursor::Done => None,
			Cursor::Failed(e) => Some(Err(e)),
			Cursor::Next => Some(self.fetch().await),
		}
	}

	/// Fetches and decodes the next page.
	pub async fn next_page<T>(&mut self) -> Option<Result<Page<T>>>
	where
		T: DeserializeOwned,
	{
		let raw = match self.next_raw().await? {
			Ok(raw) => raw,
			Err(e) => return Some(Err(e)),
		};

		match raw.decode() {
			Ok(page) => Some(Ok(page)),
			Err(e) => {
				self.cursor = Cursor::Done;

				Some(Err(e.into()))
			},
		}
	}

	// On success `self.cursor` holds what the following call yields; on failure it stays `Done`.
	async fn fetch(&mut self) -> Result<RawPage> {
		let pages = self.state.pages;

		if pages >= self.max_pages {
			return Err(TraversalError::PageLimitExceeded { limit: self.max_pages }.into());
		}
		if self.cancellation.is_cancelled() {
			return Err(TraversalError::Cancelled { pages }.into());
		}

		let url = self.state.params.apply_to(&self.endpoint);
		let budget = self.deadline;
		let deadline_at = *self
			.deadline_at
			.get_or_insert_with(|| budget.and_then(|budget| Instant::now().checked_add(budget)));
		let expired = async move {
			match deadline_at {
				Some(at) => tokio::time::sleep_until(at).await,
				None => std::future::pending().await,
			}
		};
		let response = tokio::select! {
			biased;
			_ = self.cancellation.cancelled() =>
				Err(Error::from(TraversalError::Cancelled { pages })),
			_ = expired => Err(Error::from(TraversalError::DeadlineExceeded {
				deadline: budget.unwrap_or_default(),
				pages,
			})),
			response = self.transport.get(url.clone()) => response,
		}?;
		let number = pages + 1;
		let navigation = Page::<IgnoredAny>::decode(number, &response.body)?;

		self.state.pages = number;
		self.state.items += navigation.data.len();
		self.cursor = match navigation.links.next_link() {
			None => Cursor::Done,
			Some(next) => match self.endpoint.join(next) {
				Ok(next_url) => {
					self.state.params.merge_override(QueryParams::from_url(&next_url));

					Cursor::Next
				},
				Err(source) => Cursor::Failed(
					TraversalError::MalformedNextLink { link: next.to_owned(), source }.into(),
				),
			},
		};

		obs::debug_event(
			CallKind::Traversal,
			format_args!(
				"Fetched page {number} ({} items, {} total) from {}.",
				navigation.data.len(),
				self.state.items,
				url.path()
			),
		);

		Ok(RawPage {
			number,
			url,
			body: response.body,
			links: navigation.links,
			meta: navigation.meta,
			items: navigation.data.len(),
		})
	}
}
impl<C, M> Debug for PageStream<C, M>
where
	C: ?Sized + HttpTransport,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("PageStream")
			.field("endpoint", &self.endpoint)
			.field("max_pages", &self.max_pages)
			.field("state", &self.state)
			.field("exhausted", &self.is_exhausted())
			.finish()
	}
}
