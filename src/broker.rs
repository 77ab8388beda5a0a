//! Bearer token broker with a single cached slot and double-checked refresh.
//!
//! [`TokenBroker::get_token`] serves the cached token under a shared read lock while it stays
//! outside the skew window. Stale callers queue on the exclusive write lock; the first one to
//! acquire it refreshes, and the rest re-check under the lock and reuse the fresh value, so a
//! stampede of K concurrent callers produces exactly one exchange.
//!
//! The broker performs no retries. Transient exchange failures surface as [`AuthError`] values
//! whose [`is_transient`](AuthError::is_transient) flag lets the caller's retry policy decide.

pub mod exchange;
/// Exchange counters kept per broker.
pub mod metrics;

pub use metrics::*;

// self
use crate::{
	_prelude::*,
	auth::{CachedToken, CredentialSigner, TokenSecret},
	clock::{Clock, SystemClock},
	error::{AuthError, ConfigError, TransportError},
	http::{HttpTransport, TransportErrorMapper},
	obs::{self, CallKind, CallOutcome, CallSpan},
};
#[cfg(feature = "reqwest")]
use crate::http::{ReqwestHttpClient, ReqwestTransportErrorMapper};

/// Logical target label used in transport errors raised by the exchange.
pub const TOKEN_ENDPOINT_TARGET: &str = "token endpoint";

#[cfg(feature = "reqwest")]
/// Broker specialized for the crate's default reqwest transport stack.
pub type ReqwestTokenBroker = TokenBroker<ReqwestHttpClient, ReqwestTransportErrorMapper>;

/// Where bearer tokens come from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TokenSource {
	/// Exchange a client assertion at an OAuth2 token endpoint (`client_credentials` grant).
	Exchange {
		/// Token endpoint URL.
		token_endpoint: Url,
	},
	/// Present the signed assertion itself as the bearer token.
	SelfSigned,
}

/// Tunables for token caching and exchange calls.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BrokerConfig {
	/// Safety margin subtracted from the expiry before a proactive refresh.
	pub skew: Duration,
	/// Per-call timeout for the token endpoint request.
	pub exchange_timeout: StdDuration,
}
impl BrokerConfig {
	/// Default skew window.
	pub const DEFAULT_SKEW: Duration = Duration::seconds(60);
	/// Default exchange timeout.
	pub const DEFAULT_EXCHANGE_TIMEOUT: StdDuration = StdDuration::from_secs(30);

	/// Overrides the skew window; negative values clamp to zero.
	pub fn with_skew(mut self, skew: Duration) -> Self {
		self.skew = if skew.is_negative() { Duration::ZERO } else { skew };

		self
	}

	/// Overrides the exchange timeout.
	pub fn with_exchange_timeout(mut self, timeout: StdDuration) -> Self {
		self.exchange_timeout = timeout;

		self
	}
}
impl Default for BrokerConfig {
	fn default() -> Self {
		Self { skew: Self::DEFAULT_SKEW, exchange_timeout: Self::DEFAULT_EXCHANGE_TIMEOUT }
	}
}

/// Owns the cached bearer token for one credential and refreshes it on demand.
///
/// Each broker owns its cache; share one broker (behind `Arc`) between every caller that should
/// reuse the same token.
pub struct TokenBroker<C, M>
where
	C: ?Sized + HttpTransport,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	signer: CredentialSigner,
	source: TokenSource,
	config: BrokerConfig,
	http_client: Arc<C>,
	transport_mapper: Arc<M>,
	clock: Arc<dyn Clock>,
	cached: AsyncRwLock<Option<CachedToken>>,
	metrics: Arc<ExchangeMetrics>,
}
impl<C, M> TokenBroker<C, M>
where
	C: ?Sized + HttpTransport,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Creates a broker that reuses the caller-provided transport + mapper pair.
	pub fn with_http_client(
		signer: CredentialSigner,
		source: TokenSource,
		http_client: impl Into<Arc<C>>,
		mapper: impl Into<Arc<M>>,
	) -> Self {
		Self {
			signer,
			source,
			config: BrokerConfig::default(),
			http_client: http_client.into(),
			transport_mapper: mapper.into(),
			clock: Arc::new(SystemClock),
			cached: AsyncRwLock::new(None),
			metrics: Default::default(),
		}
	}

	/// Replaces the broker configuration.
	pub fn with_config(mut self, config: BrokerConfig) -> Self {
		self.config = config.with_skew(config.skew);

		self
	}

	/// Replaces the clock used for expiry checks. The signer keeps its own clock.
	pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
		self.clock = clock;

		self
	}

	/// Active configuration.
	pub fn config(&self) -> &BrokerConfig {
		&self.config
	}

	/// Token source.
	pub fn source(&self) -> &TokenSource {
		&self.source
	}

	/// Signer used to mint client assertions.
	pub fn signer(&self) -> &CredentialSigner {
		&self.signer
	}

	/// HTTP transport shared with the resource calls.
	pub fn http_client(&self) -> &Arc<C> {
		&self.http_client
	}

	/// Mapper shared with the resource calls.
	pub fn transport_mapper(&self) -> &Arc<M> {
		&self.transport_mapper
	}

	/// Shared exchange counters.
	pub fn metrics(&self) -> Arc<ExchangeMetrics> {
		self.metrics.clone()
	}

	/// Snapshot of the cached token, if any.
	pub async fn cached(&self) -> Option<CachedToken> {
		self.cached.read().await.clone()
	}

	/// Returns a bearer token, refreshing it when absent or inside the skew window.
	pub async fn get_token(&self) -> Result<TokenSecret> {
		const KIND: CallKind = CallKind::TokenExchange;

		{
			let cached = self.cached.read().await;

			if let Some(token) = self.reusable(cached.as_ref()) {
				self.metrics.record_cache_hit();

				return Ok(token);
			}
		}

		let span = CallSpan::new(KIND, "get_token");
		let mut cached = span.instrument(self.cached.write()).await;

		if let Some(token) = self.reusable(cached.as_ref()) {
			self.metrics.record_cache_hit();

			return Ok(token);
		}

		obs::record_call_outcome(KIND, CallOutcome::Attempt);
		self.metrics.record_attempt();

		let result = span.instrument(self.fetch_token()).await;

		obs::record_call_result(KIND, &result);

		match result {
			Ok(token) => {
				self.metrics.record_success();
				obs::debug_event(
					KIND,
					format_args!("Stored a new access token expiring at {}.", token.expires_at),
				);

				let secret = token.access_token.clone();

				*cached = Some(token);

				Ok(secret)
			},
			Err(e) => {
				self.metrics.record_failure();
				obs::warn_event(KIND, format_args!("Token acquisition failed: {e}."));

				Err(e)
			},
		}
	}

	/// Clears the cached token so the next [`get_token`](Self::get_token) performs an exchange.
	///
	/// Takes the same exclusive lock as a refresh, so an in-flight refresh completes first and
	/// its result is discarded.
	pub async fn force_invalidate(&self) {
		let mut cached = self.cached.write().await;

		*cached = None;

		self.metrics.record_invalidation();
		obs::debug_event(CallKind::TokenExchange, "Cached access token invalidated.");
	}

	/// Clears the cached token only while it is still `rejected`.
	///
	/// Returns `false` when another caller already replaced it, so concurrent 401s on one stale
	/// token invalidate it once.
	pub async fn invalidate_if(&self, rejected: &TokenSecret) -> bool {
		let mut cached = self.cached.write().await;

		match cached.as_ref() {
			Some(token) if token.access_token == *rejected => {
				*cached = None;

				self.metrics.record_invalidation();
				obs::debug_event(CallKind::TokenExchange, "Rejected access token invalidated.");

				true
			},
			_ => false,
		}
	}

	fn reusable(&self, cached: Option<&CachedToken>) -> Option<TokenSecret> {
		let token = cached?;

		if token.is_fresh_at(self.clock.now_utc(), self.config.skew) {
			Some(token.access_token.clone())
		} else {
			None
		}
	}

	async fn fetch_token(&self) -> Result<CachedToken> {
		let assertion = self.signer.sign().map_err(AuthError::from)?;
		let token_endpoint = match &self.source {
			TokenSource::SelfSigned =>
				return Ok(CachedToken {
					access_token: assertion.token,
					token_type: Some("Bearer".into()),
					scope: None,
					issued_at: assertion.issued_at,
					expires_at: assertion.expires_at,
				}),
			TokenSource::Exchange { token_endpoint } => token_endpoint,
		};
		let request =
			exchange::build_request(token_endpoint, self.signer.credential(), &assertion)?;
		let timeout = self.config.exchange_timeout;
		let response = match tokio::time::timeout(timeout, self.http_client.execute(request)).await
		{
			Ok(Ok(response)) => response,
			Ok(Err(e)) =>
				return Err(
					match self.transport_mapper.map_transport_error(TOKEN_ENDPOINT_TARGET, e) {
						Error::Transport(inner) => AuthError::TransportFailure(inner).into(),
						other => other,
					},
				),
			Err(_) =>
				return Err(AuthError::TransportFailure(TransportError::Timeout {
					target: TOKEN_ENDPOINT_TARGET,
					timeout,
				})
				.into()),
		};

		exchange::parse_response(&response, self.clock.now_utc()).map_err(Error::from)
	}
}
#[cfg(feature = "reqwest")]
impl TokenBroker<ReqwestHttpClient, ReqwestTransportErrorMapper> {
	/// Creates a broker backed by the default reqwest transport.
	pub fn new(signer: CredentialSigner, source: TokenSource) -> Result<Self, ConfigError> {
		Ok(Self::with_http_client(
			signer,
			source,
			ReqwestHttpClient::new()?,
			ReqwestTransportErrorMapper,
		))
	}
}
impl<C, M> Debug for TokenBroker<C, M>
where
	C: ?Sized + HttpTransport,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenBroker")
			.field("signer", &self.signer)
			.field("source", &self.source)
			.field("config", &self.config)
			.finish()
	}
}
