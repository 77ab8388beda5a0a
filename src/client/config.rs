// std
use std::net::IpAddr;
// crates.io
use url::Host;
// self
use crate::{
	_prelude::*,
	broker::{BrokerConfig, TokenSource},
	error::ConfigError,
	pager::PagerConfig,
	transport::{DEFAULT_REQUEST_TIMEOUT, RetryPolicy},
};

/// Validated settings shared by the broker, transport, and page walker of one client.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClientConfig {
	/// API base URL; always ends with `/` so relative paths join beneath it.
	pub api_base: Url,
	/// Where bearer tokens come from.
	pub token_source: TokenSource,
	/// Token cache tunables.
	pub broker: BrokerConfig,
	/// Transient retry policy for resource calls.
	pub retry: RetryPolicy,
	/// Per-call timeout for resource calls.
	pub request_timeout: StdDuration,
	/// Pagination defaults.
	pub pager: PagerConfig,
}
impl ClientConfig {
	/// Starts a builder.
	pub fn builder() -> ClientConfigBuilder {
		ClientConfigBuilder::default()
	}
}

/// Builder for [`ClientConfig`] values.
#[derive(Clone, Debug, Default)]
pub struct ClientConfigBuilder {
	/// API base URL.
	pub api_base: Option<Url>,
	/// Token source; exchange mode requires a token endpoint.
	pub token_source: Option<TokenSource>,
	/// Token cache tunables.
	pub broker: BrokerConfig,
	/// Retry policy, defaulting to [`RetryPolicy::default`].
	pub retry: Option<RetryPolicy>,
	/// Per-call timeout, defaulting to 30 seconds.
	pub request_timeout: Option<StdDuration>,
	/// Pagination defaults.
	pub pager: PagerConfig,
}
impl ClientConfigBuilder {
	/// Sets the API base URL.
	pub fn api_base(mut self, url: Url) -> Self {
		self.api_base = Some(url);

		self
	}

	/// Exchanges client assertions at `url`.
	pub fn token_endpoint(mut self, url: Url) -> Self {
		self.token_source = Some(TokenSource::Exchange { token_endpoint: url });

		self
	}

	/// Uses the signed assertion itself as the bearer token.
	pub fn self_signed(mut self) -> Self {
		self.token_source = Some(TokenSource::SelfSigned);

		self
	}

	/// Sets the refresh skew window; negative values clamp to zero.
	pub fn skew(mut self, skew: Duration) -> Self {
		self.broker = self.broker.with_skew(skew);

		self
	}

	/// Sets the token endpoint timeout.
	pub fn exchange_timeout(mut self, timeout: StdDuration) -> Self {
		self.broker = self.broker.with_exchange_timeout(timeout);

		self
	}

	/// Sets the retry policy for resource calls.
	pub fn retry(mut self, retry: RetryPolicy) -> Self {
		self.retry = Some(retry);

		self
	}

	/// Sets the per-call timeout for resource calls.
	pub fn request_timeout(mut self, timeout: StdDuration) -> Self {
		self.request_timeout = Some(timeout);

		self
	}

	/// Sets the default page cap.
	pub fn max_pages(mut self, max_pages: usize) -> Self {
		self.pager = self.pager.with_max_pages(max_pages);

		self
	}

	/// Sets the default page size.
	pub fn page_size(mut self, page_size: u32) -> Self {
		self.pager = self.pager.with_page_size(page_size);

		self
	}

	/// Consumes the builder and validates the resulting configuration.
	pub fn build(self) -> Result<ClientConfig, ConfigError> {
		let mut api_base = self.api_base.ok_or(ConfigError::MissingApiBase)?;
		let token_source = self.token_source.ok_or(ConfigError::MissingTokenEndpoint)?;

		validate_endpoint("API", &api_base)?;

		if let TokenSource::Exchange { token_endpoint } = &token_source {
			validate_endpoint("token", token_endpoint)?;
		}

		self.pager.validate()?;

		if !api_base.path().ends_with('/') {
			let path = format!("{}/", api_base.path());

			api_base.set_path(&path);
		}

		Ok(ClientConfig {
			api_base,
			token_source,
			broker: self.broker,
			retry: self.retry.unwrap_or_default(),
			request_timeout: self.request_timeout.unwrap_or(DEFAULT_REQUEST_TIMEOUT),
			pager: self.pager,
		})
	}
}

fn validate_endpoint(name: &'static str, url: &Url) -> Result<(), ConfigError> {
	match url.scheme() {
		"https" => Ok(()),
		"http" if is_loopback(url) => Ok(()),
		_ => Err(ConfigError::InsecureEndpoint { endpoint: name, url: url.to_string() }),
	}
}

fn is_loopback(url: &Url) -> bool {
	match url.host() {
		Some(Host::Domain(domain)) => domain.eq_ignore_ascii_case("localhost"),
		Some(Host::Ipv4(ip)) => IpAddr::V4(ip).is_loopback(),
		Some(Host::Ipv6(ip)) => IpAddr::V6(ip).is_loopback(),
		None => false,
	}
}
