//! Scripted in-memory transport shared by the integration tests.

#![allow(dead_code)]

// std
use std::{
	collections::{HashMap, VecDeque},
	io,
	sync::{
		Arc,
		atomic::{AtomicI64, AtomicUsize, Ordering},
	},
	time::Duration as StdDuration,
};
// crates.io
use oauth2::{
	HttpClientError, HttpRequest, HttpResponse,
	http::{HeaderName, HeaderValue, StatusCode, header::AUTHORIZATION},
};
use parking_lot::Mutex;
// self
use oauth2_walker::{
	auth::{AssertionProfile, Credential, CredentialSigner, IssuerId, KeyId, PrivateKey},
	client::{ApiClient, ClientConfig, ClientConfigBuilder},
	clock::Clock,
	http::{GenericTransportErrorMapper, HttpFuture, HttpTransport},
	transport::{Backoff, RetryPolicy},
	url::Url,
};

pub const EC_PEM: &str = include_str!("../fixtures/ec_private.pem");
pub const API_BASE: &str = "https://api.example.com/v1/";
pub const TOKEN_ENDPOINT: &str = "https://auth.example.com/token";
pub const TOKEN_PATH: &str = "/token";

pub type TestClient = ApiClient<ScriptedTransport, GenericTransportErrorMapper>;

/// Canned answer for one request.
#[derive(Clone, Debug)]
pub enum Reply {
	Respond {
		status: u16,
		headers: Vec<(String, String)>,
		body: String,
		delay: Option<StdDuration>,
	},
	Reset,
}
impl Reply {
	pub fn json(status: u16, body: impl Into<String>) -> Self {
		Self::Respond {
			status,
			headers: vec![("content-type".into(), "application/json".into())],
			body: body.into(),
			delay: None,
		}
	}

	pub fn page(items: &str, next: Option<&str>) -> Self {
		let links = match next {
			Some(next) => format!(r#"{{"self":"{API_BASE}","next":"{next}"}}"#),
			None => format!(r#"{{"self":"{API_BASE}"}}"#),
		};

		Self::json(200, format!(r#"{{"data":{items},"links":{links}}}"#))
	}

	pub fn with_header(mut self, name: &str, value: &str) -> Self {
		if let Self::Respond { headers, .. } = &mut self {
			headers.push((name.into(), value.into()));
		}

		self
	}

	pub fn delayed(mut self, by: StdDuration) -> Self {
		if let Self::Respond { delay, .. } = &mut self {
			*delay = Some(by);
		}

		self
	}
}

/// Request observed by [`ScriptedTransport`].
#[derive(Clone, Debug)]
pub struct Recorded {
	pub method: String,
	pub url: Url,
	pub authorization: Option<String>,
	pub body: String,
}
impl Recorded {
	pub fn query(&self, key: &str) -> Option<String> {
		self.url.query_pairs().find(|(k, _)| k == key).map(|(_, v)| v.into_owned())
	}
}

/// Transport answering from per-path reply queues.
///
/// The last reply of a queue repeats forever. The token path mints `tok1`, `tok2`, ... unless
/// token replies were queued explicitly.
pub struct ScriptedTransport {
	routes: Mutex<HashMap<String, VecDeque<Reply>>>,
	token_replies: Mutex<VecDeque<Reply>>,
	token_delay: Mutex<Option<StdDuration>>,
	token_lifetime: AtomicI64,
	exchanges: AtomicUsize,
	log: Mutex<Vec<Recorded>>,
}
impl ScriptedTransport {
	pub fn new() -> Arc<Self> {
		Arc::new(Self {
			routes: Default::default(),
			token_replies: Default::default(),
			token_delay: Default::default(),
			token_lifetime: AtomicI64::new(1_200),
			exchanges: AtomicUsize::new(0),
			log: Default::default(),
		})
	}

	pub fn route(&self, path: &str, replies: impl IntoIterator<Item = Reply>) {
		self.routes.lock().insert(path.into(), replies.into_iter().collect());
	}

	pub fn queue_token(&self, reply: Reply) {
		self.token_replies.lock().push_back(reply);
	}

	pub fn set_token_delay(&self, delay: StdDuration) {
		*self.token_delay.lock() = Some(delay);
	}

	pub fn set_token_lifetime(&self, seconds: i64) {
		self.token_lifetime.store(seconds, Ordering::SeqCst);
	}

	pub fn exchanges(&self) -> usize {
		self.exchanges.load(Ordering::SeqCst)
	}

	pub fn requests(&self) -> Vec<Recorded> {
		self.log.lock().clone()
	}

	pub fn requests_to(&self, path: &str) -> Vec<Recorded> {
		self.log.lock().iter().filter(|r| r.url.path() == path).cloned().collect()
	}

	fn reply_for(&self, path: &str) -> Reply {
		if path == TOKEN_PATH {
			let call = self.exchanges.fetch_add(1, Ordering::SeqCst) + 1;

			if let Some(reply) = self.token_replies.lock().pop_front() {
				return reply;
			}

			let lifetime = self.token_lifetime.load(Ordering::SeqCst);
			let reply = Reply::json(
				200,
				format!(
					r#"{{"access_token":"tok{call}","token_type":"Bearer","expires_in":{lifetime}}}"#
				),
			);

			return match *self.token_delay.lock() {
				Some(delay) => reply.delayed(delay),
				None => reply,
			};
		}

		let mut routes = self.routes.lock();

		match routes.get_mut(path) {
			Some(queue) if queue.len() > 1 => queue.pop_front().expect("Queue is not empty."),
			Some(queue) if !queue.is_empty() => queue[0].clone(),
			_ => Reply::json(404, r#"{"errors":[{"status":"404","title":"Not Found"}]}"#),
		}
	}
}
impl HttpTransport for ScriptedTransport {
	type TransportError = io::Error;

	fn execute(&self, request: HttpRequest) -> HttpFuture<'_, Self::TransportError> {
		let url = Url::parse(&request.uri().to_string()).expect("Request URI should be a URL.");
		let authorization = request
			.headers()
			.get(AUTHORIZATION)
			.and_then(|value| value.to_str().ok())
			.map(str::to_owned);
		let reply = self.reply_for(url.path());

		self.log.lock().push(Recorded {
			method: request.method().to_string(),
			url,
			authorization,
			body: String::from_utf8_lossy(request.body()).into_owned(),
		});

		Box::pin(async move {
			let (status, headers, body, delay) = match reply {
				Reply::Respond { status, headers, body, delay } => (status, headers, body, delay),
				Reply::Reset =>
					return Err(HttpClientError::Io(io::Error::new(
						io::ErrorKind::ConnectionReset,
						"connection reset by peer",
					))),
			};

			if let Some(delay) = delay {
				tokio::time::sleep(delay).await;
			}

			let mut response = HttpResponse::new(body.into_bytes());

			*response.status_mut() = StatusCode::from_u16(status).expect("Status is valid.");

			for (name, value) in headers {
				response.headers_mut().insert(
					HeaderName::from_bytes(name.as_bytes()).expect("Header name is valid."),
					HeaderValue::from_str(&value).expect("Header value is valid."),
				);
			}

			Ok(response)
		})
	}
}

pub fn url(raw: &str) -> Url {
	Url::parse(raw).expect("URL fixture should parse.")
}

pub fn credential() -> Credential {
	Credential::new(
		KeyId::new("KEY123").expect("Key identifier fixture should be valid."),
		IssuerId::new("team-9").expect("Issuer fixture should be valid."),
		PrivateKey::ecdsa_pem(EC_PEM).expect("EC fixture should parse."),
		TOKEN_ENDPOINT,
	)
}

pub fn signer(clock: Option<Arc<dyn Clock>>) -> CredentialSigner {
	let signer = CredentialSigner::new(credential(), AssertionProfile::ClientAssertion);

	match clock {
		Some(clock) => signer.with_clock(clock),
		None => signer,
	}
}

/// Exchange-mode builder with millisecond backoff so retry tests stay fast.
pub fn builder() -> ClientConfigBuilder {
	ClientConfig::builder()
		.api_base(url(API_BASE))
		.token_endpoint(url(TOKEN_ENDPOINT))
		.retry(RetryPolicy::default().with_backoff(Backoff::Fixed(StdDuration::from_millis(5))))
}

pub fn client(transport: &Arc<ScriptedTransport>) -> TestClient {
	client_with(transport, builder())
}

pub fn client_with(transport: &Arc<ScriptedTransport>, builder: ClientConfigBuilder) -> TestClient {
	TestClient::with_http_client(
		builder.build().expect("Client configuration should build."),
		signer(None),
		transport.clone(),
		GenericTransportErrorMapper,
	)
	.expect("Client should build.")
}
