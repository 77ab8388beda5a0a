mod support;

// std
use std::{sync::Arc, time::Duration as StdDuration};
// crates.io
use time::{Duration, macros};
// self
use oauth2_walker::{
	broker::{BrokerConfig, TokenBroker, TokenSource},
	clock::ManualClock,
	error::{AuthError, Error, TransportError},
	http::GenericTransportErrorMapper,
};
use support::*;

type TestBroker = TokenBroker<ScriptedTransport, GenericTransportErrorMapper>;

fn broker(transport: &Arc<ScriptedTransport>, clock: &ManualClock) -> TestBroker {
	TestBroker::with_http_client(
		signer(Some(Arc::new(clock.clone()))),
		TokenSource::Exchange { token_endpoint: url(TOKEN_ENDPOINT) },
		transport.clone(),
		GenericTransportErrorMapper,
	)
	.with_clock(Arc::new(clock.clone()))
}

#[tokio::test]
async fn repeated_calls_within_lifetime_exchange_once() {
	let transport = ScriptedTransport::new();
	let clock = ManualClock::new(macros::datetime!(2025-03-01 12:00 UTC));
	let broker = broker(&transport, &clock);

	for _ in 0..5 {
		assert_eq!(broker.get_token().await.expect("Token should be served.").expose(), "tok1");
	}

	assert_eq!(transport.exchanges(), 1);

	let exchange = &transport.requests_to(TOKEN_PATH)[0];

	assert_eq!(exchange.method, "POST");
	assert!(exchange.body.contains("grant_type=client_credentials"));
	assert!(exchange.body.contains(
		"client_assertion_type=urn%3Aietf%3Aparams%3Aoauth%3Aclient-assertion-type%3Ajwt-bearer"
	));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_callers_share_one_exchange() {
	let transport = ScriptedTransport::new();
	let clock = ManualClock::new(macros::datetime!(2025-03-01 12:00 UTC));
	let broker = Arc::new(broker(&transport, &clock));

	transport.set_token_delay(StdDuration::from_millis(50));

	let handles = (0..16)
		.map(|_| {
			let broker = broker.clone();

			tokio::spawn(async move { broker.get_token().await })
		})
		.collect::<Vec<_>>();
	let mut tokens = Vec::new();

	for handle in handles {
		let token = handle.await.expect("Task should not panic.").expect("Token should be served.");

		tokens.push(token.expose().to_owned());
	}

	assert_eq!(transport.exchanges(), 1);
	assert!(tokens.iter().all(|token| token == "tok1"));
	assert_eq!(broker.metrics().attempts(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn tokens_shorter_than_the_skew_still_share_one_exchange() {
	let transport = ScriptedTransport::new();
	let clock = ManualClock::new(macros::datetime!(2025-03-01 12:00 UTC));
	let broker = Arc::new(broker(&transport, &clock));

	transport.set_token_lifetime(30);
	transport.set_token_delay(StdDuration::from_millis(50));

	let handles = (0..8)
		.map(|_| {
			let broker = broker.clone();

			tokio::spawn(async move { broker.get_token().await })
		})
		.collect::<Vec<_>>();

	for handle in handles {
		let token = handle.await.expect("Task should not panic.").expect("Token should be served.");

		assert_eq!(token.expose(), "tok1");
	}

	assert_eq!(transport.exchanges(), 1);

	clock.advance(Duration::seconds(14));

	assert_eq!(broker.get_token().await.expect("Token should be reused.").expose(), "tok1");

	clock.advance(Duration::seconds(1));

	assert_eq!(broker.get_token().await.expect("Token should refresh.").expose(), "tok2");
	assert_eq!(transport.exchanges(), 2);
}

#[tokio::test]
async fn token_is_reused_until_the_skew_adjusted_expiry() {
	let transport = ScriptedTransport::new();
	let clock = ManualClock::new(macros::datetime!(2025-03-01 12:00 UTC));
	let broker = broker(&transport, &clock)
		.with_config(BrokerConfig::default().with_skew(Duration::ZERO));

	assert_eq!(broker.get_token().await.expect("First token").expose(), "tok1");

	clock.advance(Duration::seconds(1_199));

	assert_eq!(broker.get_token().await.expect("Cached token").expose(), "tok1");
	assert_eq!(transport.exchanges(), 1);

	clock.advance(Duration::seconds(1));

	assert_eq!(broker.get_token().await.expect("Refreshed token").expose(), "tok2");
	assert_eq!(broker.get_token().await.expect("Cached refreshed token").expose(), "tok2");
	assert_eq!(transport.exchanges(), 2);
}

#[tokio::test]
async fn default_skew_refreshes_a_minute_early() {
	let transport = ScriptedTransport::new();
	let clock = ManualClock::new(macros::datetime!(2025-03-01 12:00 UTC));
	let broker = broker(&transport, &clock);

	broker.get_token().await.expect("First token");
	clock.advance(Duration::seconds(1_139));
	broker.get_token().await.expect("Cached token");

	assert_eq!(transport.exchanges(), 1);

	clock.advance(Duration::seconds(1));

	assert_eq!(broker.get_token().await.expect("Refreshed token").expose(), "tok2");
	assert_eq!(transport.exchanges(), 2);
}

#[tokio::test]
async fn force_invalidate_always_triggers_a_fresh_exchange() {
	let transport = ScriptedTransport::new();
	let clock = ManualClock::new(macros::datetime!(2025-03-01 12:00 UTC));
	let broker = broker(&transport, &clock);

	broker.get_token().await.expect("First token");
	broker.force_invalidate().await;

	assert_eq!(broker.get_token().await.expect("Fresh token").expose(), "tok2");
	assert_eq!(transport.exchanges(), 2);
	assert_eq!(broker.metrics().invalidations(), 1);
}

#[tokio::test]
async fn stale_rejections_do_not_evict_a_replacement_token() {
	let transport = ScriptedTransport::new();
	let clock = ManualClock::new(macros::datetime!(2025-03-01 12:00 UTC));
	let broker = broker(&transport, &clock);
	let rejected = broker.get_token().await.expect("First token");

	assert!(broker.invalidate_if(&rejected).await);
	assert_eq!(broker.get_token().await.expect("Fresh token").expose(), "tok2");
	assert!(!broker.invalidate_if(&rejected).await);
	assert_eq!(broker.get_token().await.expect("Kept token").expose(), "tok2");
	assert_eq!(transport.exchanges(), 2);
	assert_eq!(broker.metrics().invalidations(), 1);
}

#[tokio::test]
async fn exchange_failures_are_classified() {
	let transport = ScriptedTransport::new();
	let clock = ManualClock::new(macros::datetime!(2025-03-01 12:00 UTC));
	let broker = broker(&transport, &clock);

	transport.queue_token(Reply::json(
		400,
		r#"{"error":"invalid_client","error_description":"Unknown key."}"#,
	));

	match broker.get_token().await {
		Err(Error::Auth(AuthError::ExchangeFailed { status: 400, oauth_error, body, .. })) => {
			assert_eq!(oauth_error.as_deref(), Some("invalid_client"));
			assert!(body.contains("Unknown key."));
		},
		other => panic!("Unexpected result: {other:?}."),
	}

	transport.queue_token(Reply::json(503, "maintenance").with_header("retry-after", "3"));

	let err = broker.get_token().await.expect_err("A 503 exchange should fail.");

	assert!(err.is_transient());
	assert!(matches!(
		&err,
		Error::Auth(AuthError::ExchangeFailed { status: 503, retry_after: Some(delay), .. })
			if *delay == StdDuration::from_secs(3)
	));

	transport.queue_token(Reply::json(200, r#"{"access_token":"tok","expires_in":0}"#));

	assert!(matches!(
		broker.get_token().await,
		Err(Error::Auth(AuthError::InvalidExpiresIn { value: 0 }))
	));

	transport.queue_token(Reply::json(200, r#"{"token":"missing"}"#));

	assert!(matches!(
		broker.get_token().await,
		Err(Error::Auth(AuthError::MalformedTokenResponse { status: 200, .. }))
	));

	transport.queue_token(Reply::Reset);

	let err = broker.get_token().await.expect_err("A reset connection should fail.");

	assert!(err.is_transient());
	assert!(matches!(err, Error::Auth(AuthError::TransportFailure(TransportError::Io(_)))));
	assert!(broker.cached().await.is_none());
	assert_eq!(broker.metrics().failures(), 5);
}

#[tokio::test]
async fn slow_token_endpoint_times_out() {
	let transport = ScriptedTransport::new();
	let clock = ManualClock::new(macros::datetime!(2025-03-01 12:00 UTC));
	let broker = broker(&transport, &clock)
		.with_config(BrokerConfig::default().with_exchange_timeout(StdDuration::from_millis(20)));

	transport.set_token_delay(StdDuration::from_millis(500));

	let err = broker.get_token().await.expect_err("Exchange should time out.");

	assert!(matches!(
		err,
		Error::Auth(AuthError::TransportFailure(TransportError::Timeout { .. }))
	));
	assert!(err.is_transient());
}
