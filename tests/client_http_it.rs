#![cfg(feature = "reqwest")]

// crates.io
use httpmock::prelude::*;
use serde::Deserialize;
// self
use oauth2_walker::{
	auth::{AssertionProfile, Credential, CredentialSigner, IssuerId, KeyId, PrivateKey},
	client::{ClientConfig, ReqwestApiClient},
	http::{ReqwestHttpClient, ReqwestTransportErrorMapper},
	pager::QueryParams,
	reqwest::{Client, redirect::Policy},
	url::Url,
};

const EC_PEM: &str = include_str!("fixtures/ec_private.pem");

#[derive(Debug, Deserialize, PartialEq, Eq)]
struct App {
	id: String,
}

fn build_client(server: &MockServer) -> ReqwestApiClient {
	let token_endpoint =
		Url::parse(&server.url("/token")).expect("Mock token endpoint should parse successfully.");
	let config = ClientConfig::builder()
		.api_base(Url::parse(&server.url("/v1")).expect("Mock API base should parse successfully."))
		.token_endpoint(token_endpoint.clone())
		.build()
		.expect("Loopback configuration should build successfully.");
	let credential = Credential::new(
		KeyId::new("KEY123").expect("Key identifier should be valid for HTTP tests."),
		IssuerId::new("team-9").expect("Issuer should be valid for HTTP tests."),
		PrivateKey::ecdsa_pem(EC_PEM).expect("EC fixture should parse for HTTP tests."),
		token_endpoint.as_str(),
	);
	let signer = CredentialSigner::new(credential, AssertionProfile::ClientAssertion);

	// The mock server presents a self-signed certificate.
	let http_client = ReqwestHttpClient::with_client(
		Client::builder()
			.danger_accept_invalid_certs(true)
			.danger_accept_invalid_hostnames(true)
			.redirect(Policy::none())
			.build()
			.expect("Reqwest client should build successfully."),
	);

	ReqwestApiClient::with_http_client(config, signer, http_client, ReqwestTransportErrorMapper)
		.expect("API client should build successfully.")
}

#[tokio::test]
async fn reqwest_stack_exchanges_once_and_walks_every_page() {
	let server = MockServer::start_async().await;
	let client = build_client(&server);
	let token_mock = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/token")
				.header("content-type", "application/x-www-form-urlencoded");
			then.status(200)
				.header("content-type", "application/json")
				.body(r#"{"access_token":"live-token","token_type":"Bearer","expires_in":1200}"#);
		})
		.await;
	let next = server.url("/v1/apps?cursor=p2&limit=3");
	let first_page = server
		.mock_async(|when, then| {
			when.method(GET)
				.path("/v1/apps")
				.query_param("limit", "2")
				.header("authorization", "Bearer live-token");
			then.status(200)
				.header("content-type", "application/json")
				.body(format!(
					r#"{{"data":[{{"id":"a"}},{{"id":"b"}}],"links":{{"next":"{next}"}}}}"#
				));
		})
		.await;
	let second_page = server
		.mock_async(|when, then| {
			when.method(GET)
				.path("/v1/apps")
				.query_param("cursor", "p2")
				.query_param("limit", "3")
				.header("authorization", "Bearer live-token");
			then.status(200)
				.header("content-type", "application/json")
				.body(r#"{"data":[{"id":"c"}],"links":{}}"#);
		})
		.await;
	let apps = client
		.fetch_all::<App>("apps", QueryParams::new().with("limit", "2"))
		.await
		.expect("Traversal over the reqwest stack should succeed.");

	assert_eq!(apps.iter().map(|app| app.id.as_str()).collect::<Vec<_>>(), ["a", "b", "c"]);

	token_mock.assert_calls_async(1).await;
	first_page.assert_calls_async(1).await;
	second_page.assert_calls_async(1).await;
}

#[tokio::test]
async fn reqwest_stack_surfaces_token_endpoint_rejections() {
	let server = MockServer::start_async().await;
	let client = build_client(&server);
	let token_mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/token");
			then.status(400)
				.header("content-type", "application/json")
				.body(r#"{"error":"invalid_client"}"#);
		})
		.await;
	let err = client
		.get::<App>("apps/1", QueryParams::new())
		.await
		.expect_err("Rejected credentials must fail the call.");

	assert_eq!(err.status(), Some(400));
	assert!(!err.is_transient());

	token_mock.assert_calls_async(1).await;
}
