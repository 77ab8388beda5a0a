//! Walks a two-page collection behind a mock token endpoint with the default reqwest transport,
//! first eagerly with `fetch_all`, then lazily page by page.

// crates.io
use color_eyre::Result;
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

const EC_PEM: &str = include_str!("../tests/fixtures/ec_private.pem");

#[derive(Debug, Deserialize)]
struct Build {
	id: String,
	version: String,
}

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let server = MockServer::start_async().await;
	let token_mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/token");
			then.status(200).header("content-type", "application/json").body(
				"{\"access_token\":\"demo-access\",\"token_type\":\"Bearer\",\"expires_in\":1200}",
			);
		})
		.await;
	let next = server.url("/v1/builds?cursor=second&limit=1");

	server
		.mock_async(|when, then| {
			when.method(GET).path("/v1/builds").query_param("cursor", "second");
			then.status(200).header("content-type", "application/json").body(
				"{\"data\":[{\"id\":\"3\",\"version\":\"1.2.0\"}],\"links\":{}}",
			);
		})
		.await;
	server
		.mock_async(|when, then| {
			when.method(GET).path("/v1/builds").query_param("limit", "2");
			then.status(200).header("content-type", "application/json").body(format!(
				"{{\"data\":[{{\"id\":\"1\",\"version\":\"1.0.0\"}},{{\"id\":\"2\",\"version\":\"1.1.0\"}}],\
				 \"links\":{{\"next\":\"{next}\"}}}}"
			));
		})
		.await;

	let token_endpoint = Url::parse(&server.url("/token"))?;
	let config = ClientConfig::builder()
		.api_base(Url::parse(&server.url("/v1/"))?)
		.token_endpoint(token_endpoint.clone())
		.page_size(2)
		.build()?;
	let credential = Credential::new(
		KeyId::new("DEMO-KEY")?,
		IssuerId::new("demo-team")?,
		PrivateKey::from_pem(EC_PEM)?,
		token_endpoint.as_str(),
	);
	let signer = CredentialSigner::new(credential, AssertionProfile::ClientAssertion);
	// httpmock serves TLS with a self-signed certificate.
	let http_client = ReqwestHttpClient::with_client(
		Client::builder()
			.danger_accept_invalid_certs(true)
			.danger_accept_invalid_hostnames(true)
			.redirect(Policy::none())
			.build()?,
	);
	let client = ReqwestApiClient::with_http_client(
		config,
		signer,
		http_client,
		ReqwestTransportErrorMapper,
	)?;
	let builds = client.fetch_all::<Build>("builds", QueryParams::new()).await?;

	for build in &builds {
		println!("Build {} ships version {}.", build.id, build.version);
	}

	let mut pages = client.pages(client.traversal("builds", QueryParams::new())?);

	while let Some(page) = pages.next_raw().await {
		let page = page?;

		println!("Page {} carried {} items from {}.", page.number, page.items, page.url);
	}

	token_mock.assert_async().await;

	Ok(())
}
