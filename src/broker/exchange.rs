//! Wire format of the `client_credentials` exchange authenticated with a JWT client assertion.

// crates.io
use oauth2::{
	HttpRequest, HttpResponse,
	basic::BasicErrorResponse,
	http::{
		Method, Request,
		header::{ACCEPT, CONTENT_TYPE},
	},
};
use url::form_urlencoded::Serializer;
// self
use crate::{
	_prelude::*,
	auth::{CachedToken, ClientAssertion, Credential, TokenSecret},
	error::{AuthError, ConfigError},
	http,
};

/// `client_assertion_type` value for JWT bearer client authentication (RFC 7523).
pub const JWT_BEARER_ASSERTION_TYPE: &str =
	"urn:ietf:params:oauth:client-assertion-type:jwt-bearer";

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";
const JSON_CONTENT_TYPE: &str = "application/json";

#[derive(Deserialize)]
struct TokenResponse {
	access_token: String,
	#[serde(default)]
	token_type: Option<String>,
	expires_in: i64,
	#[serde(default)]
	scope: Option<String>,
}

/// Encodes the token request form body.
pub(crate) fn encode_form(credential: &Credential, assertion: &ClientAssertion) -> String {
	let mut form = Serializer::new(String::new());

	form.append_pair("grant_type", "client_credentials")
		.append_pair("client_id", credential.subject())
		.append_pair("client_assertion_type", JWT_BEARER_ASSERTION_TYPE)
		.append_pair("client_assertion", assertion.token.expose());

	if let Some(scope) = credential.scope().to_form_value() {
		form.append_pair("scope", &scope);
	}

	form.finish()
}

/// Builds the POST request sent to the token endpoint.
pub(crate) fn build_request(
	token_endpoint: &Url,
	credential: &Credential,
	assertion: &ClientAssertion,
) -> Result<HttpRequest, ConfigError> {
	let request = Request::builder()
		.method(Method::POST)
		.uri(token_endpoint.as_str())
		.header(CONTENT_TYPE, FORM_CONTENT_TYPE)
		.header(ACCEPT, JSON_CONTENT_TYPE)
		.body(encode_form(credential, assertion).into_bytes())?;

	Ok(request)
}

/// Interprets the token endpoint response, stamping expiry relative to `now`.
pub(crate) fn parse_response(
	response: &HttpResponse,
	now: OffsetDateTime,
) -> Result<CachedToken, AuthError> {
	let status = response.status();
	let body = response.body();

	if !status.is_success() {
		let oauth_error = serde_json::from_slice::<BasicErrorResponse>(body)
			.ok()
			.map(|parsed| parsed.error().as_ref().to_owned());

		return Err(AuthError::ExchangeFailed {
			status: status.as_u16(),
			body: String::from_utf8_lossy(body).into_owned(),
			oauth_error,
			retry_after: http::parse_retry_after(response.headers()),
		});
	}

	let mut deserializer = serde_json::Deserializer::from_slice(body);
	let parsed: TokenResponse = serde_path_to_error::deserialize(&mut deserializer)
		.map_err(|source| AuthError::MalformedTokenResponse { source, status: status.as_u16() })?;

	if parsed.expires_in <= 0 {
		return Err(AuthError::InvalidExpiresIn { value: parsed.expires_in });
	}

	let expires_at = now
		.checked_add(Duration::seconds(parsed.expires_in))
		.ok_or(AuthError::InvalidExpiresIn { value: parsed.expires_in })?;

	Ok(CachedToken {
		access_token: TokenSecret::new(parsed.access_token),
		token_type: parsed.token_type,
		scope: parsed.scope,
		issued_at: now,
		expires_at,
	})
}
