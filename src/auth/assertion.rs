//! Client assertion minting (`CredentialSigner`).
//!
//! A signer owns one [`Credential`] and produces short-lived signed JWTs on demand. Nothing is
//! cached here: every call to [`CredentialSigner::sign`] stamps fresh `iat`/`exp` claims and a
//! new `jti`, so an assertion is used for exactly one exchange.

// std
use std::time::{SystemTime, UNIX_EPOCH};
// crates.io
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use jsonwebtoken::{Header, errors::ErrorKind};
// self
use crate::{
	_prelude::*,
	auth::{Credential, TokenSecret},
	clock::{Clock, SystemClock},
	error::{ConfigError, SigningError},
};

/// How the signed assertion is consumed, which fixes its maximum lifetime.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssertionProfile {
	/// The JWT is exchanged at an OAuth2 token endpoint for a short-lived access token.
	#[default]
	ClientAssertion,
	/// The JWT is presented directly as the bearer token.
	DirectBearer,
}
impl AssertionProfile {
	/// Maximum lifetime accepted by servers for this profile.
	pub const fn ceiling(self) -> Duration {
		match self {
			Self::ClientAssertion => Duration::days(180),
			Self::DirectBearer => Duration::minutes(20),
		}
	}
}

/// Registered claims carried by every assertion.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssertionClaims {
	/// Issuer (team or organization identifier).
	pub iss: String,
	/// Subject (client identifier).
	pub sub: String,
	/// Audience.
	pub aud: String,
	/// Issued-at, seconds since the Unix epoch.
	pub iat: i64,
	/// Expiry, seconds since the Unix epoch.
	pub exp: i64,
	/// Unique token identifier.
	pub jti: String,
}

/// Signed assertion ready for a single exchange.
#[derive(Clone, Debug)]
pub struct ClientAssertion {
	/// Compact JWS serialization.
	pub token: TokenSecret,
	/// Unique token identifier embedded in the claims.
	pub jti: String,
	/// `iat` instant.
	pub issued_at: OffsetDateTime,
	/// `exp` instant.
	pub expires_at: OffsetDateTime,
}

/// Mints signed client assertions from a [`Credential`].
#[derive(Clone)]
pub struct CredentialSigner {
	credential: Credential,
	profile: AssertionProfile,
	lifetime: Duration,
	clock: Arc<dyn Clock>,
}
impl CredentialSigner {
	/// Creates a signer whose assertions live for the profile's full ceiling.
	pub fn new(credential: Credential, profile: AssertionProfile) -> Self {
		Self { credential, profile, lifetime: profile.ceiling(), clock: Arc::new(SystemClock) }
	}

	/// Shortens the assertion lifetime; must fall within `(0, ceiling]`.
	pub fn with_lifetime(mut self, lifetime: Duration) -> Result<Self, ConfigError> {
		let ceiling = self.profile.ceiling();

		if !lifetime.is_positive() || lifetime > ceiling {
			return Err(ConfigError::AssertionLifetime { requested: lifetime, ceiling });
		}

		self.lifetime = lifetime;

		Ok(self)
	}

	/// Replaces the clock used for `iat`/`exp`.
	pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
		self.clock = clock;

		self
	}

	/// Credential owned by the signer.
	pub fn credential(&self) -> &Credential {
		&self.credential
	}

	/// Assertion profile.
	pub fn profile(&self) -> AssertionProfile {
		self.profile
	}

	/// Lifetime stamped on each assertion.
	pub fn lifetime(&self) -> Duration {
		self.lifetime
	}

	/// Builds the claim set for an assertion issued at `now`.
	pub fn claims_at(&self, now: OffsetDateTime) -> AssertionClaims {
		let now = now.replace_nanosecond(0).unwrap_or(now);

		AssertionClaims {
			iss: self.credential.issuer().to_string(),
			sub: self.credential.subject().to_owned(),
			aud: self.credential.audience().to_owned(),
			iat: now.unix_timestamp(),
			exp: (now + self.lifetime).unix_timestamp(),
			jti: mint_jti(),
		}
	}

	/// Mints a fresh assertion stamped with the signer clock.
	pub fn sign(&self) -> Result<ClientAssertion, SigningError> {
		let claims = self.claims_at(self.clock.now_utc());
		let token = self.sign_claims(&claims)?;
		let issued_at = OffsetDateTime::from_unix_timestamp(claims.iat)
			.unwrap_or(OffsetDateTime::UNIX_EPOCH);

		Ok(ClientAssertion {
			token: TokenSecret::new(token),
			jti: claims.jti,
			issued_at,
			expires_at: issued_at + self.lifetime,
		})
	}

	/// Signs an arbitrary claim set with the credential key.
	///
	/// The header carries `alg` (ES256 or RS256, from the key family) and `kid`.
	pub fn sign_claims<C>(&self, claims: &C) -> Result<String, SigningError>
	where
		C: Serialize,
	{
		let key = self.credential.private_key();
		let mut header = Header::new(key.algorithm());

		header.kid = Some(self.credential.key_id().to_string());

		jsonwebtoken::encode(&header, claims, key.encoding_key()).map_err(|source| {
			let invalid_key = matches!(
				source.kind(),
				ErrorKind::InvalidEcdsaKey
					| ErrorKind::InvalidRsaKey(_)
					| ErrorKind::InvalidKeyFormat
			);

			if invalid_key {
				SigningError::InvalidKey { source }
			} else {
				SigningError::SignatureFailed { source }
			}
		})
	}
}
impl Debug for CredentialSigner {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("CredentialSigner")
			.field("credential", &self.credential)
			.field("profile", &self.profile)
			.field("lifetime", &self.lifetime)
			.finish()
	}
}

// Nanosecond timestamp plus random bytes keeps identifiers distinct across processes.
fn mint_jti() -> String {
	let nanos =
		SystemTime::now().duration_since(UNIX_EPOCH).map(|elapsed| elapsed.as_nanos()).unwrap_or(0);
	let mut raw = [0_u8; 24];

	raw[..16].copy_from_slice(&nanos.to_be_bytes());
	raw[16..].copy_from_slice(&rand::random::<[u8; 8]>());

	URL_SAFE_NO_PAD.encode(raw)
}
