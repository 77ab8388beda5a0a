//! Identity material used to mint client assertions.
//!
//! Private keys are modeled as a closed sum over the two supported algorithm families so the
//! signer dispatches on a tag instead of probing an opaque key at signing time. Any other key
//! family is rejected while the [`PrivateKey`] is being constructed.

// crates.io
use jsonwebtoken::{Algorithm, EncodingKey, Header};
// self
use crate::{
	_prelude::*,
	auth::{ClientId, IssuerId, KeyId, ScopeSet},
	error::SigningError,
};

/// Algorithm family of a private key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyFamily {
	/// Elliptic-curve (P-256) key, signs with ES256.
	Ecdsa,
	/// RSA key, signs with RS256.
	Rsa,
}
impl KeyFamily {
	/// JWT algorithm used for this family.
	pub const fn algorithm(self) -> Algorithm {
		match self {
			Self::Ecdsa => Algorithm::ES256,
			Self::Rsa => Algorithm::RS256,
		}
	}

	/// Returns a stable label suitable for logs.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Ecdsa => "ecdsa",
			Self::Rsa => "rsa",
		}
	}
}
impl Display for KeyFamily {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Parsed private key tagged with its algorithm family.
#[derive(Clone)]
pub enum PrivateKey {
	/// P-256 key in PKCS#8 PEM form.
	Ecdsa(EncodingKey),
	/// RSA key in PKCS#1 or PKCS#8 PEM form.
	Rsa(EncodingKey),
}
impl PrivateKey {
	/// Parses a PKCS#8 PEM elliptic-curve key.
	pub fn ecdsa_pem(pem: impl AsRef<[u8]>) -> Result<Self, SigningError> {
		let key = EncodingKey::from_ec_pem(pem.as_ref())
			.map_err(|source| SigningError::InvalidKey { source })?;

		Self::Ecdsa(key).probed()
	}

	/// Parses a PKCS#1 or PKCS#8 PEM RSA key.
	pub fn rsa_pem(pem: impl AsRef<[u8]>) -> Result<Self, SigningError> {
		let key = EncodingKey::from_rsa_pem(pem.as_ref())
			.map_err(|source| SigningError::InvalidKey { source })?;

		Self::Rsa(key).probed()
	}

	/// Parses a PEM key and detects its family.
	///
	/// Ed25519 keys parse but are rejected with [`SigningError::UnsupportedKeyType`]; input
	/// that is not a recognizable private key yields [`SigningError::InvalidKey`].
	pub fn from_pem(pem: impl AsRef<[u8]>) -> Result<Self, SigningError> {
		let pem = pem.as_ref();

		if let Ok(key) = EncodingKey::from_ec_pem(pem) {
			return Self::Ecdsa(key).probed();
		}

		match EncodingKey::from_rsa_pem(pem) {
			Ok(key) => Self::Rsa(key).probed(),
			Err(_) if EncodingKey::from_ed_pem(pem).is_ok() =>
				Err(SigningError::UnsupportedKeyType { kind: "EdDSA".into() }),
			Err(source) => Err(SigningError::InvalidKey { source }),
		}
	}

	/// Parses a PEM key for an explicitly requested algorithm.
	pub fn from_pem_for(algorithm: Algorithm, pem: impl AsRef<[u8]>) -> Result<Self, SigningError> {
		match algorithm {
			Algorithm::ES256 => Self::ecdsa_pem(pem),
			Algorithm::RS256 => Self::rsa_pem(pem),
			other => Err(SigningError::UnsupportedKeyType { kind: format!("{other:?}") }),
		}
	}

	/// Algorithm family of the key.
	pub fn family(&self) -> KeyFamily {
		match self {
			Self::Ecdsa(_) => KeyFamily::Ecdsa,
			Self::Rsa(_) => KeyFamily::Rsa,
		}
	}

	/// JWT algorithm selected for the key.
	pub fn algorithm(&self) -> Algorithm {
		self.family().algorithm()
	}

	pub(crate) fn encoding_key(&self) -> &EncodingKey {
		match self {
			Self::Ecdsa(key) | Self::Rsa(key) => key,
		}
	}

	// PEM parsing only checks framing; the DER body is validated by signing once.
	fn probed(self) -> Result<Self, SigningError> {
		let probe = BTreeMap::from([("probe", "probe")]);

		jsonwebtoken::encode(&Header::new(self.algorithm()), &probe, self.encoding_key())
			.map_err(|source| SigningError::InvalidKey { source })?;

		Ok(self)
	}
}
impl Debug for PrivateKey {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_tuple("PrivateKey").field(&self.family()).field(&"<redacted>").finish()
	}
}

/// Immutable identity material owned by a [`CredentialSigner`](crate::auth::CredentialSigner).
#[derive(Clone, Debug)]
pub struct Credential {
	key_id: KeyId,
	issuer: IssuerId,
	client_id: Option<ClientId>,
	private_key: PrivateKey,
	audience: String,
	scope: ScopeSet,
}
impl Credential {
	/// Creates a credential whose subject defaults to the issuer.
	pub fn new(
		key_id: KeyId,
		issuer: IssuerId,
		private_key: PrivateKey,
		audience: impl Into<String>,
	) -> Self {
		Self {
			key_id,
			issuer,
			client_id: None,
			private_key,
			audience: audience.into(),
			scope: ScopeSet::default(),
		}
	}

	/// Sets a client identifier distinct from the issuer.
	pub fn with_client_id(mut self, client_id: ClientId) -> Self {
		self.client_id = Some(client_id);

		self
	}

	/// Sets the scope requested during the token exchange.
	pub fn with_scope(mut self, scope: ScopeSet) -> Self {
		self.scope = scope;

		self
	}

	/// Key identifier (`kid`).
	pub fn key_id(&self) -> &KeyId {
		&self.key_id
	}

	/// Issuer identifier (`iss`).
	pub fn issuer(&self) -> &IssuerId {
		&self.issuer
	}

	/// Client identifier used as `sub` and `client_id`; falls back to the issuer.
	pub fn subject(&self) -> &str {
		self.client_id.as_deref().unwrap_or(self.issuer.as_ref())
	}

	/// Private key.
	pub fn private_key(&self) -> &PrivateKey {
		&self.private_key
	}

	/// Audience (`aud`).
	pub fn audience(&self) -> &str {
		&self.audience
	}

	/// Requested scope.
	pub fn scope(&self) -> &ScopeSet {
		&self.scope
	}
}
