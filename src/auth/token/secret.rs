//! Bearer tokens and signed assertions that must never reach a log line.

// crates.io
use oauth2::http::{HeaderValue, header::InvalidHeaderValue};
// self
use crate::_prelude::*;

const REDACTED: &str = "<redacted>";

/// Secret string shared between concurrent callers without copying.
///
/// `Debug` and `Display` print a placeholder; [`TokenSecret::expose`] is the only way to read it.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct TokenSecret(Arc<str>);
impl TokenSecret {
	/// Wraps a secret value.
	pub fn new(value: impl Into<String>) -> Self {
		Self(Arc::from(value.into()))
	}

	/// Reads the secret. The result must not be logged.
	pub fn expose(&self) -> &str {
		&self.0
	}

	/// Renders an `Authorization: Bearer` value flagged as sensitive.
	pub fn bearer_header(&self) -> Result<HeaderValue, InvalidHeaderValue> {
		let mut value = HeaderValue::from_str(&format!("Bearer {}", self.0))?;

		value.set_sensitive(true);

		Ok(value)
	}
}
impl From<String> for TokenSecret {
	fn from(value: String) -> Self {
		Self::new(value)
	}
}
impl From<TokenSecret> for String {
	fn from(secret: TokenSecret) -> Self {
		secret.0.as_ref().to_owned()
	}
}
impl Debug for TokenSecret {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "TokenSecret({REDACTED}, {} bytes)", self.0.len())
	}
}
impl Display for TokenSecret {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(REDACTED)
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn formatting_never_leaks() {
		let secret = TokenSecret::new("eyJhbGciOiJFUzI1NiJ9.payload.signature");

		assert_eq!(format!("{secret:?}"), "TokenSecret(<redacted>, 38 bytes)");
		assert_eq!(secret.to_string(), "<redacted>");
		assert_eq!(secret.expose(), "eyJhbGciOiJFUzI1NiJ9.payload.signature");
	}

	#[test]
	fn bearer_header_is_sensitive() {
		let header =
			TokenSecret::new("tok1").bearer_header().expect("Plain token is a valid header.");

		assert_eq!(header, "Bearer tok1");
		assert!(header.is_sensitive());
		assert!(TokenSecret::new("tok\r\n1").bearer_header().is_err());
	}
}
