//! Identifiers embedded in JWT headers, assertion claims, and token request forms.
//!
//! Every identifier ends up verbatim in a signed header or a form body, so only visible ASCII
//! is accepted; anything else is reported with the offending character and its position.

// std
use std::ops::Deref;
// self
use crate::_prelude::*;

macro_rules! def_id {
	($(#[$meta:meta])* $name:ident => $label:literal) => {
		$(#[$meta])*
		#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
		#[serde(try_from = "String", into = "String")]
		pub struct $name(String);
		impl $name {
			/// Validates and wraps `value`.
			pub fn new(value: impl Into<String>) -> Result<Self, IdentifierError> {
				let value = value.into();

				validate($label, &value)?;

				Ok(Self(value))
			}

			/// Borrows the identifier.
			pub fn as_str(&self) -> &str {
				&self.0
			}
		}
		impl Deref for $name {
			type Target = str;

			fn deref(&self) -> &str {
				&self.0
			}
		}
		impl AsRef<str> for $name {
			fn as_ref(&self) -> &str {
				&self.0
			}
		}
		impl From<$name> for String {
			fn from(id: $name) -> Self {
				id.0
			}
		}
		impl TryFrom<String> for $name {
			type Error = IdentifierError;

			fn try_from(value: String) -> Result<Self, Self::Error> {
				Self::new(value)
			}
		}
		impl FromStr for $name {
			type Err = IdentifierError;

			fn from_str(s: &str) -> Result<Self, Self::Err> {
				Self::new(s)
			}
		}
		impl Debug for $name {
			fn fmt(&self, f: &mut Formatter) -> FmtResult {
				f.debug_tuple(stringify!($name)).field(&self.0).finish()
			}
		}
		impl Display for $name {
			fn fmt(&self, f: &mut Formatter) -> FmtResult {
				f.write_str(&self.0)
			}
		}
	};
}

/// Longest identifier accepted, in bytes.
pub const IDENTIFIER_MAX_LEN: usize = 256;

/// Identifier validation failures.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum IdentifierError {
	/// Nothing was supplied.
	#[error("The {kind} identifier is empty.")]
	Empty {
		/// Identifier label (`key`, `issuer`, `client`).
		kind: &'static str,
	},
	/// A character outside visible ASCII was found.
	#[error("The {kind} identifier contains {found:?} at byte {index}.")]
	InvalidCharacter {
		/// Identifier label.
		kind: &'static str,
		/// Offending character.
		found: char,
		/// Byte offset of the character.
		index: usize,
	},
	/// The identifier is longer than [`IDENTIFIER_MAX_LEN`].
	#[error("The {kind} identifier is {len} bytes long; at most {IDENTIFIER_MAX_LEN} are allowed.")]
	TooLong {
		/// Identifier label.
		kind: &'static str,
		/// Actual length in bytes.
		len: usize,
	},
}

def_id! {
	/// Signing key identifier, sent as the JWT `kid` header.
	KeyId => "key"
}
def_id! {
	/// Team or organization identifier, sent as the `iss` claim.
	IssuerId => "issuer"
}
def_id! {
	/// OAuth client identifier, sent as the `sub` claim and the `client_id` form field.
	ClientId => "client"
}

fn validate(kind: &'static str, value: &str) -> Result<(), IdentifierError> {
	if value.is_empty() {
		return Err(IdentifierError::Empty { kind });
	}
	if value.len() > IDENTIFIER_MAX_LEN {
		return Err(IdentifierError::TooLong { kind, len: value.len() });
	}

	match value.char_indices().find(|(_, c)| !c.is_ascii_graphic()) {
		Some((index, found)) => Err(IdentifierError::InvalidCharacter { kind, found, index }),
		None => Ok(()),
	}
}
