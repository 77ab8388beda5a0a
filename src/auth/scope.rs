//! Scope requested in the `scope` form field of the client-credentials grant.

// std
use std::collections::{BTreeSet, btree_set::Iter};
// self
use crate::_prelude::*;

/// Reasons a scope token is rejected.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum ScopeValidationError {
	/// A scope token was empty.
	#[error("Scope tokens cannot be empty.")]
	Empty,
	/// A scope token used a character outside `%x21 / %x23-5B / %x5D-7E`.
	#[error("Scope `{scope}` contains the disallowed character {found:?}.")]
	InvalidCharacter {
		/// Offending scope token.
		scope: String,
		/// First disallowed character.
		found: char,
	},
}

/// Sorted, deduplicated scope tokens.
///
/// Serialized as the space-delimited wire form so token responses and configuration files share
/// one representation.
#[derive(Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ScopeSet(BTreeSet<String>);
impl ScopeSet {
	/// Validates every token and collects them into a set.
	pub fn new<I, S>(scopes: I) -> Result<Self, ScopeValidationError>
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		scopes
			.into_iter()
			.map(|scope| {
				let scope = scope.into();

				check_token(&scope)?;

				Ok(scope)
			})
			.collect::<Result<_, _>>()
			.map(Self)
	}

	/// Number of distinct scopes.
	pub fn len(&self) -> usize {
		self.0.len()
	}

	/// Whether no scope is requested.
	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	/// Whether `scope` is part of the set.
	pub fn contains(&self, scope: &str) -> bool {
		self.0.contains(scope)
	}

	/// Scopes in ascending order.
	pub fn iter(&self) -> impl Iterator<Item = &str> {
		self.into_iter()
	}

	/// Space-delimited form field value, or `None` when no scope is requested.
	pub fn to_form_value(&self) -> Option<String> {
		if self.is_empty() { None } else { Some(self.to_string()) }
	}
}
impl Debug for ScopeSet {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_set().entries(&self.0).finish()
	}
}
impl Display for ScopeSet {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		for (i, scope) in self.0.iter().enumerate() {
			if i > 0 {
				f.write_str(" ")?;
			}

			f.write_str(scope)?;
		}

		Ok(())
	}
}
impl<'a> IntoIterator for &'a ScopeSet {
	type IntoIter = ScopeIter<'a>;
	type Item = &'a str;

	fn into_iter(self) -> Self::IntoIter {
		ScopeIter(self.0.iter())
	}
}
impl FromStr for ScopeSet {
	type Err = ScopeValidationError;

	/// Parses the space-delimited wire form; runs of spaces are treated as one separator.
	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Self::new(s.split(' ').filter(|token| !token.is_empty()))
	}
}
impl TryFrom<String> for ScopeSet {
	type Error = ScopeValidationError;

	fn try_from(value: String) -> Result<Self, Self::Error> {
		value.parse()
	}
}
impl From<ScopeSet> for String {
	fn from(scopes: ScopeSet) -> Self {
		scopes.to_string()
	}
}

/// Borrowing iterator over a [`ScopeSet`].
pub struct ScopeIter<'a>(Iter<'a, String>);
impl<'a> Iterator for ScopeIter<'a> {
	type Item = &'a str;

	fn next(&mut self) -> Option<Self::Item> {
		self.0.next().map(String::as_str)
	}
}

fn check_token(scope: &str) -> Result<(), ScopeValidationError> {
	if scope.is_empty() {
		return Err(ScopeValidationError::Empty);
	}

	match scope.chars().find(|c| !matches!(c, '\x21' | '\x23'..='\x5b' | '\x5d'..='\x7e')) {
		Some(found) =>
			Err(ScopeValidationError::InvalidCharacter { scope: scope.to_owned(), found }),
		None => Ok(()),
	}
}
