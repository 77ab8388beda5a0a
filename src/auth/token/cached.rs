//! The broker's cached bearer token and its freshness checks.

// self
use crate::{_prelude::*, auth::token::secret::TokenSecret};

/// Lifecycle status of a cached token relative to an instant and a skew window.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TokenStatus {
	/// Token is valid and outside the skew window.
	Valid,
	/// Token is still valid but inside the skew window; callers refresh proactively.
	Expiring,
	/// Token reached its expiry instant.
	Expired,
}

/// Bearer token held by a broker together with its absolute expiry.
#[derive(Clone, Serialize, Deserialize)]
pub struct CachedToken {
	/// Access token secret; callers must avoid logging it.
	pub access_token: TokenSecret,
	/// `token_type` reported by the token endpoint, if any.
	pub token_type: Option<String>,
	/// Space-delimited scope granted by the token endpoint, if reported.
	pub scope: Option<String>,
	/// Instant the token was stored.
	pub issued_at: OffsetDateTime,
	/// Absolute expiry instant.
	pub expires_at: OffsetDateTime,
}
impl CachedToken {
	/// Creates a token that expires `expires_in` after `issued_at`.
	pub fn new(
		access_token: impl Into<String>,
		issued_at: OffsetDateTime,
		expires_in: Duration,
	) -> Self {
		Self {
			access_token: TokenSecret::new(access_token),
			token_type: None,
			scope: None,
			issued_at,
			expires_at: issued_at + expires_in,
		}
	}

	/// Computes the lifecycle status at `instant` with the provided skew window.
	///
	/// The skew never exceeds half of the token's lifetime, so a token shorter than the skew is
	/// still reusable for its first half.
	pub fn status_at(&self, instant: OffsetDateTime, skew: Duration) -> TokenStatus {
		let skew = skew.min(self.lifetime() / 2);

		if instant >= self.expires_at {
			return TokenStatus::Expired;
		}
		if instant + skew >= self.expires_at {
			return TokenStatus::Expiring;
		}

		TokenStatus::Valid
	}

	/// Returns `true` when the token can be reused at `instant` without a refresh.
	pub fn is_fresh_at(&self, instant: OffsetDateTime, skew: Duration) -> bool {
		matches!(self.status_at(instant, skew), TokenStatus::Valid)
	}

	/// Total lifetime granted at issue time.
	pub fn lifetime(&self) -> Duration {
		self.expires_at - self.issued_at
	}

	/// Remaining lifetime at `instant`, clamped to zero.
	pub fn remaining_at(&self, instant: OffsetDateTime) -> Duration {
		let remaining = self.expires_at - instant;

		if remaining.is_negative() { Duration::ZERO } else { remaining }
	}
}
impl Debug for CachedToken {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("CachedToken")
			.field("access_token", &"<redacted>")
			.field("token_type", &self.token_type)
			.field("scope", &self.scope)
			.field("issued_at", &self.issued_at)
			.field("expires_at", &self.expires_at)
			.finish()
	}
}
