//! Bounded retry policy for transient failures.

// self
use crate::_prelude::*;

/// Delay schedule between retries.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Backoff {
	/// Same delay before every retry.
	Fixed(StdDuration),
	/// `initial * 2^(retry - 1)`, capped at `max`.
	Exponential {
		/// Delay before the first retry.
		initial: StdDuration,
		/// Upper bound for any computed delay.
		max: StdDuration,
	},
}
impl Backoff {
	/// Delay before the given one-based retry.
	pub fn delay(&self, retry: u32) -> StdDuration {
		match *self {
			Self::Fixed(delay) => delay,
			Self::Exponential { initial, max } => {
				let factor = 2_u32.saturating_pow(retry.saturating_sub(1));

				initial.saturating_mul(factor).min(max)
			},
		}
	}
}

/// How many times a transient failure is re-issued and how long to wait in between.
///
/// The single re-authentication retry after a 401 is not counted against this budget.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
	/// Retries after the first attempt; zero disables retrying.
	pub max_retries: u32,
	/// Delay schedule.
	pub backoff: Backoff,
	/// Ceiling applied to server `Retry-After` hints.
	pub max_retry_after: StdDuration,
}
impl RetryPolicy {
	/// Policy that never retries.
	pub const fn disabled() -> Self {
		Self {
			max_retries: 0,
			backoff: Backoff::Fixed(StdDuration::ZERO),
			max_retry_after: StdDuration::ZERO,
		}
	}

	/// Overrides the retry budget.
	pub fn with_max_retries(mut self, max_retries: u32) -> Self {
		self.max_retries = max_retries;

		self
	}

	/// Overrides the delay schedule.
	pub fn with_backoff(mut self, backoff: Backoff) -> Self {
		self.backoff = backoff;

		self
	}

	/// Returns `true` while the one-based `retry` fits in the budget.
	pub fn allows(&self, retry: u32) -> bool {
		retry <= self.max_retries
	}

	/// Delay before the one-based `retry`, preferring the server hint when present.
	pub fn delay_for(&self, retry: u32, retry_after: Option<StdDuration>) -> StdDuration {
		match retry_after {
			Some(hint) => hint.min(self.max_retry_after),
			None => self.backoff.delay(retry),
		}
	}
}
impl Default for RetryPolicy {
	fn default() -> Self {
		Self {
			max_retries: 2,
			backoff: Backoff::Exponential {
				initial: StdDuration::from_millis(250),
				max: StdDuration::from_secs(5),
			},
			max_retry_after: StdDuration::from_secs(30),
		}
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn exponential_backoff_doubles_and_caps() {
		let backoff = Backoff::Exponential {
			initial: StdDuration::from_millis(100),
			max: StdDuration::from_millis(350),
		};

		assert_eq!(backoff.delay(1), StdDuration::from_millis(100));
		assert_eq!(backoff.delay(2), StdDuration::from_millis(200));
		assert_eq!(backoff.delay(3), StdDuration::from_millis(350));
		assert_eq!(backoff.delay(40), StdDuration::from_millis(350));
	}

	#[test]
	fn retry_after_hints_are_capped() {
		let policy = RetryPolicy::default();

		assert!(policy.allows(2));
		assert!(!policy.allows(3));
		assert_eq!(policy.delay_for(1, Some(StdDuration::from_secs(2))), StdDuration::from_secs(2));
		assert_eq!(
			policy.delay_for(1, Some(StdDuration::from_secs(600))),
			StdDuration::from_secs(30)
		);
		assert_eq!(policy.delay_for(2, None), StdDuration::from_millis(500));
		assert!(!RetryPolicy::disabled().allows(1));
	}
}
