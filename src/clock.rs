//! Wall-clock abstraction so expiry math can be driven deterministically in tests.

// self
use crate::_prelude::*;

/// Source of the current UTC instant used for assertion claims and token expiry.
pub trait Clock
where
	Self: 'static + Send + Sync,
{
	/// Returns the current instant.
	fn now_utc(&self) -> OffsetDateTime;
}

/// Clock backed by the operating system.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;
impl Clock for SystemClock {
	fn now_utc(&self) -> OffsetDateTime {
		OffsetDateTime::now_utc()
	}
}

/// Manually advanced clock; every caller sharing the handle observes the same instant.
#[derive(Clone, Debug)]
pub struct ManualClock(Arc<Mutex<OffsetDateTime>>);
impl ManualClock {
	/// Creates a clock frozen at `start`.
	pub fn new(start: OffsetDateTime) -> Self {
		Self(Arc::new(Mutex::new(start)))
	}

	/// Moves the clock forward (or backward, for negative durations).
	pub fn advance(&self, by: Duration) {
		let mut now = self.0.lock();

		*now += by;
	}

	/// Pins the clock to `instant`.
	pub fn set(&self, instant: OffsetDateTime) {
		*self.0.lock() = instant;
	}
}
impl Default for ManualClock {
	fn default() -> Self {
		Self::new(OffsetDateTime::UNIX_EPOCH)
	}
}
impl Clock for ManualClock {
	fn now_utc(&self) -> OffsetDateTime {
		*self.0.lock()
	}
}
