use std::time::Duration;

/// Exponential reconnect backoff: 1s, doubled after every failed attempt,
/// capped at a maximum. No jitter.
#[derive(Debug, Clone)]
pub struct Backoff {
	initial: Duration,
	current: Duration,
	max: Duration,
	attempts: u32,
}

impl Backoff {
	pub const INITIAL_DELAY: Duration = Duration::from_secs(1);

	pub fn new(max: Duration) -> Self {
		Self::with_initial(Self::INITIAL_DELAY, max)
	}

	pub fn with_initial(initial: Duration, max: Duration) -> Self {
		Self {
			initial,
			current: initial,
			max,
			attempts: 0,
		}
	}

	/// Delay to wait before the next attempt; advances the sequence.
	pub fn next_delay(&mut self) -> Duration {
		let delay = self.current.min(self.max);
		self.current = self.current.saturating_mul(2).min(self.max);
		self.attempts = self.attempts.saturating_add(1);
		delay
	}

	/// Delay the next call to `next_delay` will return.
	pub fn current(&self) -> Duration {
		self.current.min(self.max)
	}

	/// Attempts scheduled since the last reset.
	pub fn attempts(&self) -> u32 {
		self.attempts
	}

	pub fn reset(&mut self) {
		self.current = self.initial;
		self.attempts = 0;
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn secs(delays: &[Duration]) -> Vec<u64> {
		delays.iter().map(Duration::as_secs).collect()
	}

	#[test]
	fn test_doubles_until_cap() {
		let mut backoff = Backoff::new(Duration::from_secs(300));
		let delays: Vec<_> = (0..12).map(|_| backoff.next_delay()).collect();

		assert_eq!(
			secs(&delays),
			[1, 2, 4, 8, 16, 32, 64, 128, 256, 300, 300, 300]
		);
		assert_eq!(backoff.attempts(), 12);
	}

	#[test]
	fn test_never_exceeds_max() {
		let max = Duration::from_secs(10);
		let mut backoff = Backoff::new(max);
		let mut previous = Duration::ZERO;
		for _ in 0..64 {
			let delay = backoff.next_delay();
			assert!(delay <= max);
			assert!(delay >= previous);
			previous = delay;
		}
		assert_eq!(previous, max);
	}

	#[test]
	fn test_reset_restarts_sequence() {
		let mut backoff = Backoff::new(Duration::from_secs(60));
		backoff.next_delay();
		backoff.next_delay();
		assert_eq!(backoff.current(), Duration::from_secs(4));

		backoff.reset();
		assert_eq!(backoff.attempts(), 0);
		assert_eq!(backoff.next_delay(), Duration::from_secs(1));
	}

	#[test]
	fn test_max_below_initial() {
		let mut backoff = Backoff::new(Duration::from_millis(500));
		assert_eq!(backoff.next_delay(), Duration::from_millis(500));
		assert_eq!(backoff.next_delay(), Duration::from_millis(500));
	}
}
