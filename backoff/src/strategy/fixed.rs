use std::iter::Take;
use std::time::Duration;

/// A Fixed Interval strategy which repeats itself every X duration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interval {
    interval: Duration,
}

impl Interval {
    /// Build interval from Duration
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }

    /// Build interval from millis
    pub fn from_millis(millis: u64) -> Self {
        Self {
            interval: Duration::from_millis(millis),
        }
    }

    /// Bounds the schedule to `max_attempts` attempts of an operation. The first attempt does not
    /// wait, so only `max_attempts - 1` pauses are yielded.
    pub fn attempts(self, max_attempts: usize) -> Take<Self> {
        self.take(max_attempts.saturating_sub(1))
    }
}

impl Iterator for Interval {
    type Item = Duration;

    fn next(&mut self) -> Option<Self::Item> {
        Some(self.interval)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new() {
        let mut interval = Interval::new(Duration::from_millis(1));
        assert_eq!(interval.next(), Some(Duration::from_millis(1)));
    }

    #[test]
    fn from_millis_repeats() {
        let mut interval = Interval::from_millis(5);
        assert_eq!(interval.next(), Some(Duration::from_millis(5)));
        assert_eq!(interval.next(), Some(Duration::from_millis(5)));
        assert_eq!(interval.next(), Some(Duration::from_millis(5)));
    }

    #[test]
    fn attempts_yields_one_pause_less() {
        let pauses: Vec<_> = Interval::from_millis(3).attempts(4).collect();
        assert_eq!(pauses, vec![Duration::from_millis(3); 3]);
    }

    #[test]
    fn single_or_zero_attempts_never_pause() {
        assert_eq!(Interval::from_millis(3).attempts(1).next(), None);
        assert_eq!(Interval::from_millis(3).attempts(0).next(), None);
    }
}
