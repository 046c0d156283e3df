//! Backoff schedules for retrying an operation.
//!
//! A schedule is an [`Iterator`] with `Item = Duration`. Every item is the cool-off period
//! before the next attempt, and an exhausted iterator means the caller has to give up. The caller
//! owns the retry loop; a schedule only decides how long to wait and when to stop.
//!
//! ```rust
//! use std::time::Duration;
//!
//! use backoff::strategy::fixed;
//!
//! // 3 attempts in total, hence 2 pauses of 10ms in between.
//! let mut schedule = fixed::Interval::from_millis(10).attempts(3);
//! assert_eq!(schedule.next(), Some(Duration::from_millis(10)));
//! assert_eq!(schedule.next(), Some(Duration::from_millis(10)));
//! assert_eq!(schedule.next(), None);
//! ```

/// strategy has all the different backoff strategies. It is an iterator with Item=Duration.
/// The strategy decides what duration to return. Since it is an iterator, we can stop the
/// iterator using [`take`](https://doc.rust-lang.org/std/iter/struct.Take.html) or
/// [`fixed::Interval::attempts`](strategy::fixed::Interval::attempts).
pub mod strategy;
