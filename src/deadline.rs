//! Absolute deadlines threaded through every I/O step of a request
//!
//! A `Deadline` is computed once per request and passed by value into the
//! upstream fetch and the cache calls. Children derived from it never outlive
//! their parent.

use std::future::Future;
use std::time::Duration;

use tokio::time::{error::Elapsed, Instant};

/// An absolute instant beyond which an in-flight operation must abort
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Deadline {
    at: Instant,
}

impl Deadline {
    /// Creates a deadline `budget` from now
    pub fn after(budget: Duration) -> Self {
        Self {
            at: Instant::now() + budget,
        }
    }

    /// Derives a sub-deadline `budget` from now, clamped so it never exceeds `self`
    pub fn child(self, budget: Duration) -> Self {
        self.min(Self::after(budget))
    }

    /// Runs `future` to completion unless this deadline passes first
    ///
    /// The future is dropped when the deadline fires, which cancels any
    /// request it had in flight.
    pub async fn run<F: Future>(self, future: F) -> Result<F::Output, Elapsed> {
        tokio::time::timeout_at(self.at, future).await
    }
}
