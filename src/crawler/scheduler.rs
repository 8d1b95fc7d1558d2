//! Bounded concurrent execution
//!
//! Both the sequential and the concurrent harvesting modes go through
//! `Scheduler::map_bounded`; sequential is simply a limit of one. The limit
//! applies per call, while the fetcher's semaphore caps requests in flight
//! across nested calls.

use futures::stream::{self, StreamExt};
use std::future::Future;

/// Applies an async function over a sequence with a concurrency cap
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Scheduler {
    limit: usize,
}

impl Scheduler {
    /// One task at a time, in input order
    pub fn sequential() -> Self {
        Self { limit: 1 }
    }

    /// At most `limit` tasks in flight; zero is treated as one
    pub fn concurrent(limit: usize) -> Self {
        Self {
            limit: limit.max(1),
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn is_sequential(&self) -> bool {
        self.limit == 1
    }

    /// Runs `f` over every item with at most `limit` futures pending
    ///
    /// Results are returned in completion order. With a limit of one that
    /// is the input order.
    pub async fn map_bounded<I, F, Fut, T>(&self, items: I, f: F) -> Vec<T>
    where
        I: IntoIterator,
        F: FnMut(I::Item) -> Fut,
        Fut: Future<Output = T>,
    {
        stream::iter(items)
            .map(f)
            .buffer_unordered(self.limit)
            .collect()
            .await
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::sequential()
    }
}
