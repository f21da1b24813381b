//! Bounded-concurrency runner.
//!
//! Keeps at most `limit` futures in flight and launches the next queued item as soon as
//! any in-flight item settles. Results come back aligned with input order.

use std::future::Future;

use futures::stream::{FuturesUnordered, StreamExt};

/// Run `items` through `task` with at most `limit` active at once.
///
/// A `limit` of zero is treated as one. Items are launched in input order; there is no
/// priority and no work-stealing. The returned vector is indexed like `items`
/// regardless of completion order.
///
/// Item failures are the caller's business: `task` should return a value (often a
/// `Result`) rather than panicking, so one bad item never aborts the batch.
pub async fn run_with_concurrency<I, T, F, Fut>(items: Vec<I>, limit: usize, mut task: F) -> Vec<T>
where
    F: FnMut(usize, I) -> Fut,
    Fut: Future<Output = T>,
{
    let limit = limit.max(1);
    let total = items.len();
    let mut results: Vec<Option<T>> = std::iter::repeat_with(|| None).take(total).collect();

    let mut pending = items.into_iter().enumerate();
    let mut in_flight = FuturesUnordered::new();

    for (index, item) in pending.by_ref().take(limit) {
        in_flight.push(tagged(index, task(index, item)));
    }

    while let Some((index, value)) = in_flight.next().await {
        results[index] = Some(value);
        if let Some((next_index, item)) = pending.next() {
            in_flight.push(tagged(next_index, task(next_index, item)));
        }
    }

    results.into_iter().flatten().collect()
}

async fn tagged<Fut: Future>(index: usize, fut: Fut) -> (usize, Fut::Output) {
    (index, fut.await)
}
