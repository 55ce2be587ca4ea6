//! Bounded-concurrency, order-preserving batch preparation.
//!
//! Statements in a batch are prepared under a sliding window of at most
//! `max_concurrent` in-flight prepares. Results land in a slot addressed
//! by submission index, never appended, so the output order always equals
//! the input order no matter how prepares interleave.

use futures::stream::{FuturesUnordered, StreamExt};
use std::future::Future;

/// Run `prepare` over every item, at most `max_concurrent` at a time,
/// and return the results in input order.
///
/// The first failure short-circuits: nothing new is started, prepares
/// already dispatched settle silently, and the caller never observes a
/// partial result.
pub async fn prepare_ordered<I, T, E, F, Fut>(
    items: Vec<I>,
    max_concurrent: usize,
    mut prepare: F,
) -> Result<Vec<T>, E>
where
    F: FnMut(usize, I) -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let max_concurrent = max_concurrent.max(1);
    let total = items.len();

    let mut slots: Vec<Option<T>> = Vec::with_capacity(total);
    slots.resize_with(total, || None);

    let mut pending = items.into_iter().enumerate();
    let mut in_flight = FuturesUnordered::new();

    for _ in 0..max_concurrent.min(total) {
        if let Some((index, item)) = pending.next() {
            in_flight.push(run_indexed(index, prepare(index, item)));
        }
    }

    while let Some((index, result)) = in_flight.next().await {
        slots[index] = Some(result?);
        // A slot freed up; start the next unstarted index, if any.
        if let Some((index, item)) = pending.next() {
            in_flight.push(run_indexed(index, prepare(index, item)));
        }
    }

    Ok(slots
        .into_iter()
        .map(|slot| slot.expect("scheduler fills every slot before completing"))
        .collect())
}

async fn run_indexed<T, Fut: Future<Output = T>>(index: usize, future: Fut) -> (usize, T) {
    (index, future.await)
}
