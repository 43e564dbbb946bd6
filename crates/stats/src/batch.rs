//! Bounded batch fetching.
//!
//! Identifiers are split into consecutive chunks; the calls of one chunk run
//! concurrently and the whole chunk settles before the next one starts. Failed
//! items are logged and dropped. Callers only ever see the successful subset,
//! in input order.

use std::fmt::Display;
use std::future::Future;

use futures::future::join_all;
use stats_core::Result;
use tracing::{debug, warn};

/// Summary of a [`fetch_all_with_report`] run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchReport<T> {
    /// Successful results, in input order.
    pub items: Vec<T>,
    /// Number of failed calls.
    pub failures: usize,
    /// Number of chunks processed.
    pub chunks: usize,
}

/// Fetches every id in chunks of `batch_size`, keeping only the successes.
///
/// A `batch_size` of zero is treated as one. Never fails; an empty `ids`
/// makes no calls.
pub async fn fetch_all<'a, I, T, F, Fut>(ids: &'a [I], batch_size: usize, fetch_one: F) -> Vec<T>
where
    I: Display,
    F: Fn(&'a I) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    fetch_all_with_report(ids, batch_size, fetch_one).await.items
}

/// Like [`fetch_all`], also reporting failure and chunk counts.
pub async fn fetch_all_with_report<'a, I, T, F, Fut>(
    ids: &'a [I],
    batch_size: usize,
    fetch_one: F,
) -> BatchReport<T>
where
    I: Display,
    F: Fn(&'a I) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let batch_size = batch_size.max(1);
    let mut report = BatchReport {
        items: Vec::with_capacity(ids.len()),
        failures: 0,
        chunks: 0,
    };

    for chunk in ids.chunks(batch_size) {
        report.chunks += 1;
        debug!(chunk = report.chunks, size = chunk.len(), "Fetching batch");

        // join_all yields results in the order of its inputs
        let results = join_all(chunk.iter().map(&fetch_one)).await;

        for (id, result) in chunk.iter().zip(results) {
            match result {
                Ok(item) => report.items.push(item),
                Err(e) => {
                    warn!(id = %id, error = %e, "Batch item failed, skipping");
                    report.failures += 1;
                }
            }
        }
    }

    debug!(
        total = ids.len(),
        succeeded = report.items.len(),
        failed = report.failures,
        "Batch fetch complete"
    );
    report
}
