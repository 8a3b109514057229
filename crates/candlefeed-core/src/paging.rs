//! Cursor-driven pagination over bounded provider pages.
//!
//! One loop serves every provider: the page-fetch closure owns URL building
//! and payload parsing, the loop owns cursor advancement, termination, and
//! inter-page pacing. Bulk providers (single call returns the whole table)
//! are the degenerate case: their first page is always short, so the loop
//! stops after one iteration.

use std::future::Future;

use tracing::{debug, warn};

use crate::candle_source::{Completion, SourceError};
use crate::normalize::RawCandle;
use crate::pacing::Pacer;

/// Bounds and limits for one paginated range fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageSpec {
    /// Inclusive range start, epoch seconds.
    pub start_ts: i64,
    /// Inclusive range end, epoch seconds.
    pub end_ts: i64,
    /// Maximum records the provider returns per call.
    pub page_cap: usize,
    /// Cooperative upper bound on loop iterations; hitting it truncates the
    /// fetch instead of paginating forever.
    pub page_budget: usize,
}

impl PageSpec {
    pub const DEFAULT_PAGE_BUDGET: usize = 64;

    pub fn new(start_ts: i64, end_ts: i64, page_cap: usize) -> Self {
        Self {
            start_ts,
            end_ts,
            page_cap,
            page_budget: Self::DEFAULT_PAGE_BUDGET,
        }
    }
}

/// Why the pagination loop stopped, in evaluation priority order.
#[derive(Debug, Clone, PartialEq)]
pub enum StopReason {
    /// Provider signalled a structured error; accumulated records are kept.
    Upstream(SourceError),
    /// A page came back with no records.
    EmptyPage,
    /// The last record reached or passed the requested end.
    Covered,
    /// Fewer records than the page cap: implicit end of history.
    Exhausted,
    /// The page budget ran out before the range was covered.
    BudgetExhausted,
}

/// Accumulated records plus the reason pagination stopped.
#[derive(Debug, Clone, PartialEq)]
pub struct PagedRecords {
    pub records: Vec<RawCandle>,
    pub stop: StopReason,
}

impl PagedRecords {
    /// Collapse the stop reason into the facade-level completion state.
    pub fn into_parts(self) -> (Vec<RawCandle>, Completion) {
        let completion = match self.stop {
            StopReason::Covered | StopReason::Exhausted | StopReason::EmptyPage => {
                Completion::Complete
            }
            StopReason::Upstream(error) => Completion::Truncated(error),
            StopReason::BudgetExhausted => Completion::Truncated(SourceError::internal(
                "page budget exhausted before the requested range was covered",
            )),
        };
        (self.records, completion)
    }
}

/// Drive the pagination loop for a closed time range.
///
/// The cursor starts at `spec.start_ts`; after each full page it advances to
/// one second past the last record's timestamp. A failed page is not retried:
/// whatever accumulated so far is returned with the error recorded.
pub async fn fetch_range<F, Fut>(spec: PageSpec, pacer: &Pacer, fetch_page: F) -> PagedRecords
where
    F: Fn(i64) -> Fut,
    Fut: Future<Output = Result<Vec<RawCandle>, SourceError>>,
{
    let mut records: Vec<RawCandle> = Vec::new();
    let mut cursor = spec.start_ts;
    let mut pages = 0_usize;

    loop {
        let page = match fetch_page(cursor).await {
            Ok(page) => page,
            Err(error) => {
                warn!(cursor, %error, accumulated = records.len(), "page fetch failed, keeping partial result");
                return PagedRecords {
                    records,
                    stop: StopReason::Upstream(error),
                };
            }
        };
        pages += 1;

        if page.is_empty() {
            debug!(cursor, pages, "empty page, stopping");
            return PagedRecords {
                records,
                stop: StopReason::EmptyPage,
            };
        }

        let page_len = page.len();
        let last_ts = page.last().map(|record| record.ts).unwrap_or(cursor);
        records.extend(page);
        debug!(cursor, page_len, last_ts, "page fetched");

        if last_ts >= spec.end_ts {
            return PagedRecords {
                records,
                stop: StopReason::Covered,
            };
        }

        if page_len < spec.page_cap {
            return PagedRecords {
                records,
                stop: StopReason::Exhausted,
            };
        }

        if pages >= spec.page_budget {
            warn!(pages, "page budget exhausted, truncating fetch");
            return PagedRecords {
                records,
                stop: StopReason::BudgetExhausted,
            };
        }

        cursor = last_ts + 1;
        pacer.pause().await;
    }
}
