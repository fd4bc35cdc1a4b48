//! Merged scans over several independently paged sources.
//!
//! [`MultiQueryAccess`] walks several sources (typically one query per entity
//! type) in one total order given by a caller-supplied comparator, without a
//! database-level `UNION` across heterogeneous tables. Each source is read in
//! pages of `batch_size` rows through [`PagedQuery`]; at most one page per
//! source is held in memory at a time, so memory stays bounded by
//! `sources × batch_size` rows whatever the total row count.
//!
//! ```rust,ignore
//! let mut scan = MultiQueryAccess::with_batch_size(
//!     Box::new(|a: Candidate<'_, &str, i64>, b| a.value.cmp(b.value)),
//!     100,
//! )?;
//! scan.add_source("place", place_count, Box::new(place_query))?;
//! scan.add_source("sorcerer", sorcerer_count, Box::new(sorcerer_query))?;
//! while scan.next().await? {
//!     handle(scan.source_type()?, scan.get()?);
//! }
//! ```

use async_trait::async_trait;
use std::cmp::Ordering;
use std::collections::VecDeque;
use std::fmt::Debug;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("Either empty or next() has not been called")]
    InvalidState,

    #[error("Batch size must be greater than 0")]
    InvalidBatchSize,

    #[error("Unknown source: {0}")]
    UnknownSource(String),

    #[error("Source added twice: {0}")]
    DuplicateSource(String),

    #[error("Moving source {source_type} by {delta} would set its next value position to {position}, which is less than 0")]
    NegativePosition {
        source_type: String,
        delta: i64,
        position: i128,
    },

    #[error("Source {source_type} returned no rows but {remaining} were still expected")]
    SourceExhausted { source_type: String, remaining: u64 },

    #[error("The {counter} count of source {source_type} did not change by exactly 1")]
    CounterDrift {
        source_type: String,
        counter: &'static str,
    },

    #[error("Failed to fetch a page from source {source_type}: {error}")]
    Fetch {
        source_type: String,
        #[source]
        error: Box<dyn std::error::Error + Send + Sync>,
    },
}

/// A re-runnable query supporting offset/limit paging.
#[async_trait]
pub trait PagedQuery: Send {
    type Item: Send;

    /// Fetch at most `limit` rows starting at row `offset`.
    async fn fetch_page(&mut self, offset: u64, limit: usize) -> anyhow::Result<Vec<Self::Item>>;
}

/// A value considered for the next position, together with its source.
pub struct Candidate<'a, K, T> {
    pub value: &'a T,
    pub source_type: &'a K,
}

impl<K, T> Clone for Candidate<'_, K, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<K, T> Copy for Candidate<'_, K, T> {}

/// Orders candidates; the smallest one is returned next.
pub type Comparator<K, T> =
    Box<dyn for<'a> Fn(Candidate<'a, K, T>, Candidate<'a, K, T>) -> Ordering + Send + Sync>;

struct SourceCursor<K, T> {
    source_type: K,
    query: Box<dyn PagedQuery<Item = T>>,
    remaining: u64,
    processed: u64,
    buffer: VecDeque<T>,
}

impl<K: Debug, T> SourceCursor<K, T> {
    fn name(&self) -> String {
        format!("{:?}", self.source_type)
    }

    // Both counters move together or not at all.
    fn advance(&mut self) -> Result<(), ScanError> {
        let processed = self.processed.checked_add(1).ok_or_else(|| ScanError::CounterDrift {
            source_type: self.name(),
            counter: "processed",
        })?;
        let remaining = self.remaining.checked_sub(1).ok_or_else(|| ScanError::CounterDrift {
            source_type: self.name(),
            counter: "remaining",
        })?;
        self.processed = processed;
        self.remaining = remaining;
        Ok(())
    }
}

/// Merged, batched scan over several sources.
///
/// Sources are kept in the order they were added; when the comparator finds
/// two heads equal, the earlier source wins.
pub struct MultiQueryAccess<K, T> {
    sources: Vec<SourceCursor<K, T>>,
    comparator: Comparator<K, T>,
    batch_size: usize,
    current: Option<(usize, T)>,
}

impl<K, T> MultiQueryAccess<K, T>
where
    K: Clone + PartialEq + Debug + Send,
    T: Send,
{
    /// Scan without real batching: every refill fetches a single row.
    pub fn new(comparator: Comparator<K, T>) -> Self {
        Self {
            sources: Vec::new(),
            comparator,
            batch_size: 1,
            current: None,
        }
    }

    /// Scan fetching `batch_size` rows per refill.
    pub fn with_batch_size(comparator: Comparator<K, T>, batch_size: usize) -> Result<Self, ScanError> {
        if batch_size == 0 {
            return Err(ScanError::InvalidBatchSize);
        }
        Ok(Self {
            batch_size,
            ..Self::new(comparator)
        })
    }

    /// Add a source holding `count` rows.
    pub fn add_source(
        &mut self,
        source_type: K,
        count: u64,
        query: Box<dyn PagedQuery<Item = T>>,
    ) -> Result<(), ScanError> {
        if self.sources.iter().any(|s| s.source_type == source_type) {
            return Err(ScanError::DuplicateSource(format!("{source_type:?}")));
        }
        self.sources.push(SourceCursor {
            source_type,
            query,
            remaining: count,
            processed: 0,
            buffer: VecDeque::with_capacity(self.batch_size),
        });
        Ok(())
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Advance to the next value in merged order.
    ///
    /// Returns `false` once every source is exhausted.
    pub async fn next(&mut self) -> Result<bool, ScanError> {
        self.current = None;

        for cursor in self.sources.iter_mut() {
            if cursor.remaining == 0 || !cursor.buffer.is_empty() {
                continue;
            }
            let page = cursor
                .query
                .fetch_page(cursor.processed, self.batch_size)
                .await
                .map_err(|error| ScanError::Fetch {
                    source_type: cursor.name(),
                    error: error.into(),
                })?;
            debug!(
                "Fetched {} rows from {:?} at offset {}",
                page.len(),
                cursor.source_type,
                cursor.processed
            );
            if page.is_empty() {
                return Err(ScanError::SourceExhausted {
                    source_type: cursor.name(),
                    remaining: cursor.remaining,
                });
            }
            cursor.buffer.extend(page);
        }

        let mut winner: Option<usize> = None;
        for (idx, cursor) in self.sources.iter().enumerate() {
            if cursor.remaining == 0 {
                continue;
            }
            let Some(head) = cursor.buffer.front() else {
                continue;
            };
            let candidate = Candidate {
                value: head,
                source_type: &cursor.source_type,
            };
            winner = match winner {
                None => Some(idx),
                Some(best) => {
                    let best_cursor = &self.sources[best];
                    let best_candidate = Candidate {
                        value: best_cursor.buffer.front().ok_or(ScanError::InvalidState)?,
                        source_type: &best_cursor.source_type,
                    };
                    if (self.comparator)(candidate, best_candidate) == Ordering::Less {
                        Some(idx)
                    } else {
                        Some(best)
                    }
                }
            };
        }

        let Some(idx) = winner else {
            return Ok(false);
        };
        let cursor = &mut self.sources[idx];
        let value = cursor.buffer.pop_front().ok_or(ScanError::InvalidState)?;
        cursor.advance()?;
        self.current = Some((idx, value));
        Ok(true)
    }

    /// The current value.
    pub fn get(&self) -> Result<&T, ScanError> {
        self.current
            .as_ref()
            .map(|(_, value)| value)
            .ok_or(ScanError::InvalidState)
    }

    /// Source of the current value.
    pub fn source_type(&self) -> Result<&K, ScanError> {
        self.current
            .as_ref()
            .map(|(idx, _)| &self.sources[*idx].source_type)
            .ok_or(ScanError::InvalidState)
    }

    /// Move the offset of the next page fetched from `source_type` by
    /// `delta` rows.
    ///
    /// Rows already buffered for the source are still returned first; the
    /// new position only applies to the next refill.
    pub fn add_to_next_value_position(&mut self, source_type: &K, delta: i64) -> Result<(), ScanError> {
        let cursor = self
            .sources
            .iter_mut()
            .find(|s| &s.source_type == source_type)
            .ok_or_else(|| ScanError::UnknownSource(format!("{source_type:?}")))?;
        let position = cursor.processed as i128 + delta as i128;
        if position < 0 {
            return Err(ScanError::NegativePosition {
                source_type: cursor.name(),
                delta,
                position,
            });
        }
        cursor.processed = u64::try_from(position).map_err(|_| ScanError::CounterDrift {
            source_type: cursor.name(),
            counter: "processed",
        })?;
        Ok(())
    }

    /// Rows of `source_type` not yet returned, if the source exists.
    pub fn remaining(&self, source_type: &K) -> Option<u64> {
        self.sources
            .iter()
            .find(|s| &s.source_type == source_type)
            .map(|s| s.remaining)
    }

    /// Offset of the next page fetched from `source_type`, if the source
    /// exists.
    pub fn processed(&self, source_type: &K) -> Option<u64> {
        self.sources
            .iter()
            .find(|s| &s.source_type == source_type)
            .map(|s| s.processed)
    }
}
