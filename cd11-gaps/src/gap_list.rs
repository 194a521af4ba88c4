//! Inclusive gap intervals over an unsigned sequence window.
//!
//! A [`GapList`] starts as one gap spanning its whole window and shrinks
//! as sequence numbers arrive: a value at a gap edge trims the gap, a
//! value in the middle splits it, and the last value of a one-element
//! gap eliminates it. Gap bounds are inclusive on both ends.

use crate::error::GapError;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// One inclusive range of sequence numbers that have not been received.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Gap {
    #[serde(rename = "lo")]
    pub start: u64,
    #[serde(rename = "hi")]
    pub end: u64,
    /// When this gap was last trimmed or split, for expiry.
    #[serde(rename = "lastModified")]
    pub modified: DateTime<Utc>,
}

impl Gap {
    fn new(start: u64, end: u64, modified: DateTime<Utc>) -> Self {
        Self {
            start,
            end,
            modified,
        }
    }

    fn contains(&self, value: u64) -> bool {
        self.start <= value && value <= self.end
    }
}

/// Serializable snapshot of a [`GapList`].
///
/// The first-value flag is deliberately not part of the snapshot; a
/// restored list treats its next value as the first observed one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GapListState {
    pub min: u64,
    pub max: u64,
    pub gaps: Vec<Gap>,
}

#[derive(Debug)]
struct Inner {
    min: u64,
    max: u64,
    first_value: bool,
    /// Sorted by start, pairwise disjoint.
    gaps: Vec<Gap>,
}

/// Thread-safe gap bookkeeping over a fixed window of sequence numbers.
///
/// `min` and `max` track the observed value bounds and are pinned to the
/// first value added; the gap intervals themselves stay within the
/// window given at construction.
#[derive(Debug)]
pub struct GapList {
    inner: Mutex<Inner>,
}

impl Default for GapList {
    /// A list covering the entire unsigned window, `[0, u64::MAX]`.
    fn default() -> Self {
        Self {
            inner: Mutex::new(Inner {
                min: 0,
                max: u64::MAX,
                first_value: true,
                gaps: vec![Gap::new(0, u64::MAX, Utc::now())],
            }),
        }
    }
}

impl GapList {
    /// A list whose single initial gap spans `[min, max]`.
    pub fn new(min: u64, max: u64) -> Result<Self, GapError> {
        if min > max {
            return Err(GapError::InvalidRange { min, max });
        }
        Ok(Self {
            inner: Mutex::new(Inner {
                min,
                max,
                first_value: true,
                gaps: vec![Gap::new(min, max, Utc::now())],
            }),
        })
    }

    /// Records one received sequence number. Returns whether the value
    /// fell inside a gap and changed the list.
    ///
    /// The first value ever recorded pins both observed bounds to it;
    /// later values stretch the bounds outward. A fully drained list
    /// ignores new values entirely.
    pub fn add_value(&self, value: u64) -> bool {
        let mut inner = self.inner.lock();
        if inner.gaps.is_empty() {
            return false;
        }

        if inner.first_value {
            inner.min = value;
            inner.max = value;
            inner.first_value = false;
        } else {
            if value < inner.min {
                inner.min = value;
            }
            if value > inner.max {
                inner.max = value;
            }
        }

        match inner.gaps.iter().position(|gap| gap.contains(value)) {
            Some(idx) => {
                inner.fill(idx, value);
                true
            }
            None => false,
        }
    }

    /// Records a whole inclusive range of received sequence numbers.
    /// Both endpoints must lie within the current observed bounds.
    pub fn add_value_range(&self, start: u64, end: u64) -> Result<(), GapError> {
        let mut inner = self.inner.lock();
        for value in [start, end] {
            if value < inner.min || value > inner.max {
                return Err(GapError::RangeOutOfBounds {
                    start,
                    end,
                    min: inner.min,
                    max: inner.max,
                });
            }
        }
        if inner.gaps.is_empty() {
            return Ok(());
        }

        let now = Utc::now();
        let mut kept = Vec::with_capacity(inner.gaps.len() + 1);
        for gap in &inner.gaps {
            if gap.end < start || gap.start > end {
                kept.push(*gap);
                continue;
            }
            // Overlap: keep whatever sticks out on either side.
            if gap.start < start {
                kept.push(Gap::new(gap.start, start - 1, now));
            }
            if gap.end > end {
                kept.push(Gap::new(end + 1, gap.end, now));
            }
        }
        inner.gaps = kept;
        Ok(())
    }

    pub fn min(&self) -> u64 {
        self.inner.lock().min
    }

    pub fn max(&self) -> u64 {
        self.inner.lock().max
    }

    pub fn gap_count(&self) -> usize {
        self.inner.lock().gaps.len()
    }

    /// Inclusive gap intervals in ascending order.
    pub fn intervals(&self) -> Vec<(u64, u64)> {
        self.gaps(false, false)
    }

    /// Gap intervals with optionally exclusive bounds: an exclusive
    /// start is shifted one below the gap, an exclusive end one above.
    /// An end of `u64::MAX` is never shifted. A start of zero wraps to
    /// `u64::MAX`, matching unsigned arithmetic on the wire.
    pub fn gaps(&self, exclusive_start: bool, exclusive_end: bool) -> Vec<(u64, u64)> {
        let inner = self.inner.lock();
        inner
            .gaps
            .iter()
            .map(|gap| {
                let lower = if exclusive_start {
                    gap.start.wrapping_sub(1)
                } else {
                    gap.start
                };
                let upper = if exclusive_end && gap.end != u64::MAX {
                    gap.end + 1
                } else {
                    gap.end
                };
                (lower, upper)
            })
            .collect()
    }

    /// Drops gaps last modified before `expiration`. Used to stop
    /// re-requesting data the sender will never retransmit.
    pub fn remove_gaps_modified_before(&self, expiration: DateTime<Utc>) {
        let mut inner = self.inner.lock();
        let before = inner.gaps.len();
        inner.gaps.retain(|gap| gap.modified >= expiration);
        let dropped = before - inner.gaps.len();
        if dropped > 0 {
            tracing::debug!(dropped, remaining = inner.gaps.len(), "expired stale gaps");
        }
    }

    /// Discards all state and starts over with a single gap spanning
    /// `[min, max]`.
    pub fn reset(&self, min: u64, max: u64) -> Result<(), GapError> {
        if min > max {
            return Err(GapError::InvalidRange { min, max });
        }
        *self.inner.lock() = Inner {
            min,
            max,
            first_value: true,
            gaps: vec![Gap::new(min, max, Utc::now())],
        };
        Ok(())
    }

    pub fn to_state(&self) -> GapListState {
        let inner = self.inner.lock();
        GapListState {
            min: inner.min,
            max: inner.max,
            gaps: inner.gaps.clone(),
        }
    }

    /// Rebuilds a list from a snapshot. The restored list treats the
    /// next added value as its first.
    pub fn from_state(state: GapListState) -> Result<Self, GapError> {
        if state.min > state.max {
            return Err(GapError::InvalidRange {
                min: state.min,
                max: state.max,
            });
        }
        let mut gaps = state.gaps;
        gaps.sort_by_key(|gap| gap.start);
        Ok(Self {
            inner: Mutex::new(Inner {
                min: state.min,
                max: state.max,
                first_value: true,
                gaps,
            }),
        })
    }
}

impl PartialEq for GapList {
    fn eq(&self, other: &Self) -> bool {
        self.to_state() == other.to_state()
    }
}

impl Inner {
    fn fill(&mut self, idx: usize, value: u64) {
        let now = Utc::now();
        let gap = self.gaps[idx];
        if gap.start == value && gap.end == value {
            self.gaps.remove(idx);
        } else if gap.start == value {
            self.gaps[idx].start += 1;
            self.gaps[idx].modified = now;
        } else if gap.end == value {
            self.gaps[idx].end -= 1;
            self.gaps[idx].modified = now;
        } else {
            self.gaps[idx].end = value - 1;
            self.gaps[idx].modified = now;
            self.gaps
                .insert(idx + 1, Gap::new(value + 1, gap.end, now));
        }
    }
}
