//! # cd11-gaps
//!
//! Sequence-number gap tracking for CD-1.1 connections.
//!
//! A receiver records every data frame sequence number it sees in a
//! [`SequenceTracker`]; the gaps that remain are exactly the frames to
//! request again via ACKNACK. [`GapStateStore`] persists tracker state
//! across restarts so accumulated gap knowledge survives a process
//! bounce.
//!
//! All sequence numbers are unsigned 64-bit values and compare as such,
//! so `u64::MAX` is the largest sequence number, not a sentinel.

pub mod error;
pub mod gap_list;
pub mod store;
pub mod tracker;

pub use error::GapError;
pub use gap_list::{Gap, GapList, GapListState};
pub use store::GapStateStore;
pub use tracker::SequenceTracker;
