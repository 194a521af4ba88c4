//! Per-connection sequence number tracking.

use crate::error::GapError;
use crate::gap_list::{GapList, GapListState};
use cd11_protocol::Acknack;

/// Tracks which data frame sequence numbers a connection has received
/// and which are still missing.
///
/// A fresh tracker covers the entire unsigned window, so the first data
/// frame pins the observed bounds and everything between later frames
/// shows up as gaps. Peer ACKNACKs can reset the tracker when the
/// sender's frame set restarted, but peer-reported gaps are never
/// imported; local state only ever reflects what this side received.
#[derive(Debug, Default, PartialEq)]
pub struct SequenceTracker {
    list: GapList,
}

impl SequenceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one received sequence number. Returns whether it filled
    /// part of a gap.
    pub fn process_sequence_number(&self, sequence: u64) -> bool {
        let filled = self.list.add_value(sequence);
        if !filled {
            tracing::trace!(sequence, "sequence number outside all gaps");
        }
        filled
    }

    /// Records an inclusive range of received sequence numbers.
    pub fn process_sequence_range(&self, start: u64, end: u64) -> Result<(), GapError> {
        self.list.add_value_range(start, end)
    }

    /// Lowest sequence number observed so far.
    pub fn lowest(&self) -> u64 {
        self.list.min()
    }

    /// Highest sequence number observed so far.
    pub fn highest(&self) -> u64 {
        self.list.max()
    }

    pub fn gap_count(&self) -> usize {
        self.list.gap_count()
    }

    /// Inspects a peer ACKNACK for evidence that the sender restarted
    /// its frame set, and if so discards local state in favor of the
    /// peer's window.
    ///
    /// An inverted window (lowest above highest) is ignored. A reset is
    /// detected when the peer's highest falls below everything seen
    /// locally: the sender is numbering from scratch, so stale local
    /// gaps would request frames that no longer exist.
    pub fn check_for_reset(&self, acknack: &Acknack) {
        if acknack.lowest_seq_num > acknack.highest_seq_num {
            tracing::warn!(
                lowest = acknack.lowest_seq_num,
                highest = acknack.highest_seq_num,
                "ignoring acknack with inverted sequence window"
            );
            return;
        }
        if acknack.highest_seq_num < self.list.min() {
            tracing::info!(
                peer_lowest = acknack.lowest_seq_num,
                peer_highest = acknack.highest_seq_num,
                local_lowest = self.list.min(),
                "peer frame set restarted, resetting gap state"
            );
            // min <= max was checked above, reset cannot fail.
            let _ = self.list.reset(acknack.lowest_seq_num, acknack.highest_seq_num);
        }
    }

    /// Discards all tracked state, returning to the full window.
    pub fn reset(&self) {
        let _ = self.list.reset(0, u64::MAX);
    }

    /// Gap ranges in ACKNACK wire form: flattened pairs with exclusive
    /// bounds on both sides.
    pub fn acknack_gap_ranges(&self) -> Vec<u64> {
        let mut ranges = Vec::with_capacity(self.list.gap_count() * 2);
        for (lower, upper) in self.list.gaps(true, true) {
            ranges.push(lower);
            ranges.push(upper);
        }
        ranges
    }

    /// Builds the ACKNACK payload describing this tracker's state.
    pub fn to_acknack(&self, frame_set: impl Into<String>) -> Acknack {
        Acknack {
            frame_set_acked: frame_set.into(),
            lowest_seq_num: self.lowest(),
            highest_seq_num: self.highest(),
            gap_ranges: self.acknack_gap_ranges(),
        }
    }

    /// Drops gaps last modified before `expiration`.
    pub fn remove_gaps_modified_before(&self, expiration: chrono::DateTime<chrono::Utc>) {
        self.list.remove_gaps_modified_before(expiration);
    }

    pub fn to_state(&self) -> GapListState {
        self.list.to_state()
    }

    pub fn from_state(state: GapListState) -> Result<Self, GapError> {
        Ok(Self {
            list: GapList::from_state(state)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn acknack(lowest: u64, highest: u64) -> Acknack {
        Acknack {
            frame_set_acked: "STA01:0".to_string(),
            lowest_seq_num: lowest,
            highest_seq_num: highest,
            gap_ranges: vec![],
        }
    }

    #[test]
    fn test_fresh_tracker_covers_full_window() {
        let tracker = SequenceTracker::new();
        assert_eq!(tracker.lowest(), 0);
        assert_eq!(tracker.highest(), u64::MAX);
        assert_eq!(tracker.gap_count(), 1);
    }

    #[test]
    fn test_sequence_processing_pins_and_stretches_bounds() {
        let tracker = SequenceTracker::new();
        assert!(tracker.process_sequence_number(20));
        assert_eq!(tracker.lowest(), 20);
        assert_eq!(tracker.highest(), 20);

        assert!(tracker.process_sequence_number(25));
        assert_eq!(tracker.highest(), 25);
        // 21 through 24 are now a gap.
        assert_eq!(tracker.gap_count(), 3);
    }

    #[test]
    fn test_to_acknack_reports_exclusive_bounds() {
        let tracker = SequenceTracker::new();
        tracker.process_sequence_number(20);
        tracker.process_sequence_number(25);

        let acknack = tracker.to_acknack("STA01:0");
        assert_eq!(acknack.frame_set_acked, "STA01:0");
        assert_eq!(acknack.lowest_seq_num, 20);
        assert_eq!(acknack.highest_seq_num, 25);
        // The middle gap [21, 24] widens to (20, 25); the outer gaps
        // keep their u64::MAX ends unshifted.
        let pairs: Vec<(u64, u64)> = acknack
            .gap_ranges
            .chunks(2)
            .map(|pair| (pair[0], pair[1]))
            .collect();
        assert!(pairs.contains(&(20, 25)));
        assert_eq!(acknack.gap_count(), 3);
    }

    #[test]
    fn test_reset_detected_when_peer_restarts_numbering() {
        let tracker = SequenceTracker::new();
        tracker.process_sequence_number(20);
        tracker.process_sequence_number(30);
        assert_eq!(tracker.lowest(), 20);

        // Peer reports a window entirely below everything seen here.
        tracker.check_for_reset(&acknack(10, 15));
        assert_eq!(tracker.lowest(), 10);
        assert_eq!(tracker.highest(), 15);
        assert_eq!(tracker.gap_count(), 1);
        assert_eq!(tracker.to_state().gaps[0].start, 10);
        assert_eq!(tracker.to_state().gaps[0].end, 15);
    }

    #[test]
    fn test_no_reset_when_windows_overlap() {
        let tracker = SequenceTracker::new();
        tracker.process_sequence_number(20);
        tracker.process_sequence_number(30);

        tracker.check_for_reset(&acknack(10, 25));
        assert_eq!(tracker.lowest(), 20);
        assert_eq!(tracker.highest(), 30);
    }

    #[test]
    fn test_inverted_acknack_window_ignored() {
        let tracker = SequenceTracker::new();
        tracker.process_sequence_number(100);

        tracker.check_for_reset(&acknack(50, 10));
        assert_eq!(tracker.lowest(), 100);
        assert_eq!(tracker.highest(), 100);
    }

    #[test]
    fn test_peer_gaps_are_not_imported() {
        let tracker = SequenceTracker::new();
        tracker.process_sequence_number(20);

        let mut peer = acknack(1, 15);
        peer.gap_ranges = vec![3, 7, 9, 12];
        tracker.check_for_reset(&peer);

        // Reset took the peer's window but none of its gaps.
        assert_eq!(tracker.gap_count(), 1);
        assert_eq!(tracker.to_state().gaps[0].start, 1);
        assert_eq!(tracker.to_state().gaps[0].end, 15);
    }

    #[test]
    fn test_reset_returns_to_full_window() {
        let tracker = SequenceTracker::new();
        tracker.process_sequence_number(5);
        tracker.reset();
        assert_eq!(tracker.lowest(), 0);
        assert_eq!(tracker.highest(), u64::MAX);
        assert_eq!(tracker.gap_count(), 1);
    }

    #[test]
    fn test_acknack_travels_the_wire() {
        use cd11_protocol::{read_frame, DecodeEvent, DecodedFrame, FrameDecoder, FrameFactory, Payload};

        let sender = SequenceTracker::new();
        sender.process_sequence_number(3);
        sender.process_sequence_number(6);

        let frame = FrameFactory::unauthenticated("STA01", "IDC")
            .unwrap()
            .wrap(Payload::Acknack(sender.to_acknack("STA01:0")))
            .unwrap();

        let mut decoder = FrameDecoder::new();
        decoder.extend(&frame.encode().unwrap());
        let span = match decoder.decode() {
            Some(DecodeEvent::Frame(span)) => span,
            other => panic!("expected frame span, got {other:?}"),
        };
        let decoded = match read_frame(span) {
            DecodedFrame::Frame(frame) => frame,
            DecodedFrame::Malformed(m) => panic!("unexpected malformed frame: {}", m.cause),
        };
        let Payload::Acknack(acknack) = decoded.payload else {
            panic!("expected acknack payload");
        };
        assert_eq!(acknack.lowest_seq_num, 3);
        assert_eq!(acknack.highest_seq_num, 6);

        // The receiver sees an overlapping window, so no reset occurs.
        let receiver = SequenceTracker::new();
        receiver.process_sequence_number(4);
        receiver.check_for_reset(&acknack);
        assert_eq!(receiver.lowest(), 4);
    }

    #[test]
    fn test_state_roundtrip() {
        let tracker = SequenceTracker::new();
        for seq in [10, 12, 15, 20] {
            tracker.process_sequence_number(seq);
        }
        let restored = SequenceTracker::from_state(tracker.to_state()).unwrap();
        assert_eq!(restored, tracker);
    }
}
