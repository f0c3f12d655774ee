//
// Copyright 2017-2026 Hans W. Uhlig. All Rights Reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//


//! Retransmission queue built from the consumer's acknacks.
//!
//! Gaps are closed ranges `(low, high)` of sequence numbers. Every acknack
//! replaces the whole queue; ranges are windowed to
//! `lowest <= low < high < next` where `next` is the next sequence number
//! the station will send. All comparisons are unsigned.

use cd11_codec::Acknack;
use std::collections::VecDeque;

/// Lowest sequence number the station retains.
pub const LOWEST_SEQUENCE_NUMBER: u64 = 1;

/// Ordered queue of sequence ranges the consumer reported missing.
///
/// The engine is the only owner; no internal synchronization is needed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GapTracker {
    lowest_sequence_number: u64,
    gaps: VecDeque<(u64, u64)>,
}

impl Default for GapTracker {
    fn default() -> Self {
        GapTracker::new()
    }
}

impl GapTracker {
    /// Empty tracker with the lower bound at [`LOWEST_SEQUENCE_NUMBER`].
    pub fn new() -> Self {
        GapTracker {
            lowest_sequence_number: LOWEST_SEQUENCE_NUMBER,
            gaps: VecDeque::new(),
        }
    }

    /// Inclusive lower bound of the retained window.
    pub fn lowest_sequence_number(&self) -> u64 {
        self.lowest_sequence_number
    }

    /// Replace the queue with the gaps carried by `acknack`.
    ///
    /// Returns `false` and leaves the queue untouched when the acknack names
    /// a frameset other than `expected_frameset`.
    pub fn apply_acknack(&mut self, acknack: &Acknack, expected_frameset: &str, next: u64) -> bool {
        if acknack.frameset_acked != expected_frameset {
            return false;
        }
        self.load(acknack.gap_ranges.iter().copied(), next);
        true
    }

    /// Replace the queue with `ranges`, windowed against `next`.
    pub fn load(&mut self, ranges: impl IntoIterator<Item = (u64, u64)>, next: u64) {
        let lowest = self.lowest_sequence_number;
        self.gaps.clear();
        self.gaps.extend(
            ranges
                .into_iter()
                .filter_map(|(low, high)| clip(low, high, lowest, next)),
        );
    }

    /// Take the next sequence number to retransmit.
    ///
    /// The head range shrinks by one from the front; a range is dropped once
    /// `low + 1` reaches `high`.
    pub fn next_gap(&mut self) -> Option<u64> {
        let (low, high) = self.gaps.pop_front()?;
        if let Some(rest) = low.checked_add(1).filter(|rest| *rest < high) {
            self.gaps.push_front((rest, high));
        }
        Some(low)
    }

    /// Outstanding ranges, head first.
    pub fn gaps(&self) -> impl ExactSizeIterator<Item = (u64, u64)> + '_ {
        self.gaps.iter().copied()
    }

    /// Number of outstanding ranges.
    pub fn len(&self) -> usize {
        self.gaps.len()
    }

    /// Whether nothing is left to retransmit.
    pub fn is_empty(&self) -> bool {
        self.gaps.is_empty()
    }
}

/// Window one reported range, or discard it.
fn clip(low: u64, high: u64, lowest: u64, next: u64) -> Option<(u64, u64)> {
    if low >= high || high < lowest || low >= next {
        return None;
    }
    let low = low.max(lowest);
    let high = if high >= next { next - 1 } else { high };
    // a range straddling both bounds can collapse once clipped
    (low < high).then_some((low, high))
}
