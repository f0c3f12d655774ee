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


//! Acknack body: the consumer's view of what it has received.

use crate::wire;
use crate::{CodecError, CodecResult};
use bytes::{Buf, BufMut};

/// Width of the frameset name slot.
pub const FRAMESET_LENGTH: usize = 20;

/// Acknowledges received data and reports missing sequence ranges.
///
/// Each gap is a `(low, high)` pair as sent by the consumer. No ordering or
/// validity is assumed here; consumers of this type clip ranges against the
/// reported window.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Acknack {
    /// Frameset being acknowledged, `creator:destination`
    pub frameset_acked: String,
    /// Lowest sequence number the consumer still tracks
    pub lowest_sequence_number: u64,
    /// Highest sequence number received
    pub highest_sequence_number: u64,
    /// Reported gap ranges
    pub gap_ranges: Vec<(u64, u64)>,
}

impl Acknack {
    pub(crate) fn encode(&self, dst: &mut impl BufMut) -> CodecResult<()> {
        wire::put_fixed_str(dst, &self.frameset_acked, FRAMESET_LENGTH, "frameset")?;
        dst.put_u64(self.lowest_sequence_number);
        dst.put_u64(self.highest_sequence_number);
        dst.put_i32(wire::len_i32(self.gap_ranges.len(), "gap count")?);
        for (low, high) in &self.gap_ranges {
            dst.put_u64(*low);
            dst.put_u64(*high);
        }
        Ok(())
    }

    pub(crate) fn decode(buf: &mut impl Buf) -> CodecResult<Self> {
        let frameset_acked = wire::get_fixed_str(buf, FRAMESET_LENGTH, "frameset")?;
        let lowest_sequence_number = wire::get_u64(buf, "acknack")?;
        let highest_sequence_number = wire::get_u64(buf, "acknack")?;
        let count = wire::get_len(buf, "gap count")?;
        let required = count.checked_mul(16).ok_or(CodecError::InvalidLength {
            field: "gap count",
            value: i64::try_from(count).unwrap_or(i64::MAX),
        })?;
        wire::ensure(buf, "gap ranges", required)?;
        let gap_ranges = (0..count)
            .map(|_| (buf.get_u64(), buf.get_u64()))
            .collect();
        Ok(Acknack {
            frameset_acked,
            lowest_sequence_number,
            highest_sequence_number,
            gap_ranges,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::{Bytes, BytesMut};

    #[test]
    fn test_acknack_layout() {
        let acknack = Acknack {
            frameset_acked: "TEST:0".to_string(),
            lowest_sequence_number: 1,
            highest_sequence_number: 99,
            gap_ranges: vec![(0, 5), (50, 60)],
        };
        let mut buf = BytesMut::new();
        acknack.encode(&mut buf).unwrap();
        assert_eq!(buf.len(), 20 + 8 + 8 + 4 + 2 * 16);
        assert_eq!(Acknack::decode(&mut buf.freeze()).unwrap(), acknack);
    }

    #[test]
    fn test_gap_count_exceeds_body() {
        let mut buf = BytesMut::new();
        Acknack {
            frameset_acked: "TEST:0".to_string(),
            ..Acknack::default()
        }
        .encode(&mut buf)
        .unwrap();
        // claim three ranges without sending them
        let len = buf.len();
        buf[len - 4..].copy_from_slice(&3i32.to_be_bytes());
        let err = Acknack::decode(&mut buf.freeze()).unwrap_err();
        assert!(matches!(err, CodecError::Truncated { required: 48, .. }));
    }

    #[test]
    fn test_unsigned_ranges_preserved() {
        let acknack = Acknack {
            frameset_acked: "A:B".to_string(),
            lowest_sequence_number: u64::MAX - 1,
            highest_sequence_number: u64::MAX,
            gap_ranges: vec![(u64::MAX - 3, u64::MAX)],
        };
        let mut buf = BytesMut::new();
        acknack.encode(&mut buf).unwrap();
        let decoded = Acknack::decode(&mut Bytes::from(buf)).unwrap();
        assert_eq!(decoded.gap_ranges, vec![(u64::MAX - 3, u64::MAX)]);
    }
}
