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


use crate::body::FrameBody;
use crate::frame::{
    Cd11Frame, FrameHeader, FrameTrailer, FrameType, HEADER_LENGTH, TRAILER_FIXED_LENGTH,
    VERIFICATION_LENGTH,
};
use crate::wire;
use crate::{CodecError, CodecResult};
use bytes::{Buf, BufMut, BytesMut};
use crc::{CRC_64_ECMA_182, Crc};
use tokio_util::codec::{Decoder, Encoder};
use tracing::warn;

/// Default upper bound on a single frame.
pub const DEFAULT_MAX_FRAME_SIZE: usize = 1024 * 1024;

static CRC64: Crc<u64> = Crc::<u64>::new(&CRC_64_ECMA_182);

/// Computes the communication verification of a frame.
///
/// `frame` is every byte preceding the verification field; the field itself
/// is taken as zero.
pub fn comm_verification(frame: &[u8]) -> u64 {
    let mut digest = CRC64.digest();
    digest.update(frame);
    digest.update(&[0u8; VERIFICATION_LENGTH]);
    digest.finalize()
}

/// A codec translating between a byte stream and [`Cd11Frame`]s.
///
/// The decoder buffers until a whole frame is present and never consumes a
/// partial frame. A checksum mismatch is logged and the frame is still
/// delivered, unless strict verification is enabled.
///
/// # Example
/// ```
/// use cd11_codec::Cd11Codec;
///
/// let codec = Cd11Codec::new().with_strict_verification(true);
/// assert!(codec.strict_verification());
/// ```
#[derive(Clone, Debug)]
pub struct Cd11Codec {
    max_frame_size: usize,
    strict_verification: bool,
}

impl Cd11Codec {
    /// Creates a codec with a 1 MiB frame limit and lenient verification.
    pub fn new() -> Cd11Codec {
        Cd11Codec {
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            strict_verification: false,
        }
    }

    /// Sets the largest frame accepted or produced.
    #[must_use]
    pub fn with_max_frame_size(mut self, max_frame_size: usize) -> Self {
        self.max_frame_size = max_frame_size;
        self
    }

    /// Rejects frames whose communication verification does not match.
    #[must_use]
    pub fn with_strict_verification(mut self, strict: bool) -> Self {
        self.strict_verification = strict;
        self
    }

    /// Largest frame accepted or produced.
    pub fn max_frame_size(&self) -> usize {
        self.max_frame_size
    }

    /// Whether checksum mismatches are errors.
    pub fn strict_verification(&self) -> bool {
        self.strict_verification
    }

    fn check_size(&self, size: usize) -> CodecResult<()> {
        if size > self.max_frame_size {
            return Err(CodecError::FrameTooLarge {
                size,
                max: self.max_frame_size,
            });
        }
        Ok(())
    }
}

impl Default for Cd11Codec {
    fn default() -> Self {
        Cd11Codec::new()
    }
}

fn peek_i32(src: &[u8], at: usize) -> i32 {
    i32::from_be_bytes([src[at], src[at + 1], src[at + 2], src[at + 3]])
}

fn peek_len(src: &[u8], at: usize, field: &'static str) -> CodecResult<usize> {
    let raw = peek_i32(src, at);
    usize::try_from(raw).map_err(|_| CodecError::InvalidLength {
        field,
        value: i64::from(raw),
    })
}

impl Decoder for Cd11Codec {
    type Item = Cd11Frame;
    type Error = CodecError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.len() < HEADER_LENGTH {
            src.reserve(HEADER_LENGTH - src.len());
            return Ok(None);
        }

        let frame_type = FrameType::try_from(peek_i32(src, 0))?;
        let trailer_offset = peek_len(src, 4, "trailer offset")?;
        if trailer_offset < HEADER_LENGTH {
            return Err(CodecError::InvalidLength {
                field: "trailer offset",
                value: i64::try_from(trailer_offset).unwrap_or(i64::MAX),
            });
        }
        self.check_size(trailer_offset + TRAILER_FIXED_LENGTH + VERIFICATION_LENGTH)?;

        let auth_end = trailer_offset + TRAILER_FIXED_LENGTH;
        if src.len() < auth_end {
            src.reserve(auth_end - src.len());
            return Ok(None);
        }
        let auth_size = peek_len(src, trailer_offset + 4, "authentication")?;
        let total = auth_end + wire::padded_len(auth_size) + VERIFICATION_LENGTH;
        self.check_size(total)?;
        if src.len() < total {
            src.reserve(total - src.len());
            return Ok(None);
        }

        let mut raw = src.split_to(total).freeze();
        let computed = comm_verification(&raw[..total - VERIFICATION_LENGTH]);
        let mut body = raw.split_off(HEADER_LENGTH);
        let mut trailer = body.split_off(trailer_offset - HEADER_LENGTH);

        raw.advance(8);
        let header = FrameHeader::decode(&mut raw)?;

        let auth_key_identifier = trailer.get_i32();
        let auth_value = wire::get_sized(&mut trailer, "authentication")?;
        let expected = trailer.get_u64();
        if expected != computed {
            if self.strict_verification {
                return Err(CodecError::ChecksumMismatch { expected, computed });
            }
            warn!(
                frame_type = %frame_type,
                expected,
                computed,
                "Communication verification mismatch"
            );
        }

        let body = FrameBody::decode(frame_type, body)?;
        Ok(Some(Cd11Frame {
            header,
            body,
            trailer: FrameTrailer {
                auth_key_identifier,
                auth_value,
                comm_verification: expected,
            },
        }))
    }
}

impl Encoder<Cd11Frame> for Cd11Codec {
    type Error = CodecError;

    fn encode(&mut self, frame: Cd11Frame, dst: &mut BytesMut) -> Result<(), Self::Error> {
        <Self as Encoder<&Cd11Frame>>::encode(self, &frame, dst)
    }
}

impl Encoder<&Cd11Frame> for Cd11Codec {
    type Error = CodecError;

    fn encode(&mut self, frame: &Cd11Frame, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let mut body = BytesMut::new();
        frame.body.encode(&mut body)?;
        let trailer_offset = HEADER_LENGTH + body.len();
        let total = trailer_offset + frame.trailer.encoded_len() + VERIFICATION_LENGTH;
        self.check_size(total)?;

        let start = dst.len();
        dst.reserve(total);
        frame
            .header
            .encode(frame.frame_type(), trailer_offset, dst)?;
        dst.put_slice(&body);
        frame.trailer.encode(dst)?;
        let verification = comm_verification(&dst[start..]);
        dst.put_u64(verification);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::body::Alert;

    fn alert_frame() -> Cd11Frame {
        Cd11Frame::new(
            FrameHeader::new("TEST", "0"),
            FrameBody::Alert(Alert::new("Shutting down.")),
            FrameTrailer::new(0),
        )
    }

    fn encoded(frame: &Cd11Frame) -> BytesMut {
        let mut buf = BytesMut::new();
        Cd11Codec::new().encode(frame, &mut buf).unwrap();
        buf
    }

    #[test]
    fn test_partial_frame_not_consumed() {
        let full = encoded(&alert_frame());
        let mut codec = Cd11Codec::new();
        for cut in [0, 10, HEADER_LENGTH, full.len() - 1] {
            let mut partial = BytesMut::from(&full[..cut]);
            assert!(codec.decode(&mut partial).unwrap().is_none());
            assert_eq!(partial.len(), cut);
        }
    }

    #[test]
    fn test_two_frames_in_one_buffer() {
        let mut buf = encoded(&alert_frame());
        buf.extend_from_slice(&encoded(&alert_frame()));
        let mut codec = Cd11Codec::new();
        assert!(codec.decode(&mut buf).unwrap().is_some());
        assert!(codec.decode(&mut buf).unwrap().is_some());
        assert!(buf.is_empty());
    }

    #[test]
    fn test_verification_covers_frame() {
        let buf = encoded(&alert_frame());
        let len = buf.len();
        let carried = u64::from_be_bytes(buf[len - 8..].try_into().unwrap());
        assert_eq!(carried, comm_verification(&buf[..len - 8]));
    }

    #[test]
    fn test_strict_verification_rejects_corruption() {
        let mut buf = encoded(&alert_frame());
        let len = buf.len();
        buf[len - 1] ^= 0xFF;
        let mut codec = Cd11Codec::new().with_strict_verification(true);
        let err = codec.decode(&mut buf).unwrap_err();
        assert!(matches!(err, CodecError::ChecksumMismatch { .. }));
        assert!(buf.is_empty());
    }

    #[tracing_test::traced_test]
    #[test]
    fn test_lenient_verification_warns() {
        let mut buf = encoded(&alert_frame());
        let len = buf.len();
        buf[len - 1] ^= 0xFF;
        let frame = Cd11Codec::new().decode(&mut buf).unwrap().unwrap();
        assert_eq!(frame.frame_type(), FrameType::Alert);
        assert!(logs_contain("Communication verification mismatch"));
    }

    #[test]
    fn test_unknown_frame_type() {
        let mut buf = encoded(&alert_frame());
        buf[0..4].copy_from_slice(&26i32.to_be_bytes());
        let err = Cd11Codec::new().decode(&mut buf).unwrap_err();
        assert!(matches!(err, CodecError::UnknownFrameType(26)));
    }

    #[test]
    fn test_frame_too_large() {
        let mut codec = Cd11Codec::new().with_max_frame_size(40);
        let mut buf = BytesMut::new();
        let err = codec.encode(&alert_frame(), &mut buf).unwrap_err();
        assert!(matches!(err, CodecError::FrameTooLarge { max: 40, .. }));
        assert!(buf.is_empty());

        let mut buf = encoded(&alert_frame());
        assert!(matches!(
            codec.decode(&mut buf),
            Err(CodecError::FrameTooLarge { .. })
        ));
    }
}
