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


//! Error type for CD 1.1 framing.

use thiserror::Error;

/// Result Type for Codec Operations
pub type CodecResult<T> = Result<T, CodecError>;

/// Errors raised while encoding or decoding CD 1.1 frames.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The underlying stream failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The header carried a frame type identifier outside the supported set.
    #[error("Unknown frame type: {0}")]
    UnknownFrameType(i32),

    /// A length or count field was negative or did not fit the wire format.
    #[error("Invalid length for {field}: {value}")]
    InvalidLength {
        /// Field the length belongs to
        field: &'static str,
        /// Offending value
        value: i64,
    },

    /// A section ended before all of its fields could be read.
    #[error("Truncated {section} (required: {required}, available: {available})")]
    Truncated {
        /// Section being decoded
        section: &'static str,
        /// Number of bytes required
        required: usize,
        /// Number of bytes available
        available: usize,
    },

    /// A string was longer than its fixed-width slot.
    #[error("Field {field} too long (max: {max}, actual: {actual})")]
    FieldTooLong {
        /// Field being encoded
        field: &'static str,
        /// Width of the slot
        max: usize,
        /// Length of the value
        actual: usize,
    },

    /// A text field did not hold UTF-8.
    #[error("Field {field} is not valid UTF-8")]
    InvalidUtf8 {
        /// Field being decoded
        field: &'static str,
    },

    /// The trailer's communication verification did not match the frame.
    #[error("Checksum mismatch (expected: {expected:#018x}, computed: {computed:#018x})")]
    ChecksumMismatch {
        /// Value carried by the frame
        expected: u64,
        /// Value computed over the received bytes
        computed: u64,
    },

    /// The frame exceeds the configured size limit.
    #[error("Frame of {size} bytes exceeds limit of {max} bytes")]
    FrameTooLarge {
        /// Size announced or produced
        size: usize,
        /// Configured limit
        max: usize,
    },
}

impl CodecError {
    /// Returns `true` if the stream can still be read after this error.
    ///
    /// Errors detected after a whole frame was consumed leave the stream
    /// aligned on the next frame boundary.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            CodecError::ChecksumMismatch { .. }
                | CodecError::InvalidUtf8 { .. }
                | CodecError::Truncated { .. }
                | CodecError::InvalidLength { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CodecError::UnknownFrameType(26);
        assert_eq!(err.to_string(), "Unknown frame type: 26");

        let err = CodecError::Truncated {
            section: "acknack",
            required: 48,
            available: 12,
        };
        assert_eq!(
            err.to_string(),
            "Truncated acknack (required: 48, available: 12)"
        );

        let err = CodecError::ChecksumMismatch {
            expected: 1,
            computed: 2,
        };
        assert_eq!(
            err.to_string(),
            "Checksum mismatch (expected: 0x0000000000000001, computed: 0x0000000000000002)"
        );
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "eof");
        let err: CodecError = io.into();
        assert!(matches!(err, CodecError::Io(_)));
        assert!(!err.is_recoverable());
    }

    #[test]
    fn test_recoverable() {
        assert!(CodecError::InvalidUtf8 { field: "alert" }.is_recoverable());
        assert!(!CodecError::UnknownFrameType(0).is_recoverable());
        assert!(!CodecError::FrameTooLarge { size: 10, max: 5 }.is_recoverable());
    }
}
