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


//! CD 1.1 frame envelope: type identifiers, header and trailer.

use crate::body::FrameBody;
use crate::wire;
use crate::{CodecError, CodecResult};
use bytes::{Buf, BufMut, Bytes};

/// Size of the fixed frame header in bytes.
pub const HEADER_LENGTH: usize = 36;
/// Width of the creator and destination slots in the header.
pub const NAME_LENGTH: usize = 8;
/// Size of the trailer fields preceding the authentication value.
pub const TRAILER_FIXED_LENGTH: usize = 8;
/// Size of the communication verification field closing each frame.
pub const VERIFICATION_LENGTH: usize = 8;

/// Frame kinds understood by the codec.
///
/// Identifiers not listed here fail to decode.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum FrameType {
    /// Station asks a manager where to deliver data
    ConnectionRequest = 1,
    /// Manager names the data consumer
    ConnectionResponse = 2,
    /// Option negotiation request
    OptionRequest = 3,
    /// Option negotiation response
    OptionResponse = 4,
    /// Waveform data
    Data = 5,
    /// Receipt acknowledgement and gap report
    Acknack = 6,
    /// Session is being terminated
    Alert = 7,
    /// Station command request
    CommandRequest = 8,
    /// Station command response
    CommandResponse = 9,
    /// Encapsulated CD-1 data
    CdOneEncapsulation = 13,
}

impl FrameType {
    /// Wire identifier.
    pub const fn id(self) -> i32 {
        self as i32
    }

    /// Protocol name of the frame kind.
    pub const fn name(self) -> &'static str {
        match self {
            FrameType::ConnectionRequest => "CONNECTION_REQUEST",
            FrameType::ConnectionResponse => "CONNECTION_RESPONSE",
            FrameType::OptionRequest => "OPTION_REQUEST",
            FrameType::OptionResponse => "OPTION_RESPONSE",
            FrameType::Data => "DATA",
            FrameType::Acknack => "ACKNACK",
            FrameType::Alert => "ALERT",
            FrameType::CommandRequest => "COMMAND_REQUEST",
            FrameType::CommandResponse => "COMMAND_RESPONSE",
            FrameType::CdOneEncapsulation => "CD_ONE_ENCAPSULATION",
        }
    }
}

impl TryFrom<i32> for FrameType {
    type Error = CodecError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        Ok(match value {
            1 => FrameType::ConnectionRequest,
            2 => FrameType::ConnectionResponse,
            3 => FrameType::OptionRequest,
            4 => FrameType::OptionResponse,
            5 => FrameType::Data,
            6 => FrameType::Acknack,
            7 => FrameType::Alert,
            8 => FrameType::CommandRequest,
            9 => FrameType::CommandResponse,
            13 => FrameType::CdOneEncapsulation,
            other => return Err(CodecError::UnknownFrameType(other)),
        })
    }
}

impl std::fmt::Display for FrameType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Routing fields shared by every frame.
///
/// The frame type and trailer offset are derived from the body when the
/// frame is encoded.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FrameHeader {
    /// Originator of the frame, at most 8 bytes
    pub creator: String,
    /// Intended recipient, at most 8 bytes
    pub destination: String,
    /// Sequence number; only meaningful on data frames
    pub sequence_number: u64,
    /// Series identifier
    pub series: i32,
}

impl FrameHeader {
    /// Header with sequence number and series zeroed.
    pub fn new(creator: impl Into<String>, destination: impl Into<String>) -> Self {
        FrameHeader {
            creator: creator.into(),
            destination: destination.into(),
            sequence_number: 0,
            series: 0,
        }
    }

    pub(crate) fn encode(
        &self,
        frame_type: FrameType,
        trailer_offset: usize,
        dst: &mut impl BufMut,
    ) -> CodecResult<()> {
        dst.put_i32(frame_type.id());
        dst.put_i32(wire::len_i32(trailer_offset, "trailer offset")?);
        wire::put_fixed_str(dst, &self.creator, NAME_LENGTH, "creator")?;
        wire::put_fixed_str(dst, &self.destination, NAME_LENGTH, "destination")?;
        dst.put_u64(self.sequence_number);
        dst.put_i32(self.series);
        Ok(())
    }

    /// Decodes the routing fields following the type and trailer offset.
    pub(crate) fn decode(buf: &mut impl Buf) -> CodecResult<Self> {
        let creator = wire::get_fixed_str(buf, NAME_LENGTH, "creator")?;
        let destination = wire::get_fixed_str(buf, NAME_LENGTH, "destination")?;
        let sequence_number = wire::get_u64(buf, "header")?;
        let series = wire::get_i32(buf, "header")?;
        Ok(FrameHeader {
            creator,
            destination,
            sequence_number,
            series,
        })
    }
}

/// Authentication and verification fields closing every frame.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FrameTrailer {
    /// Key used to sign the frame, zero when unauthenticated
    pub auth_key_identifier: i32,
    /// Signature bytes
    pub auth_value: Bytes,
    /// CRC-64 carried by a decoded frame; recomputed on encode
    pub comm_verification: u64,
}

impl FrameTrailer {
    /// Unauthenticated trailer using `auth_key_identifier`.
    pub fn new(auth_key_identifier: i32) -> Self {
        FrameTrailer {
            auth_key_identifier,
            ..FrameTrailer::default()
        }
    }

    /// Bytes written before the communication verification field.
    pub(crate) fn encoded_len(&self) -> usize {
        TRAILER_FIXED_LENGTH + wire::padded_len(self.auth_value.len())
    }

    pub(crate) fn encode(&self, dst: &mut impl BufMut) -> CodecResult<()> {
        dst.put_i32(self.auth_key_identifier);
        wire::put_sized(dst, &self.auth_value, "authentication")
    }
}

/// A complete CD 1.1 frame.
#[derive(Clone, Debug, PartialEq)]
pub struct Cd11Frame {
    /// Routing header
    pub header: FrameHeader,
    /// Typed body
    pub body: FrameBody,
    /// Authentication trailer
    pub trailer: FrameTrailer,
}

impl Cd11Frame {
    /// Assembles a frame from its sections.
    pub fn new(header: FrameHeader, body: FrameBody, trailer: FrameTrailer) -> Self {
        Cd11Frame {
            header,
            body,
            trailer,
        }
    }

    /// Kind of the frame, as determined by its body.
    pub fn frame_type(&self) -> FrameType {
        self.body.frame_type()
    }

    /// Header sequence number.
    pub fn sequence_number(&self) -> u64 {
        self.header.sequence_number
    }

    /// The frameset this frame belongs to, `creator:destination`.
    pub fn frameset(&self) -> String {
        format!("{}:{}", self.header.creator, self.header.destination)
    }
}
