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


//! Typed frame bodies.

mod acknack;
mod alert;
mod connection;
mod data;

pub use acknack::{Acknack, FRAMESET_LENGTH};
pub use alert::Alert;
pub use connection::{ConnectionRequest, ConnectionResponse};
pub use data::{ChannelSubframe, ChannelSubframeHeader, DataFrame};

use crate::CodecResult;
use crate::frame::FrameType;
use bytes::{BufMut, Bytes};

/// The body of a frame, one variant per [`FrameType`].
///
/// Frame kinds this crate does not interpret keep their raw body bytes.
#[derive(Clone, Debug, PartialEq)]
pub enum FrameBody {
    /// Station asks a manager where to deliver data
    ConnectionRequest(ConnectionRequest),
    /// Manager names the data consumer
    ConnectionResponse(ConnectionResponse),
    /// Uninterpreted option request
    OptionRequest(Bytes),
    /// Uninterpreted option response
    OptionResponse(Bytes),
    /// Waveform data
    Data(DataFrame),
    /// Receipt acknowledgement and gap report
    Acknack(Acknack),
    /// Session termination notice
    Alert(Alert),
    /// Uninterpreted command request
    CommandRequest(Bytes),
    /// Uninterpreted command response
    CommandResponse(Bytes),
    /// Uninterpreted CD-1 encapsulation
    CdOneEncapsulation(Bytes),
}

impl FrameBody {
    /// Kind of frame carrying this body.
    pub fn frame_type(&self) -> FrameType {
        match self {
            FrameBody::ConnectionRequest(_) => FrameType::ConnectionRequest,
            FrameBody::ConnectionResponse(_) => FrameType::ConnectionResponse,
            FrameBody::OptionRequest(_) => FrameType::OptionRequest,
            FrameBody::OptionResponse(_) => FrameType::OptionResponse,
            FrameBody::Data(_) => FrameType::Data,
            FrameBody::Acknack(_) => FrameType::Acknack,
            FrameBody::Alert(_) => FrameType::Alert,
            FrameBody::CommandRequest(_) => FrameType::CommandRequest,
            FrameBody::CommandResponse(_) => FrameType::CommandResponse,
            FrameBody::CdOneEncapsulation(_) => FrameType::CdOneEncapsulation,
        }
    }

    pub(crate) fn encode(&self, dst: &mut impl BufMut) -> CodecResult<()> {
        match self {
            FrameBody::ConnectionRequest(body) => body.encode(dst),
            FrameBody::ConnectionResponse(body) => body.encode(dst),
            FrameBody::Data(body) => body.encode(dst),
            FrameBody::Acknack(body) => body.encode(dst),
            FrameBody::Alert(body) => body.encode(dst),
            FrameBody::OptionRequest(raw)
            | FrameBody::OptionResponse(raw)
            | FrameBody::CommandRequest(raw)
            | FrameBody::CommandResponse(raw)
            | FrameBody::CdOneEncapsulation(raw) => {
                dst.put_slice(raw);
                Ok(())
            }
        }
    }

    pub(crate) fn decode(frame_type: FrameType, mut body: Bytes) -> CodecResult<Self> {
        Ok(match frame_type {
            FrameType::ConnectionRequest => {
                FrameBody::ConnectionRequest(ConnectionRequest::decode(&mut body)?)
            }
            FrameType::ConnectionResponse => {
                FrameBody::ConnectionResponse(ConnectionResponse::decode(&mut body)?)
            }
            FrameType::Data => FrameBody::Data(DataFrame::decode(&mut body)?),
            FrameType::Acknack => FrameBody::Acknack(Acknack::decode(&mut body)?),
            FrameType::Alert => FrameBody::Alert(Alert::decode(&mut body)?),
            FrameType::OptionRequest => FrameBody::OptionRequest(body),
            FrameType::OptionResponse => FrameBody::OptionResponse(body),
            FrameType::CommandRequest => FrameBody::CommandRequest(body),
            FrameType::CommandResponse => FrameBody::CommandResponse(body),
            FrameType::CdOneEncapsulation => FrameBody::CdOneEncapsulation(body),
        })
    }
}
