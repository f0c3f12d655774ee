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


//! Builds outbound frames stamped with a station's creator and destination.

use crate::body::{
    Acknack, Alert, ChannelSubframe, ChannelSubframeHeader, ConnectionRequest, DataFrame, FrameBody,
};
use crate::frame::{Cd11Frame, FrameHeader, FrameTrailer};

/// Stamps outbound frames with a fixed creator, destination and
/// authentication key.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FrameFactory {
    creator: String,
    destination: String,
    auth_key_identifier: i32,
}

impl FrameFactory {
    /// Factory for frames from `creator` to `destination`.
    pub fn new(creator: impl Into<String>, destination: impl Into<String>) -> Self {
        FrameFactory {
            creator: creator.into(),
            destination: destination.into(),
            auth_key_identifier: 0,
        }
    }

    /// Sets the authentication key identifier written to every trailer.
    #[must_use]
    pub fn with_auth_key_identifier(mut self, auth_key_identifier: i32) -> Self {
        self.auth_key_identifier = auth_key_identifier;
        self
    }

    /// Creator stamped on every frame.
    pub fn creator(&self) -> &str {
        &self.creator
    }

    /// Destination stamped on every frame.
    pub fn destination(&self) -> &str {
        &self.destination
    }

    /// The `creator:destination` frameset name.
    pub fn frameset(&self) -> String {
        format!("{}:{}", self.creator, self.destination)
    }

    fn frame(&self, body: FrameBody, sequence_number: u64) -> Cd11Frame {
        let mut header = FrameHeader::new(self.creator.clone(), self.destination.clone());
        header.sequence_number = sequence_number;
        Cd11Frame::new(header, body, FrameTrailer::new(self.auth_key_identifier))
    }

    /// Connection request for the manager handshake.
    pub fn connection_request(&self, request: ConnectionRequest) -> Cd11Frame {
        self.frame(FrameBody::ConnectionRequest(request), 0)
    }

    /// Acknack for `frameset_acked` covering `lowest..=highest`.
    pub fn acknack(
        &self,
        frameset_acked: impl Into<String>,
        lowest_sequence_number: u64,
        highest_sequence_number: u64,
        gap_ranges: Vec<(u64, u64)>,
    ) -> Cd11Frame {
        self.frame(
            FrameBody::Acknack(Acknack {
                frameset_acked: frameset_acked.into(),
                lowest_sequence_number,
                highest_sequence_number,
                gap_ranges,
            }),
            0,
        )
    }

    /// Alert announcing session termination.
    pub fn alert(&self, message: impl Into<String>) -> Cd11Frame {
        self.frame(FrameBody::Alert(Alert::new(message)), 0)
    }

    /// Data frame for `subframes`, with the channel subframe header derived
    /// from them.
    ///
    /// The nominal time is taken from the first subframe and the frame time
    /// length is the longest subframe's.
    pub fn data(&self, subframes: Vec<ChannelSubframe>, sequence_number: u64) -> Cd11Frame {
        let header = ChannelSubframeHeader {
            frame_time_length: subframes
                .iter()
                .map(|s| s.subframe_time_length)
                .max()
                .unwrap_or(0),
            nominal_time: subframes
                .first()
                .map(|s| s.timestamp.clone())
                .unwrap_or_default(),
            channel_string: subframes.iter().map(channel_name).collect(),
        };
        self.data_frame(DataFrame { header, subframes }, sequence_number)
    }

    /// Data frame carrying `data` under `sequence_number`.
    pub fn data_frame(&self, data: DataFrame, sequence_number: u64) -> Cd11Frame {
        self.frame(FrameBody::Data(data), sequence_number)
    }
}

/// The 10-byte channel name: site, channel and location, each space padded.
fn channel_name(subframe: &ChannelSubframe) -> String {
    format!(
        "{:<5}{:<3}{:<2}",
        subframe.site, subframe.channel, subframe.location
    )
}
