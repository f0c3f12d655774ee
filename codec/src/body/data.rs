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


//! Data frame body: a channel subframe header followed by one subframe per
//! channel.

use crate::wire;
use crate::CodecResult;
use bytes::{Buf, BufMut, Bytes, BytesMut};

const TIMESTAMP_LENGTH: usize = 20;
const DESCRIPTION_LENGTH: usize = 24;

/// Describes the channels carried by a data frame.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ChannelSubframeHeader {
    /// Duration of the frame in milliseconds
    pub frame_time_length: i32,
    /// Nominal start time, `yyyyddd hh:mm:ss.mmm`
    pub nominal_time: String,
    /// Concatenated 10-byte channel names
    pub channel_string: String,
}

/// Samples and metadata for one channel.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ChannelSubframe {
    /// Subframe is signed
    pub authenticated: bool,
    /// Compression or transform applied to the data
    pub transform: u8,
    /// Sensor kind
    pub sensor_type: u8,
    /// Calibration option flag
    pub calibration: bool,
    /// Site name, at most 5 bytes
    pub site: String,
    /// Channel name, at most 3 bytes
    pub channel: String,
    /// Location code, at most 2 bytes
    pub location: String,
    /// Sample format, e.g. `s4`
    pub data_type: String,
    /// Calibration factor
    pub calibration_factor: f32,
    /// Calibration period
    pub calibration_period: f32,
    /// Time of the first sample
    pub timestamp: String,
    /// Duration of the subframe in milliseconds
    pub subframe_time_length: i32,
    /// Number of samples
    pub samples: i32,
    /// Channel status bytes
    pub channel_status: Bytes,
    /// Sample bytes
    pub channel_data: Bytes,
    /// Subframe counter
    pub subframe_count: i32,
    /// Key used to sign the subframe
    pub auth_key_identifier: i32,
    /// Signature bytes
    pub auth_value: Bytes,
}

/// Body of a DATA frame.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DataFrame {
    /// Channel summary
    pub header: ChannelSubframeHeader,
    /// One entry per channel
    pub subframes: Vec<ChannelSubframe>,
}

impl ChannelSubframeHeader {
    fn encode(&self, channels: usize, dst: &mut impl BufMut) -> CodecResult<()> {
        dst.put_i32(wire::len_i32(channels, "channel count")?);
        dst.put_i32(self.frame_time_length);
        wire::put_fixed_str(dst, &self.nominal_time, TIMESTAMP_LENGTH, "nominal time")?;
        wire::put_sized(dst, self.channel_string.as_bytes(), "channel string")
    }

    fn decode(buf: &mut impl Buf) -> CodecResult<(Self, usize)> {
        let channels = wire::get_len(buf, "channel count")?;
        let frame_time_length = wire::get_i32(buf, "channel subframe header")?;
        let nominal_time = wire::get_fixed_str(buf, TIMESTAMP_LENGTH, "nominal time")?;
        let channel_string = wire::utf8(wire::get_sized(buf, "channel string")?, "channel string")?;
        Ok((
            ChannelSubframeHeader {
                frame_time_length,
                nominal_time,
                channel_string,
            },
            channels,
        ))
    }
}

impl ChannelSubframe {
    fn encode(&self, dst: &mut impl BufMut) -> CodecResult<()> {
        let status_len = wire::padded_len(self.channel_status.len());
        let data_len = wire::padded_len(self.channel_data.len());
        // offset of the authentication key identifier from the start of the subframe
        let auth_offset = 4 + 4 + DESCRIPTION_LENGTH + TIMESTAMP_LENGTH + 4 + 4 + 4 + status_len
            + 4
            + data_len
            + 4;

        let mut sub = BytesMut::with_capacity(auth_offset + 8 + self.auth_value.len());
        sub.put_i32(wire::len_i32(auth_offset, "authentication offset")?);
        sub.put_u8(u8::from(self.authenticated));
        sub.put_u8(self.transform);
        sub.put_u8(self.sensor_type);
        sub.put_u8(u8::from(self.calibration));
        wire::put_fixed_str(&mut sub, &self.site, 5, "site")?;
        wire::put_fixed_str(&mut sub, &self.channel, 3, "channel")?;
        wire::put_fixed_str(&mut sub, &self.location, 2, "location")?;
        wire::put_fixed_str(&mut sub, &self.data_type, 2, "data type")?;
        sub.put_f32(self.calibration_factor);
        sub.put_f32(self.calibration_period);
        wire::put_fixed_str(&mut sub, &self.timestamp, TIMESTAMP_LENGTH, "timestamp")?;
        sub.put_i32(self.subframe_time_length);
        sub.put_i32(self.samples);
        wire::put_sized(&mut sub, &self.channel_status, "channel status")?;
        wire::put_sized(&mut sub, &self.channel_data, "channel data")?;
        sub.put_i32(self.subframe_count);
        sub.put_i32(self.auth_key_identifier);
        wire::put_sized(&mut sub, &self.auth_value, "subframe authentication")?;

        dst.put_i32(wire::len_i32(sub.len(), "channel length")?);
        dst.put_slice(&sub);
        Ok(())
    }

    fn decode(buf: &mut impl Buf) -> CodecResult<Self> {
        let channel_length = wire::get_len(buf, "channel length")?;
        wire::ensure(buf, "channel subframe", channel_length)?;
        let mut sub = buf.copy_to_bytes(channel_length);

        let _auth_offset = wire::get_i32(&mut sub, "channel subframe")?;
        wire::ensure(&sub, "channel description", DESCRIPTION_LENGTH)?;
        let authenticated = sub.get_u8() != 0;
        let transform = sub.get_u8();
        let sensor_type = sub.get_u8();
        let calibration = sub.get_u8() != 0;
        let site = wire::get_fixed_str(&mut sub, 5, "site")?;
        let channel = wire::get_fixed_str(&mut sub, 3, "channel")?;
        let location = wire::get_fixed_str(&mut sub, 2, "location")?;
        let data_type = wire::get_fixed_str(&mut sub, 2, "data type")?;
        let calibration_factor = sub.get_f32();
        let calibration_period = sub.get_f32();
        let timestamp = wire::get_fixed_str(&mut sub, TIMESTAMP_LENGTH, "timestamp")?;
        let subframe_time_length = wire::get_i32(&mut sub, "channel subframe")?;
        let samples = wire::get_i32(&mut sub, "channel subframe")?;
        let channel_status = wire::get_sized(&mut sub, "channel status")?;
        let channel_data = wire::get_sized(&mut sub, "channel data")?;
        let subframe_count = wire::get_i32(&mut sub, "channel subframe")?;
        let auth_key_identifier = wire::get_i32(&mut sub, "channel subframe")?;
        let auth_value = wire::get_sized(&mut sub, "subframe authentication")?;

        Ok(ChannelSubframe {
            authenticated,
            transform,
            sensor_type,
            calibration,
            site,
            channel,
            location,
            data_type,
            calibration_factor,
            calibration_period,
            timestamp,
            subframe_time_length,
            samples,
            channel_status,
            channel_data,
            subframe_count,
            auth_key_identifier,
            auth_value,
        })
    }
}

impl DataFrame {
    pub(crate) fn encode(&self, dst: &mut impl BufMut) -> CodecResult<()> {
        self.header.encode(self.subframes.len(), dst)?;
        for subframe in &self.subframes {
            subframe.encode(dst)?;
        }
        Ok(())
    }

    pub(crate) fn decode(buf: &mut impl Buf) -> CodecResult<Self> {
        let (header, channels) = ChannelSubframeHeader::decode(buf)?;
        // each subframe needs at least its length prefix
        wire::ensure(buf, "channel subframes", channels.saturating_mul(4))?;
        let subframes = (0..channels)
            .map(|_| ChannelSubframe::decode(buf))
            .collect::<CodecResult<Vec<_>>>()?;
        Ok(DataFrame { header, subframes })
    }
}
