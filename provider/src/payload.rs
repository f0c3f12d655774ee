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


//! Data frame bodies for each send turn
//!
//! A session either generates a small deterministic frame per sequence
//! number or replays one encoded frame loaded from disk.

use crate::{ProviderConfig, ProviderError, Result};
use bytes::{BufMut, Bytes, BytesMut};
use cd11_codec::{Cd11Codec, ChannelSubframe, ChannelSubframeHeader, DataFrame, FrameBody};
use std::path::Path;
use tokio_util::codec::Decoder;
use tracing::{info, instrument};

/// Duration covered by one synthetic frame.
const FRAME_TIME_MS: u64 = 10_000;
/// Samples per synthetic frame.
const SAMPLES: usize = 100;
/// Days in a 400-year Gregorian cycle.
const DAYS_PER_CYCLE: u64 = 146_097;

/// Where data frame bodies come from
#[derive(Clone, Debug, PartialEq)]
pub enum PayloadSource {
    /// One generated channel per frame for the named station
    Synthetic {
        /// Site written into each subframe, at most 5 bytes
        site: String,
    },
    /// The same body for every frame
    Canned(DataFrame),
}

impl PayloadSource {
    /// Generated frames for `station`
    pub fn synthetic(station: &str) -> Self {
        PayloadSource::Synthetic {
            site: station.chars().take(5).collect(),
        }
    }

    /// Load one encoded DATA frame from `path`
    #[instrument]
    pub async fn load(path: &Path) -> Result<Self> {
        let raw = tokio::fs::read(path).await?;
        let mut buffer = BytesMut::from(&raw[..]);
        let frame = Cd11Codec::new().decode_eof(&mut buffer)?.ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "canned frame file is empty")
        })?;
        match frame.body {
            FrameBody::Data(data) => {
                info!(channels = data.subframes.len(), "Loaded canned data frame");
                Ok(PayloadSource::Canned(data))
            }
            other => Err(ProviderError::UnexpectedFrame(other.frame_type())),
        }
    }

    /// The source a session built from `config` uses
    pub async fn from_config(config: &ProviderConfig) -> Result<Self> {
        match &config.canned_frame_path {
            Some(path) => Self::load(path).await,
            None => Ok(Self::synthetic(&config.station_name)),
        }
    }

    /// Body for the frame sent as `sequence_number`
    pub fn frame(&self, sequence_number: u64) -> DataFrame {
        match self {
            PayloadSource::Synthetic { site } => synthetic_frame(site, sequence_number),
            PayloadSource::Canned(data) => data.clone(),
        }
    }
}

fn synthetic_frame(site: &str, sequence_number: u64) -> DataFrame {
    let timestamp = cd11_time(sequence_number.wrapping_mul(FRAME_TIME_MS));
    let mut data = BytesMut::with_capacity(SAMPLES * 4);
    for i in 0..SAMPLES as u64 {
        // triangle wave between -1000 and 1000, shifted by sequence number
        let phase = sequence_number.wrapping_add(i) % 4000;
        let value = if phase < 2000 { phase } else { 4000 - phase };
        data.put_i32(i32::try_from(value).unwrap_or(0) - 1000);
    }
    let subframe = ChannelSubframe {
        site: site.to_string(),
        channel: "BHZ".to_string(),
        location: "00".to_string(),
        data_type: "s4".to_string(),
        calibration_factor: 1.0,
        calibration_period: 1.0,
        timestamp: timestamp.clone(),
        subframe_time_length: FRAME_TIME_MS as i32,
        samples: SAMPLES as i32,
        channel_status: Bytes::from_static(&[1, 0, 0, 0]),
        channel_data: data.freeze(),
        ..ChannelSubframe::default()
    };
    DataFrame {
        header: ChannelSubframeHeader {
            frame_time_length: FRAME_TIME_MS as i32,
            nominal_time: timestamp,
            channel_string: format!("{site:<5}BHZ00"),
        },
        subframes: vec![subframe],
    }
}

const fn is_leap(year: u64) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}

/// Formats `offset_ms` past 2000-001 as `yyyyddd hh:mm:ss.mmm`, wrapping
/// every 400 years.
fn cd11_time(offset_ms: u64) -> String {
    let mut days = (offset_ms / 86_400_000) % DAYS_PER_CYCLE;
    let ms_of_day = offset_ms % 86_400_000;
    let mut year = 2000;
    loop {
        let length = if is_leap(year) { 366 } else { 365 };
        if days < length {
            break;
        }
        days -= length;
        year += 1;
    }
    format!(
        "{year:04}{:03} {:02}:{:02}:{:02}.{:03}",
        days + 1,
        ms_of_day / 3_600_000,
        ms_of_day / 60_000 % 60,
        ms_of_day / 1000 % 60,
        ms_of_day % 1000
    )
}
