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


//! # CD 1.1 Frame Codec
//!
//! This crate implements the framing layer of the CD 1.1 station data
//! protocol for use with Tokio. Frames are big-endian and consist of a
//! 36-byte header, a typed body and a trailer closed by a CRC-64
//! communication verification.
//!
//! ## Core Components
//!
//! ### [`Cd11Codec`]
//!
//! Implements [`Decoder`](tokio_util::codec::Decoder) and
//! [`Encoder`](tokio_util::codec::Encoder) so a socket can be wrapped in
//! `FramedRead`/`FramedWrite`.
//!
//! ### [`Cd11Frame`]
//!
//! A decoded frame: [`FrameHeader`], [`FrameBody`] and [`FrameTrailer`].
//! The body is a closed enum over [`FrameType`]; option, command and CD-1
//! encapsulation bodies are carried as raw bytes.
//!
//! ### [`FrameFactory`]
//!
//! Builds the frames a station sends: connection requests, acknacks,
//! alerts and data.
//!
//! ## Example
//!
//! ```
//! use bytes::BytesMut;
//! use cd11_codec::{Cd11Codec, FrameBody, FrameFactory};
//! use tokio_util::codec::{Decoder, Encoder};
//!
//! let factory = FrameFactory::new("H04N", "0");
//! let mut codec = Cd11Codec::new();
//! let mut buffer = BytesMut::new();
//! codec.encode(factory.alert("Shutting down."), &mut buffer).unwrap();
//!
//! let frame = codec.decode(&mut buffer).unwrap().unwrap();
//! assert!(matches!(frame.body, FrameBody::Alert(_)));
//! ```

#![warn(
    clippy::cargo,
    missing_docs,
    clippy::pedantic,
    future_incompatible,
    rust_2018_idioms
)]
#![allow(
    clippy::option_if_let_else,
    clippy::module_name_repetitions,
    clippy::missing_errors_doc
)]

mod body;
mod codec;
mod factory;
mod frame;
mod result;
mod wire;

pub use body::{
    Acknack, Alert, ChannelSubframe, ChannelSubframeHeader, ConnectionRequest, ConnectionResponse,
    DataFrame, FRAMESET_LENGTH, FrameBody,
};
pub use codec::{Cd11Codec, DEFAULT_MAX_FRAME_SIZE, comm_verification};
pub use factory::FrameFactory;
pub use frame::{
    Cd11Frame, FrameHeader, FrameTrailer, FrameType, HEADER_LENGTH, NAME_LENGTH,
    TRAILER_FIXED_LENGTH, VERIFICATION_LENGTH,
};
pub use result::{CodecError, CodecResult};
