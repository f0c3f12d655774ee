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


//! Alert body.

use crate::wire;
use crate::CodecResult;
use bytes::{Buf, BufMut};

/// Notice that the sender is terminating the session.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Alert {
    /// Human-readable reason
    pub message: String,
}

impl Alert {
    /// Alert carrying `message`.
    pub fn new(message: impl Into<String>) -> Self {
        Alert {
            message: message.into(),
        }
    }

    pub(crate) fn encode(&self, dst: &mut impl BufMut) -> CodecResult<()> {
        wire::put_sized(dst, self.message.as_bytes(), "alert message")
    }

    pub(crate) fn decode(buf: &mut impl Buf) -> CodecResult<Self> {
        let raw = wire::get_sized(buf, "alert message")?;
        Ok(Alert {
            message: wire::utf8(raw, "alert message")?,
        })
    }
}
