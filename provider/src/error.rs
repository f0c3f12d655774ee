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


//! Error types for the data provider

use crate::config::{ConfigError, ServiceType};
use crate::transport::TransportError;
use cd11_codec::{CodecError, FrameType};
use thiserror::Error;

/// Result type for provider operations
pub type Result<T> = std::result::Result<T, ProviderError>;

/// Data provider error types
#[derive(Debug, Error)]
pub enum ProviderError {
    /// I/O error outside the transport, e.g. loading a canned frame
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Frame encoding or decoding failed
    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    /// The transport failed
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// The configuration was rejected
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The connection manager handshake did not complete
    #[error("Handshake failed: {0}")]
    Handshake(String),

    /// A frame arrived that is not valid at this point of the session
    #[error("Unexpected {0} frame")]
    UnexpectedFrame(FrameType),

    /// The configured service type has no implementation
    #[error("Service type {0} is not supported")]
    UnsupportedService(ServiceType),

    /// A background worker stopped abnormally
    #[error("Worker {worker} failed: {reason}")]
    WorkerFailed {
        /// Worker name
        worker: &'static str,
        /// What went wrong
        reason: String,
    },

    /// A stop was requested before the operation completed
    #[error("Operation cancelled")]
    Cancelled,

    /// The event channel has no receiver
    #[error("Event channel closed")]
    ChannelClosed,
}

impl ProviderError {
    /// Check if the error came from a stop request rather than a fault
    pub fn is_cancellation(&self) -> bool {
        matches!(self, ProviderError::Cancelled)
    }

    /// Check if the error is a connection error
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            ProviderError::Transport(_) | ProviderError::Handshake(_) | ProviderError::Io(_)
        )
    }
}
