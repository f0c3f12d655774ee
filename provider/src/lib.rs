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


//! # CD 1.1 Station Data Provider
//!
//! The station side of a CD 1.1 session. A [`DataProvider`] asks a
//! connection manager where to send data, connects to the named data
//! consumer and streams data frames to it. It retransmits the sequence
//! numbers the consumer reports missing and ends the session on an alert,
//! a stop request or a silent peer.
//!
//! ## Core Components
//!
//! ### [`DataProvider`]
//!
//! The engine. It owns all session state and handles one [`Event`] at a
//! time. Four supervised workers feed it: a frame receiver and three
//! timers (acknack, data send and connection expiry).
//!
//! ### [`Transport`]
//!
//! The connection seam. [`TcpTransport`] frames a TCP socket with
//! [`Cd11Codec`](cd11_codec::Cd11Codec) and tracks the activity
//! timestamps the timers poll.
//!
//! ### [`GapTracker`]
//!
//! The ordered queue of sequence ranges awaiting retransmission.
//!
//! ## Example
//!
//! ```no_run
//! use cd11_provider::{DataProvider, ProviderConfig, TcpTransport};
//! use std::sync::Arc;
//!
//! # async fn example() -> cd11_provider::Result<()> {
//! let config = ProviderConfig::new("10.0.0.1".parse().unwrap(), 8041)
//!     .with_station("H04N", "IDC");
//! let mut provider = DataProvider::new(config, Arc::new(TcpTransport::new()))?;
//! let stop = provider.stop_handle();
//! tokio::spawn(async move {
//!     let _ = tokio::signal::ctrl_c().await;
//!     stop.cancel();
//! });
//! let report = provider.run().await;
//! assert!(report.is_clean(), "{report}");
//! # Ok(())
//! # }
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
    clippy::missing_errors_doc,
    clippy::cast_precision_loss
)]

mod config;
mod error;
mod event;
mod gap;
mod payload;
mod provider;
#[cfg(test)]
mod testing;
mod transport;
mod worker;

pub use config::{ConfigError, MAX_NAME_LENGTH, ProviderConfig, ServiceType};
pub use error::{ProviderError, Result};
pub use event::{Event, EventKind, EventReceiver, EventSender, event_channel};
pub use gap::{GapTracker, LOWEST_SEQUENCE_NUMBER};
pub use payload::PayloadSource;
pub use provider::{DataProvider, ProviderState, SessionReport};
pub use transport::{TcpTransport, Transport, TransportError};
pub use worker::{
    ACKNACK_PERIOD, ACKNACK_THRESHOLD, ActivityProbe, FrameReceiver, SupervisedWorker,
    TimerPolicy, TimerWorker, Worker,
};
