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


//! # CD 1.1 Data Provider Example
//!
//! Connects to a connection manager, follows it to the data consumer and
//! streams synthetic (or canned) data frames until Ctrl-C, an alert from
//! the consumer, or an idle timeout.
//!
//! ## Usage
//!
//! ```bash
//! cargo run --example data_provider -- 10.0.0.1 8041 H04N [canned-frame.bin]
//! ```
//!
//! Set `RUST_LOG=cd11_provider=debug` for per-frame logging.

use cd11_provider::{DataProvider, ProviderConfig, TcpTransport};
use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();
    let manager: IpAddr = match args.get(1) {
        Some(host) => host.parse()?,
        None => IpAddr::V4(Ipv4Addr::LOCALHOST),
    };
    let port: u16 = match args.get(2) {
        Some(port) => port.parse()?,
        None => 8041,
    };
    let station = args.get(3).map_or("H04N", String::as_str);
    let canned = args.get(4).map(PathBuf::from);

    let config = ProviderConfig::new(manager, port)
        .with_station(station, "IDC")
        .with_frameset(station, "0")
        .with_canned_frame_path(canned);
    let mut provider = DataProvider::new(config, Arc::new(TcpTransport::new()))?;

    let stop = provider.stop_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupted, stopping");
            stop.cancel();
        }
    });

    let report = provider.run().await;
    if report.is_clean() {
        info!("Session finished");
        Ok(ExitCode::SUCCESS)
    } else {
        error!(%report, "Session finished with errors");
        Ok(ExitCode::FAILURE)
    }
}
