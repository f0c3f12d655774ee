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


//! Data provider configuration
//!
//! Settings are plain fields with defaults matching a local test station.
//! Call [`ProviderConfig::validate`] before starting a session;
//! [`DataProvider::new`](crate::DataProvider::new) does so automatically.
//!
//! # Examples
//!
//! ```
//! use cd11_provider::ProviderConfig;
//! use std::net::{IpAddr, Ipv4Addr};
//! use std::time::Duration;
//!
//! let config = ProviderConfig::new(IpAddr::V4(Ipv4Addr::new(10, 1, 1, 1)), 8041)
//!     .with_station("H04N", "IDC")
//!     .with_frameset("H04N", "0")
//!     .with_data_frame_interval(Duration::from_millis(250));
//! assert!(config.validate().is_ok());
//! ```

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Longest station name, frame creator or frame destination.
pub const MAX_NAME_LENGTH: usize = 8;

/// Transport requested in the connection request
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ServiceType {
    /// Stream over TCP
    Tcp,
    /// Datagrams over UDP; recognized but not implemented
    Udp,
}

impl ServiceType {
    /// Wire spelling of the service type.
    pub const fn as_str(self) -> &'static str {
        match self {
            ServiceType::Tcp => "TCP",
            ServiceType::Udp => "UDP",
        }
    }
}

impl FromStr for ServiceType {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "TCP" => Ok(ServiceType::Tcp),
            "UDP" => Ok(ServiceType::Udp),
            other => Err(ConfigError::UnknownServiceType(other.to_string())),
        }
    }
}

impl std::fmt::Display for ServiceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Configuration rejected by [`ProviderConfig::validate`]
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// A required name was empty or whitespace
    #[error("{0} must not be blank")]
    Blank(&'static str),

    /// A name exceeds its wire width
    #[error("{field} must be at most {max} characters (got {actual})")]
    TooLong {
        /// Offending setting
        field: &'static str,
        /// Maximum length
        max: usize,
        /// Actual length
        actual: usize,
    },

    /// Station type other than IDC or IMS
    #[error("Unknown station type: {0} (expected IDC or IMS)")]
    UnknownStationType(String),

    /// Service type other than TCP or UDP
    #[error("Unknown service type: {0} (expected TCP or UDP)")]
    UnknownServiceType(String),

    /// UDP was selected
    #[error("UDP service is not implemented")]
    UdpNotSupported,

    /// Connection manager port was zero
    #[error("Connection manager port must not be zero")]
    ZeroManagerPort,

    /// A timing setting was zero
    #[error("{0} must be greater than zero")]
    ZeroDuration(&'static str),
}

/// Data provider configuration
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    /// Address of the well-known connection manager
    pub connection_manager_address: IpAddr,

    /// Port of the well-known connection manager
    pub connection_manager_port: u16,

    /// Local address to bind before connecting (None lets the OS choose)
    pub local_address: Option<IpAddr>,

    /// Local port to bind before connecting (0 lets the OS choose)
    pub local_port: u16,

    /// Station name sent in the connection request
    pub station_name: String,

    /// Station type, `IDC` or `IMS`
    pub station_type: String,

    /// Service type; only TCP is implemented
    pub service_type: ServiceType,

    /// Creator stamped on outbound frames
    pub frame_creator: String,

    /// Destination stamped on outbound frames
    pub frame_destination: String,

    /// Protocol major version
    pub protocol_major_version: i16,

    /// Protocol minor version
    pub protocol_minor_version: i16,

    /// Authentication key identifier written to frame trailers
    pub auth_key_identifier: i32,

    /// Upper bound on each connect attempt, including retries
    pub max_connect_wait: Duration,

    /// How long to wait for the connection manager's response
    pub response_timeout: Duration,

    /// Idle time without contact from the consumer before the session ends
    pub connection_expiry: Duration,

    /// Interval between data frames
    pub data_frame_interval: Duration,

    /// Encoded data frame to send instead of synthetic data
    pub canned_frame_path: Option<PathBuf>,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            connection_manager_address: IpAddr::V4(Ipv4Addr::LOCALHOST),
            connection_manager_port: 8041,
            local_address: None,
            local_port: 0,
            station_name: "H04N".to_string(),
            station_type: "IDC".to_string(),
            service_type: ServiceType::Tcp,
            frame_creator: "TEST".to_string(),
            frame_destination: "0".to_string(),
            protocol_major_version: 1,
            protocol_minor_version: 1,
            auth_key_identifier: 0,
            max_connect_wait: Duration::from_secs(30),
            response_timeout: Duration::from_secs(30),
            connection_expiry: Duration::from_secs(120),
            data_frame_interval: Duration::from_millis(500),
            canned_frame_path: None,
        }
    }
}

impl ProviderConfig {
    /// Create a configuration for the given connection manager
    pub fn new(connection_manager_address: IpAddr, connection_manager_port: u16) -> Self {
        Self {
            connection_manager_address,
            connection_manager_port,
            ..Self::default()
        }
    }

    /// Set the local bind address and port
    #[must_use]
    pub fn with_local_address(mut self, address: Option<IpAddr>, port: u16) -> Self {
        self.local_address = address;
        self.local_port = port;
        self
    }

    /// Set the station name and type
    #[must_use]
    pub fn with_station(mut self, name: impl Into<String>, station_type: impl Into<String>) -> Self {
        self.station_name = name.into();
        self.station_type = station_type.into();
        self
    }

    /// Set the service type
    #[must_use]
    pub fn with_service_type(mut self, service_type: ServiceType) -> Self {
        self.service_type = service_type;
        self
    }

    /// Set the frame creator and destination
    #[must_use]
    pub fn with_frameset(mut self, creator: impl Into<String>, destination: impl Into<String>) -> Self {
        self.frame_creator = creator.into();
        self.frame_destination = destination.into();
        self
    }

    /// Set the protocol version
    #[must_use]
    pub fn with_protocol_version(mut self, major: i16, minor: i16) -> Self {
        self.protocol_major_version = major;
        self.protocol_minor_version = minor;
        self
    }

    /// Set the authentication key identifier
    #[must_use]
    pub fn with_auth_key_identifier(mut self, auth_key_identifier: i32) -> Self {
        self.auth_key_identifier = auth_key_identifier;
        self
    }

    /// Set the connect wait
    #[must_use]
    pub fn with_max_connect_wait(mut self, wait: Duration) -> Self {
        self.max_connect_wait = wait;
        self
    }

    /// Set the connection manager response timeout
    #[must_use]
    pub fn with_response_timeout(mut self, timeout: Duration) -> Self {
        self.response_timeout = timeout;
        self
    }

    /// Set the idle expiry
    #[must_use]
    pub fn with_connection_expiry(mut self, expiry: Duration) -> Self {
        self.connection_expiry = expiry;
        self
    }

    /// Set the data frame interval
    #[must_use]
    pub fn with_data_frame_interval(mut self, interval: Duration) -> Self {
        self.data_frame_interval = interval;
        self
    }

    /// Send a canned frame from disk instead of synthetic data
    #[must_use]
    pub fn with_canned_frame_path(mut self, path: Option<PathBuf>) -> Self {
        self.canned_frame_path = path;
        self
    }

    /// The connection manager endpoint
    pub fn connection_manager(&self) -> SocketAddr {
        SocketAddr::new(self.connection_manager_address, self.connection_manager_port)
    }

    /// The local endpoint to bind, if any
    pub fn local_bind(&self) -> Option<SocketAddr> {
        match (self.local_address, self.local_port) {
            (Some(address), port) => Some(SocketAddr::new(address, port)),
            (None, 0) => None,
            (None, port) => Some(SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), port)),
        }
    }

    /// The `creator:destination` frameset acknacks must name
    pub fn frameset(&self) -> String {
        format!("{}:{}", self.frame_creator, self.frame_destination)
    }

    /// Check the configuration for values a session cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_name("station name", &self.station_name)?;
        check_name("frame creator", &self.frame_creator)?;
        check_name("frame destination", &self.frame_destination)?;
        if !matches!(self.station_type.as_str(), "IDC" | "IMS") {
            return Err(ConfigError::UnknownStationType(self.station_type.clone()));
        }
        if self.service_type == ServiceType::Udp {
            return Err(ConfigError::UdpNotSupported);
        }
        if self.connection_manager_port == 0 {
            return Err(ConfigError::ZeroManagerPort);
        }
        for (field, value) in [
            ("max connect wait", self.max_connect_wait),
            ("response timeout", self.response_timeout),
            ("connection expiry", self.connection_expiry),
            ("data frame interval", self.data_frame_interval),
        ] {
            if value.is_zero() {
                return Err(ConfigError::ZeroDuration(field));
            }
        }
        Ok(())
    }
}

fn check_name(field: &'static str, value: &str) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        return Err(ConfigError::Blank(field));
    }
    if value.len() > MAX_NAME_LENGTH {
        return Err(ConfigError::TooLong {
            field,
            max: MAX_NAME_LENGTH,
            actual: value.len(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = ProviderConfig::default();
        assert_eq!(config.connection_manager(), "127.0.0.1:8041".parse().unwrap());
        assert_eq!(config.station_name, "H04N");
        assert_eq!(config.frameset(), "TEST:0");
        assert_eq!(config.data_frame_interval, Duration::from_millis(500));
        assert_eq!(config.connection_expiry, Duration::from_secs(120));
        assert!(config.local_bind().is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_name_validation() {
        let config = ProviderConfig::default().with_station("  ", "IDC");
        assert_eq!(config.validate(), Err(ConfigError::Blank("station name")));

        let config = ProviderConfig::default().with_frameset("TOOLONGNAME", "0");
        assert_eq!(
            config.validate(),
            Err(ConfigError::TooLong {
                field: "frame creator",
                max: 8,
                actual: 11
            })
        );
    }

    #[test]
    fn test_station_and_service_types() {
        let config = ProviderConfig::default().with_station("H04N", "XYZ");
        assert_eq!(
            config.validate(),
            Err(ConfigError::UnknownStationType("XYZ".to_string()))
        );
        assert!(ProviderConfig::default().with_station("H04N", "IMS").validate().is_ok());

        let config = ProviderConfig::default().with_service_type(ServiceType::Udp);
        assert_eq!(config.validate(), Err(ConfigError::UdpNotSupported));

        assert_eq!("TCP".parse::<ServiceType>(), Ok(ServiceType::Tcp));
        assert_eq!(
            "SCTP".parse::<ServiceType>(),
            Err(ConfigError::UnknownServiceType("SCTP".to_string()))
        );
    }

    #[test]
    fn test_zero_values_rejected() {
        let mut config = ProviderConfig::default();
        config.connection_manager_port = 0;
        assert_eq!(config.validate(), Err(ConfigError::ZeroManagerPort));

        let config = ProviderConfig::default().with_data_frame_interval(Duration::ZERO);
        assert_eq!(
            config.validate(),
            Err(ConfigError::ZeroDuration("data frame interval"))
        );
    }

    #[test]
    fn test_local_bind() {
        let config = ProviderConfig::default().with_local_address(None, 9000);
        assert_eq!(config.local_bind(), Some("0.0.0.0:9000".parse().unwrap()));

        let config = ProviderConfig::default()
            .with_local_address(Some(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 2))), 0);
        assert_eq!(config.local_bind(), Some("10.0.0.2:0".parse().unwrap()));
    }
}
