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


//! Connection request and response bodies.
//!
//! Both share one 32-byte layout: protocol version, a name/type/service
//! triple, and a primary and secondary IPv4 endpoint.

use crate::wire;
use crate::CodecResult;
use bytes::{Buf, BufMut};
use std::net::Ipv4Addr;

const BODY_LENGTH: usize = 32;

/// Sent by a station to a connection manager.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConnectionRequest {
    /// Protocol major version
    pub major_version: i16,
    /// Protocol minor version
    pub minor_version: i16,
    /// Station name, at most 8 bytes
    pub station_name: String,
    /// Station type, `IDC` or `IMS`
    pub station_type: String,
    /// Service type, `TCP` or `UDP`
    pub service_type: String,
    /// Station address
    pub address: Ipv4Addr,
    /// Station port
    pub port: u16,
    /// Optional secondary address
    pub secondary_address: Option<Ipv4Addr>,
    /// Optional secondary port
    pub secondary_port: Option<u16>,
}

/// Returned by a connection manager naming the data consumer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConnectionResponse {
    /// Protocol major version
    pub major_version: i16,
    /// Protocol minor version
    pub minor_version: i16,
    /// Responder name
    pub responder_name: String,
    /// Responder type
    pub responder_type: String,
    /// Service type
    pub service_type: String,
    /// Data consumer address
    pub address: Ipv4Addr,
    /// Data consumer port
    pub port: u16,
    /// Optional secondary address
    pub secondary_address: Option<Ipv4Addr>,
    /// Optional secondary port
    pub secondary_port: Option<u16>,
}

struct Fields<'a> {
    major: i16,
    minor: i16,
    name: &'a str,
    kind: &'a str,
    service: &'a str,
    address: Ipv4Addr,
    port: u16,
    secondary_address: Option<Ipv4Addr>,
    secondary_port: Option<u16>,
}

fn encode(fields: &Fields<'_>, dst: &mut impl BufMut) -> CodecResult<()> {
    dst.put_i16(fields.major);
    dst.put_i16(fields.minor);
    wire::put_fixed_str(dst, fields.name, 8, "station name")?;
    wire::put_fixed_str(dst, fields.kind, 4, "station type")?;
    wire::put_fixed_str(dst, fields.service, 4, "service type")?;
    dst.put_u32(u32::from(fields.address));
    dst.put_u16(fields.port);
    dst.put_u32(fields.secondary_address.map_or(0, u32::from));
    dst.put_u16(fields.secondary_port.unwrap_or(0));
    Ok(())
}

impl ConnectionRequest {
    pub(crate) fn encode(&self, dst: &mut impl BufMut) -> CodecResult<()> {
        encode(
            &Fields {
                major: self.major_version,
                minor: self.minor_version,
                name: &self.station_name,
                kind: &self.station_type,
                service: &self.service_type,
                address: self.address,
                port: self.port,
                secondary_address: self.secondary_address,
                secondary_port: self.secondary_port,
            },
            dst,
        )
    }

    pub(crate) fn decode(buf: &mut impl Buf) -> CodecResult<Self> {
        wire::ensure(buf, "connection body", BODY_LENGTH)?;
        let major_version = buf.get_i16();
        let minor_version = buf.get_i16();
        let station_name = wire::get_fixed_str(buf, 8, "station name")?;
        let station_type = wire::get_fixed_str(buf, 4, "station type")?;
        let service_type = wire::get_fixed_str(buf, 4, "service type")?;
        let address = Ipv4Addr::from(buf.get_u32());
        let port = buf.get_u16();
        let secondary_address = Some(buf.get_u32())
            .filter(|raw| *raw != 0)
            .map(Ipv4Addr::from);
        let secondary_port = Some(buf.get_u16()).filter(|raw| *raw != 0);
        Ok(ConnectionRequest {
            major_version,
            minor_version,
            station_name,
            station_type,
            service_type,
            address,
            port,
            secondary_address,
            secondary_port,
        })
    }
}

impl ConnectionResponse {
    /// Response directing the station to `address:port`.
    pub fn new(responder_name: impl Into<String>, address: Ipv4Addr, port: u16) -> Self {
        ConnectionResponse {
            major_version: 1,
            minor_version: 1,
            responder_name: responder_name.into(),
            responder_type: "IDC".to_string(),
            service_type: "TCP".to_string(),
            address,
            port,
            secondary_address: None,
            secondary_port: None,
        }
    }

    pub(crate) fn encode(&self, dst: &mut impl BufMut) -> CodecResult<()> {
        encode(
            &Fields {
                major: self.major_version,
                minor: self.minor_version,
                name: &self.responder_name,
                kind: &self.responder_type,
                service: &self.service_type,
                address: self.address,
                port: self.port,
                secondary_address: self.secondary_address,
                secondary_port: self.secondary_port,
            },
            dst,
        )
    }

    pub(crate) fn decode(buf: &mut impl Buf) -> CodecResult<Self> {
        let fields = ConnectionRequest::decode(buf)?;
        Ok(ConnectionResponse {
            major_version: fields.major_version,
            minor_version: fields.minor_version,
            responder_name: fields.station_name,
            responder_type: fields.station_type,
            service_type: fields.service_type,
            address: fields.address,
            port: fields.port,
            secondary_address: fields.secondary_address,
            secondary_port: fields.secondary_port,
        })
    }
}
