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


//! Frame transport between the station and its peers
//!
//! The engine and the workers share one [`Transport`]. Only the frame
//! receiver reads; the engine writes. [`TcpTransport`] keeps the read and
//! write halves behind separate locks so a pending read never blocks a
//! write.

use async_trait::async_trait;
use cd11_codec::{Cd11Codec, Cd11Frame, CodecError, FrameType};
use futures_util::{SinkExt, StreamExt};
use metrics::{counter, histogram};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock};
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpSocket, TcpStream};
use tokio::sync::Mutex;
use tokio_util::codec::{FramedRead, FramedWrite};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, trace, warn};

/// Pause between connection attempts.
const RETRY_DELAY: Duration = Duration::from_millis(250);

/// Transport failures
#[derive(Debug, Error)]
pub enum TransportError {
    /// Socket error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Framing error on the stream
    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    /// No connection could be established before the deadline
    #[error("Could not connect to {addr} within {timeout:?}")]
    ConnectTimeout {
        /// Remote endpoint
        addr: SocketAddr,
        /// Connect wait
        timeout: Duration,
    },

    /// No frame arrived before the deadline
    #[error("No frame received within {0:?}")]
    ReadTimeout(Duration),

    /// The transport is not connected
    #[error("Not connected")]
    NotConnected,

    /// The peer closed the connection
    #[error("Connection closed by peer")]
    ConnectionClosed,
}

/// Frame-level connection to a connection manager or data consumer
///
/// Implementations must allow one reader concurrently with writers.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Connect to `remote`, replacing any existing connection
    ///
    /// Retries until `timeout` has elapsed. When `local` is set the socket
    /// is bound to it first.
    async fn connect(
        &self,
        remote: SocketAddr,
        timeout: Duration,
        local: Option<SocketAddr>,
    ) -> Result<(), TransportError>;

    /// Read the next frame, or `None` once `cancel` fires
    async fn read(&self, cancel: &CancellationToken) -> Result<Option<Cd11Frame>, TransportError>;

    /// Read the next frame, failing after `timeout`
    async fn read_timeout(&self, timeout: Duration) -> Result<Cd11Frame, TransportError>;

    /// Send one frame
    async fn write(&self, frame: &Cd11Frame) -> Result<(), TransportError>;

    /// Whole seconds since a frame was last received; 0 while disconnected
    fn seconds_since_last_contact(&self) -> u64;

    /// Whole seconds since an acknack was last sent; 0 while disconnected
    fn seconds_since_last_acknack_sent(&self) -> u64;

    /// Milliseconds since a data frame was last sent; 0 while disconnected
    fn milliseconds_since_last_data_sent(&self) -> u64;

    /// Whether a connection is open
    fn is_connected(&self) -> bool;

    /// Local endpoint of the open connection
    fn local_addr(&self) -> Option<SocketAddr>;

    /// Remote endpoint of the open connection
    fn remote_addr(&self) -> Option<SocketAddr>;

    /// Close the connection; does nothing when already closed
    async fn disconnect(&self);
}

/// Monotonic activity timestamps, stored as milliseconds since creation.
#[derive(Debug)]
struct Activity {
    epoch: Instant,
    last_contact: AtomicU64,
    last_acknack_sent: AtomicU64,
    last_data_sent: AtomicU64,
}

impl Activity {
    fn new() -> Self {
        Activity {
            epoch: Instant::now(),
            last_contact: AtomicU64::new(0),
            last_acknack_sent: AtomicU64::new(0),
            last_data_sent: AtomicU64::new(0),
        }
    }

    fn now(&self) -> u64 {
        u64::try_from(self.epoch.elapsed().as_millis()).unwrap_or(u64::MAX)
    }

    fn touch(&self, stamp: &AtomicU64) {
        stamp.store(self.now(), Ordering::Release);
    }

    fn reset(&self, value: u64) {
        for stamp in [&self.last_contact, &self.last_acknack_sent, &self.last_data_sent] {
            stamp.store(value, Ordering::Release);
        }
    }

    fn elapsed_ms(&self, stamp: &AtomicU64) -> u64 {
        self.now().saturating_sub(stamp.load(Ordering::Acquire))
    }
}

#[derive(Clone, Copy, Debug)]
struct Endpoints {
    local: SocketAddr,
    remote: SocketAddr,
}

/// [`Transport`] over a Tokio TCP stream
pub struct TcpTransport {
    codec: Cd11Codec,
    reader: Mutex<Option<FramedRead<OwnedReadHalf, Cd11Codec>>>,
    writer: Mutex<Option<FramedWrite<OwnedWriteHalf, Cd11Codec>>>,
    endpoints: RwLock<Option<Endpoints>>,
    connected: AtomicBool,
    activity: Activity,
}

impl TcpTransport {
    /// Create a disconnected transport using the default codec
    pub fn new() -> Self {
        Self::with_codec(Cd11Codec::new())
    }

    /// Create a disconnected transport framing with `codec`
    pub fn with_codec(codec: Cd11Codec) -> Self {
        Self {
            codec,
            reader: Mutex::new(None),
            writer: Mutex::new(None),
            endpoints: RwLock::new(None),
            connected: AtomicBool::new(false),
            activity: Activity::new(),
        }
    }

    async fn open(remote: SocketAddr, local: Option<SocketAddr>) -> std::io::Result<TcpStream> {
        let Some(local) = local else {
            return TcpStream::connect(remote).await;
        };
        let socket = if remote.is_ipv4() {
            TcpSocket::new_v4()?
        } else {
            TcpSocket::new_v6()?
        };
        socket.set_reuseaddr(true)?;
        socket.bind(local)?;
        socket.connect(remote).await
    }

    async fn install(&self, stream: TcpStream) -> Result<Endpoints, TransportError> {
        stream.set_nodelay(true)?;
        let endpoints = Endpoints {
            local: stream.local_addr()?,
            remote: stream.peer_addr()?,
        };
        let (read_half, write_half) = stream.into_split();
        *self.reader.lock().await = Some(FramedRead::new(read_half, self.codec.clone()));
        *self.writer.lock().await = Some(FramedWrite::new(write_half, self.codec.clone()));
        *self
            .endpoints
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(endpoints);
        self.activity.reset(self.activity.now());
        self.connected.store(true, Ordering::Release);
        Ok(endpoints)
    }

    fn endpoints(&self) -> Option<Endpoints> {
        *self.endpoints.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn since(&self, stamp: &AtomicU64) -> u64 {
        if self.is_connected() {
            self.activity.elapsed_ms(stamp)
        } else {
            0
        }
    }

    fn received(&self, frame: &Cd11Frame) {
        self.activity.touch(&self.activity.last_contact);
        counter!("cd11.frames.received").increment(1);
        trace!(frame_type = %frame.frame_type(), "Frame received");
    }
}

impl Default for TcpTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for TcpTransport {
    #[instrument(skip(self))]
    async fn connect(
        &self,
        remote: SocketAddr,
        timeout: Duration,
        local: Option<SocketAddr>,
    ) -> Result<(), TransportError> {
        self.disconnect().await;
        let deadline = tokio::time::Instant::now() + timeout;
        let mut attempts = 0u32;
        loop {
            attempts += 1;
            match tokio::time::timeout_at(deadline, Self::open(remote, local)).await {
                Ok(Ok(stream)) => {
                    let endpoints = self.install(stream).await?;
                    info!(local = %endpoints.local, attempts, "Connected");
                    return Ok(());
                }
                Ok(Err(e)) => {
                    debug!(error = %e, attempts, "Connect attempt failed");
                    if tokio::time::Instant::now() + RETRY_DELAY >= deadline {
                        warn!(error = %e, attempts, "Giving up on connect");
                        return Err(TransportError::ConnectTimeout {
                            addr: remote,
                            timeout,
                        });
                    }
                    tokio::time::sleep(RETRY_DELAY).await;
                }
                Err(_) => {
                    warn!(attempts, "Connect timed out");
                    return Err(TransportError::ConnectTimeout {
                        addr: remote,
                        timeout,
                    });
                }
            }
        }
    }

    async fn read(&self, cancel: &CancellationToken) -> Result<Option<Cd11Frame>, TransportError> {
        let mut reader = tokio::select! {
            biased;
            () = cancel.cancelled() => return Ok(None),
            guard = self.reader.lock() => guard,
        };
        let stream = reader.as_mut().ok_or(TransportError::NotConnected)?;
        tokio::select! {
            biased;
            () = cancel.cancelled() => Ok(None),
            next = stream.next() => match next {
                Some(Ok(frame)) => {
                    self.received(&frame);
                    Ok(Some(frame))
                }
                Some(Err(e)) => Err(e.into()),
                None => Err(TransportError::ConnectionClosed),
            },
        }
    }

    async fn read_timeout(&self, timeout: Duration) -> Result<Cd11Frame, TransportError> {
        let read = async {
            let mut reader = self.reader.lock().await;
            let stream = reader.as_mut().ok_or(TransportError::NotConnected)?;
            match stream.next().await {
                Some(Ok(frame)) => {
                    self.received(&frame);
                    Ok(frame)
                }
                Some(Err(e)) => Err(e.into()),
                None => Err(TransportError::ConnectionClosed),
            }
        };
        tokio::time::timeout(timeout, read)
            .await
            .map_err(|_| TransportError::ReadTimeout(timeout))?
    }

    async fn write(&self, frame: &Cd11Frame) -> Result<(), TransportError> {
        let start = Instant::now();
        let mut writer = self.writer.lock().await;
        let sink = writer.as_mut().ok_or(TransportError::NotConnected)?;
        sink.send(frame).await?;

        let frame_type = frame.frame_type();
        match frame_type {
            FrameType::Acknack => self.activity.touch(&self.activity.last_acknack_sent),
            FrameType::Data => self.activity.touch(&self.activity.last_data_sent),
            _ => {}
        }
        counter!("cd11.frames.sent", "kind" => frame_type.name()).increment(1);
        histogram!("cd11.frame.send_duration").record(start.elapsed().as_secs_f64());
        trace!(%frame_type, sequence_number = frame.sequence_number(), "Frame sent");
        Ok(())
    }

    fn seconds_since_last_contact(&self) -> u64 {
        self.since(&self.activity.last_contact) / 1000
    }

    fn seconds_since_last_acknack_sent(&self) -> u64 {
        self.since(&self.activity.last_acknack_sent) / 1000
    }

    fn milliseconds_since_last_data_sent(&self) -> u64 {
        self.since(&self.activity.last_data_sent)
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    fn local_addr(&self) -> Option<SocketAddr> {
        self.endpoints().map(|e| e.local)
    }

    fn remote_addr(&self) -> Option<SocketAddr> {
        self.endpoints().map(|e| e.remote)
    }

    async fn disconnect(&self) {
        if !self.connected.swap(false, Ordering::AcqRel) {
            return;
        }
        if let Some(mut writer) = self.writer.lock().await.take() {
            if let Err(e) = SinkExt::<Cd11Frame>::close(&mut writer).await {
                debug!(error = %e, "Error closing connection");
            }
        }
        self.reader.lock().await.take();
        let remote = self
            .endpoints
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .map(|e| e.remote);
        self.activity.reset(0);
        info!(remote = ?remote, "Disconnected");
    }
}

impl std::fmt::Debug for TcpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TcpTransport")
            .field("connected", &self.is_connected())
            .field("local_addr", &self.local_addr())
            .field("remote_addr", &self.remote_addr())
            .finish()
    }
}
