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


//! Scripted transport shared by the session tests.

#![allow(dead_code)]

use async_trait::async_trait;
use cd11_codec::{
    Acknack, Alert, Cd11Frame, ConnectionResponse, FrameBody, FrameHeader, FrameTrailer,
};
use cd11_provider::{ProviderConfig, Transport, TransportError};
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Mutex as StdMutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::{Mutex, Notify, mpsc};
use tokio::time::{Instant, sleep};
use tokio_util::sync::CancellationToken;

/// Local address the scripted transport reports once connected
pub const LOCAL_ADDRESS: &str = "192.0.2.10:40000";

struct Stamps {
    contact: Instant,
    acknack: Instant,
    data: Instant,
}

/// In-memory transport whose inbound frames are fed by the test
pub struct ScriptedTransport {
    inbox_tx: StdMutex<Option<mpsc::UnboundedSender<Cd11Frame>>>,
    inbox: Mutex<mpsc::UnboundedReceiver<Cd11Frame>>,
    connects: StdMutex<Vec<SocketAddr>>,
    written: StdMutex<Vec<Cd11Frame>>,
    remote: StdMutex<Option<SocketAddr>>,
    stamps: StdMutex<Stamps>,
    connected: AtomicBool,
    hang_up: Notify,
    disconnects: AtomicUsize,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        let (inbox_tx, inbox) = mpsc::unbounded_channel();
        let now = Instant::now();
        Self {
            inbox_tx: StdMutex::new(Some(inbox_tx)),
            inbox: Mutex::new(inbox),
            connects: StdMutex::new(Vec::new()),
            written: StdMutex::new(Vec::new()),
            remote: StdMutex::new(None),
            stamps: StdMutex::new(Stamps {
                contact: now,
                acknack: now,
                data: now,
            }),
            connected: AtomicBool::new(false),
            hang_up: Notify::new(),
            disconnects: AtomicUsize::new(0),
        }
    }

    /// Queue a frame as if the peer had sent it
    pub fn push(&self, frame: Cd11Frame) {
        if let Some(tx) = self.inbox_tx.lock().unwrap().as_ref() {
            tx.send(frame).unwrap();
        }
    }

    /// Close the inbound side; reads fail with `ConnectionClosed` once drained
    pub fn close_inbox(&self) {
        self.inbox_tx.lock().unwrap().take();
    }

    /// Make the next read end without a frame or an error
    pub fn hang_up_quietly(&self) {
        self.hang_up.notify_one();
    }

    pub fn connects(&self) -> Vec<SocketAddr> {
        self.connects.lock().unwrap().clone()
    }

    pub fn written(&self) -> Vec<Cd11Frame> {
        self.written.lock().unwrap().clone()
    }

    pub fn disconnects(&self) -> usize {
        self.disconnects.load(Ordering::SeqCst)
    }

    pub fn data_sequence_numbers(&self) -> Vec<u64> {
        self.written()
            .into_iter()
            .filter(|frame| matches!(frame.body, FrameBody::Data(_)))
            .map(|frame| frame.sequence_number())
            .collect()
    }

    pub fn alerts(&self) -> Vec<String> {
        self.written()
            .into_iter()
            .filter_map(|frame| match frame.body {
                FrameBody::Alert(alert) => Some(alert.message),
                _ => None,
            })
            .collect()
    }

    /// Wait until at least `count` data frames were written
    pub async fn wait_for_data(&self, count: usize) {
        for _ in 0..6_000 {
            if self.data_sequence_numbers().len() >= count {
                return;
            }
            sleep(Duration::from_millis(10)).await;
        }
        panic!("{count} data frames were never written");
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn connect(
        &self,
        remote: SocketAddr,
        _timeout: Duration,
        _local: Option<SocketAddr>,
    ) -> Result<(), TransportError> {
        self.connects.lock().unwrap().push(remote);
        *self.remote.lock().unwrap() = Some(remote);
        let now = Instant::now();
        *self.stamps.lock().unwrap() = Stamps {
            contact: now,
            acknack: now,
            data: now,
        };
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn read(&self, cancel: &CancellationToken) -> Result<Option<Cd11Frame>, TransportError> {
        let mut inbox = self.inbox.lock().await;
        tokio::select! {
            biased;
            () = cancel.cancelled() => Ok(None),
            () = self.hang_up.notified() => Ok(None),
            frame = inbox.recv() => {
                self.stamps.lock().unwrap().contact = Instant::now();
                frame.map(Some).ok_or(TransportError::ConnectionClosed)
            }
        }
    }

    async fn read_timeout(&self, timeout: Duration) -> Result<Cd11Frame, TransportError> {
        let mut inbox = self.inbox.lock().await;
        match tokio::time::timeout(timeout, inbox.recv()).await {
            Ok(Some(frame)) => Ok(frame),
            Ok(None) => Err(TransportError::ConnectionClosed),
            Err(_) => Err(TransportError::ReadTimeout(timeout)),
        }
    }

    async fn write(&self, frame: &Cd11Frame) -> Result<(), TransportError> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(TransportError::NotConnected);
        }
        match frame.body {
            FrameBody::Data(_) => self.stamps.lock().unwrap().data = Instant::now(),
            FrameBody::Acknack(_) => self.stamps.lock().unwrap().acknack = Instant::now(),
            _ => {}
        }
        self.written.lock().unwrap().push(frame.clone());
        Ok(())
    }

    fn seconds_since_last_contact(&self) -> u64 {
        self.stamps.lock().unwrap().contact.elapsed().as_secs()
    }

    fn seconds_since_last_acknack_sent(&self) -> u64 {
        self.stamps.lock().unwrap().acknack.elapsed().as_secs()
    }

    fn milliseconds_since_last_data_sent(&self) -> u64 {
        let elapsed = self.stamps.lock().unwrap().data.elapsed();
        u64::try_from(elapsed.as_millis()).unwrap()
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn local_addr(&self) -> Option<SocketAddr> {
        self.is_connected().then(|| LOCAL_ADDRESS.parse().unwrap())
    }

    fn remote_addr(&self) -> Option<SocketAddr> {
        *self.remote.lock().unwrap()
    }

    async fn disconnect(&self) {
        if self.connected.swap(false, Ordering::SeqCst) {
            self.disconnects.fetch_add(1, Ordering::SeqCst);
        }
        self.remote.lock().unwrap().take();
    }
}

/// Configuration with a fast data interval for tests
pub fn test_config() -> ProviderConfig {
    ProviderConfig::default()
        .with_station("H04N", "IDC")
        .with_data_frame_interval(Duration::from_millis(500))
}

/// Frame as sent by the connection manager or data consumer
pub fn peer_frame(body: FrameBody) -> Cd11Frame {
    Cd11Frame::new(FrameHeader::new("CONS", "TEST"), body, FrameTrailer::default())
}

pub fn connection_response(address: Ipv4Addr, port: u16) -> Cd11Frame {
    peer_frame(FrameBody::ConnectionResponse(ConnectionResponse::new(
        "MGR", address, port,
    )))
}

pub fn acknack(frameset: &str, gaps: Vec<(u64, u64)>) -> Cd11Frame {
    peer_frame(FrameBody::Acknack(Acknack {
        frameset_acked: frameset.to_string(),
        lowest_sequence_number: 1,
        highest_sequence_number: 0,
        gap_ranges: gaps,
    }))
}

pub fn alert(message: &str) -> Cd11Frame {
    peer_frame(FrameBody::Alert(Alert::new(message)))
}
