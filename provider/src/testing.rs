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


//! In-memory transport for unit tests.

use crate::transport::{Transport, TransportError};
use async_trait::async_trait;
use cd11_codec::Cd11Frame;
use std::net::SocketAddr;
use std::sync::Mutex as StdMutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::{Mutex, mpsc};
use tokio_util::sync::CancellationToken;

pub(crate) struct StubTransport {
    contact_secs: AtomicU64,
    acknack_secs: AtomicU64,
    data_ms: AtomicU64,
    inbox_tx: StdMutex<Option<mpsc::UnboundedSender<Cd11Frame>>>,
    inbox: Mutex<mpsc::UnboundedReceiver<Cd11Frame>>,
    written: StdMutex<Vec<Cd11Frame>>,
    connected: AtomicBool,
    remote: StdMutex<Option<SocketAddr>>,
    fail_writes: AtomicBool,
}

impl StubTransport {
    pub(crate) fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            contact_secs: AtomicU64::new(0),
            acknack_secs: AtomicU64::new(0),
            data_ms: AtomicU64::new(0),
            inbox_tx: StdMutex::new(Some(tx)),
            inbox: Mutex::new(rx),
            written: StdMutex::new(Vec::new()),
            connected: AtomicBool::new(false),
            remote: StdMutex::new(None),
            fail_writes: AtomicBool::new(false),
        }
    }

    pub(crate) fn set_contact_secs(&self, value: u64) {
        self.contact_secs.store(value, Ordering::SeqCst);
    }

    pub(crate) fn set_acknack_secs(&self, value: u64) {
        self.acknack_secs.store(value, Ordering::SeqCst);
    }

    pub(crate) fn set_data_ms(&self, value: u64) {
        self.data_ms.store(value, Ordering::SeqCst);
    }

    pub(crate) fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn push_frame(&self, frame: Cd11Frame) {
        if let Some(tx) = self.inbox_tx.lock().unwrap().as_ref() {
            tx.send(frame).unwrap();
        }
    }

    pub(crate) fn close_inbox(&self) {
        self.inbox_tx.lock().unwrap().take();
    }

    pub(crate) fn written(&self) -> Vec<Cd11Frame> {
        self.written.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for StubTransport {
    async fn connect(
        &self,
        remote: SocketAddr,
        _timeout: Duration,
        _local: Option<SocketAddr>,
    ) -> Result<(), TransportError> {
        *self.remote.lock().unwrap() = Some(remote);
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn read(&self, cancel: &CancellationToken) -> Result<Option<Cd11Frame>, TransportError> {
        let mut inbox = self.inbox.lock().await;
        tokio::select! {
            biased;
            () = cancel.cancelled() => Ok(None),
            frame = inbox.recv() => frame.map(Some).ok_or(TransportError::ConnectionClosed),
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
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(TransportError::ConnectionClosed);
        }
        self.written.lock().unwrap().push(frame.clone());
        Ok(())
    }

    fn seconds_since_last_contact(&self) -> u64 {
        self.contact_secs.load(Ordering::SeqCst)
    }

    fn seconds_since_last_acknack_sent(&self) -> u64 {
        self.acknack_secs.load(Ordering::SeqCst)
    }

    fn milliseconds_since_last_data_sent(&self) -> u64 {
        self.data_ms.load(Ordering::SeqCst)
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn local_addr(&self) -> Option<SocketAddr> {
        None
    }

    fn remote_addr(&self) -> Option<SocketAddr> {
        *self.remote.lock().unwrap()
    }

    async fn disconnect(&self) {
        self.connected.store(false, Ordering::SeqCst);
        self.remote.lock().unwrap().take();
    }
}
