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


//! Background workers feeding the engine
//!
//! Each session runs four workers next to the engine:
//! - the frame receiver, turning inbound frames into events
//! - the acknack scheduler
//! - the data send scheduler
//! - the connection expiry monitor
//!
//! Workers own no session state. They read transport activity probes and
//! post events; the engine does everything else. A [`SupervisedWorker`]
//! wraps each one with start, stop and join handling and turns a failure
//! or panic into a `Shutdown` event.

use crate::event::{Event, EventKind, EventSender};
use crate::transport::{Transport, TransportError};
use crate::{ProviderError, Result};
use async_trait::async_trait;
use cd11_codec::FrameType;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::select;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, trace};

/// Idle time after which an acknack is due.
pub const ACKNACK_THRESHOLD: Duration = Duration::from_secs(55);
/// Pause after posting an acknack request.
pub const ACKNACK_PERIOD: Duration = Duration::from_secs(56);

/// A long-running loop driven by a [`SupervisedWorker`]
#[async_trait]
pub trait Worker: Send + 'static {
    /// Name used in logs and error reports
    fn name(&self) -> &'static str;

    /// Run until `stop` fires or the work is done
    ///
    /// Cancellation is normal termination and returns `Ok`.
    async fn run(&mut self, stop: CancellationToken) -> Result<()>;
}

/// Clears the running flag when the task ends, and requests a shutdown if
/// it ends by panicking.
struct RunGuard {
    running: Arc<AtomicBool>,
    events: EventSender,
    name: &'static str,
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Release);
        if std::thread::panicking() {
            error!(worker = self.name, "Worker panicked");
            let _ = self.events.post(Event::Shutdown);
        }
    }
}

/// Lifecycle wrapper around a [`Worker`]
pub struct SupervisedWorker {
    name: &'static str,
    worker: Option<Box<dyn Worker>>,
    events: EventSender,
    stop: CancellationToken,
    running: Arc<AtomicBool>,
    initialized: Option<watch::Receiver<bool>>,
    handle: Option<JoinHandle<Result<()>>>,
    last_error: Option<ProviderError>,
}

impl SupervisedWorker {
    /// Wrap `worker`; it stops when `stop` or any of its parents is cancelled
    pub fn new(worker: impl Worker, events: EventSender, stop: CancellationToken) -> Self {
        Self {
            name: worker.name(),
            worker: Some(Box::new(worker)),
            events,
            stop,
            running: Arc::new(AtomicBool::new(false)),
            initialized: None,
            handle: None,
            last_error: None,
        }
    }

    /// Worker name
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Spawn the worker task; later calls do nothing
    pub fn start(&mut self) {
        let Some(mut worker) = self.worker.take() else {
            return;
        };
        let (ready, initialized) = watch::channel(false);
        self.initialized = Some(initialized);
        self.running.store(true, Ordering::Release);

        let guard = RunGuard {
            running: Arc::clone(&self.running),
            events: self.events.clone(),
            name: self.name,
        };
        let events = self.events.clone();
        let stop = self.stop.clone();
        let name = self.name;
        self.handle = Some(tokio::spawn(async move {
            let _guard = guard;
            let _ = ready.send(true);
            debug!(worker = name, "Worker started");
            let result = worker.run(stop).await;
            match &result {
                Ok(()) => debug!(worker = name, "Worker stopped"),
                Err(e) => {
                    error!(worker = name, error = %e, "Worker failed");
                    if events.post(Event::Shutdown).is_err() {
                        debug!(worker = name, "Engine already gone");
                    }
                }
            }
            result
        }));
    }

    /// Wait until the worker task has begun running
    pub async fn wait_initialized(&mut self) {
        if let Some(initialized) = self.initialized.as_mut() {
            let _ = initialized.wait_for(|ready| *ready).await;
        }
    }

    /// Whether the worker task is still running
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Ask the worker to stop
    pub fn request_stop(&self) {
        self.stop.cancel();
    }

    /// Wait for the worker task to finish and record how it ended
    pub async fn join(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };
        match handle.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => self.last_error = Some(e),
            Err(e) => {
                let reason = if e.is_panic() { "panicked" } else { "aborted" };
                self.last_error = Some(ProviderError::WorkerFailed {
                    worker: self.name,
                    reason: reason.to_string(),
                });
            }
        }
    }

    /// The error the worker ended with, if any
    pub fn last_error(&self) -> Option<&ProviderError> {
        self.last_error.as_ref()
    }
}

impl std::fmt::Debug for SupervisedWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SupervisedWorker")
            .field("name", &self.name)
            .field("started", &self.worker.is_none())
            .field("running", &self.is_running())
            .field("last_error", &self.last_error)
            .finish()
    }
}

/// Transport activity a timer measures
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ActivityProbe {
    /// Time since a frame was received
    LastContact,
    /// Time since an acknack was sent
    LastAcknackSent,
    /// Time since a data frame was sent
    LastDataSent,
}

impl ActivityProbe {
    /// Read the probe from `transport`
    pub fn elapsed(self, transport: &dyn Transport) -> Duration {
        match self {
            ActivityProbe::LastContact => {
                Duration::from_secs(transport.seconds_since_last_contact())
            }
            ActivityProbe::LastAcknackSent => {
                Duration::from_secs(transport.seconds_since_last_acknack_sent())
            }
            ActivityProbe::LastDataSent => {
                Duration::from_millis(transport.milliseconds_since_last_data_sent())
            }
        }
    }
}

/// When and what a [`TimerWorker`] posts
#[derive(Clone, Debug)]
pub struct TimerPolicy {
    /// Worker name
    pub name: &'static str,
    /// Activity measured
    pub probe: ActivityProbe,
    /// Elapsed time at which the event is due
    pub threshold: Duration,
    /// Pause after posting
    pub period: Duration,
    /// Event posted when due
    pub event: Event,
    /// Skip posting while an event of the same kind is queued
    pub dedup: bool,
    /// Exit after the first post
    pub terminate_after_fire: bool,
}

impl TimerPolicy {
    /// Request an acknack after 55 s without sending one
    pub fn acknack() -> Self {
        Self {
            name: "acknack-scheduler",
            probe: ActivityProbe::LastAcknackSent,
            threshold: ACKNACK_THRESHOLD,
            period: ACKNACK_PERIOD,
            event: Event::SendAcknack,
            dedup: true,
            terminate_after_fire: false,
        }
    }

    /// Request a data frame every `interval`
    pub fn data_send(interval: Duration) -> Self {
        Self {
            name: "data-send-scheduler",
            probe: ActivityProbe::LastDataSent,
            threshold: interval,
            period: interval,
            event: Event::SendData,
            dedup: true,
            terminate_after_fire: false,
        }
    }

    /// End the session after `idle` without contact
    pub fn connection_expiry(idle: Duration) -> Self {
        Self {
            name: "connection-expiry",
            probe: ActivityProbe::LastContact,
            threshold: idle,
            period: idle,
            event: Event::Shutdown,
            dedup: false,
            terminate_after_fire: true,
        }
    }
}

/// Posts its policy's event whenever the probed activity is overdue
pub struct TimerWorker {
    policy: TimerPolicy,
    transport: Arc<dyn Transport>,
    events: EventSender,
}

impl TimerWorker {
    /// Timer following `policy`
    pub fn new(policy: TimerPolicy, transport: Arc<dyn Transport>, events: EventSender) -> Self {
        Self {
            policy,
            transport,
            events,
        }
    }

    /// The policy this timer follows
    pub fn policy(&self) -> &TimerPolicy {
        &self.policy
    }

    fn fire(&self) -> Result<()> {
        let event = self.policy.event.clone();
        if self.policy.dedup {
            if !self.events.post_unique(event)? {
                trace!(worker = self.policy.name, "Request already queued");
            }
        } else {
            self.events.post(event)?;
        }
        Ok(())
    }
}

#[async_trait]
impl Worker for TimerWorker {
    fn name(&self) -> &'static str {
        self.policy.name
    }

    async fn run(&mut self, stop: CancellationToken) -> Result<()> {
        loop {
            let elapsed = self.policy.probe.elapsed(self.transport.as_ref());
            let wait = if elapsed >= self.policy.threshold {
                self.fire()?;
                if self.policy.terminate_after_fire {
                    debug!(worker = self.policy.name, ?elapsed, "Timer expired");
                    return Ok(());
                }
                self.policy.period
            } else {
                self.policy.threshold - elapsed
            };
            select! {
                biased;
                () = stop.cancelled() => return Ok(()),
                () = sleep(wait) => {}
            }
        }
    }
}

/// Reads frames and posts them to the engine
pub struct FrameReceiver {
    transport: Arc<dyn Transport>,
    events: EventSender,
}

impl FrameReceiver {
    /// Receiver reading from `transport`
    pub fn new(transport: Arc<dyn Transport>, events: EventSender) -> Self {
        Self { transport, events }
    }
}

#[async_trait]
impl Worker for FrameReceiver {
    fn name(&self) -> &'static str {
        "frame-receiver"
    }

    async fn run(&mut self, stop: CancellationToken) -> Result<()> {
        let mut alert_received = false;
        loop {
            match self.transport.read(&stop).await {
                Ok(Some(frame)) => {
                    debug!(
                        frame_type = %frame.frame_type(),
                        sequence_number = frame.sequence_number(),
                        "Frame received"
                    );
                    alert_received |= frame.frame_type() == FrameType::Alert;
                    self.events.post(Event::NewFrameReceived(frame))?;
                }
                Ok(None) => return Ok(()),
                Err(e) if stop.is_cancelled() => {
                    debug!(error = %e, "Read failed after stop");
                    return Ok(());
                }
                Err(TransportError::ConnectionClosed)
                    if alert_received || self.events.is_pending(EventKind::Shutdown) =>
                {
                    // peer hung up after ending the session; the engine sees
                    // the shutdown before it sees this worker gone
                    debug!(alert_received, "Connection closed during teardown");
                    if !self.events.is_pending(EventKind::Shutdown) {
                        self.events.post(Event::Shutdown)?;
                    }
                    return Ok(());
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{EventReceiver, event_channel};
    use crate::testing::StubTransport;
    use cd11_codec::FrameFactory;

    fn drain(rx: &mut EventReceiver) -> Vec<Event> {
        std::iter::from_fn(|| rx.try_recv()).collect()
    }

    struct FailingWorker;

    #[async_trait]
    impl Worker for FailingWorker {
        fn name(&self) -> &'static str {
            "failing"
        }

        async fn run(&mut self, _stop: CancellationToken) -> Result<()> {
            Err(ProviderError::Handshake("boom".to_string()))
        }
    }

    struct PanickingWorker;

    #[async_trait]
    impl Worker for PanickingWorker {
        fn name(&self) -> &'static str {
            "panicking"
        }

        async fn run(&mut self, _stop: CancellationToken) -> Result<()> {
            panic!("worker bug");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_data_timer_posts_once_while_pending() {
        let transport = Arc::new(StubTransport::new());
        transport.set_data_ms(1_000);
        let (tx, mut rx) = event_channel();
        let timer = TimerWorker::new(
            TimerPolicy::data_send(Duration::from_millis(500)),
            transport,
            tx.clone(),
        );
        let mut worker = SupervisedWorker::new(timer, tx, CancellationToken::new());
        worker.start();
        worker.wait_initialized().await;
        sleep(Duration::from_secs(3)).await;
        worker.request_stop();
        worker.join().await;

        assert_eq!(drain(&mut rx), vec![Event::SendData]);
        assert!(worker.last_error().is_none());
        assert!(!worker.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_acknack_timer_waits_for_threshold() {
        let transport = Arc::new(StubTransport::new());
        transport.set_acknack_secs(10);
        let (tx, mut rx) = event_channel();
        let timer = TimerWorker::new(TimerPolicy::acknack(), transport.clone(), tx.clone());
        let mut worker = SupervisedWorker::new(timer, tx, CancellationToken::new());
        worker.start();

        sleep(Duration::from_secs(30)).await;
        assert!(rx.is_empty());

        transport.set_acknack_secs(60);
        sleep(Duration::from_secs(20)).await;
        assert_eq!(drain(&mut rx), vec![Event::SendAcknack]);

        worker.request_stop();
        worker.join().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_expiry_posts_shutdown_and_exits() {
        let transport = Arc::new(StubTransport::new());
        transport.set_contact_secs(121);
        let (tx, mut rx) = event_channel();
        let timer = TimerWorker::new(
            TimerPolicy::connection_expiry(Duration::from_secs(120)),
            transport,
            tx.clone(),
        );
        let mut worker = SupervisedWorker::new(timer, tx, CancellationToken::new());
        worker.start();
        worker.join().await;

        assert!(!worker.is_running());
        assert!(worker.last_error().is_none());
        assert_eq!(drain(&mut rx), vec![Event::Shutdown]);
    }

    #[tokio::test]
    async fn test_failed_worker_requests_shutdown() {
        let (tx, mut rx) = event_channel();
        let mut worker = SupervisedWorker::new(FailingWorker, tx, CancellationToken::new());
        worker.start();
        worker.join().await;

        assert!(matches!(
            worker.last_error(),
            Some(ProviderError::Handshake(_))
        ));
        assert!(rx.shutdown_pending());
        assert_eq!(drain(&mut rx), vec![Event::Shutdown]);
    }

    #[tokio::test]
    async fn test_panicking_worker_is_contained() {
        let (tx, mut rx) = event_channel();
        let mut worker = SupervisedWorker::new(PanickingWorker, tx, CancellationToken::new());
        worker.start();
        worker.join().await;

        assert!(!worker.is_running());
        assert!(matches!(
            worker.last_error(),
            Some(ProviderError::WorkerFailed {
                worker: "panicking",
                ..
            })
        ));
        assert_eq!(drain(&mut rx), vec![Event::Shutdown]);
    }

    #[tokio::test]
    async fn test_join_before_start_is_noop() {
        let (tx, _rx) = event_channel();
        let mut worker = SupervisedWorker::new(FailingWorker, tx, CancellationToken::new());
        worker.request_stop();
        worker.wait_initialized().await;
        worker.join().await;
        assert!(worker.last_error().is_none());
        assert!(!worker.is_running());
    }

    #[tokio::test]
    async fn test_receiver_forwards_frames() {
        let transport = Arc::new(StubTransport::new());
        let (tx, mut rx) = event_channel();
        let factory = FrameFactory::new("CONS", "0");
        transport.push_frame(factory.alert("hello"));

        let mut worker = SupervisedWorker::new(
            FrameReceiver::new(transport.clone(), tx.clone()),
            tx,
            CancellationToken::new(),
        );
        worker.start();
        let event = rx.recv().await.unwrap();
        assert!(matches!(event, Event::NewFrameReceived(frame) if frame.header.creator == "CONS"));

        worker.request_stop();
        worker.join().await;
        assert!(worker.last_error().is_none());
    }

    #[tokio::test]
    async fn test_receiver_close_after_alert_is_clean() {
        let transport = Arc::new(StubTransport::new());
        let factory = FrameFactory::new("CONS", "0");
        transport.push_frame(factory.alert("bye"));
        transport.close_inbox();
        let (tx, mut rx) = event_channel();
        let mut worker = SupervisedWorker::new(
            FrameReceiver::new(transport, tx.clone()),
            tx,
            CancellationToken::new(),
        );
        worker.start();
        worker.join().await;

        assert!(worker.last_error().is_none());
        let events = drain(&mut rx);
        assert_eq!(events.len(), 2);
        assert!(matches!(&events[0], Event::NewFrameReceived(frame) if frame.frame_type() == FrameType::Alert));
        assert_eq!(events[1], Event::Shutdown);
    }

    #[tokio::test]
    async fn test_receiver_close_with_shutdown_queued_is_clean() {
        let transport = Arc::new(StubTransport::new());
        transport.close_inbox();
        let (tx, mut rx) = event_channel();
        tx.post(Event::Shutdown).unwrap();
        let mut worker = SupervisedWorker::new(
            FrameReceiver::new(transport, tx.clone()),
            tx,
            CancellationToken::new(),
        );
        worker.start();
        worker.join().await;

        assert!(worker.last_error().is_none());
        assert_eq!(drain(&mut rx), vec![Event::Shutdown]);
    }

    #[tokio::test]
    async fn test_receiver_fails_on_closed_connection() {
        let transport = Arc::new(StubTransport::new());
        transport.close_inbox();
        let (tx, mut rx) = event_channel();
        let mut worker = SupervisedWorker::new(
            FrameReceiver::new(transport, tx.clone()),
            tx,
            CancellationToken::new(),
        );
        worker.start();
        worker.join().await;
        assert!(matches!(
            worker.last_error(),
            Some(ProviderError::Transport(_))
        ));
        assert_eq!(drain(&mut rx), vec![Event::Shutdown]);
    }
}
