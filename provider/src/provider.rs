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


//! The connection engine
//!
//! A [`DataProvider`] drives one CD 1.1 session: it asks the connection
//! manager where to deliver data, reconnects to that data consumer, starts
//! the four workers and then handles their events one at a time until the
//! session ends. Session state (sequence numbers, the gap queue and the
//! gap/forward alternation) lives here and nowhere else.

use crate::config::{ProviderConfig, ServiceType};
use crate::event::{Event, EventReceiver, EventSender, event_channel};
use crate::gap::GapTracker;
use crate::payload::PayloadSource;
use crate::transport::Transport;
use crate::worker::{FrameReceiver, SupervisedWorker, TimerPolicy, TimerWorker};
use crate::{ProviderError, Result};
use cd11_codec::{Cd11Frame, ConnectionRequest, FrameBody, FrameFactory};
use metrics::{counter, gauge};
use std::future::Future;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use tokio::select;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

/// Upper bound on sending the farewell alert.
const ALERT_TIMEOUT: Duration = Duration::from_secs(5);
/// Message carried by the farewell alert.
const SHUTDOWN_MESSAGE: &str = "Shutting down.";

/// Where a session is in its lifecycle
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ProviderState {
    /// Created, not yet run
    Idle,
    /// Connecting to the connection manager
    ConnectingToManager,
    /// Waiting for the connection response
    AwaitingManagerResponse,
    /// Connecting to the data consumer
    ConnectingToConsumer,
    /// Workers running, handling events
    Streaming,
    /// Tearing down
    ShuttingDown,
    /// Finished
    Stopped,
}

/// Outcome of a session: every error recorded by the engine and its workers
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SessionReport {
    /// Error messages, engine first
    pub errors: Vec<String>,
}

impl SessionReport {
    /// Whether the session ended without errors
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

impl std::fmt::Display for SessionReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.errors.join("; "))
    }
}

/// Station side of one CD 1.1 session
pub struct DataProvider {
    config: ProviderConfig,
    transport: Arc<dyn Transport>,
    factory: FrameFactory,
    payload: Option<PayloadSource>,
    state: ProviderState,
    stop: CancellationToken,
    events: EventSender,
    receiver: EventReceiver,
    workers: Vec<SupervisedWorker>,
    gaps: GapTracker,
    next_sequence_number: u64,
    send_gap_data: bool,
    data_consumer: Option<SocketAddr>,
    last_error: Option<ProviderError>,
    report: Option<SessionReport>,
}

impl DataProvider {
    /// Create a session over `transport`
    ///
    /// Fails if the configuration is invalid or asks for UDP.
    pub fn new(config: ProviderConfig, transport: Arc<dyn Transport>) -> Result<Self> {
        if config.service_type == ServiceType::Udp {
            return Err(ProviderError::UnsupportedService(config.service_type));
        }
        config.validate()?;
        let factory = FrameFactory::new(&*config.frame_creator, &*config.frame_destination)
            .with_auth_key_identifier(config.auth_key_identifier);
        let (events, receiver) = event_channel();
        Ok(Self {
            config,
            transport,
            factory,
            payload: None,
            state: ProviderState::Idle,
            stop: CancellationToken::new(),
            events,
            receiver,
            workers: Vec::new(),
            gaps: GapTracker::new(),
            next_sequence_number: 1,
            send_gap_data: false,
            data_consumer: None,
            last_error: None,
            report: None,
        })
    }

    /// Use `payload` instead of the source named by the configuration
    #[must_use]
    pub fn with_payload(mut self, payload: PayloadSource) -> Self {
        self.payload = Some(payload);
        self
    }

    /// Token that ends the session when cancelled
    pub fn stop_handle(&self) -> CancellationToken {
        self.stop.clone()
    }

    /// Current lifecycle state
    pub fn state(&self) -> ProviderState {
        self.state
    }

    /// Configuration in use
    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    /// Data consumer named by the connection manager
    pub fn data_consumer_address(&self) -> Option<SocketAddr> {
        self.data_consumer
    }

    /// Sequence number the next forward data frame will carry
    pub fn next_sequence_number(&self) -> u64 {
        self.next_sequence_number
    }

    /// Outstanding retransmission requests
    pub fn gap_tracker(&self) -> &GapTracker {
        &self.gaps
    }

    /// Run the session to completion
    ///
    /// Returns the combined error report; it is empty when the session
    /// ended normally (stop request, alert or idle expiry).
    #[instrument(skip(self), fields(station = %self.config.station_name))]
    pub async fn run(&mut self) -> SessionReport {
        if self.state != ProviderState::Idle {
            warn!(state = ?self.state, "Session already started");
            return self.shutdown().await;
        }
        match self.establish().await {
            Ok(()) => {
                if let Err(e) = self.event_loop().await {
                    self.fail(e);
                }
            }
            Err(e) => self.fail(e),
        }
        self.shutdown().await
    }

    fn set_state(&mut self, state: ProviderState) {
        if self.state != state {
            info!(from = ?self.state, to = ?state, "State transition");
            self.state = state;
        }
    }

    fn fail(&mut self, error: ProviderError) {
        if error.is_cancellation() {
            info!(state = ?self.state, "Stop requested");
            return;
        }
        error!(state = ?self.state, error = %error, "Session failed");
        self.last_error = Some(error);
    }

    async fn establish(&mut self) -> Result<()> {
        if self.payload.is_none() {
            self.payload = Some(PayloadSource::from_config(&self.config).await?);
        }
        self.handshake().await?;
        self.start_workers().await;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn handshake(&mut self) -> Result<()> {
        let manager = self.config.connection_manager();
        let wait = self.config.max_connect_wait;
        let local = self.config.local_bind();

        self.check_stop()?;
        self.set_state(ProviderState::ConnectingToManager);
        info!(%manager, "Connecting to connection manager");
        until_stopped(&self.stop, self.transport.connect(manager, wait, local)).await?;

        self.check_stop()?;
        let request = self.factory.connection_request(self.connection_request());
        until_stopped(&self.stop, self.transport.write(&request)).await?;
        self.set_state(ProviderState::AwaitingManagerResponse);
        let response = until_stopped(
            &self.stop,
            self.transport.read_timeout(self.config.response_timeout),
        )
        .await?;
        let consumer = match response.body {
            FrameBody::ConnectionResponse(body) if body.port == 0 => {
                return Err(ProviderError::Handshake(format!(
                    "{} named no data consumer port",
                    body.responder_name
                )));
            }
            FrameBody::ConnectionResponse(body) => {
                SocketAddr::new(IpAddr::V4(body.address), body.port)
            }
            other => return Err(ProviderError::UnexpectedFrame(other.frame_type())),
        };
        self.data_consumer = Some(consumer);

        self.check_stop()?;
        self.set_state(ProviderState::ConnectingToConsumer);
        info!(%consumer, "Connecting to data consumer");
        until_stopped(&self.stop, self.transport.connect(consumer, wait, local)).await?;
        self.check_stop()
    }

    fn check_stop(&self) -> Result<()> {
        if self.stop.is_cancelled() {
            return Err(ProviderError::Cancelled);
        }
        Ok(())
    }

    fn connection_request(&self) -> ConnectionRequest {
        let local = self.transport.local_addr();
        let address = match local.map(|addr| addr.ip()) {
            Some(IpAddr::V4(address)) => address,
            _ => Ipv4Addr::UNSPECIFIED,
        };
        ConnectionRequest {
            major_version: self.config.protocol_major_version,
            minor_version: self.config.protocol_minor_version,
            station_name: self.config.station_name.clone(),
            station_type: self.config.station_type.clone(),
            service_type: self.config.service_type.as_str().to_string(),
            address,
            port: local.map_or(0, |addr| addr.port()),
            secondary_address: None,
            secondary_port: None,
        }
    }

    async fn start_workers(&mut self) {
        let transport = &self.transport;
        let events = &self.events;
        let timer = |policy| {
            SupervisedWorker::new(
                TimerWorker::new(policy, Arc::clone(transport), events.clone()),
                events.clone(),
                self.stop.child_token(),
            )
        };
        let mut workers = vec![
            SupervisedWorker::new(
                FrameReceiver::new(Arc::clone(transport), events.clone()),
                events.clone(),
                self.stop.child_token(),
            ),
            timer(TimerPolicy::acknack()),
            timer(TimerPolicy::connection_expiry(self.config.connection_expiry)),
            timer(TimerPolicy::data_send(self.config.data_frame_interval)),
        ];
        for worker in &mut workers {
            worker.start();
        }
        self.workers = workers;
        for worker in &mut self.workers {
            worker.wait_initialized().await;
        }
        self.set_state(ProviderState::Streaming);
    }

    async fn event_loop(&mut self) -> Result<()> {
        while self.state == ProviderState::Streaming {
            // workers post before they stop running, so check running first
            if let Some(worker) = self.workers.iter().find(|w| !w.is_running()) {
                if !self.receiver.shutdown_pending() {
                    return Err(ProviderError::WorkerFailed {
                        worker: worker.name(),
                        reason: "stopped unexpectedly".to_string(),
                    });
                }
            }

            let event = select! {
                biased;
                () = self.stop.cancelled() => Event::Shutdown,
                event = self.receiver.recv() => event.unwrap_or(Event::Shutdown),
            };
            match event {
                Event::NewFrameReceived(frame) => self.process_frame(frame)?,
                Event::SendAcknack => self.send_acknack().await?,
                Event::SendData => self.send_data().await?,
                Event::Shutdown => {
                    info!("Shutdown requested");
                    break;
                }
            }
        }
        Ok(())
    }

    fn process_frame(&mut self, frame: Cd11Frame) -> Result<()> {
        let frame_type = frame.frame_type();
        match frame.body {
            FrameBody::Acknack(acknack) => {
                let expected = self.config.frameset();
                if self
                    .gaps
                    .apply_acknack(&acknack, &expected, self.next_sequence_number)
                {
                    debug!(
                        highest = acknack.highest_sequence_number,
                        reported = acknack.gap_ranges.len(),
                        outstanding = self.gaps.len(),
                        "Acknack applied"
                    );
                    gauge!("cd11.gaps.outstanding").set(self.gaps.len() as f64);
                } else {
                    warn!(
                        %expected,
                        received = %acknack.frameset_acked,
                        "Acknack for another frameset ignored"
                    );
                }
            }
            FrameBody::Alert(alert) => {
                info!(message = %alert.message, "Alert received");
                self.events.post(Event::Shutdown)?;
            }
            FrameBody::CdOneEncapsulation(_) => {
                warn!(%frame_type, "CD-1 encapsulation is not yet supported");
            }
            FrameBody::CommandRequest(_) | FrameBody::CommandResponse(_) => {
                warn!(%frame_type, "Command frames are not supported");
            }
            FrameBody::ConnectionRequest(_) | FrameBody::ConnectionResponse(_) => {
                error!(%frame_type, "Unexpected connection frame from data consumer");
            }
            FrameBody::Data(_) => {
                warn!(
                    sequence_number = frame.header.sequence_number,
                    "Data frame received from data consumer"
                );
            }
            FrameBody::OptionRequest(_) | FrameBody::OptionResponse(_) => {
                error!(%frame_type, "Option frames are not supported");
            }
        }
        Ok(())
    }

    async fn send_acknack(&mut self) -> Result<()> {
        let highest = self.next_sequence_number.wrapping_sub(1);
        let frame = self.factory.acknack(
            self.factory.creator(),
            self.gaps.lowest_sequence_number(),
            highest,
            Vec::new(),
        );
        debug!(highest, "Sending acknack");
        self.transport.write(&frame).await?;
        Ok(())
    }

    async fn send_data(&mut self) -> Result<()> {
        let gap = if self.send_gap_data {
            self.gaps.next_gap()
        } else {
            None
        };
        let sequence_number = gap.unwrap_or(self.next_sequence_number);
        let body = match &self.payload {
            Some(payload) => payload.frame(sequence_number),
            None => PayloadSource::synthetic(&self.config.station_name).frame(sequence_number),
        };
        let frame = self.factory.data_frame(body, sequence_number);
        self.transport.write(&frame).await?;

        if gap.is_some() {
            debug!(sequence_number, "Retransmitted gap");
            counter!("cd11.gaps.retransmitted").increment(1);
            gauge!("cd11.gaps.outstanding").set(self.gaps.len() as f64);
            self.send_gap_data = false;
        } else {
            self.next_sequence_number = self.next_sequence_number.wrapping_add(1);
            self.send_gap_data = true;
        }
        Ok(())
    }

    /// Tear the session down and report its errors
    ///
    /// Sends a farewell alert when connected to a data consumer, stops and
    /// joins every worker, then disconnects. Safe to call in any state;
    /// later calls return the first report.
    #[instrument(skip(self), fields(station = %self.config.station_name))]
    pub async fn shutdown(&mut self) -> SessionReport {
        if let Some(report) = &self.report {
            return report.clone();
        }
        self.set_state(ProviderState::ShuttingDown);

        if self.transport.is_connected()
            && self.transport.remote_addr() != Some(self.config.connection_manager())
        {
            let alert = self.factory.alert(SHUTDOWN_MESSAGE);
            match tokio::time::timeout(ALERT_TIMEOUT, self.transport.write(&alert)).await {
                Ok(Ok(())) => debug!("Sent shutdown alert"),
                Ok(Err(e)) => debug!(error = %e, "Could not send shutdown alert"),
                Err(_) => debug!("Timed out sending shutdown alert"),
            }
        }

        for worker in &self.workers {
            worker.request_stop();
        }
        for worker in &mut self.workers {
            worker.join().await;
        }

        let mut errors: Vec<String> = self.last_error.iter().map(ToString::to_string).collect();
        errors.extend(self.workers.iter().filter_map(|worker| {
            worker
                .last_error()
                .map(|e| format!("{}: {e}", worker.name()))
        }));

        self.transport.disconnect().await;
        self.set_state(ProviderState::Stopped);

        if errors.is_empty() {
            info!("Session ended");
        } else {
            counter!("cd11.sessions.errors").increment(1);
            warn!(errors = errors.len(), "Session ended with errors");
        }
        let report = SessionReport { errors };
        self.report = Some(report.clone());
        report
    }
}

impl Drop for DataProvider {
    fn drop(&mut self) {
        // workers hold child tokens; make sure none outlive the session
        self.stop.cancel();
    }
}

impl std::fmt::Debug for DataProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataProvider")
            .field("station", &self.config.station_name)
            .field("state", &self.state)
            .field("data_consumer", &self.data_consumer)
            .field("next_sequence_number", &self.next_sequence_number)
            .field("gaps", &self.gaps.len())
            .field("workers", &self.workers)
            .finish_non_exhaustive()
    }
}

async fn until_stopped<T, E>(
    stop: &CancellationToken,
    operation: impl Future<Output = std::result::Result<T, E>>,
) -> Result<T>
where
    ProviderError: From<E>,
{
    select! {
        biased;
        () = stop.cancelled() => Err(ProviderError::Cancelled),
        result = operation => Ok(result?),
    }
}
