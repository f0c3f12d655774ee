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


//! Ordered event channel feeding the engine
//!
//! Workers never touch session state. They post [`Event`]s that the engine
//! consumes one at a time in the order posted. The channel counts queued
//! events per [`EventKind`] so timer workers can skip posting while an
//! identical request is still waiting.

use crate::{ProviderError, Result};
use cd11_codec::Cd11Frame;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::mpsc;

/// Work item for the engine
#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    /// A frame arrived from the peer
    NewFrameReceived(Cd11Frame),
    /// Time to send an acknack
    SendAcknack,
    /// Time to send a data frame
    SendData,
    /// End the session
    Shutdown,
}

/// Tag of an [`Event`], without its payload
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// [`Event::NewFrameReceived`]
    NewFrameReceived,
    /// [`Event::SendAcknack`]
    SendAcknack,
    /// [`Event::SendData`]
    SendData,
    /// [`Event::Shutdown`]
    Shutdown,
}

impl EventKind {
    const fn index(self) -> usize {
        match self {
            EventKind::NewFrameReceived => 0,
            EventKind::SendAcknack => 1,
            EventKind::SendData => 2,
            EventKind::Shutdown => 3,
        }
    }
}

impl Event {
    /// Tag of this event
    pub fn kind(&self) -> EventKind {
        match self {
            Event::NewFrameReceived(_) => EventKind::NewFrameReceived,
            Event::SendAcknack => EventKind::SendAcknack,
            Event::SendData => EventKind::SendData,
            Event::Shutdown => EventKind::Shutdown,
        }
    }
}

#[derive(Debug, Default)]
struct Pending {
    counts: [AtomicUsize; 4],
}

impl Pending {
    fn count(&self, kind: EventKind) -> &AtomicUsize {
        &self.counts[kind.index()]
    }
}

/// Creates a connected sender and receiver
pub fn event_channel() -> (EventSender, EventReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    let pending = Arc::new(Pending::default());
    (
        EventSender {
            tx,
            pending: Arc::clone(&pending),
        },
        EventReceiver { rx, pending },
    )
}

/// Posting side of the event channel, shared by all workers
#[derive(Clone, Debug)]
pub struct EventSender {
    tx: mpsc::UnboundedSender<Event>,
    pending: Arc<Pending>,
}

impl EventSender {
    /// Queue `event` unconditionally
    pub fn post(&self, event: Event) -> Result<()> {
        let count = self.pending.count(event.kind());
        count.fetch_add(1, Ordering::AcqRel);
        self.send(event, count)
    }

    /// Queue `event` unless one of the same kind is already waiting
    ///
    /// Returns `Ok(false)` when the event was skipped.
    pub fn post_unique(&self, event: Event) -> Result<bool> {
        let count = self.pending.count(event.kind());
        if count
            .compare_exchange(0, 1, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Ok(false);
        }
        self.send(event, count).map(|()| true)
    }

    /// Whether an event of `kind` is queued and not yet received
    pub fn is_pending(&self, kind: EventKind) -> bool {
        self.pending.count(kind).load(Ordering::Acquire) > 0
    }

    fn send(&self, event: Event, count: &AtomicUsize) -> Result<()> {
        self.tx.send(event).map_err(|_| {
            count.fetch_sub(1, Ordering::AcqRel);
            ProviderError::ChannelClosed
        })
    }
}

/// Consuming side of the event channel, owned by the engine
#[derive(Debug)]
pub struct EventReceiver {
    rx: mpsc::UnboundedReceiver<Event>,
    pending: Arc<Pending>,
}

impl EventReceiver {
    /// Wait for the next event
    ///
    /// Returns `None` once every sender is gone and the queue is drained.
    pub async fn recv(&mut self) -> Option<Event> {
        let event = self.rx.recv().await?;
        self.received(&event);
        Some(event)
    }

    /// Take the next event if one is queued
    pub fn try_recv(&mut self) -> Option<Event> {
        let event = self.rx.try_recv().ok()?;
        self.received(&event);
        Some(event)
    }

    /// Whether a shutdown request is queued
    pub fn shutdown_pending(&self) -> bool {
        self.pending.count(EventKind::Shutdown).load(Ordering::Acquire) > 0
    }

    /// Number of queued events
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    /// Whether the queue is empty
    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    fn received(&self, event: &Event) {
        self.pending
            .count(event.kind())
            .fetch_sub(1, Ordering::AcqRel);
    }
}
