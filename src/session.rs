//! Session: one connection's framer, parsers, dispatcher and scheduler.
//!
//! The [`Session`] ties the pieces together:
//! - outbound: `send*` → [`Framer`] → [`WriteScheduler`] → transport
//! - inbound: `process*` → [`StreamParser`] (one per source) → [`Dispatcher`]
//!
//! All methods take `&self`, so a session is normally shared behind an
//! `Arc` between the application and the inbound pump.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use eventlink::{EventContext, HandlerFilter, SendOptions, Session, SessionConfig};
//! use eventlink::transport::ChannelTransport;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> eventlink::Result<()> {
//! let (a, b) = ChannelTransport::pair(16);
//!
//! let sensor = Session::new(SessionConfig::with_addr(0x02), Arc::new(a.transport))?;
//! let hub = Arc::new(Session::new(SessionConfig::with_addr(0x01), Arc::new(b.transport))?);
//!
//! hub.on_event(HandlerFilter::event("temp"), |ctx: &EventContext<'_>| {
//!     println!("{} says {}", ctx.sender(), ctx.payload());
//!     Ok(())
//! });
//! let pump = hub.spawn_inbound(0, b.notifications);
//!
//! sensor.send("temp", "21.5", SendOptions::to(0x01)).await?;
//! drop(sensor);
//! pump.await.unwrap();
//! # Ok(())
//! # }
//! ```

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::codec::JsonCodec;
use crate::error::{EventLinkError, Result};
use crate::handler::{Dispatcher, EventContext, HandlerFilter, HandlerResult};
use crate::protocol::{Framer, Identity, ParserState, SendOptions, StreamParser};
use crate::scheduler::{FlowStats, SchedulerConfig, WriteScheduler};
use crate::transport::Transport;

/// Identifies a physical byte source (BLE link, serial port, ...).
pub type SourceId = u8;

/// Source used by [`Session::process`].
pub const DEFAULT_SOURCE: SourceId = 0;

/// Session configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Local virtual address, written as sender on every frame.
    pub local_addr: u8,
    /// Local group.
    pub local_group: u8,
    /// Drop inbound frames not addressed to the local identity before
    /// dispatch. Off by default: every frame reaches the handler filters.
    pub filter_by_address: bool,
    /// Write scheduler tuning.
    pub scheduler: SchedulerConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            local_addr: 0x00,
            local_group: 0x00,
            filter_by_address: false,
            scheduler: SchedulerConfig::default(),
        }
    }
}

impl SessionConfig {
    /// Default configuration with the given local address.
    pub fn with_addr(local_addr: u8) -> Self {
        Self {
            local_addr,
            ..Self::default()
        }
    }

    /// Load a configuration document. Missing fields take their defaults.
    ///
    /// # Example
    ///
    /// ```
    /// use eventlink::SessionConfig;
    ///
    /// let config = SessionConfig::from_json(r#"{
    ///     "local_addr": 2,
    ///     "filter_by_address": true,
    ///     "scheduler": { "write_with_response": true }
    /// }"#).unwrap();
    ///
    /// assert_eq!(config.local_addr, 2);
    /// assert!(config.scheduler.write_with_response);
    /// assert_eq!(config.scheduler.max_pending_writes, 3);
    /// ```
    pub fn from_json(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Check the configuration.
    pub fn validate(&self) -> Result<()> {
        self.scheduler.validate()
    }

    /// Local identity derived from address and group.
    pub fn identity(&self) -> Identity {
        Identity::new(self.local_addr, self.local_group)
    }
}

/// Counts from one inbound chunk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InboundReport {
    /// Frames handed to the dispatcher.
    pub frames: usize,
    /// Frames dropped by address filtering.
    pub filtered: usize,
    /// Malformed frames discarded.
    pub errors: usize,
}

/// One connection's protocol state.
pub struct Session {
    config: SessionConfig,
    framer: Mutex<Framer>,
    dispatcher: RwLock<Dispatcher>,
    parsers: Mutex<HashMap<SourceId, StreamParser>>,
    scheduler: RwLock<Arc<WriteScheduler>>,
}

impl Session {
    /// Create a session writing to `transport`.
    pub fn new(config: SessionConfig, transport: Arc<dyn Transport>) -> Result<Self> {
        config.validate()?;
        let scheduler = WriteScheduler::new(transport, config.scheduler.clone());

        Ok(Self {
            framer: Mutex::new(Framer::new(config.local_addr)),
            dispatcher: RwLock::new(Dispatcher::new()),
            parsers: Mutex::new(HashMap::new()),
            scheduler: RwLock::new(Arc::new(scheduler)),
            config,
        })
    }

    /// Configuration the session was created with.
    ///
    /// `local_addr` here is the initial address; see [`Session::local_addr`].
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Current local address.
    pub fn local_addr(&self) -> u8 {
        lock(&self.framer).local_addr()
    }

    /// Change the local address.
    ///
    /// Applies to the next frame sent and to inbound address filtering. The
    /// message counter keeps running.
    pub fn set_local_addr(&self, addr: u8) {
        lock(&self.framer).set_local_addr(addr);
        info!(local_addr = addr, "local address changed");
    }

    /// Local identity.
    pub fn identity(&self) -> Identity {
        Identity::new(self.local_addr(), self.config.local_group)
    }

    /// Check if the current transport is usable.
    pub fn is_connected(&self) -> bool {
        self.current_scheduler().transport().is_connected()
    }

    // ------------------------------------------------------------------
    // Outbound
    // ------------------------------------------------------------------

    /// Send an event with explicit addressing.
    ///
    /// # Arguments
    ///
    /// * `name` - Event name (at most 31 bytes)
    /// * `payload` - Payload text (at most 2047 bytes)
    /// * `receiver` - Receiver address, `0xFF` for broadcast
    /// * `sender_group` - Local group to announce
    /// * `receiver_group` - Target group, `0x00` for all
    /// * `flags` - Application flags byte
    pub async fn send_event(
        &self,
        name: &str,
        payload: &str,
        receiver: u8,
        sender_group: u8,
        receiver_group: u8,
        flags: u8,
    ) -> Result<()> {
        let opts = SendOptions {
            receiver,
            sender_group,
            receiver_group,
            flags,
        };
        self.send(name, payload, opts).await
    }

    /// Send an event.
    ///
    /// Oversized names or payloads are rejected before anything is written.
    /// Returns once every chunk of the frame has been written.
    pub async fn send(&self, name: &str, payload: &str, opts: SendOptions) -> Result<()> {
        let scheduler = self.current_scheduler();
        if !scheduler.transport().is_connected() {
            return Err(EventLinkError::NotConnected);
        }

        let bytes = lock(&self.framer).build(name, payload, opts)?;
        debug!(
            event = name,
            receiver = opts.receiver,
            len = bytes.len(),
            "sending event"
        );

        scheduler.write(&bytes).await?;
        Ok(())
    }

    /// Send a value encoded as a JSON payload.
    pub async fn send_json<T: Serialize>(
        &self,
        name: &str,
        value: &T,
        opts: SendOptions,
    ) -> Result<()> {
        let payload = JsonCodec::encode(value)?;
        self.send(name, &payload, opts).await
    }

    /// Current flow-control state.
    pub fn flow_stats(&self) -> FlowStats {
        self.current_scheduler().stats()
    }

    /// Swap in a new transport.
    ///
    /// Flow state, the message counter and every parser start over. Writes
    /// still queued on the old connection fail with `Disconnected`.
    pub fn reconnect(&self, transport: Arc<dyn Transport>) {
        let fresh = Arc::new(WriteScheduler::new(transport, self.config.scheduler.clone()));
        let old = std::mem::replace(&mut *write(&self.scheduler), fresh);
        old.close();

        let local_addr = {
            let mut framer = lock(&self.framer);
            *framer = Framer::new(framer.local_addr());
            framer.local_addr()
        };
        for parser in lock(&self.parsers).values_mut() {
            parser.reset();
        }
        info!(local_addr, "session reconnected");
    }

    // ------------------------------------------------------------------
    // Handler registration
    // ------------------------------------------------------------------
    //
    // Handlers run while the dispatcher is read-locked; registering from
    // inside a handler would deadlock.

    /// Register a typed event handler.
    pub fn on_event<F>(&self, filter: HandlerFilter, handler: F)
    where
        F: Fn(&EventContext<'_>) -> HandlerResult + Send + Sync + 'static,
    {
        write(&self.dispatcher).on_event(filter, handler);
    }

    /// Register a handler receiving the payload decoded as JSON.
    pub fn on_json<T, F>(&self, filter: HandlerFilter, handler: F)
    where
        T: DeserializeOwned + 'static,
        F: Fn(T, &EventContext<'_>) -> HandlerResult + Send + Sync + 'static,
    {
        write(&self.dispatcher).on_json(filter, handler);
    }

    /// Register a raw frame observer.
    pub fn on_raw_frame<F>(&self, filter: HandlerFilter, handler: F)
    where
        F: Fn(&[u8]) -> HandlerResult + Send + Sync + 'static,
    {
        write(&self.dispatcher).on_raw_frame(filter, handler);
    }

    /// Set the handler for events no typed handler took.
    pub fn on_unhandled<F>(&self, filter: HandlerFilter, handler: F)
    where
        F: Fn(&EventContext<'_>) -> HandlerResult + Send + Sync + 'static,
    {
        write(&self.dispatcher).on_unhandled(filter, handler);
    }

    // ------------------------------------------------------------------
    // Inbound
    // ------------------------------------------------------------------

    /// Feed a chunk from the default source.
    pub fn process(&self, chunk: &[u8]) -> InboundReport {
        self.process_from(DEFAULT_SOURCE, chunk)
    }

    /// Feed a chunk from `source` and dispatch every frame it completes.
    ///
    /// Each source has its own parser; partial frames never mix between
    /// sources.
    pub fn process_from(&self, source: SourceId, chunk: &[u8]) -> InboundReport {
        let results = lock(&self.parsers)
            .entry(source)
            .or_insert_with(StreamParser::new)
            .feed(chunk);

        let mut report = InboundReport::default();
        if results.is_empty() {
            return report;
        }

        let identity = self.identity();
        let dispatcher = read(&self.dispatcher);
        for result in results {
            match result {
                Ok(frame) => {
                    if self.config.filter_by_address && !frame.is_addressed_to(&identity) {
                        debug!(
                            source,
                            event = %frame.name,
                            receiver = frame.receiver(),
                            receiver_group = frame.header.receiver_group,
                            "frame filtered"
                        );
                        report.filtered += 1;
                        continue;
                    }
                    debug!(
                        source,
                        event = %frame.name,
                        sender = frame.sender(),
                        message_id = frame.message_id(),
                        "frame decoded"
                    );
                    dispatcher.dispatch(&frame, identity.addr);
                    report.frames += 1;
                }
                Err(err) => {
                    warn!(source, error = %err, "discarding malformed frame");
                    report.errors += 1;
                }
            }
        }
        report
    }

    /// Parser state for `source`, if it has received anything.
    pub fn parser_state(&self, source: SourceId) -> Option<ParserState> {
        lock(&self.parsers).get(&source).map(StreamParser::state)
    }

    /// Run the notification loop for `source` on a tokio task.
    ///
    /// The task ends when the notification channel closes.
    pub fn spawn_inbound(
        self: &Arc<Self>,
        source: SourceId,
        mut notifications: mpsc::Receiver<Bytes>,
    ) -> JoinHandle<()> {
        let session = Arc::clone(self);
        tokio::spawn(async move {
            while let Some(chunk) = notifications.recv().await {
                session.process_from(source, &chunk);
            }
            debug!(source, "notification stream closed");
        })
    }

    fn current_scheduler(&self) -> Arc<WriteScheduler> {
        Arc::clone(&read(&self.scheduler))
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("config", &self.config)
            .field("flow", &self.flow_stats())
            .finish()
    }
}

// Every critical section leaves its state consistent, so a poisoned lock is
// still safe to use.

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}
