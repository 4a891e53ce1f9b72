//! Dispatcher fanning decoded frames out to registered handlers.
//!
//! Two ordered lists are kept: raw handlers, which see the frame's wire
//! bytes, and typed handlers, which see an [`EventContext`]. For each frame
//! every matching raw handler runs first, then every matching typed handler,
//! each list in registration order. If no typed handler matched, the
//! optional unhandled-event handler gets the frame.
//!
//! A failing or panicking handler is logged and skipped; dispatch continues
//! with the next one. Handlers cannot be removed once registered.
//!
//! # Example
//!
//! ```
//! use eventlink::handler::{Dispatcher, EventContext, HandlerFilter};
//! use eventlink::protocol::{Framer, SendOptions, StreamParser};
//!
//! let mut dispatcher = Dispatcher::new();
//! dispatcher.on_event(HandlerFilter::event("temp"), |ctx: &EventContext<'_>| {
//!     assert_eq!(ctx.payload(), "21.5");
//!     Ok(())
//! });
//!
//! let bytes = Framer::new(0x02).build("temp", "21.5", SendOptions::broadcast()).unwrap();
//! let frame = StreamParser::new().feed(&bytes).remove(0).unwrap();
//!
//! let outcome = dispatcher.dispatch(&frame, 0x01);
//! assert_eq!(outcome.typed, 1);
//! ```

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use serde::de::DeserializeOwned;
use tracing::{debug, error};

use super::{EventContext, HandlerFilter};
use crate::error::Result;
use crate::protocol::Frame;

/// Result type for handler functions.
pub type HandlerResult = Result<()>;

/// Callback for decoded events.
pub trait EventHandler: Send + Sync + 'static {
    /// Handle one event.
    fn call(&self, ctx: &EventContext<'_>) -> HandlerResult;
}

impl<F> EventHandler for F
where
    F: Fn(&EventContext<'_>) -> HandlerResult + Send + Sync + 'static,
{
    fn call(&self, ctx: &EventContext<'_>) -> HandlerResult {
        self(ctx)
    }
}

/// Callback for a frame's wire bytes (`SOH` through `EOT`, still stuffed).
pub trait RawHandler: Send + Sync + 'static {
    /// Observe one frame. The slice length is the raw frame length.
    fn call(&self, raw: &[u8]) -> HandlerResult;
}

impl<F> RawHandler for F
where
    F: Fn(&[u8]) -> HandlerResult + Send + Sync + 'static,
{
    fn call(&self, raw: &[u8]) -> HandlerResult {
        self(raw)
    }
}

/// What a single dispatch did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchOutcome {
    /// Raw handlers whose filter matched.
    pub raw: usize,
    /// Typed handlers whose filter matched.
    pub typed: usize,
    /// Matched handlers that returned an error or panicked.
    pub failed: usize,
    /// Whether the unhandled-event handler ran.
    pub fallback: bool,
}

impl DispatchOutcome {
    /// Check if any typed handler (or the fallback) took the frame.
    pub fn is_handled(&self) -> bool {
        self.typed > 0 || self.fallback
    }
}

/// Ordered handler lists for one session.
#[derive(Default)]
pub struct Dispatcher {
    handlers: Vec<(HandlerFilter, Box<dyn EventHandler>)>,
    raw_handlers: Vec<(HandlerFilter, Box<dyn RawHandler>)>,
    unhandled: Option<(HandlerFilter, Box<dyn EventHandler>)>,
}

impl Dispatcher {
    /// Create a dispatcher with no handlers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a typed handler.
    pub fn on_event<F>(&mut self, filter: HandlerFilter, handler: F)
    where
        F: Fn(&EventContext<'_>) -> HandlerResult + Send + Sync + 'static,
    {
        self.handlers.push((filter, Box::new(handler)));
    }

    /// Register a typed handler whose payload is decoded as JSON first.
    ///
    /// A payload that does not decode counts as a handler failure.
    pub fn on_json<T, F>(&mut self, filter: HandlerFilter, handler: F)
    where
        T: DeserializeOwned + 'static,
        F: Fn(T, &EventContext<'_>) -> HandlerResult + Send + Sync + 'static,
    {
        self.on_event(filter, move |ctx: &EventContext<'_>| {
            let value = ctx.json::<T>()?;
            handler(value, ctx)
        });
    }

    /// Register a raw frame observer. The filter's event name is ignored.
    pub fn on_raw_frame<F>(&mut self, filter: HandlerFilter, handler: F)
    where
        F: Fn(&[u8]) -> HandlerResult + Send + Sync + 'static,
    {
        self.raw_handlers.push((filter, Box::new(handler)));
    }

    /// Set the handler for frames no typed handler matched, replacing any
    /// previous one.
    pub fn on_unhandled<F>(&mut self, filter: HandlerFilter, handler: F)
    where
        F: Fn(&EventContext<'_>) -> HandlerResult + Send + Sync + 'static,
    {
        self.unhandled = Some((filter, Box::new(handler)));
    }

    /// Number of typed handlers.
    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }

    /// Number of raw handlers.
    pub fn raw_handler_count(&self) -> usize {
        self.raw_handlers.len()
    }

    /// Check if an unhandled-event handler is set.
    pub fn has_unhandled(&self) -> bool {
        self.unhandled.is_some()
    }

    /// Deliver a frame to every matching handler.
    ///
    /// # Arguments
    ///
    /// * `frame` - Decoded frame
    /// * `local_addr` - Local address, used for reply addressing
    pub fn dispatch(&self, frame: &Frame, local_addr: u8) -> DispatchOutcome {
        let mut outcome = DispatchOutcome::default();

        for (filter, handler) in &self.raw_handlers {
            if filter.matches_header(&frame.header) {
                outcome.raw += 1;
                if !invoke("raw", frame, || handler.call(&frame.raw)) {
                    outcome.failed += 1;
                }
            }
        }

        let ctx = EventContext::new(frame, local_addr);
        for (filter, handler) in &self.handlers {
            if filter.matches(frame) {
                outcome.typed += 1;
                if !invoke("event", frame, || handler.call(&ctx)) {
                    outcome.failed += 1;
                }
            }
        }

        if outcome.typed == 0 {
            if let Some((filter, handler)) = &self.unhandled {
                if filter.matches(frame) {
                    outcome.fallback = true;
                    if !invoke("unhandled", frame, || handler.call(&ctx)) {
                        outcome.failed += 1;
                    }
                }
            }
        }

        if !outcome.is_handled() {
            debug!(
                event = %frame.name,
                sender = frame.sender(),
                message_id = frame.message_id(),
                "no handler for event"
            );
        }

        outcome
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("handlers", &self.handlers.len())
            .field("raw_handlers", &self.raw_handlers.len())
            .field("unhandled", &self.unhandled.is_some())
            .finish()
    }
}

/// Run one handler, containing errors and panics. Returns `true` on success.
fn invoke(kind: &'static str, frame: &Frame, call: impl FnOnce() -> HandlerResult) -> bool {
    match panic::catch_unwind(AssertUnwindSafe(call)) {
        Ok(Ok(())) => true,
        Ok(Err(err)) => {
            error!(
                kind,
                event = %frame.name,
                sender = frame.sender(),
                error = %err,
                "handler failed"
            );
            false
        }
        Err(payload) => {
            error!(
                kind,
                event = %frame.name,
                sender = frame.sender(),
                panic = panic_message(payload.as_ref()),
                "handler panicked"
            );
            false
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        msg
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg
    } else {
        "non-string panic payload"
    }
}
