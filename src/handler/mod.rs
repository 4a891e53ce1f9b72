//! Handler module - filtering and dispatch of decoded events.
//!
//! Provides:
//! - [`HandlerFilter`] - optional name/sender/group/flags constraints
//! - [`Dispatcher`] - ordered raw and typed handler lists
//! - [`EventContext`] - what a typed handler sees
//!
//! # Example
//!
//! ```
//! use eventlink::handler::{Dispatcher, EventContext, HandlerFilter};
//!
//! let mut dispatcher = Dispatcher::new();
//!
//! // Typed handler for one event from one sender
//! dispatcher.on_event(HandlerFilter::event("temp").sender(0x05), |ctx: &EventContext<'_>| {
//!     println!("temperature: {}", ctx.payload());
//!     Ok(())
//! });
//!
//! // Raw observer for every frame
//! dispatcher.on_raw_frame(HandlerFilter::any(), |raw: &[u8]| {
//!     println!("{} wire bytes", raw.len());
//!     Ok(())
//! });
//! ```

mod context;
mod filter;
mod registry;

pub use context::EventContext;
pub use filter::HandlerFilter;
pub use registry::{DispatchOutcome, Dispatcher, EventHandler, HandlerResult, RawHandler};
