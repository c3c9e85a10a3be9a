//! # Loopline - Channel Pipelines with Event Loop Affinity
//!
//! `loopline` is a small Netty-style pipeline for stream channels. Every channel owns an
//! ordered chain of [`Handler`]s and is pinned to one
//! [`EventLoop`](loopline_executor::EventLoop). Any handler can be moved onto a different
//! loop, which keeps its blocking work away from the rest of the channel.
//!
//! ## Core Concepts
//!
//! ### Pipeline
//!
//! The [`Pipeline`] is the ordered chain of handlers of one channel. Inbound events visit
//! handlers in registration order, outbound events in reverse order. Handlers can be
//! appended at any time, including while events are in flight.
//!
//! ### Handler
//!
//! A [`Handler`] reacts to four events:
//! - `transport_active`: the channel connected
//! - `transport_inactive`: the channel was torn down
//! - `handle_read`: a message arrived from the peer
//! - `handle_write`: a message is about to be sent to the peer
//!
//! Each callback returns a [`Flow`]: forward the (possibly replaced) value to the next
//! handler, or stop the event here.
//!
//! ### Channel
//!
//! A [`Channel`] is a thread-safe handle to one connection. Writes and pipeline changes made
//! through it are delivered to the channel's event loop in call order.
//!
//! ## Why Affinity Matters
//!
//! All handlers of a channel run on one loop thread, and that thread also serves every
//! other channel pinned to it. A handler that blocks (see
//! [`DelayHandler`](handlers::DelayHandler)) stalls all of them:
//!
//! ```text
//! loop-0: [write: DelayHandler sleeps 3s ...........][read RES0][read RES1]...
//! ```
//!
//! Bound to a dedicated loop, the same handler only holds up the event it is processing:
//!
//! ```text
//! loop-0:    [write → submit][read RES0][read RES1]...[write resumes → socket]
//! blocking:       [DelayHandler sleeps 3s ...........]
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use loopline::{Context, Flow, Handler, Pipeline, handlers::LoggingHandler};
//!
//! struct Echo;
//!
//! impl Handler for Echo {
//!     fn name(&self) -> &str {
//!         "Echo"
//!     }
//!
//!     fn handle_read(&self, ctx: &Context, msg: String) -> Flow<String> {
//!         let _ = ctx.channel().write(msg.clone());
//!         Flow::Forward(msg)
//!     }
//! }
//!
//! let pipeline = Pipeline::new();
//! pipeline
//!     .add_back(Echo)
//!     .add_back(LoggingHandler::new("Server", true));
//! assert_eq!(pipeline.len(), 2);
//! ```
//!
//! Sockets, framing and the per-connection driver live in `loopline-bootstrap` and
//! `loopline-codec`.

#![warn(rust_2018_idioms)]
#![warn(missing_docs)]

/// Channel handles and the commands they deliver to their event loop
pub(crate) mod channel;

/// Handler contract
pub(crate) mod handler;

/// Ready-made handlers
pub mod handlers;

/// Pipeline of handlers
pub(crate) mod pipeline;

pub use channel::{Channel, ChannelCommand, TransportContext};
pub use handler::{Context, Flow, Handler};
pub use pipeline::{Pipeline, PipelineEntry};
