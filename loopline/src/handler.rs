//! # Handler - Processing Units of a Pipeline
//!
//! A [`Handler`] observes, transforms, delays or stops the events that flow through a
//! channel's [`Pipeline`](crate::Pipeline). Each callback returns a [`Flow`] that tells the
//! pipeline whether to continue with the next handler.
//!
//! ## Event Flow
//!
//! ```text
//!        socket
//!          │ ▲
//!   read   │ │   write
//!          ▼ │
//!     ┌──────────┐
//!     │ handler 0│
//!     └──────────┘
//!          │ ▲
//!          ▼ │
//!     ┌──────────┐
//!     │ handler 1│
//!     └──────────┘
//!          │ ▲
//!          ▼ │
//!       application
//! ```
//!
//! Inbound events (`transport_active`, `transport_inactive`, `handle_read`) visit handlers in
//! registration order. Outbound events (`handle_write`) visit them in reverse order, starting
//! from the most recently added handler.
//!
//! ## Example
//!
//! ```rust
//! use loopline::{Context, Flow, Handler};
//!
//! struct Uppercase;
//!
//! impl Handler for Uppercase {
//!     fn name(&self) -> &str {
//!         "Uppercase"
//!     }
//!
//!     fn handle_read(&self, _ctx: &Context, msg: String) -> Flow<String> {
//!         Flow::Forward(msg.to_uppercase())
//!     }
//! }
//! ```
//!
//! Handlers take `&self` and must be `Send + Sync`: a handler bound to another event loop
//! runs on that loop's thread. Configuration is supplied at construction.

use std::net::SocketAddr;

use crate::channel::Channel;

/// The decision a handler makes about one event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Flow<T> {
    /// Pass the (possibly replaced) value on to the next handler.
    Forward(T),
    /// Stop propagating this event. Later events are not affected.
    Stop,
}

impl<T> Flow<T> {
    /// Returns `true` for [`Flow::Stop`].
    pub fn is_stop(&self) -> bool {
        matches!(self, Flow::Stop)
    }

    /// Returns the forwarded value, if any.
    pub fn into_forwarded(self) -> Option<T> {
        match self {
            Flow::Forward(value) => Some(value),
            Flow::Stop => None,
        }
    }
}

/// Per-invocation context handed to a handler callback.
#[derive(Clone, Debug)]
pub struct Context {
    name: String,
    channel: Channel,
}

impl Context {
    /// Creates a context for the handler named `name` on `channel`.
    pub fn new(name: &str, channel: Channel) -> Self {
        Self {
            name: name.to_string(),
            channel,
        }
    }

    /// Name of the handler this context belongs to.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The channel the event belongs to. Use it to write replies.
    pub fn channel(&self) -> &Channel {
        &self.channel
    }

    /// Local address of the channel.
    pub fn local_addr(&self) -> SocketAddr {
        self.channel.local_addr()
    }

    /// Remote address of the channel.
    pub fn peer_addr(&self) -> SocketAddr {
        self.channel.peer_addr()
    }
}

/// The callback contract of a pipeline handler.
///
/// Every callback has a default that forwards the event unchanged, so a handler only
/// overrides the events it cares about.
pub trait Handler: Send + Sync + 'static {
    /// Name used in logs and by [`Pipeline::names`](crate::Pipeline::names).
    fn name(&self) -> &str;

    /// Fires once when the channel becomes active.
    fn transport_active(&self, _ctx: &Context) -> Flow<()> {
        Flow::Forward(())
    }

    /// Fires once when the channel is torn down.
    fn transport_inactive(&self, _ctx: &Context) -> Flow<()> {
        Flow::Forward(())
    }

    /// Fires for every message received from the peer.
    fn handle_read(&self, _ctx: &Context, msg: String) -> Flow<String> {
        Flow::Forward(msg)
    }

    /// Fires for every message about to be sent to the peer.
    fn handle_write(&self, _ctx: &Context, msg: String) -> Flow<String> {
        Flow::Forward(msg)
    }
}
