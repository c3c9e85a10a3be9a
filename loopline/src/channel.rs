use std::{
    fmt,
    io::{Error, ErrorKind},
    net::SocketAddr,
    sync::Arc,
};

use loopline_executor::EventLoop;
use tokio::sync::mpsc;

use crate::{handler::Handler, pipeline::PipelineEntry};

/// Addresses of an established stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TransportContext {
    /// Local socket address.
    pub local_addr: SocketAddr,
    /// Remote socket address.
    pub peer_addr: SocketAddr,
}

/// A request delivered to the event loop that owns a channel.
#[derive(Debug)]
pub enum ChannelCommand {
    /// Send a message through the outbound pipeline.
    Write(String),
    /// Append a handler to the tail of the pipeline.
    AddBack(PipelineEntry),
    /// Close the stream.
    Close,
}

/// A handle to one established bidirectional stream.
///
/// The handle can be cloned and used from any thread. Everything it does is forwarded to the
/// event loop the channel is pinned to, in the order the calls were made: a handler added
/// with [`add_back`](Self::add_back) sees every message written after that call.
#[derive(Clone)]
pub struct Channel {
    inner: Arc<ChannelInner>,
}

struct ChannelInner {
    transport: TransportContext,
    event_loop: EventLoop,
    commands: mpsc::UnboundedSender<ChannelCommand>,
}

impl Channel {
    /// Creates a channel pinned to `event_loop`, together with the receiving end of its
    /// command queue. The transport driver owns the receiver.
    pub fn new(
        transport: TransportContext,
        event_loop: EventLoop,
    ) -> (Self, mpsc::UnboundedReceiver<ChannelCommand>) {
        let (commands, commands_rx) = mpsc::unbounded_channel();
        let channel = Self {
            inner: Arc::new(ChannelInner {
                transport,
                event_loop,
                commands,
            }),
        };
        (channel, commands_rx)
    }

    /// Addresses of the underlying stream.
    pub fn transport(&self) -> TransportContext {
        self.inner.transport
    }

    /// Local address of the underlying stream.
    pub fn local_addr(&self) -> SocketAddr {
        self.inner.transport.local_addr
    }

    /// Remote address of the underlying stream.
    pub fn peer_addr(&self) -> SocketAddr {
        self.inner.transport.peer_addr
    }

    /// The event loop this channel is pinned to.
    pub fn event_loop(&self) -> &EventLoop {
        &self.inner.event_loop
    }

    /// Returns `false` once the driver stopped accepting commands.
    pub fn is_active(&self) -> bool {
        !self.inner.commands.is_closed()
    }

    /// Writes a message through the outbound pipeline and onto the wire.
    pub fn write(&self, msg: impl Into<String>) -> Result<(), Error> {
        self.send(ChannelCommand::Write(msg.into()))
    }

    /// Appends a handler that runs on this channel's event loop.
    pub fn add_back(&self, handler: impl Handler) -> Result<(), Error> {
        self.send(ChannelCommand::AddBack(PipelineEntry::new(handler, None)))
    }

    /// Appends a handler whose callbacks run on `event_loop` instead of the channel's loop.
    pub fn add_back_on(&self, event_loop: &EventLoop, handler: impl Handler) -> Result<(), Error> {
        self.send(ChannelCommand::AddBack(PipelineEntry::new(
            handler,
            Some(event_loop.clone()),
        )))
    }

    /// Closes the channel after every command queued before it.
    pub fn close(&self) -> Result<(), Error> {
        self.send(ChannelCommand::Close)
    }

    fn send(&self, command: ChannelCommand) -> Result<(), Error> {
        self.inner.commands.send(command).map_err(|_| {
            Error::new(
                ErrorKind::NotConnected,
                format!("channel to {} is closed", self.peer_addr()),
            )
        })
    }
}

impl fmt::Debug for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Channel")
            .field("local_addr", &self.inner.transport.local_addr)
            .field("peer_addr", &self.inner.transport.peer_addr)
            .field("event_loop", &self.inner.event_loop.name())
            .finish()
    }
}
