//! The helpful bootstrap APIs which wire TCP sockets to loopline pipelines.
//!
//! [`ServerBootstrap`] listens on one event loop of a boss group and hands every accepted
//! stream to a loop of its worker group. [`ClientBootstrap`] connects from a loop of its
//! group. In both cases the stream gets its own [`Channel`](loopline::Channel) and [`Pipeline`], pinned to
//! that loop for the rest of its life, and a driver task that:
//!
//! - decodes frames into strings and passes them to [`Pipeline::handle_read`]
//! - takes writes queued through [`Channel::write`](loopline::Channel::write), passes them to
//!   [`Pipeline::handle_write`] and puts the result on the wire
//! - applies pipeline changes queued through [`Channel::add_back`](loopline::Channel::add_back)
//! - fires `transport_active` first and `transport_inactive` last
//!
//! ```rust,no_run
//! use loopline::handlers::LoggingHandler;
//! use loopline_bootstrap::{ClientBootstrap, ServerBootstrap};
//! use loopline_executor::EventLoopGroup;
//!
//! # fn main() -> std::io::Result<()> {
//! let mut server = ServerBootstrap::new(
//!     EventLoopGroup::new("boss", 1)?,
//!     EventLoopGroup::new("worker", 2)?,
//! );
//! server.pipeline(|pipeline| {
//!     pipeline.add_back(LoggingHandler::new("Server", true));
//! });
//! let addr = server.bind("127.0.0.1:0")?;
//!
//! let mut client = ClientBootstrap::new(EventLoopGroup::new("client", 1)?);
//! client.pipeline(|pipeline| {
//!     pipeline.add_back(LoggingHandler::new("Client", true));
//! });
//! let channel = client.connect(addr)?;
//! channel.write("ABCD")?;
//! # Ok(())
//! # }
//! ```

#![warn(rust_2018_idioms)]
#![warn(missing_docs)]

use std::{
    io::{Error, ErrorKind},
    net::{SocketAddr, ToSocketAddrs},
    sync::Arc,
};

use loopline::Pipeline;
use loopline_codec::Framing;

mod bootstrap_tcp;

pub use bootstrap_tcp::{
    bootstrap_tcp_client::ClientBootstrap, bootstrap_tcp_server::ServerBootstrap,
};

/// Populates the pipeline of a freshly established channel.
///
/// Runs on the channel's event loop before `transport_active` is fired.
pub type PipelineInitializer = Arc<dyn Fn(&Pipeline) + Send + Sync>;

/// Typical internet MTU = 1500, rounded up to a power of 2
const DEFAULT_READ_BUFFER_SIZE: usize = 2048;

/// Settings shared by the server and client bootstraps.
#[derive(Clone)]
struct Bootstrap {
    initializer: Option<PipelineInitializer>,
    framing: Framing,
    read_buffer_size: usize,
}

impl Default for Bootstrap {
    fn default() -> Self {
        Self::new()
    }
}

impl Bootstrap {
    fn new() -> Self {
        Self {
            initializer: None,
            framing: Framing::default(),
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
        }
    }

    fn pipeline<F>(&mut self, initializer: F) -> &mut Self
    where
        F: Fn(&Pipeline) + Send + Sync + 'static,
    {
        self.initializer = Some(Arc::new(initializer));
        self
    }

    fn framing(&mut self, framing: Framing) -> &mut Self {
        self.framing = framing;
        self
    }

    fn read_buffer_size(&mut self, read_buffer_size: usize) -> &mut Self {
        self.read_buffer_size = read_buffer_size;
        self
    }

    fn initialize(&self, pipeline: &Pipeline) {
        if let Some(initializer) = &self.initializer {
            initializer(pipeline);
        }
    }
}

fn resolve<A: ToSocketAddrs>(addr: A) -> Result<SocketAddr, Error> {
    addr.to_socket_addrs()?
        .next()
        .ok_or_else(|| Error::new(ErrorKind::InvalidInput, "no socket address to use"))
}

fn event_loop_gone(name: &str) -> Error {
    Error::new(
        ErrorKind::BrokenPipe,
        format!("event loop {} is shut down", name),
    )
}
