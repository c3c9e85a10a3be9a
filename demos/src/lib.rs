//! # Loopline Demos
//!
//! A small harness showing what a blocking handler does to a channel, depending on which
//! event loop it runs on.
//!
//! The server echoes or answers every message and registers its channels so the harness can
//! write from the server side. The client captures everything it reads into a queue the
//! harness polls with a short window. Two scenarios put a [`DelayHandler`] on the client:
//!
//! - [`blocking_side_effect`]: on the channel's own loop, so the server's replies pile up
//!   unread until the delay is over
//! - [`isolated_blocking`]: on a dedicated loop, so the replies arrive right away
//!
//! Run both with:
//!
//! ```bash
//! cargo run -p loopline-demos --bin blocking_demo -- --debug
//! ```
//!
//! [`DelayHandler`]: loopline::handlers::DelayHandler

#![warn(rust_2018_idioms)]
#![warn(missing_docs)]

mod config;
mod handlers;
mod harness;

pub use config::HarnessConfig;
pub use handlers::{CaptureHandler, ChannelRegistrar, Reply, ResponseHandler};
pub use harness::{blocking_side_effect, isolated_blocking, Harness};
