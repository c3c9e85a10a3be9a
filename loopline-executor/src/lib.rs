//! # Loopline Executor - Single-Threaded Event Loops
//!
//! `loopline-executor` provides the execution contexts used by loopline channels.
//!
//! ## Features
//!
//! - **Tokio LocalSet**: Each [`EventLoop`] owns one OS thread running a current-thread
//!   tokio runtime and a `LocalSet`
//! - **Serialized Jobs**: Jobs submitted to a loop run one after another, in submission order
//! - **Event Loop Groups**: A fixed pool of loops handed out round-robin
//! - **Graceful Shutdown**: Tasks spawned on a loop observe shutdown and are awaited
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use loopline_executor::EventLoop;
//!
//! let event_loop = EventLoop::new("worker").unwrap();
//! let answer = event_loop.submit(|| 40 + 2).unwrap();
//! assert_eq!(answer.blocking_recv().unwrap(), 42);
//! event_loop.shutdown_gracefully();
//! ```
//!
//! ## Blocking
//!
//! A job occupies its loop until it returns. A job that sleeps for three seconds delays every
//! other job and every task on that loop by three seconds. That property is what the rest of
//! the workspace builds on: handlers that block are moved onto a loop of their own.
//!
//! ## Event Loop Groups
//!
//! ```rust,no_run
//! use loopline_executor::EventLoopGroup;
//!
//! let group = EventLoopGroup::new("io", 2).unwrap();
//! let first = group.next();
//! let second = group.next();
//! assert_ne!(first.name(), second.name());
//! group.shutdown_gracefully();
//! ```

#![warn(rust_2018_idioms)]
#![warn(missing_docs)]

mod event_loop;
mod group;

pub use event_loop::EventLoop;
pub use group::EventLoopGroup;
