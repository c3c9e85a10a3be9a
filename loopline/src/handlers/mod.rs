//! Ready-made handlers.
//!
//! - [`LoggingHandler`]: records every event it sees, optionally terminating the pipeline
//! - [`DelayHandler`]: blocks its event loop for a fixed duration on every write

mod delay;
mod logging;

pub use delay::DelayHandler;
pub use logging::LoggingHandler;
