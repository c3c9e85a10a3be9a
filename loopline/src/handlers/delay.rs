use log::trace;
use std::{thread, time::Duration};

use crate::handler::{Context, Flow, Handler};

/// An outbound handler that sleeps synchronously before forwarding every write.
///
/// The sleep is a plain `std::thread::sleep`: it occupies whichever event loop runs the
/// handler for the full duration. Added with [`Pipeline::add_back`](crate::Pipeline::add_back)
/// it stalls the channel's own loop, reads included. Added with
/// [`Pipeline::add_back_on`](crate::Pipeline::add_back_on) only the dedicated loop sleeps.
#[derive(Debug, Clone, Copy)]
pub struct DelayHandler {
    delay: Duration,
}

impl DelayHandler {
    /// Creates a handler that blocks for `delay` on each write.
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }

    /// The configured delay.
    pub fn delay(&self) -> Duration {
        self.delay
    }
}

impl Handler for DelayHandler {
    fn name(&self) -> &str {
        "DelayHandler"
    }

    fn handle_write(&self, ctx: &Context, msg: String) -> Flow<String> {
        trace!(
            "blocking {:?} on {:?} before writing to {}",
            self.delay(),
            thread::current().name(),
            ctx.peer_addr()
        );
        thread::sleep(self.delay);
        Flow::Forward(msg)
    }
}
