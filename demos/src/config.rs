use std::{net::SocketAddr, time::Duration};

use loopline_codec::Framing;

use crate::handlers::Reply;

/// Settings of a [`Harness`](crate::Harness) run.
#[derive(Debug, Clone)]
pub struct HarnessConfig {
    /// Address the server binds. Port `0` picks a free one.
    pub bind_addr: SocketAddr,
    /// How long the delay handler blocks on each write.
    pub delay: Duration,
    /// Number of `RES<i>` messages the server side sends, and of polls.
    pub messages: usize,
    /// How long each poll of the capture queue waits.
    pub poll_window: Duration,
    /// Wire format of both ends.
    pub framing: Framing,
    /// What the server answers to every message it reads.
    pub reply: Reply,
    /// Loops accepting connections.
    pub boss_threads: usize,
    /// Loops serving accepted connections.
    pub worker_threads: usize,
    /// Loops serving client connections.
    pub client_threads: usize,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
            delay: Duration::from_millis(3000),
            messages: 10,
            poll_window: Duration::from_millis(100),
            framing: Framing::default(),
            reply: Reply::Fixed("RESP".to_owned()),
            boss_threads: 1,
            worker_threads: 2,
            client_threads: 1,
        }
    }
}

impl HarnessConfig {
    /// Total time the polls of one scenario may take.
    pub fn observation_window(&self) -> Duration {
        self.poll_window * self.messages as u32
    }
}
