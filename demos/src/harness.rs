use anyhow::{anyhow, Context as _};
use crossbeam_channel::Receiver;
use log::{debug, info};
use std::{
    net::SocketAddr,
    thread,
    time::{Duration, Instant},
};

use loopline::{
    handlers::{DelayHandler, LoggingHandler},
    Channel,
};
use loopline_bootstrap::{ClientBootstrap, ServerBootstrap};
use loopline_executor::{EventLoop, EventLoopGroup};

use crate::{
    config::HarnessConfig,
    handlers::{CaptureHandler, ChannelRegistrar, ResponseHandler},
};

const REGISTRATION_TIMEOUT: Duration = Duration::from_secs(5);

/// A running server and a client bootstrap connected to it.
pub struct Harness {
    config: HarnessConfig,
    server_addr: SocketAddr,
    client: ClientBootstrap,
    registrar: ChannelRegistrar,
    captured: Receiver<String>,
    groups: Vec<EventLoopGroup>,
}

impl Harness {
    /// Starts the server and prepares the client side.
    ///
    /// Server pipeline: `[ChannelRegistrar, ResponseHandler, LoggingHandler("Server")]`.
    /// Client pipeline: `[CaptureHandler, LoggingHandler("Client")]`. Both loggers end
    /// their pipeline.
    ///
    /// An invalid framing fails with an `InvalidInput` I/O error before any loop starts.
    pub fn start(config: HarnessConfig) -> anyhow::Result<Self> {
        config.framing.validate()?;
        let boss = EventLoopGroup::new("boss", config.boss_threads)?;
        let workers = EventLoopGroup::new("worker", config.worker_threads)?;
        let clients = EventLoopGroup::new("client", config.client_threads)?;

        let registrar = ChannelRegistrar::new();
        let mut server = ServerBootstrap::new(boss.clone(), workers.clone());
        server.framing(config.framing).pipeline({
            let registrar = registrar.clone();
            let reply = config.reply.clone();
            move |pipeline| {
                pipeline
                    .add_back(registrar.clone())
                    .add_back(ResponseHandler::new(reply.clone()))
                    .add_back(LoggingHandler::new("Server", true));
            }
        });
        let server_addr = server
            .bind(config.bind_addr)
            .with_context(|| format!("failed to bind {}", config.bind_addr))?;
        info!("server listening on {}", server_addr);

        let (captured_tx, captured) = crossbeam_channel::unbounded();
        let mut client = ClientBootstrap::new(clients.clone());
        client.framing(config.framing).pipeline(move |pipeline| {
            pipeline
                .add_back(CaptureHandler::new(captured_tx.clone()))
                .add_back(LoggingHandler::new("Client", true));
        });

        Ok(Self {
            config,
            server_addr,
            client,
            registrar,
            captured,
            groups: vec![clients, workers, boss],
        })
    }

    /// Address the server is listening on.
    pub fn server_addr(&self) -> SocketAddr {
        self.server_addr
    }

    /// Opens a client channel to the server.
    pub fn connect(&self) -> anyhow::Result<Channel> {
        let channel = self
            .client
            .connect(self.server_addr)
            .with_context(|| format!("failed to connect to {}", self.server_addr))?;
        debug!("client connected from {}", channel.local_addr());
        Ok(channel)
    }

    /// Waits until the server registered the other end of `client`.
    pub fn server_channel_for(&self, client: &Channel) -> anyhow::Result<Channel> {
        let deadline = Instant::now() + REGISTRATION_TIMEOUT;
        loop {
            if let Some(channel) = self.registrar.get(&client.local_addr()) {
                return Ok(channel);
            }
            if Instant::now() >= deadline {
                return Err(anyhow!(
                    "server never registered a channel for {}",
                    client.local_addr()
                ));
            }
            thread::sleep(Duration::from_millis(5));
        }
    }

    /// Waits one poll window for the next captured message.
    pub fn poll(&self) -> Option<String> {
        self.poll_timeout(self.config.poll_window)
    }

    /// Waits up to `timeout` for the next captured message.
    pub fn poll_timeout(&self, timeout: Duration) -> Option<String> {
        self.captured.recv_timeout(timeout).ok()
    }

    /// Writes `"ABCD"` from `client`, then `RES0..` from the server side, and polls once
    /// per server message.
    pub fn exchange(&self, client: &Channel) -> anyhow::Result<Vec<Option<String>>> {
        let server = self.server_channel_for(client)?;

        client.write("ABCD")?;
        for i in 0..self.config.messages {
            server.write(format!("RES{i}"))?;
        }

        Ok((0..self.config.messages).map(|_| self.poll()).collect())
    }

    /// Stops every loop, clients first.
    pub fn shutdown(self) {
        for group in &self.groups {
            group.shutdown_gracefully();
        }
    }
}

/// Runs the exchange with the delay handler on the client channel's own loop.
pub fn blocking_side_effect(config: &HarnessConfig) -> anyhow::Result<Vec<Option<String>>> {
    let harness = Harness::start(config.clone())?;
    let client = harness.connect()?;
    client.add_back(DelayHandler::new(config.delay))?;

    let observed = harness.exchange(&client);
    harness.shutdown();
    observed
}

/// Runs the exchange with the delay handler bound to a dedicated loop.
pub fn isolated_blocking(config: &HarnessConfig) -> anyhow::Result<Vec<Option<String>>> {
    let harness = Harness::start(config.clone())?;
    let dedicated = EventLoop::new("blocking-handler")?;
    let client = harness.connect()?;
    client.add_back_on(&dedicated, DelayHandler::new(config.delay))?;

    let observed = harness.exchange(&client);
    harness.shutdown();
    dedicated.shutdown_gracefully();
    observed
}
