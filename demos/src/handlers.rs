use crossbeam_channel::Sender;
use dashmap::DashMap;
use log::{info, warn};
use loopline::{Channel, Context, Flow, Handler};
use std::{net::SocketAddr, sync::Arc};

/// What [`ResponseHandler`] writes back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// The message that was read.
    Echo,
    /// The same text for every message.
    Fixed(String),
}

/// Answers every inbound message through the channel, then forwards it.
pub struct ResponseHandler {
    reply: Reply,
}

impl ResponseHandler {
    /// Creates a handler answering with `reply`.
    pub fn new(reply: Reply) -> Self {
        Self { reply }
    }
}

impl Handler for ResponseHandler {
    fn name(&self) -> &str {
        "ResponseHandler"
    }

    fn handle_read(&self, ctx: &Context, msg: String) -> Flow<String> {
        let reply = match &self.reply {
            Reply::Echo => msg.clone(),
            Reply::Fixed(text) => text.clone(),
        };
        if let Err(err) = ctx.channel().write(reply) {
            warn!("failed to answer {}: {}", ctx.peer_addr(), err);
        }
        Flow::Forward(msg)
    }
}

/// Pushes every inbound message onto a queue, then forwards it.
pub struct CaptureHandler {
    captured: Sender<String>,
}

impl CaptureHandler {
    /// Creates a handler pushing onto `captured`.
    pub fn new(captured: Sender<String>) -> Self {
        Self { captured }
    }
}

impl Handler for CaptureHandler {
    fn name(&self) -> &str {
        "CaptureHandler"
    }

    fn handle_read(&self, _ctx: &Context, msg: String) -> Flow<String> {
        let _ = self.captured.send(msg.clone());
        Flow::Forward(msg)
    }
}

/// Keeps the server side channels reachable by their peer address while they are active.
#[derive(Clone, Default)]
pub struct ChannelRegistrar {
    channels: Arc<DashMap<SocketAddr, Channel>>,
}

impl ChannelRegistrar {
    /// Creates an empty registrar. Clones share the same map.
    pub fn new() -> Self {
        Self::default()
    }

    /// The active channel whose peer is `peer_addr`.
    pub fn get(&self, peer_addr: &SocketAddr) -> Option<Channel> {
        self.channels.get(peer_addr).map(|channel| channel.clone())
    }

    /// Number of active channels.
    pub fn len(&self) -> usize {
        self.channels.len()
    }

    /// Returns `true` when no channel is active.
    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }
}

impl Handler for ChannelRegistrar {
    fn name(&self) -> &str {
        "ChannelRegistrar"
    }

    fn transport_active(&self, ctx: &Context) -> Flow<()> {
        info!("{} joined", ctx.peer_addr());
        self.channels.insert(ctx.peer_addr(), ctx.channel().clone());
        Flow::Forward(())
    }

    fn transport_inactive(&self, ctx: &Context) -> Flow<()> {
        info!("{} left", ctx.peer_addr());
        self.channels.remove(&ctx.peer_addr());
        Flow::Forward(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use loopline::{ChannelCommand, TransportContext};
    use loopline_executor::EventLoop;
    use tokio::sync::mpsc::UnboundedReceiver;

    fn context() -> (Context, UnboundedReceiver<ChannelCommand>) {
        let transport = TransportContext {
            local_addr: "127.0.0.1:8080".parse().unwrap(),
            peer_addr: "127.0.0.1:50000".parse().unwrap(),
        };
        let (channel, commands) =
            Channel::new(transport, EventLoop::new("handlers-test").unwrap());
        (Context::new("test", channel), commands)
    }

    fn written(commands: &mut UnboundedReceiver<ChannelCommand>) -> Vec<String> {
        let mut written = vec![];
        while let Ok(command) = commands.try_recv() {
            if let ChannelCommand::Write(msg) = command {
                written.push(msg);
            }
        }
        written
    }

    #[test]
    fn fixed_reply_ignores_message() {
        let (ctx, mut commands) = context();
        let handler = ResponseHandler::new(Reply::Fixed("RESP".to_owned()));

        assert_eq!(
            handler.handle_read(&ctx, "ABCD".to_owned()),
            Flow::Forward("ABCD".to_owned())
        );
        assert_eq!(written(&mut commands), ["RESP"]);
    }

    #[test]
    fn echo_reply_repeats_message() {
        let (ctx, mut commands) = context();
        let handler = ResponseHandler::new(Reply::Echo);

        handler.handle_read(&ctx, "ABCD".to_owned());
        handler.handle_read(&ctx, "RES0".to_owned());
        assert_eq!(written(&mut commands), ["ABCD", "RES0"]);
    }

    #[test]
    fn capture_queues_and_forwards() {
        let (ctx, _commands) = context();
        let (tx, rx) = crossbeam_channel::unbounded();
        let handler = CaptureHandler::new(tx);

        assert_eq!(
            handler.handle_read(&ctx, "RES0".to_owned()),
            Flow::Forward("RES0".to_owned())
        );
        assert_eq!(rx.try_recv().unwrap(), "RES0");
    }

    #[test]
    fn registrar_tracks_active_channels() {
        let (ctx, _commands) = context();
        let registrar = ChannelRegistrar::new();
        let view = registrar.clone();

        registrar.transport_active(&ctx);
        assert_eq!(view.len(), 1);
        let channel = view.get(&ctx.peer_addr()).unwrap();
        assert_eq!(channel.local_addr(), ctx.local_addr());

        registrar.transport_inactive(&ctx);
        assert!(view.is_empty());
    }
}
