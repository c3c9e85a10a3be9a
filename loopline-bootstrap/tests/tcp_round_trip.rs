use std::{
    io::ErrorKind,
    net::TcpListener,
    thread,
    time::{Duration, Instant},
};

use crossbeam_channel::{Receiver, Sender};
use loopline::{handlers::LoggingHandler, Context, Flow, Handler};
use loopline_bootstrap::{ClientBootstrap, ServerBootstrap};
use loopline_codec::Framing;
use loopline_executor::EventLoopGroup;

const TIMEOUT: Duration = Duration::from_secs(5);

struct Echo;

impl Handler for Echo {
    fn name(&self) -> &str {
        "Echo"
    }

    fn handle_read(&self, ctx: &Context, msg: String) -> Flow<String> {
        let _ = ctx.channel().write(msg.clone());
        Flow::Forward(msg)
    }
}

struct Capture(Sender<String>);

impl Handler for Capture {
    fn name(&self) -> &str {
        "Capture"
    }

    fn handle_read(&self, _ctx: &Context, msg: String) -> Flow<String> {
        let _ = self.0.send(msg.clone());
        Flow::Forward(msg)
    }
}

/// Stops writes whose text starts with `prefix`.
struct DropWrites {
    prefix: &'static str,
}

impl Handler for DropWrites {
    fn name(&self) -> &str {
        "DropWrites"
    }

    fn handle_write(&self, _ctx: &Context, msg: String) -> Flow<String> {
        if msg.starts_with(self.prefix) {
            Flow::Stop
        } else {
            Flow::Forward(msg)
        }
    }
}

struct Explode;

impl Handler for Explode {
    fn name(&self) -> &str {
        "Explode"
    }

    fn handle_read(&self, _ctx: &Context, msg: String) -> Flow<String> {
        panic!("cannot handle {}", msg);
    }
}

fn shuts_down_within(groups: Vec<EventLoopGroup>, timeout: Duration) -> bool {
    let (tx, rx) = crossbeam_channel::bounded(1);
    thread::spawn(move || {
        for group in groups {
            group.shutdown_gracefully();
        }
        let _ = tx.send(());
    });
    rx.recv_timeout(timeout).is_ok()
}

struct Rig {
    server_groups: Vec<EventLoopGroup>,
    client: ClientBootstrap,
    client_group: EventLoopGroup,
    addr: std::net::SocketAddr,
    received: Receiver<String>,
    server_log: Receiver<String>,
}

impl Rig {
    fn start(framing: Framing) -> anyhow::Result<Self> {
        let _ = env_logger::builder().is_test(true).try_init();

        let boss = EventLoopGroup::new("boss", 1)?;
        let workers = EventLoopGroup::new("worker", 2)?;
        let (log_tx, server_log) = crossbeam_channel::unbounded();
        let mut server = ServerBootstrap::new(boss.clone(), workers.clone());
        server.framing(framing).pipeline(move |pipeline| {
            pipeline
                .add_back(Echo)
                .add_back(LoggingHandler::new("Server", true).with_sink(log_tx.clone()));
        });
        let addr = server.bind("127.0.0.1:0")?;

        let client_group = EventLoopGroup::new("client", 1)?;
        let (tx, received) = crossbeam_channel::unbounded();
        let mut client = ClientBootstrap::new(client_group.clone());
        client.framing(framing).pipeline(move |pipeline| {
            pipeline
                .add_back(Capture(tx.clone()))
                .add_back(LoggingHandler::new("Client", true));
        });

        Ok(Self {
            server_groups: vec![boss, workers],
            client,
            client_group,
            addr,
            received,
            server_log,
        })
    }

    fn shutdown(self) {
        self.client_group.shutdown_gracefully();
        for group in self.server_groups {
            group.shutdown_gracefully();
        }
    }
}

#[test]
fn echo_round_trip_preserves_text() -> anyhow::Result<()> {
    let rig = Rig::start(Framing::default())?;
    let channel = rig.client.connect(rig.addr)?;

    let long = "ABCD".repeat(1500);
    let sent = ["ABCD", "héllo wörld", "응답", long.as_str()];
    for msg in sent {
        channel.write(msg)?;
    }

    for msg in sent {
        assert_eq!(rig.received.recv_timeout(TIMEOUT)?, msg);
    }

    rig.shutdown();
    Ok(())
}

#[test]
fn fixed_length_framing_regroups_writes() -> anyhow::Result<()> {
    let rig = Rig::start(Framing::FixedLength { frame_length: 4 })?;
    let channel = rig.client.connect(rig.addr)?;

    channel.write("AB")?;
    channel.write("CDRE")?;
    channel.write("S0")?;

    assert_eq!(rig.received.recv_timeout(TIMEOUT)?, "ABCD");
    assert_eq!(rig.received.recv_timeout(TIMEOUT)?, "RES0");

    rig.shutdown();
    Ok(())
}

#[test]
fn closed_channel_rejects_writes() -> anyhow::Result<()> {
    let rig = Rig::start(Framing::default())?;
    let channel = rig.client.connect(rig.addr)?;
    assert_eq!(rig.server_log.recv_timeout(TIMEOUT)?, "Server : active");

    channel.close()?;
    assert_eq!(rig.server_log.recv_timeout(TIMEOUT)?, "Server : inactive");

    let deadline = Instant::now() + TIMEOUT;
    while channel.is_active() && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(10));
    }
    let err = channel.write("ABCD").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotConnected);

    rig.shutdown();
    Ok(())
}

#[test]
fn connect_to_closed_port_fails() -> anyhow::Result<()> {
    let rig = Rig::start(Framing::default())?;
    let addr = TcpListener::bind("127.0.0.1:0")?.local_addr()?;

    assert!(rig.client.connect(addr).is_err());

    rig.shutdown();
    Ok(())
}

#[test]
fn shut_down_group_refuses_connect() -> anyhow::Result<()> {
    let rig = Rig::start(Framing::default())?;
    rig.client_group.shutdown_gracefully();

    let err = rig.client.connect(rig.addr).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::BrokenPipe);

    rig.shutdown();
    Ok(())
}

#[test]
fn stopped_write_never_reaches_peer() -> anyhow::Result<()> {
    let rig = Rig::start(Framing::default())?;
    let channel = rig.client.connect(rig.addr)?;
    channel.add_back(DropWrites { prefix: "secret" })?;

    channel.write("secret handshake")?;
    channel.write("ABCD")?;

    assert_eq!(rig.received.recv_timeout(TIMEOUT)?, "ABCD");
    assert_eq!(rig.server_log.recv_timeout(TIMEOUT)?, "Server : active");
    assert_eq!(rig.server_log.recv_timeout(TIMEOUT)?, "Server : read ABCD");

    rig.shutdown();
    Ok(())
}

#[test]
fn invalid_framing_is_rejected_before_binding() -> anyhow::Result<()> {
    let _ = env_logger::builder().is_test(true).try_init();
    let framing = Framing::FixedLength { frame_length: 0 };

    let boss = EventLoopGroup::new("boss", 1)?;
    let workers = EventLoopGroup::new("worker", 1)?;
    let mut server = ServerBootstrap::new(boss.clone(), workers.clone());
    server.framing(framing);
    let err = server.bind("127.0.0.1:0").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidInput);

    let rig = Rig::start(Framing::default())?;
    let client_group = EventLoopGroup::new("client", 1)?;
    let mut client = ClientBootstrap::new(client_group.clone());
    client.framing(framing);
    let err = client.connect(rig.addr).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidInput);

    assert!(shuts_down_within(
        vec![boss, workers, client_group],
        TIMEOUT
    ));
    rig.shutdown();
    Ok(())
}

#[test]
fn panicking_handler_does_not_block_shutdown() -> anyhow::Result<()> {
    let _ = env_logger::builder().is_test(true).try_init();

    let boss = EventLoopGroup::new("boss", 1)?;
    let workers = EventLoopGroup::new("worker", 1)?;
    let mut server = ServerBootstrap::new(boss.clone(), workers.clone());
    server.pipeline(|pipeline| {
        pipeline.add_back(Explode);
    });
    let addr = server.bind("127.0.0.1:0")?;

    let client_group = EventLoopGroup::new("client", 1)?;
    let (log_tx, client_log) = crossbeam_channel::unbounded();
    let mut client = ClientBootstrap::new(client_group.clone());
    client.pipeline(move |pipeline| {
        pipeline.add_back(LoggingHandler::new("Client", true).with_sink(log_tx.clone()));
    });
    let channel = client.connect(addr)?;
    channel.write("ABCD")?;

    // the server task dies with its stream, so the client sees the peer go away
    let deadline = Instant::now() + TIMEOUT;
    let mut lines = vec![];
    while Instant::now() < deadline {
        match client_log.recv_timeout(Duration::from_millis(100)) {
            Ok(line) if line == "Client : inactive" => {
                lines.push(line);
                break;
            }
            Ok(line) => lines.push(line),
            Err(_) => {}
        }
    }
    assert_eq!(lines.last().map(String::as_str), Some("Client : inactive"));

    assert!(shuts_down_within(
        vec![client_group, workers, boss],
        Duration::from_secs(10)
    ));
    Ok(())
}
