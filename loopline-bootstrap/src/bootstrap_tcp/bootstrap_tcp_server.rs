use super::*;
use loopline_executor::EventLoopGroup;
use tokio::net::TcpSocket;

/// Accepts TCP connections and drives one pipeline per accepted stream.
///
/// The listener runs on a loop of the `boss` group. Each accepted stream is pinned to the
/// next loop of the `workers` group, round-robin.
pub struct ServerBootstrap {
    bootstrap: Bootstrap,
    boss: EventLoopGroup,
    workers: EventLoopGroup,
}

impl ServerBootstrap {
    /// Creates a server bootstrap listening on `boss` and serving on `workers`.
    pub fn new(boss: EventLoopGroup, workers: EventLoopGroup) -> Self {
        Self {
            bootstrap: Bootstrap::new(),
            boss,
            workers,
        }
    }

    /// Sets the initializer that populates each accepted channel's pipeline.
    pub fn pipeline<F>(&mut self, initializer: F) -> &mut Self
    where
        F: Fn(&Pipeline) + Send + Sync + 'static,
    {
        self.bootstrap.pipeline(initializer);
        self
    }

    /// Sets the wire format. Defaults to [`Framing::default`].
    pub fn framing(&mut self, framing: Framing) -> &mut Self {
        self.bootstrap.framing(framing);
        self
    }

    /// Sets how many bytes each socket read reserves.
    pub fn read_buffer_size(&mut self, read_buffer_size: usize) -> &mut Self {
        self.bootstrap.read_buffer_size(read_buffer_size);
        self
    }

    /// Binds a listener with `SO_REUSEADDR` and starts accepting.
    ///
    /// Returns the bound address, which resolves port `0`. The listener stops when its
    /// boss loop shuts down. An invalid framing fails with `InvalidInput` before anything
    /// is bound.
    ///
    /// # Panics
    ///
    /// Panics if called from within an async runtime, since it blocks until the listener
    /// is up.
    pub fn bind<A: ToSocketAddrs>(&self, addr: A) -> Result<SocketAddr, Error> {
        self.bootstrap.framing.validate()?;
        let addr = resolve(addr)?;
        let boss = self.boss.next();
        let listening = boss.submit({
            let boss = boss.clone();
            let workers = self.workers.clone();
            let bootstrap = self.bootstrap.clone();
            move || listen(addr, boss, workers, bootstrap)
        })?;

        listening
            .blocking_recv()
            .map_err(|_| event_loop_gone(boss.name()))?
    }
}

fn listen(
    addr: SocketAddr,
    boss: EventLoop,
    workers: EventLoopGroup,
    bootstrap: Bootstrap,
) -> Result<SocketAddr, Error> {
    let socket = if addr.is_ipv4() {
        TcpSocket::new_v4()?
    } else {
        TcpSocket::new_v6()?
    };
    socket.set_reuseaddr(true)?;
    socket.bind(addr)?;
    let listener = socket.listen(1024)?;
    let local_addr = listener.local_addr()?;
    trace!("listening on {} from {}", local_addr, boss.name());

    let owner = boss.clone();
    boss.spawn_local(async move {
        loop {
            tokio::select! {
                _ = owner.closed() => {
                    trace!("listener exit loop");
                    break;
                }
                res = listener.accept() => {
                    match res {
                        Ok((stream, peer_addr)) => {
                            trace!("accepted {} on {}", peer_addr, local_addr);
                            if let Err(err) = dispatch(stream, &workers, &bootstrap) {
                                error!("failed to hand {} to a worker: {}", peer_addr, err);
                            }
                        }
                        Err(err) => {
                            warn!("listener accept error {}", err);
                            break;
                        }
                    }
                }
            }
        }
    });

    Ok(local_addr)
}

fn dispatch(
    stream: TcpStream,
    workers: &EventLoopGroup,
    bootstrap: &Bootstrap,
) -> Result<(), Error> {
    // re-registered with the worker's reactor on its own thread
    let stream = stream.into_std()?;
    let worker = workers.next();
    let event_loop = worker.clone();
    let bootstrap = bootstrap.clone();

    worker.execute(move || {
        match TcpStream::from_std(stream).and_then(|stream| serve(stream, &event_loop, &bootstrap))
        {
            Ok(channel) => trace!("{:?} is being served", channel),
            Err(err) => error!("failed to serve accepted stream: {}", err),
        }
    })
}
