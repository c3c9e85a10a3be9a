use super::*;
use loopline_executor::EventLoopGroup;
use tokio::sync::oneshot;

/// Connects to TCP servers and drives one pipeline per connection.
///
/// Every connection is pinned to the next loop of the group, round-robin.
pub struct ClientBootstrap {
    bootstrap: Bootstrap,
    group: EventLoopGroup,
}

impl ClientBootstrap {
    /// Creates a client bootstrap connecting from loops of `group`.
    pub fn new(group: EventLoopGroup) -> Self {
        Self {
            bootstrap: Bootstrap::new(),
            group,
        }
    }

    /// Sets the initializer that populates each connected channel's pipeline.
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

    /// Connects to `addr` and returns the established channel.
    ///
    /// The channel's `transport_active` event is fired on its loop before any write made
    /// through the returned handle is processed. An invalid framing fails with
    /// `InvalidInput` before connecting.
    ///
    /// # Panics
    ///
    /// Panics if called from within an async runtime, since it blocks until the
    /// connection is established.
    pub fn connect<A: ToSocketAddrs>(&self, addr: A) -> Result<Channel, Error> {
        self.bootstrap.framing.validate()?;
        let addr = resolve(addr)?;
        let event_loop = self.group.next();
        let (tx, rx) = oneshot::channel();

        event_loop.execute({
            let event_loop = event_loop.clone();
            let bootstrap = self.bootstrap.clone();
            move || {
                let owner = event_loop.clone();
                owner.spawn_local(async move {
                    let res = tokio::select! {
                        res = TcpStream::connect(addr) => {
                            res.and_then(|stream| serve(stream, &event_loop, &bootstrap))
                        }
                        _ = event_loop.closed() => Err(event_loop_gone(event_loop.name())),
                    };
                    let _ = tx.send(res);
                });
            }
        })?;

        rx.blocking_recv()
            .map_err(|_| event_loop_gone(event_loop.name()))?
    }
}
