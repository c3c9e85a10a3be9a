use std::{
    io::{Error, ErrorKind, Result},
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
};

use crate::EventLoop;

/// A fixed pool of [`EventLoop`]s.
///
/// [`next`](Self::next) hands the loops out round-robin. Channels registered on a loop stay
/// there for their whole lifetime, so a group of `n` loops services any number of channels
/// with `n` threads.
#[derive(Clone, Debug)]
pub struct EventLoopGroup {
    inner: Arc<GroupInner>,
}

#[derive(Debug)]
struct GroupInner {
    loops: Vec<EventLoop>,
    next: AtomicUsize,
}

impl EventLoopGroup {
    /// Starts `threads` event loops named `{name}-0`, `{name}-1`, ...
    pub fn new(name: &str, threads: usize) -> Result<Self> {
        if threads == 0 {
            return Err(Error::new(
                ErrorKind::InvalidInput,
                "event loop group needs at least one thread",
            ));
        }

        let mut loops = Vec::with_capacity(threads);
        for index in 0..threads {
            match EventLoop::new(&format!("{name}-{index}")) {
                Ok(event_loop) => loops.push(event_loop),
                Err(err) => {
                    for event_loop in &loops {
                        event_loop.shutdown_gracefully();
                    }
                    return Err(err);
                }
            }
        }

        Ok(Self {
            inner: Arc::new(GroupInner {
                loops,
                next: AtomicUsize::new(0),
            }),
        })
    }

    /// Returns the next loop in round-robin order.
    pub fn next(&self) -> EventLoop {
        let index = self.inner.next.fetch_add(1, Ordering::Relaxed) % self.inner.loops.len();
        self.inner.loops[index].clone()
    }

    /// Returns the number of loops in this group.
    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> usize {
        self.inner.loops.len()
    }

    /// Iterates over the loops of this group.
    pub fn iter(&self) -> impl Iterator<Item = &EventLoop> {
        self.inner.loops.iter()
    }

    /// Signals every loop to shut down, then waits for all of them.
    pub fn shutdown_gracefully(&self) {
        for event_loop in &self.inner.loops {
            event_loop.signal_shutdown();
        }
        for event_loop in &self.inner.loops {
            event_loop.shutdown_gracefully();
        }
    }
}

impl Drop for GroupInner {
    fn drop(&mut self) {
        for event_loop in &self.loops {
            event_loop.signal_shutdown();
        }
    }
}
