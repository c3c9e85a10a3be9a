//! Tokio-based event loop implementation
//!
//! Every [`EventLoop`] is a named thread that runs a tokio `LocalSet`. Work reaches the
//! thread in two shapes: plain jobs ([`EventLoop::execute`], [`EventLoop::submit`]) that run
//! to completion one after another, and local tasks ([`EventLoop::spawn_local`]) that are
//! interleaved with those jobs by the runtime.

use log::{trace, warn};
use scoped_tls::scoped_thread_local;
use std::{
    fmt,
    future::Future,
    io::{Error, ErrorKind, Result},
    panic::{self, AssertUnwindSafe},
    sync::{Arc, Mutex, Weak},
    thread::{self, JoinHandle},
};
use tokio::{
    sync::{mpsc, oneshot, watch},
    task::LocalSet,
};
use wg::AsyncWaitGroup;

scoped_thread_local!(static CURRENT: Weak<Inner>);

type Job = Box<dyn FnOnce() + Send + 'static>;

/// A handle to a single-threaded event loop.
///
/// Handles are cheap to clone and can be sent to any thread. All clones refer to the same
/// loop thread.
#[derive(Clone)]
pub struct EventLoop {
    inner: Arc<Inner>,
}

struct Inner {
    name: String,
    jobs: mpsc::UnboundedSender<Job>,
    close_tx: watch::Sender<bool>,
    wg: AsyncWaitGroup,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl EventLoop {
    /// Starts a new event loop thread with the given name.
    pub fn new(name: &str) -> Result<Self> {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;

        let (jobs_tx, jobs_rx) = mpsc::unbounded_channel::<Job>();
        let (close_tx, close_rx) = watch::channel(false);
        let wg = AsyncWaitGroup::new();

        let inner = Arc::new(Inner {
            name: name.to_owned(),
            jobs: jobs_tx,
            close_tx,
            wg: wg.clone(),
            thread: Mutex::new(None),
        });

        let current = Arc::downgrade(&inner);
        let thread_name = name.to_owned();
        let handle = thread::Builder::new()
            .name(thread_name.clone())
            .spawn(move || {
                let local_set = LocalSet::new();
                CURRENT.set(&current, || {
                    rt.block_on(local_set.run_until(run_jobs(jobs_rx, close_rx, wg)))
                });
                trace!("event loop {} exited", thread_name);
            })?;

        if let Ok(mut thread) = inner.thread.lock() {
            *thread = Some(handle);
        }

        Ok(Self { inner })
    }

    /// Returns the name of this loop, which is also the name of its thread.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Returns the loop that owns the calling thread, if any.
    pub fn current() -> Option<Self> {
        if CURRENT.is_set() {
            CURRENT.with(|current| current.upgrade().map(|inner| Self { inner }))
        } else {
            None
        }
    }

    /// Returns `true` when called from this loop's thread.
    pub fn in_event_loop(&self) -> bool {
        CURRENT.is_set() && CURRENT.with(|current| current.as_ptr() == Arc::as_ptr(&self.inner))
    }

    /// Returns `true` once [`shutdown_gracefully`](Self::shutdown_gracefully) was called.
    pub fn is_shutdown(&self) -> bool {
        *self.inner.close_tx.borrow()
    }

    /// Queues a job on this loop.
    ///
    /// The job runs on the loop thread after every job queued before it. While it runs,
    /// nothing else on this loop makes progress.
    pub fn execute<F>(&self, job: F) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        if self.is_shutdown() {
            return Err(self.shutdown_error());
        }
        self.inner
            .jobs
            .send(Box::new(job))
            .map_err(|_| self.shutdown_error())
    }

    /// Queues a job on this loop and returns a receiver for its result.
    ///
    /// The receiver resolves to an error if the loop shuts down before the job ran.
    pub fn submit<F, T>(&self, job: F) -> Result<oneshot::Receiver<T>>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        self.execute(move || {
            let _ = tx.send(job());
        })?;
        Ok(rx)
    }

    /// Spawns a local task on this loop.
    ///
    /// Shutdown waits for every task spawned this way, so long-running tasks should race
    /// their work against [`closed`](Self::closed).
    ///
    /// # Panics
    ///
    /// Panics if not called from this loop's thread.
    pub fn spawn_local<F>(&self, future: F)
    where
        F: Future<Output = ()> + 'static,
    {
        if !self.in_event_loop() {
            panic!(
                "`spawn_local()` on event loop {} must be called from its own thread",
                self.inner.name
            );
        }

        // released on drop, so a panicking task still lets shutdown finish
        let worker = TaskGuard(self.inner.wg.add(1));
        tokio::task::spawn_local(async move {
            let _worker = worker;
            future.await;
        });
    }

    /// Resolves once this loop starts shutting down.
    pub async fn closed(&self) {
        let mut close_rx = self.inner.close_tx.subscribe();
        let _ = close_rx.wait_for(|closed| *closed).await;
    }

    /// Signals shutdown and waits for the loop thread to finish.
    ///
    /// Jobs still queued are dropped. When called from the loop's own thread this only
    /// signals shutdown.
    pub fn shutdown_gracefully(&self) {
        self.signal_shutdown();
        if self.in_event_loop() {
            return;
        }

        let handle = match self.inner.thread.lock() {
            Ok(mut thread) => thread.take(),
            Err(_) => None,
        };
        if let Some(handle) = handle {
            if handle.join().is_err() {
                warn!("event loop {} panicked", self.inner.name);
            }
        }
    }

    pub(crate) fn signal_shutdown(&self) {
        self.inner.close_tx.send_replace(true);
    }

    fn shutdown_error(&self) -> Error {
        Error::new(
            ErrorKind::BrokenPipe,
            format!("event loop {} is shut down", self.inner.name),
        )
    }
}

impl fmt::Debug for EventLoop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventLoop")
            .field("name", &self.inner.name)
            .field("shutdown", &self.is_shutdown())
            .finish()
    }
}

struct TaskGuard(AsyncWaitGroup);

impl Drop for TaskGuard {
    fn drop(&mut self) {
        self.0.done();
    }
}

async fn run_jobs(
    mut jobs: mpsc::UnboundedReceiver<Job>,
    mut close_rx: watch::Receiver<bool>,
    wg: AsyncWaitGroup,
) {
    loop {
        tokio::select! {
            biased;
            _ = close_rx.wait_for(|closed| *closed) => break,
            job = jobs.recv() => match job {
                Some(job) => {
                    if panic::catch_unwind(AssertUnwindSafe(job)).is_err() {
                        warn!("a job panicked on event loop {:?}", thread::current().name());
                    }
                }
                None => break,
            },
        }
    }

    // pending jobs are dropped so their submitters observe the shutdown
    drop(jobs);
    wg.wait().await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc as std_mpsc;
    use std::time::{Duration, Instant};

    #[test]
    fn submit_runs_on_named_thread() {
        let event_loop = EventLoop::new("submit-test").unwrap();
        let rx = event_loop
            .submit(|| thread::current().name().map(str::to_owned))
            .unwrap();
        assert_eq!(rx.blocking_recv().unwrap().as_deref(), Some("submit-test"));
        event_loop.shutdown_gracefully();
    }

    #[test]
    fn in_event_loop_only_on_own_thread() {
        let event_loop = EventLoop::new("affinity-test").unwrap();
        assert!(!event_loop.in_event_loop());
        assert!(EventLoop::current().is_none());

        let probe = event_loop.clone();
        let rx = event_loop
            .submit(move || {
                let current = EventLoop::current().map(|current| current.name().to_owned());
                (probe.in_event_loop(), current)
            })
            .unwrap();
        let (inside, current) = rx.blocking_recv().unwrap();
        assert!(inside);
        assert_eq!(current.as_deref(), Some("affinity-test"));
        event_loop.shutdown_gracefully();
    }

    #[test]
    fn blocking_job_delays_later_jobs() {
        let event_loop = EventLoop::new("serial-test").unwrap();
        let started = Instant::now();
        event_loop
            .execute(|| thread::sleep(Duration::from_millis(200)))
            .unwrap();
        let rx = event_loop.submit(Instant::now).unwrap();
        let ran_at = rx.blocking_recv().unwrap();
        assert!(ran_at.duration_since(started) >= Duration::from_millis(200));
        event_loop.shutdown_gracefully();
    }

    #[test]
    fn spawned_tasks_observe_shutdown() {
        let _ = env_logger::builder().is_test(true).try_init();

        let event_loop = EventLoop::new("spawn-test").unwrap();
        let (tx, rx) = std_mpsc::channel();
        let owner = event_loop.clone();
        event_loop
            .execute(move || {
                let task_loop = owner.clone();
                owner.spawn_local(async move {
                    task_loop.closed().await;
                    let _ = tx.send("closed");
                });
            })
            .unwrap();

        event_loop.shutdown_gracefully();
        assert_eq!(rx.recv_timeout(Duration::from_secs(1)), Ok("closed"));
    }

    fn shuts_down_within(event_loop: EventLoop, timeout: Duration) -> bool {
        let (tx, rx) = std_mpsc::channel();
        thread::spawn(move || {
            event_loop.shutdown_gracefully();
            let _ = tx.send(());
        });
        rx.recv_timeout(timeout).is_ok()
    }

    #[test]
    fn panicking_task_does_not_block_shutdown() {
        let _ = env_logger::builder().is_test(true).try_init();

        let event_loop = EventLoop::new("panic-task-test").unwrap();
        let owner = event_loop.clone();
        let spawned = event_loop
            .submit(move || {
                owner.spawn_local(async {
                    tokio::task::yield_now().await;
                    panic!("task failure");
                });
            })
            .unwrap();
        spawned.blocking_recv().unwrap();

        // the panicking task has had its chance to run once this job is served
        thread::sleep(Duration::from_millis(50));
        event_loop.submit(|| ()).unwrap().blocking_recv().unwrap();

        assert!(shuts_down_within(event_loop, Duration::from_secs(5)));
    }

    #[test]
    fn panicking_job_keeps_loop_serving() {
        let _ = env_logger::builder().is_test(true).try_init();

        let event_loop = EventLoop::new("panic-job-test").unwrap();
        let failed = event_loop.submit(|| -> u32 { panic!("job failure") }).unwrap();
        assert!(failed.blocking_recv().is_err());

        let rx = event_loop.submit(|| 7).unwrap();
        assert_eq!(rx.blocking_recv().unwrap(), 7);
        assert!(shuts_down_within(event_loop, Duration::from_secs(5)));
    }

    #[test]
    fn execute_fails_after_shutdown() {
        let event_loop = EventLoop::new("closed-test").unwrap();
        event_loop.shutdown_gracefully();
        assert!(event_loop.is_shutdown());
        let err = event_loop.execute(|| {}).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BrokenPipe);
    }
}
