//! # Pipeline - Ordered Handlers of a Channel
//!
//! A pipeline is the ordered chain of [`Handler`]s attached to one channel:
//!
//! - **Inbound** (`transport_active`, `transport_inactive`, `handle_read`): first → last
//! - **Outbound** (`handle_write`): last → first
//!
//! ## Event Loop Affinity
//!
//! By default every handler runs inline on the channel's event loop. A handler added with
//! [`Pipeline::add_back_on`] runs on the given loop instead:
//!
//! ```text
//!   channel loop                      dedicated loop
//!   ────────────                      ──────────────
//!   handler 0 ──┐
//!               │ submit(callback) ─────▶ handler 1
//!   (free to    │                            │
//!    run other  │ ◀──── Flow ────────────────┘
//!    tasks)     │
//!   handler 2 ◀─┘
//! ```
//!
//! The traversal waits for the offloaded handler's [`Flow`] before visiting the next handler,
//! so per-event ordering is preserved. Waiting suspends only this event: the channel's loop
//! keeps serving other tasks, including reads of the same channel.
//!
//! ## Dynamic Modification
//!
//! Handlers can be appended while events are in flight. An event reads the chain one step at
//! a time, so it visits a handler appended ahead of its current position.
//!
//! ## Example
//!
//! ```rust,no_run
//! use loopline::{Pipeline, handlers::{DelayHandler, LoggingHandler}};
//! use loopline_executor::EventLoop;
//! use std::time::Duration;
//!
//! let blocking = EventLoop::new("blocking").unwrap();
//!
//! let pipeline = Pipeline::new();
//! pipeline
//!     .add_back(LoggingHandler::new("Client", true))
//!     .add_back_on(&blocking, DelayHandler::new(Duration::from_secs(3)));
//! assert_eq!(pipeline.names(), ["LoggingHandler", "DelayHandler"]);
//! ```
//!
//! A `Pipeline` is not thread-safe. It lives on its channel's event loop and is shared there
//! through `Rc`.

use std::{cell::RefCell, fmt, sync::Arc};

use log::warn;
use loopline_executor::EventLoop;

use crate::{
    channel::Channel,
    handler::{Context, Flow, Handler},
};

type Event<T> = fn(&dyn Handler, &Context, T) -> Flow<T>;

/// One handler of a pipeline together with its optional event loop override.
#[derive(Clone)]
pub struct PipelineEntry {
    name: String,
    handler: Arc<dyn Handler>,
    event_loop: Option<EventLoop>,
}

impl PipelineEntry {
    /// Wraps `handler`. With `Some(event_loop)` the handler's callbacks run on that loop.
    pub fn new(handler: impl Handler, event_loop: Option<EventLoop>) -> Self {
        Self {
            name: handler.name().to_owned(),
            handler: Arc::new(handler),
            event_loop,
        }
    }

    /// Name of the wrapped handler.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The event loop override, if any.
    pub fn event_loop(&self) -> Option<&EventLoop> {
        self.event_loop.as_ref()
    }
}

impl fmt::Debug for PipelineEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineEntry")
            .field("name", &self.name)
            .field("event_loop", &self.event_loop.as_ref().map(EventLoop::name))
            .finish()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Direction {
    Inbound,
    Outbound,
}

/// An ordered chain of handlers.
#[derive(Default)]
pub struct Pipeline {
    entries: RefCell<Vec<PipelineEntry>>,
}

impl Pipeline {
    /// Creates an empty pipeline.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a handler that runs on the channel's event loop.
    pub fn add_back(&self, handler: impl Handler) -> &Self {
        self.add_entry(PipelineEntry::new(handler, None))
    }

    /// Appends a handler whose callbacks run on `event_loop`.
    pub fn add_back_on(&self, event_loop: &EventLoop, handler: impl Handler) -> &Self {
        self.add_entry(PipelineEntry::new(handler, Some(event_loop.clone())))
    }

    /// Appends a prepared entry.
    pub fn add_entry(&self, entry: PipelineEntry) -> &Self {
        self.entries.borrow_mut().push(entry);
        self
    }

    /// Number of handlers.
    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    /// Returns `true` when no handler was added yet.
    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    /// Handler names in registration order.
    pub fn names(&self) -> Vec<String> {
        self.entries
            .borrow()
            .iter()
            .map(|entry| entry.name.clone())
            .collect()
    }

    /// Fires `transport_active` front-to-back.
    pub async fn transport_active(&self, channel: &Channel) {
        self.fire(channel, Direction::Inbound, (), transport_active_event)
            .await;
    }

    /// Fires `transport_inactive` front-to-back.
    pub async fn transport_inactive(&self, channel: &Channel) {
        self.fire(channel, Direction::Inbound, (), transport_inactive_event)
            .await;
    }

    /// Passes a received message front-to-back.
    ///
    /// Returns the message if no handler stopped it.
    pub async fn handle_read(&self, channel: &Channel, msg: String) -> Option<String> {
        let unhandled = self
            .fire(channel, Direction::Inbound, msg, handle_read_event)
            .await;
        if let Some(msg) = &unhandled {
            warn!("handle_read reached end of pipeline: {}", msg);
        }
        unhandled
    }

    /// Passes an outgoing message back-to-front.
    ///
    /// Returns the message to put on the wire, or `None` if a handler stopped it.
    pub async fn handle_write(&self, channel: &Channel, msg: String) -> Option<String> {
        self.fire(channel, Direction::Outbound, msg, handle_write_event)
            .await
    }

    fn entry(&self, index: usize) -> Option<PipelineEntry> {
        self.entries.borrow().get(index).cloned()
    }

    async fn fire<T: Send + 'static>(
        &self,
        channel: &Channel,
        direction: Direction,
        mut msg: T,
        event: Event<T>,
    ) -> Option<T> {
        // the chain is re-read at every step so appended handlers are picked up
        let mut cursor = match direction {
            Direction::Inbound => 0,
            Direction::Outbound => self.len(),
        };

        loop {
            let entry = match direction {
                Direction::Inbound => {
                    cursor += 1;
                    self.entry(cursor - 1)
                }
                Direction::Outbound if cursor > 0 => {
                    cursor -= 1;
                    self.entry(cursor)
                }
                Direction::Outbound => None,
            };
            let Some(entry) = entry else {
                return Some(msg);
            };

            match invoke(entry, channel, msg, event).await {
                Flow::Forward(next) => msg = next,
                Flow::Stop => return None,
            }
        }
    }
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.entries.borrow().iter()).finish()
    }
}

async fn invoke<T: Send + 'static>(
    entry: PipelineEntry,
    channel: &Channel,
    msg: T,
    event: Event<T>,
) -> Flow<T> {
    let PipelineEntry {
        name,
        handler,
        event_loop,
    } = entry;
    let ctx = Context::new(&name, channel.clone());

    match event_loop {
        Some(event_loop) if !event_loop.in_event_loop() => {
            match event_loop.submit(move || event(handler.as_ref(), &ctx, msg)) {
                Ok(decision) => match decision.await {
                    Ok(flow) => flow,
                    Err(_) => {
                        warn!(
                            "{} dropped an event: event loop {} shut down",
                            name,
                            event_loop.name()
                        );
                        Flow::Stop
                    }
                },
                Err(err) => {
                    warn!("{} dropped an event: {}", name, err);
                    Flow::Stop
                }
            }
        }
        _ => event(handler.as_ref(), &ctx, msg),
    }
}

fn transport_active_event(handler: &dyn Handler, ctx: &Context, _: ()) -> Flow<()> {
    handler.transport_active(ctx)
}

fn transport_inactive_event(handler: &dyn Handler, ctx: &Context, _: ()) -> Flow<()> {
    handler.transport_inactive(ctx)
}

fn handle_read_event(handler: &dyn Handler, ctx: &Context, msg: String) -> Flow<String> {
    handler.handle_read(ctx, msg)
}

fn handle_write_event(handler: &dyn Handler, ctx: &Context, msg: String) -> Flow<String> {
    handler.handle_write(ctx, msg)
}
