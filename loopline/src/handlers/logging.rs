use crossbeam_channel::Sender;
use log::info;
use std::fmt;

use crate::handler::{Context, Flow, Handler};

/// A duplex handler that logs every event it observes as `"<host> : <event>"`.
///
/// Lines go to the `log` facade at `info` level and, when configured, to an append-only
/// sink. A full or disconnected sink is ignored.
///
/// With `end_of_pipeline` set, lifecycle and read events stop here after being logged.
/// Writes are always forwarded: the logger is usually the last handler, which makes it the
/// first one every outbound message passes through.
pub struct LoggingHandler {
    host: String,
    end_of_pipeline: bool,
    sink: Option<Sender<String>>,
}

impl LoggingHandler {
    /// Creates a logger labelled `host`.
    pub fn new(host: impl Into<String>, end_of_pipeline: bool) -> Self {
        Self {
            host: host.into(),
            end_of_pipeline,
            sink: None,
        }
    }

    /// Also appends every logged line to `sink`.
    pub fn with_sink(mut self, sink: Sender<String>) -> Self {
        self.sink = Some(sink);
        self
    }

    fn record(&self, event: fmt::Arguments<'_>) {
        let line = format!("{} : {}", self.host, event);
        info!("{}", line);
        if let Some(sink) = &self.sink {
            let _ = sink.send(line);
        }
    }

    fn pass<T>(&self, value: T) -> Flow<T> {
        if self.end_of_pipeline {
            Flow::Stop
        } else {
            Flow::Forward(value)
        }
    }
}

impl Handler for LoggingHandler {
    fn name(&self) -> &str {
        "LoggingHandler"
    }

    fn transport_active(&self, _ctx: &Context) -> Flow<()> {
        self.record(format_args!("active"));
        self.pass(())
    }

    fn transport_inactive(&self, _ctx: &Context) -> Flow<()> {
        self.record(format_args!("inactive"));
        self.pass(())
    }

    fn handle_read(&self, _ctx: &Context, msg: String) -> Flow<String> {
        self.record(format_args!("read {}", msg));
        self.pass(msg)
    }

    fn handle_write(&self, _ctx: &Context, msg: String) -> Flow<String> {
        self.record(format_args!("write {}", msg));
        Flow::Forward(msg)
    }
}
