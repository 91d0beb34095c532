//! Raw trace of the conversation with the device.
//!
//! The protocol has no error codes, so when the two sides fall out of step
//! the operator diagnoses it by reading exactly what was sent and received.

/// A single traced event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraceEvent<'a> {
    /// A command line written to the device.
    Sent(&'a str),
    /// A text line read from the device.
    Received(&'a str),
    /// Session lifecycle notices.
    Info(&'a str),
}

/// Observation sink for every sent command and received line.
pub trait Observer: Send + Sync {
    fn observe(&self, event: TraceEvent<'_>);
}

impl<F> Observer for F
where
    F: Fn(TraceEvent<'_>) + Send + Sync,
{
    fn observe(&self, event: TraceEvent<'_>) {
        self(event);
    }
}

/// Forwards the trace to the `log` facade.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogObserver;

impl Observer for LogObserver {
    fn observe(&self, event: TraceEvent<'_>) {
        match event {
            TraceEvent::Sent(command) => info!("> {command}"),
            TraceEvent::Received(line) => info!("< {line}"),
            TraceEvent::Info(notice) => info!("{notice}"),
        }
    }
}
