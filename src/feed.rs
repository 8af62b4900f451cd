//! In-process stand-in for the out-of-scope `terminal_feed` SSE endpoint
//! (spec §6): every tracing event is mirrored onto a broadcast channel that
//! a future HTTP layer could forward to connected clients over SSE.

use std::fmt;

use tokio::sync::broadcast;
use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::Context;
use tracing_subscriber::Layer;

const FEED_CAPACITY: usize = 256;

/// One formatted log line as it would appear on the feed.
#[derive(Debug, Clone)]
pub struct FeedEvent {
    pub level: String,
    pub target: String,
    pub message: String,
}

/// A `tracing_subscriber::Layer` that rebroadcasts every event it sees.
/// Cloning shares the same underlying channel, so the CLI driver keeps one
/// instance alive for the process lifetime and hands out subscriptions.
#[derive(Clone)]
pub struct TerminalFeed {
    sender: broadcast::Sender<FeedEvent>,
}

impl TerminalFeed {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(FEED_CAPACITY);
        Self { sender }
    }

    /// A lagging subscriber only loses the oldest buffered events, it never
    /// blocks `on_event` below.
    pub fn subscribe(&self) -> broadcast::Receiver<FeedEvent> {
        self.sender.subscribe()
    }
}

impl Default for TerminalFeed {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Default)]
struct MessageVisitor(String);

impl Visit for MessageVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.0 = format!("{value:?}");
        }
    }
}

impl<S: Subscriber> Layer<S> for TerminalFeed {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);
        // No subscribers yet is not an error, the feed is best-effort.
        let _ = self.sender.send(FeedEvent {
            level: event.metadata().level().to_string(),
            target: event.metadata().target().to_string(),
            message: visitor.0,
        });
    }
}
