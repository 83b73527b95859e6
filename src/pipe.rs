//! The message pipe between the link layer and its application.
//!
//! The session engine pulls outgoing payloads from the pipe at the start of
//! each fresh transmission and pushes incoming payloads back up once they
//! are durably accepted (when a newer sequence number supersedes them).

use std::sync::Arc;

use crossbeam_queue::ArrayQueue;
use tracing::trace;

use crate::types::Payload;

type SourceFn = Box<dyn FnMut() -> Option<Payload> + Send>;
type SinkFn = Box<dyn FnMut(Payload) + Send>;

/// Producer of outgoing payloads and sink for incoming ones.
pub struct MessagePipe {
    source: SourceFn,
    sink: SinkFn,
}

impl MessagePipe {
    /// A pipe that never offers messages and drops everything received.
    pub fn idle() -> Self {
        Self {
            source: Box::new(|| None),
            sink: Box::new(|_| {}),
        }
    }

    pub fn new(
        source: impl FnMut() -> Option<Payload> + Send + 'static,
        sink: impl FnMut(Payload) + Send + 'static,
    ) -> Self {
        Self {
            source: Box::new(source),
            sink: Box::new(sink),
        }
    }

    /// A pipe backed by bounded queues: `outbound` feeds transmissions,
    /// `inbound` collects deliveries (overwriting the oldest entry when
    /// full).
    pub fn queued(outbound: Arc<ArrayQueue<Payload>>, inbound: Arc<ArrayQueue<Payload>>) -> Self {
        Self::new(
            move || outbound.pop(),
            move |payload| {
                if inbound.force_push(payload).is_some() {
                    trace!("inbound message queue full, dropped oldest entry");
                }
            },
        )
    }

    /// Called at the start of each fresh transmission; `None` yields a
    /// zero-length data packet.
    pub fn get_next_message_to_send(&mut self) -> Option<Payload> {
        (self.source)()
    }

    /// Called once a received payload has been durably accepted.
    pub fn deposit_received_message(&mut self, message: Payload) {
        (self.sink)(message);
    }
}

impl Default for MessagePipe {
    fn default() -> Self {
        Self::idle()
    }
}
