use std::sync::Arc;

use async_trait::async_trait;
use edusync_core::errors::Result;
use edusync_core_types::{EventEnvelope, Subject};

/// Processes one delivery of an event.
///
/// The return value is the acknowledgment decision: `Ok` acknowledges, and an
/// error acknowledges or forces redelivery according to its
/// [`Disposition`](edusync_core::errors::Disposition). The subscription loop
/// applies the decision, so a handler can never double-ack or forget to ack.
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(&self, envelope: EventEnvelope) -> Result<()>;
}

/// Durable publish/subscribe channel with at-least-once delivery.
///
/// `subscribe` registers a durable, named queue group on a subject:
/// horizontally scaled replicas of one service subscribe under the same group
/// name and split the message stream, while distinct groups each see every
/// message. A group created after messages were published still receives the
/// full backlog (deliver-all-available semantics).
#[async_trait]
pub trait EventTransport: Send + Sync {
    /// Durably append and fan out one event.
    async fn publish(&self, envelope: EventEnvelope) -> Result<()>;

    /// Attach one handler replica to `(subject, queue_group)`.
    async fn subscribe(
        &self,
        subject: Subject,
        queue_group: &str,
        handler: Arc<dyn EventHandler>,
    ) -> Result<()>;
}
