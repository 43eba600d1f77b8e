//! In-process broker with NATS-Streaming-like delivery semantics.
//!
//! Every published envelope is appended to a per-subject log. Each durable
//! queue group owns one work channel fed from that log; replicas of the group
//! share the channel's receiver, so each delivery reaches exactly one
//! replica. A delivery is acknowledged implicitly when the handler returns
//! `Ok` (or a terminal error); a retryable error leaves it unacknowledged and
//! the broker re-enqueues it after the configured ack-wait.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use edusync_core::errors::{Disposition, Result};
use edusync_core_types::{EventEnvelope, Subject};
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

use crate::contract::{EventHandler, EventTransport};

/// Ack-wait used when none is configured; mirrors the 5s default of the
/// source protocol's subscription options.
pub const DEFAULT_ACK_WAIT: Duration = Duration::from_secs(5);

/// One delivery attempt of one envelope.
#[derive(Debug, Clone)]
struct Delivery {
    envelope: EventEnvelope,
    attempt: u32,
}

/// Work channel of one durable queue group.
struct Group {
    tx: mpsc::UnboundedSender<Delivery>,
    rx: Arc<tokio::sync::Mutex<mpsc::UnboundedReceiver<Delivery>>>,
}

#[derive(Default)]
struct BrokerState {
    /// Durable append-only log per subject.
    log: HashMap<Subject, Vec<EventEnvelope>>,
    groups: HashMap<(Subject, String), Arc<Group>>,
}

/// In-process `EventTransport`; cheap to clone, clones share the broker.
#[derive(Clone)]
pub struct MemoryBroker {
    state: Arc<Mutex<BrokerState>>,
    ack_wait: Duration,
}

impl Default for MemoryBroker {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBroker {
    pub fn new() -> Self {
        Self::with_ack_wait(DEFAULT_ACK_WAIT)
    }

    /// Broker with a custom redelivery window. Tests use a short window so
    /// redelivery paths run in milliseconds.
    pub fn with_ack_wait(ack_wait: Duration) -> Self {
        Self {
            state: Arc::new(Mutex::new(BrokerState::default())),
            ack_wait,
        }
    }

    fn state(&self) -> MutexGuard<'_, BrokerState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Everything published so far on `subject`, in publish order.
    /// Introspection surface for tests and the demo binary.
    pub fn published(&self, subject: Subject) -> Vec<EventEnvelope> {
        self.state().log.get(&subject).cloned().unwrap_or_default()
    }

    fn spawn_worker(&self, subject: Subject, queue_group: String, group: Arc<Group>,
                    handler: Arc<dyn EventHandler>) {
        let ack_wait = self.ack_wait;
        tokio::spawn(async move {
            loop {
                let delivery = {
                    let mut rx = group.rx.lock().await;
                    rx.recv().await
                };
                let Some(delivery) = delivery else {
                    break;
                };
                let id = delivery.envelope.data.id.clone();
                trace!(%subject, %queue_group, unit_id = %id, attempt = delivery.attempt,
                       "delivering event");
                match handler.handle(delivery.envelope.clone()).await {
                    Ok(()) => {
                        trace!(%subject, %queue_group, unit_id = %id, "acknowledged");
                    }
                    Err(err) if err.disposition() == Disposition::Ack => {
                        // Terminal: acknowledge so the message cannot loop.
                        debug!(%subject, %queue_group, unit_id = %id, error = %err,
                               "acknowledged without effect");
                    }
                    Err(err) => {
                        warn!(%subject, %queue_group, unit_id = %id, error = %err,
                              attempt = delivery.attempt, "unacknowledged, will redeliver");
                        let tx = group.tx.clone();
                        let next = Delivery {
                            envelope: delivery.envelope,
                            attempt: delivery.attempt + 1,
                        };
                        tokio::spawn(async move {
                            tokio::time::sleep(ack_wait).await;
                            // Send fails only once the group is gone.
                            let _ = tx.send(next);
                        });
                    }
                }
            }
        });
    }
}

#[async_trait]
impl EventTransport for MemoryBroker {
    async fn publish(&self, envelope: EventEnvelope) -> Result<()> {
        let subject = envelope.subject;
        let mut state = self.state();
        state.log.entry(subject).or_default().push(envelope.clone());
        for ((group_subject, _), group) in state.groups.iter() {
            if *group_subject == subject {
                let _ = group.tx.send(Delivery {
                    envelope: envelope.clone(),
                    attempt: 1,
                });
            }
        }
        Ok(())
    }

    async fn subscribe(
        &self,
        subject: Subject,
        queue_group: &str,
        handler: Arc<dyn EventHandler>,
    ) -> Result<()> {
        let group = {
            let mut state = self.state();
            let key = (subject, queue_group.to_string());
            if let Some(existing) = state.groups.get(&key) {
                // Another replica of an existing group: share its channel.
                Arc::clone(existing)
            } else {
                let (tx, rx) = mpsc::unbounded_channel();
                // New durable group: replay the full backlog before going live.
                if let Some(backlog) = state.log.get(&subject) {
                    for envelope in backlog {
                        let _ = tx.send(Delivery {
                            envelope: envelope.clone(),
                            attempt: 1,
                        });
                    }
                }
                let group = Arc::new(Group {
                    tx,
                    rx: Arc::new(tokio::sync::Mutex::new(rx)),
                });
                state.groups.insert(key, Arc::clone(&group));
                group
            }
        };
        self.spawn_worker(subject, queue_group.to_string(), group, handler);
        Ok(())
    }
}
