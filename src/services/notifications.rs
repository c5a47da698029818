use serde::Serialize;
use std::collections::HashSet;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::database::models::{
    RequestPriority, RequestStatus, RescheduleRequest, TransitionChange,
};
use crate::database::models::macros::string_enum;

string_enum! {
    #[derive(Debug, Clone, Serialize, PartialEq, Eq)]
    #[serde(rename_all = "snake_case")]
    pub enum EventCategory {
        Reschedule => "reschedule",
    }
}

/// One notification to one interested party about one committed transition.
/// Subscribers use it only as a signal to re-fetch; the store stays the
/// source of truth.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RescheduleEvent {
    pub category: EventCategory,
    pub request_id: Uuid,
    pub new_status: RequestStatus,
    pub changed_fields: Vec<String>,
    pub recipient: Uuid,
    pub priority: RequestPriority,
}

/// Fan-out hub over a broadcast channel. Publishing never blocks and never
/// fails the commit path; delivery to subscribers is at-least-once, so
/// consumers must drop duplicate (requestId, newStatus) pairs.
#[derive(Clone)]
pub struct NotificationHub {
    tx: broadcast::Sender<RescheduleEvent>,
}

impl NotificationHub {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Opens an explicit subscription handle. Events sent before the handle
    /// exists are not replayed.
    pub fn subscribe(&self) -> RescheduleSubscription {
        RescheduleSubscription {
            rx: self.tx.subscribe(),
        }
    }

    /// Builds the per-party events for one committed transition: requester,
    /// bound target staff, and the branch's approvers, deduplicated.
    pub fn fan_out(
        request: &RescheduleRequest,
        change: &TransitionChange,
        approvers: &[Uuid],
    ) -> Vec<RescheduleEvent> {
        let changed_fields: Vec<String> = change
            .changed_fields()
            .into_iter()
            .map(str::to_string)
            .collect();

        let mut seen = HashSet::new();
        let mut recipients = vec![request.requester_staff_id];
        recipients.extend(request.target_staff_id);
        recipients.extend_from_slice(approvers);

        recipients
            .into_iter()
            .filter(|staff_id| seen.insert(*staff_id))
            .map(|recipient| RescheduleEvent {
                category: EventCategory::Reschedule,
                request_id: request.id,
                new_status: request.status.clone(),
                changed_fields: changed_fields.clone(),
                recipient,
                priority: request.priority.clone(),
            })
            .collect()
    }

    pub fn publish(&self, events: Vec<RescheduleEvent>) {
        for event in events {
            // send only errors when no subscriber is listening
            let _ = self.tx.send(event);
        }
    }
}

/// Explicit subscription lifecycle: hold the handle to receive, call `stop`
/// (or drop) to end it. No ambient global listener.
pub struct RescheduleSubscription {
    rx: broadcast::Receiver<RescheduleEvent>,
}

impl RescheduleSubscription {
    /// Next event, or `None` once the hub is gone. A lagged subscriber skips
    /// ahead rather than erroring out.
    pub async fn recv(&mut self) -> Option<RescheduleEvent> {
        loop {
            match self.rx.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    log::warn!("reschedule subscriber lagged, skipped {} events", missed);
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    pub fn stop(self) {}
}

/// Duplicate-delivery guard for consumers: at-least-once delivery means the
/// same (requestId, newStatus) pair may arrive more than once.
#[derive(Debug, Default)]
pub struct EventDeduper {
    seen: HashSet<(Uuid, RequestStatus, Uuid)>,
}

impl EventDeduper {
    pub fn new() -> Self {
        Self::default()
    }

    /// True the first time this (request, status, recipient) triple is seen;
    /// false for redeliveries, which must be treated as no-ops.
    pub fn observe(&mut self, event: &RescheduleEvent) -> bool {
        self.seen
            .insert((event.request_id, event.new_status.clone(), event.recipient))
    }
}
