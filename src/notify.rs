use std::collections::HashMap;

use serde::Serialize;

pub type SubscriptionId = u64;

/// Notification that a course's class groups changed. Carries no payload;
/// subscribers re-list to pick up the new state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeEvent {
    pub course_id: String,
}

struct Subscriber {
    course_id: String,
    pending: Vec<ChangeEvent>,
}

/// In-process "class groups changed" feed, scoped by course. Subscribers
/// register and unregister explicitly with the lifecycle of the view that
/// needs them; events queue per subscriber until drained. Not durable and
/// not cross-process.
#[derive(Default)]
pub struct ChangeBus {
    next_id: SubscriptionId,
    subscribers: HashMap<SubscriptionId, Subscriber>,
}

impl ChangeBus {
    pub fn new() -> ChangeBus {
        ChangeBus::default()
    }

    pub fn subscribe(&mut self, course_id: &str) -> SubscriptionId {
        self.next_id += 1;
        let id = self.next_id;
        self.subscribers.insert(
            id,
            Subscriber {
                course_id: course_id.to_string(),
                pending: Vec::new(),
            },
        );
        id
    }

    /// Drops the subscriber and any undrained events. Returns false for an
    /// unknown id.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.subscribers.remove(&id).is_some()
    }

    pub fn publish(&mut self, course_id: &str) {
        for subscriber in self.subscribers.values_mut() {
            if subscriber.course_id == course_id {
                subscriber.pending.push(ChangeEvent {
                    course_id: course_id.to_string(),
                });
            }
        }
    }

    /// Pending events for the subscriber, oldest first; empties the queue.
    /// None for an unknown id.
    pub fn drain(&mut self, id: SubscriptionId) -> Option<Vec<ChangeEvent>> {
        self.subscribers
            .get_mut(&id)
            .map(|s| std::mem::take(&mut s.pending))
    }

    pub fn clear(&mut self) {
        self.subscribers.clear();
    }
}
