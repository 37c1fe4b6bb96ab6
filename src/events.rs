// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2025 Daniel Negri
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Change notifications.
//!
//! Views that display students, payments or sessions subscribe to a
//! [`Topic`] and receive a [`SchoolEvent`] after every committed change.
//! Nothing is published for rolled-back operations.

use crate::base::{PaymentId, SessionId, StudentId};
use crossbeam::channel::{self, Receiver, Sender};
use dashmap::DashMap;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Topic {
    Students,
    Payments,
    Sessions,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StudentChange {
    Enrolled,
    /// Totals or balance moved.
    LedgerUpdated,
    HoursUpdated,
    Deleted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PaymentChange {
    Created,
    Amended,
    Validated,
    Cancelled,
    Deleted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SessionChange {
    Created,
    Updated,
    Deleted,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum SchoolEvent {
    Student {
        student_id: StudentId,
        change: StudentChange,
    },
    Payment {
        payment_id: PaymentId,
        student_id: StudentId,
        change: PaymentChange,
    },
    Session {
        session_id: SessionId,
        change: SessionChange,
    },
}

impl SchoolEvent {
    pub fn topic(&self) -> Topic {
        match self {
            Self::Student { .. } => Topic::Students,
            Self::Payment { .. } => Topic::Payments,
            Self::Session { .. } => Topic::Sessions,
        }
    }
}

/// Fan-out of events to per-topic subscribers.
///
/// Subscribers whose receiver has been dropped are pruned on the next
/// publish to their topic.
#[derive(Debug, Default)]
pub struct EventBus {
    subscribers: DashMap<Topic, Vec<Sender<SchoolEvent>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, topic: Topic) -> Receiver<SchoolEvent> {
        let (tx, rx) = channel::unbounded();
        self.subscribers.entry(topic).or_default().push(tx);
        rx
    }

    /// No-op if nobody listens on the event's topic.
    pub fn publish(&self, event: SchoolEvent) {
        if let Some(mut senders) = self.subscribers.get_mut(&event.topic()) {
            senders.retain(|tx| tx.send(event.clone()).is_ok());
        }
    }

    pub fn subscriber_count(&self, topic: Topic) -> usize {
        self.subscribers.get(&topic).map_or(0, |s| s.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn enrolled(id: u32) -> SchoolEvent {
        SchoolEvent::Student {
            student_id: StudentId(id),
            change: StudentChange::Enrolled,
        }
    }

    #[test]
    fn subscribe_and_receive() {
        let bus = EventBus::new();
        let rx = bus.subscribe(Topic::Students);

        bus.publish(enrolled(1));
        assert_eq!(rx.try_recv().unwrap(), enrolled(1));
    }

    #[test]
    fn topics_are_isolated() {
        let bus = EventBus::new();
        let rx = bus.subscribe(Topic::Payments);

        bus.publish(enrolled(1));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn publish_without_subscribers_is_noop() {
        let bus = EventBus::new();
        bus.publish(enrolled(1));
    }

    #[test]
    fn dropped_receivers_are_pruned() {
        let bus = EventBus::new();
        let kept = bus.subscribe(Topic::Students);
        drop(bus.subscribe(Topic::Students));
        assert_eq!(bus.subscriber_count(Topic::Students), 2);

        bus.publish(enrolled(1));
        assert_eq!(bus.subscriber_count(Topic::Students), 1);
        assert_eq!(kept.try_recv().unwrap(), enrolled(1));
    }

    #[test]
    fn events_cross_threads() {
        let bus = EventBus::new();
        let rx = bus.subscribe(Topic::Sessions);
        let worker = std::thread::spawn(move || rx.recv().unwrap());

        let event = SchoolEvent::Session {
            session_id: SessionId(3),
            change: SessionChange::Created,
        };
        bus.publish(event.clone());
        assert_eq!(worker.join().unwrap(), event);
    }
}
