// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
// Event Bus Implementation - Pub/Sub for Practice Events
//
// Every event is written to the tracing log and fanned out to in-process
// subscribers over a tokio broadcast channel. Events are not persisted.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::domain::events::{EventBus, PracticeEvent};

#[derive(Clone)]
pub struct TracingEventBus {
    sender: Arc<broadcast::Sender<PracticeEvent>>,
}

impl TracingEventBus {
    /// Capacity bounds how many events a slow subscriber may lag behind
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender: Arc::new(sender),
        }
    }

    pub fn with_default_capacity() -> Self {
        Self::new(256)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PracticeEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for TracingEventBus {
    fn default() -> Self {
        Self::with_default_capacity()
    }
}

#[async_trait]
impl EventBus for TracingEventBus {
    async fn publish(&self, event: PracticeEvent) -> anyhow::Result<()> {
        match &event {
            PracticeEvent::MaintenanceCompleted { .. } | PracticeEvent::DrillRunCompleted { .. } => {
                info!(event_type = event.event_type(), payload = ?event, "Practice event");
            }
            _ => debug!(event_type = event.event_type(), payload = ?event, "Practice event"),
        }

        // send() only fails when nobody is listening
        if self.sender.send(event).is_err() {
            debug!("No subscribers listening to event");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[tokio::test]
    async fn test_publish_reaches_subscribers() {
        let bus = TracingEventBus::new(8);
        let mut rx = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 1);

        bus.publish(PracticeEvent::InsightsDecayed {
            count: 3,
            decay_rate: 0.95,
            timestamp: Utc::now(),
        })
        .await
        .unwrap();

        let received = rx.recv().await.unwrap();
        assert_eq!(received.event_type(), "insights_decayed");
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_is_ok() {
        let bus = TracingEventBus::default();
        bus.publish(PracticeEvent::InsightsCompressed {
            removed: 2,
            created: 1,
            used_service: false,
            timestamp: Utc::now(),
        })
        .await
        .unwrap();
    }
}
