// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Domain events for the practice pipeline
//! Published to the EventBus for observability and integration

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::insight::InsightId;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PracticeEvent {
    // Insight memory events

    /// Time decay lowered the weight of some insights
    InsightsDecayed {
        count: usize,
        decay_rate: f64,
        timestamp: DateTime<Utc>,
    },

    /// Insight removed because its weight fell below the threshold
    InsightPruned {
        insight_id: InsightId,
        final_weight: f64,
        timestamp: DateTime<Utc>,
    },

    /// Insight removed because it was not seen within the retention window
    InsightArchived {
        insight_id: InsightId,
        age_days: i64,
        retained: bool,
        timestamp: DateTime<Utc>,
    },

    /// Near-duplicate insights folded into one
    InsightsMerged {
        survivor_id: InsightId,
        merged_count: usize,
        timestamp: DateTime<Utc>,
    },

    /// Compression replaced raw insights with atomic ones
    InsightsCompressed {
        removed: usize,
        created: usize,
        used_service: bool,
        timestamp: DateTime<Utc>,
    },

    /// Maintenance cycle finished
    MaintenanceCompleted {
        decayed: usize,
        pruned: usize,
        archived: usize,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },

    // Drill queue events

    /// A generation run finished
    DrillRunCompleted {
        target: usize,
        saved: usize,
        from_templates: usize,
        skills: usize,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },
}

impl PracticeEvent {
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            PracticeEvent::InsightsDecayed { timestamp, .. } => *timestamp,
            PracticeEvent::InsightPruned { timestamp, .. } => *timestamp,
            PracticeEvent::InsightArchived { timestamp, .. } => *timestamp,
            PracticeEvent::InsightsMerged { timestamp, .. } => *timestamp,
            PracticeEvent::InsightsCompressed { timestamp, .. } => *timestamp,
            PracticeEvent::MaintenanceCompleted { timestamp, .. } => *timestamp,
            PracticeEvent::DrillRunCompleted { timestamp, .. } => *timestamp,
        }
    }

    pub fn event_type(&self) -> &'static str {
        match self {
            PracticeEvent::InsightsDecayed { .. } => "insights_decayed",
            PracticeEvent::InsightPruned { .. } => "insight_pruned",
            PracticeEvent::InsightArchived { .. } => "insight_archived",
            PracticeEvent::InsightsMerged { .. } => "insights_merged",
            PracticeEvent::InsightsCompressed { .. } => "insights_compressed",
            PracticeEvent::MaintenanceCompleted { .. } => "maintenance_completed",
            PracticeEvent::DrillRunCompleted { .. } => "drill_run_completed",
        }
    }
}

/// Event bus trait for publishing domain events
#[async_trait]
pub trait EventBus: Send + Sync {
    async fn publish(&self, event: PracticeEvent) -> anyhow::Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serialization() {
        let event = PracticeEvent::InsightPruned {
            insight_id: InsightId::new(),
            final_weight: 0.05,
            timestamp: Utc::now(),
        };

        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"insight_pruned\""));
        let deserialized: PracticeEvent = serde_json::from_str(&json).unwrap();

        assert_eq!(event.event_type(), deserialized.event_type());
    }
}
