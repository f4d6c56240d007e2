//! Per-tier service-level targets and the resolution deadline calculator.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::scoring::Priority;

/// Service-level targets for one priority tier, in whole hours.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlaConfig {
    pub priority: Priority,
    pub response_time_hours: i64,
    pub resolution_time_hours: i64,
    pub escalation_level_1_hours: i64,
    pub escalation_level_2_hours: i64,
}

/// The SLA configuration table, one row per tier.
///
/// Rarely mutated; read by the submission pipeline and the escalation
/// sweep. A tier without a row soft-fails: no SLA is tracked for it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SlaTable {
    pub rows: Vec<SlaConfig>,
}

impl SlaTable {
    /// Stock targets shipped with the engine.
    pub fn builtin() -> Self {
        Self {
            rows: vec![
                SlaConfig {
                    priority: Priority::Critical,
                    response_time_hours: 2,
                    resolution_time_hours: 24,
                    escalation_level_1_hours: 4,
                    escalation_level_2_hours: 12,
                },
                SlaConfig {
                    priority: Priority::High,
                    response_time_hours: 8,
                    resolution_time_hours: 72,
                    escalation_level_1_hours: 24,
                    escalation_level_2_hours: 48,
                },
                SlaConfig {
                    priority: Priority::Medium,
                    response_time_hours: 24,
                    resolution_time_hours: 168,
                    escalation_level_1_hours: 72,
                    escalation_level_2_hours: 120,
                },
                SlaConfig {
                    priority: Priority::Low,
                    response_time_hours: 48,
                    resolution_time_hours: 336,
                    escalation_level_1_hours: 168,
                    escalation_level_2_hours: 240,
                },
            ],
        }
    }

    pub fn get(&self, priority: Priority) -> Option<&SlaConfig> {
        self.rows.iter().find(|c| c.priority == priority)
    }

    /// Resolution deadline for a report created at `created_at`.
    ///
    /// `None` when the tier has no configuration row; a missing row must
    /// never block report creation.
    pub fn resolution_due(
        &self,
        priority: Priority,
        created_at: DateTime<Utc>,
    ) -> Option<DateTime<Utc>> {
        self.get(priority)
            .map(|c| created_at + Duration::hours(c.resolution_time_hours))
    }
}
