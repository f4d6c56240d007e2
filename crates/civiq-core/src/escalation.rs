//! Escalation policy: which SLA threshold a report has crossed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::sla::SlaConfig;

/// One append-only escalation log entry. Never mutated after writing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Escalation {
    pub id: u64,
    pub report_id: Uuid,
    pub from_level: u8,
    pub to_level: u8,
    pub reason: String,
    pub created_at: DateTime<Utc>,
}

/// A level bump the sweep should apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EscalationStep {
    pub from: u8,
    pub to: u8,
    /// The crossed threshold, in hours.
    pub threshold_hours: i64,
}

impl EscalationStep {
    /// Human-readable reason citing the elapsed time and the crossed
    /// threshold, stored on the escalation log entry.
    pub fn reason(&self, hours_elapsed: f64) -> String {
        format!(
            "unresolved for {:.1}h, past the {}h level-{} threshold",
            hours_elapsed, self.threshold_hours, self.to
        )
    }
}

/// Decide the next escalation for a report `hours_elapsed` hours after
/// creation, given its current level.
///
/// Level 2 wins when its threshold is crossed, even from level 0 — a
/// report found late jumps straight to 2. Returns `None` when the report
/// is already at or past the level its age calls for, which is what makes
/// repeated sweeps idempotent.
pub fn next_escalation(
    hours_elapsed: f64,
    config: &SlaConfig,
    current_level: u8,
) -> Option<EscalationStep> {
    if hours_elapsed > config.escalation_level_2_hours as f64 && current_level < 2 {
        Some(EscalationStep {
            from: current_level,
            to: 2,
            threshold_hours: config.escalation_level_2_hours,
        })
    } else if hours_elapsed > config.escalation_level_1_hours as f64 && current_level < 1 {
        Some(EscalationStep {
            from: current_level,
            to: 1,
            threshold_hours: config.escalation_level_1_hours,
        })
    } else {
        None
    }
}

/// Fractional hours between two instants.
pub fn hours_between(earlier: DateTime<Utc>, later: DateTime<Utc>) -> f64 {
    (later - earlier).num_seconds() as f64 / 3600.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::Priority;
    use chrono::TimeZone;

    fn high_config() -> SlaConfig {
        SlaConfig {
            priority: Priority::High,
            response_time_hours: 8,
            resolution_time_hours: 72,
            escalation_level_1_hours: 24,
            escalation_level_2_hours: 48,
        }
    }

    #[test]
    fn under_first_threshold_no_escalation() {
        assert!(next_escalation(10.0, &high_config(), 0).is_none());
    }

    #[test]
    fn past_first_threshold_escalates_to_one() {
        let step = next_escalation(30.0, &high_config(), 0).unwrap();
        assert_eq!(step.from, 0);
        assert_eq!(step.to, 1);
        assert_eq!(step.threshold_hours, 24);
    }

    #[test]
    fn past_second_threshold_escalates_to_two() {
        let step = next_escalation(50.0, &high_config(), 1).unwrap();
        assert_eq!(step.from, 1);
        assert_eq!(step.to, 2);
        assert_eq!(step.threshold_hours, 48);
    }

    #[test]
    fn level_zero_report_found_late_jumps_to_two() {
        let step = next_escalation(60.0, &high_config(), 0).unwrap();
        assert_eq!(step.from, 0);
        assert_eq!(step.to, 2);
    }

    #[test]
    fn already_escalated_report_is_left_alone() {
        assert!(next_escalation(30.0, &high_config(), 1).is_none());
        assert!(next_escalation(60.0, &high_config(), 2).is_none());
        assert!(next_escalation(500.0, &high_config(), 2).is_none());
    }

    #[test]
    fn thresholds_are_exclusive() {
        // Exactly at the threshold is not past it.
        assert!(next_escalation(24.0, &high_config(), 0).is_none());
        let step = next_escalation(24.001, &high_config(), 0).unwrap();
        assert_eq!(step.to, 1);
    }

    #[test]
    fn reason_cites_elapsed_hours_and_threshold() {
        let step = next_escalation(30.0, &high_config(), 0).unwrap();
        let reason = step.reason(30.0);
        assert!(reason.contains("30.0h"), "{reason}");
        assert!(reason.contains("24h"), "{reason}");
        assert!(reason.contains("level-1"), "{reason}");
    }

    #[test]
    fn hours_between_is_fractional() {
        let a = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let b = Utc.with_ymd_and_hms(2025, 1, 1, 1, 30, 0).unwrap();
        assert!((hours_between(a, b) - 1.5).abs() < 1e-9);
    }
}
