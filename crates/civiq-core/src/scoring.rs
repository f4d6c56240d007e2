//! Deterministic priority scoring.
//!
//! A report's continuous score is `base × time multiplier × confidence
//! factor`, clamped to 1.0, where the base weight comes from the active
//! priority rules and the confidence factor maps AI confidence 0..1 onto
//! 0.5..1.0. Fixed thresholds then bucket the score into a tier.

use chrono::{DateTime, Timelike, Utc};
use serde::{Deserialize, Serialize};

use crate::report::IssueType;

/// Base weight used when no active rule covers an issue type.
pub const DEFAULT_BASE_WEIGHT: f64 = 0.5;

/// Night-time boost applied to streetlight reports.
pub const NIGHT_MULTIPLIER: f64 = 1.3;

/// Daytime window: hours in `[DAY_START, DAY_END)` take no boost.
pub const DAY_START_HOUR: u32 = 6;
pub const DAY_END_HOUR: u32 = 18;

/// Coarse priority tier derived from a continuous score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    Medium,
    High,
    Critical,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }

    pub fn all() -> &'static [Priority] {
        &[Self::Low, Self::Medium, Self::High, Self::Critical]
    }

    /// Bucket a score into a tier.
    pub fn from_score(score: f64, thresholds: &ScoreThresholds) -> Self {
        if score >= thresholds.critical {
            Self::Critical
        } else if score >= thresholds.high {
            Self::High
        } else if score >= thresholds.medium {
            Self::Medium
        } else {
            Self::Low
        }
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

impl std::str::FromStr for Priority {
    type Err = crate::report::ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            "critical" => Ok(Self::Critical),
            _ => Err(crate::report::ParseEnumError {
                kind: "priority",
                value: s.to_string(),
            }),
        }
    }
}

/// Score-to-tier cut points. Parameterised for tests; production uses the
/// defaults.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreThresholds {
    pub critical: f64,
    pub high: f64,
    pub medium: f64,
}

impl Default for ScoreThresholds {
    fn default() -> Self {
        Self {
            critical: 0.75,
            high: 0.55,
            medium: 0.35,
        }
    }
}

/// A single (factor, value) → weight mapping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriorityRule {
    pub factor_type: String,
    pub factor_value: String,
    /// Weight in [0,1].
    pub weight: f64,
    pub active: bool,
}

impl PriorityRule {
    pub fn issue_type(ty: IssueType, weight: f64) -> Self {
        Self {
            factor_type: "issue_type".to_string(),
            factor_value: ty.as_str().to_string(),
            weight,
            active: true,
        }
    }
}

/// The active rule table consulted for base weights.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuleSet {
    pub rules: Vec<PriorityRule>,
}

impl RuleSet {
    /// Stock weights shipped with the engine.
    pub fn builtin() -> Self {
        Self {
            rules: vec![
                PriorityRule::issue_type(IssueType::Pothole, 0.7),
                PriorityRule::issue_type(IssueType::Garbage, 0.45),
                PriorityRule::issue_type(IssueType::Streetlight, 0.8),
                PriorityRule::issue_type(IssueType::Drainage, 0.65),
                PriorityRule::issue_type(IssueType::RoadDamage, 0.75),
                PriorityRule::issue_type(IssueType::WaterSupply, 0.7),
                PriorityRule::issue_type(IssueType::PowerOutage, 0.75),
                PriorityRule::issue_type(IssueType::Other, 0.4),
            ],
        }
    }

    /// Base weight for an issue type; [`DEFAULT_BASE_WEIGHT`] when no
    /// active rule covers it.
    pub fn base_weight(&self, issue_type: IssueType) -> f64 {
        self.rules
            .iter()
            .find(|r| {
                r.active
                    && r.factor_type == "issue_type"
                    && r.factor_value == issue_type.as_str()
            })
            .map(|r| r.weight)
            .unwrap_or(DEFAULT_BASE_WEIGHT)
    }
}

/// Output of the scorer: the continuous score and the tier it maps to.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriorityScore {
    pub score: f64,
    pub priority: Priority,
}

impl PriorityScore {
    /// The forced result for emergency-category submissions, which bypass
    /// the scorer entirely.
    pub fn emergency() -> Self {
        Self {
            score: 1.0,
            priority: Priority::Critical,
        }
    }
}

/// Score a report.
///
/// `at` supplies the wall-clock hour for the time-of-day rule; callers
/// inject it so the function stays deterministic. `ai_confidence` is
/// clamped into [0,1] before use.
pub fn score(
    rules: &RuleSet,
    issue_type: IssueType,
    ai_confidence: f64,
    at: DateTime<Utc>,
    thresholds: &ScoreThresholds,
) -> PriorityScore {
    let base = rules.base_weight(issue_type);
    let multiplier = time_multiplier(issue_type, at);
    let confidence = ai_confidence.clamp(0.0, 1.0);

    let score = (base * multiplier * (0.5 + confidence * 0.5)).min(1.0);
    PriorityScore {
        score,
        priority: Priority::from_score(score, thresholds),
    }
}

/// Streetlight faults matter more at night; no other issue type is
/// time-sensitive.
fn time_multiplier(issue_type: IssueType, at: DateTime<Utc>) -> f64 {
    let hour = at.hour();
    if issue_type == IssueType::Streetlight && !(DAY_START_HOUR..DAY_END_HOUR).contains(&hour) {
        NIGHT_MULTIPLIER
    } else {
        1.0
    }
}
