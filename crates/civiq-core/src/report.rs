//! The report entity, its classification enums, and the status state machine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Issue categories a citizen can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueType {
    Pothole,
    Garbage,
    Streetlight,
    Drainage,
    RoadDamage,
    WaterSupply,
    PowerOutage,
    Other,
}

impl IssueType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pothole => "pothole",
            Self::Garbage => "garbage",
            Self::Streetlight => "streetlight",
            Self::Drainage => "drainage",
            Self::RoadDamage => "road_damage",
            Self::WaterSupply => "water_supply",
            Self::PowerOutage => "power_outage",
            Self::Other => "other",
        }
    }

    /// All known issue types, in display order.
    pub fn all() -> &'static [IssueType] {
        &[
            Self::Pothole,
            Self::Garbage,
            Self::Streetlight,
            Self::Drainage,
            Self::RoadDamage,
            Self::WaterSupply,
            Self::PowerOutage,
            Self::Other,
        ]
    }
}

impl std::fmt::Display for IssueType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

impl std::str::FromStr for IssueType {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pothole" => Ok(Self::Pothole),
            "garbage" => Ok(Self::Garbage),
            "streetlight" => Ok(Self::Streetlight),
            "drainage" => Ok(Self::Drainage),
            "road_damage" => Ok(Self::RoadDamage),
            "water_supply" => Ok(Self::WaterSupply),
            "power_outage" => Ok(Self::PowerOutage),
            "other" => Ok(Self::Other),
            _ => Err(ParseEnumError {
                kind: "issue type",
                value: s.to_string(),
            }),
        }
    }
}

/// Lifecycle state of a report.
///
/// Reopened reports count as active for escalation purposes but stay
/// visually distinct from in-progress ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportStatus {
    Pending,
    InProgress,
    Resolved,
    Rejected,
    Reopened,
}

impl ReportStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Resolved => "resolved",
            Self::Rejected => "rejected",
            Self::Reopened => "reopened",
        }
    }

    /// Whether the state machine allows moving from `self` to `next`.
    ///
    /// pending → in_progress | rejected
    /// in_progress → resolved | rejected
    /// resolved → reopened
    /// reopened → in_progress | resolved | rejected
    /// rejected is terminal. Self-transitions are not allowed.
    pub fn can_transition_to(self, next: ReportStatus) -> bool {
        use ReportStatus::*;
        matches!(
            (self, next),
            (Pending, InProgress)
                | (Pending, Rejected)
                | (InProgress, Resolved)
                | (InProgress, Rejected)
                | (Resolved, Reopened)
                | (Reopened, InProgress)
                | (Reopened, Resolved)
                | (Reopened, Rejected)
        )
    }

    /// States scanned by the escalation sweep.
    pub fn is_active(self) -> bool {
        matches!(self, Self::Pending | Self::InProgress | Self::Reopened)
    }

    /// States that still count as candidates for duplicate detection.
    pub fn is_open_for_duplicates(self) -> bool {
        !matches!(self, Self::Resolved | Self::Rejected)
    }
}

impl std::fmt::Display for ReportStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

impl std::str::FromStr for ReportStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "in_progress" => Ok(Self::InProgress),
            "resolved" => Ok(Self::Resolved),
            "rejected" => Ok(Self::Rejected),
            "reopened" => Ok(Self::Reopened),
            _ => Err(ParseEnumError {
                kind: "report status",
                value: s.to_string(),
            }),
        }
    }
}

/// Failed string-to-enum conversion (CLI and config parsing).
#[derive(Debug, Error)]
#[error("unknown {kind}: {value:?}")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

/// A point in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

/// A citizen-submitted issue report.
///
/// The single integration point shared by the scorer, the SLA calculator,
/// the duplicate detector, and the escalation sweep. Rows are never hard
/// deleted; terminal states are soft.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub id: Uuid,
    pub issue_type: IssueType,
    pub title: String,
    pub description: String,
    pub coordinates: Option<Coordinates>,
    pub address: Option<String>,
    pub municipality: Option<String>,
    pub status: ReportStatus,
    /// Tier derived from `priority_score`; None until the pipeline ran.
    pub priority: Option<crate::scoring::Priority>,
    /// Continuous score in [0,1] justifying the tier.
    pub priority_score: Option<f64>,
    /// Simulated AI confidence in [0,1]; 0.5 when nothing was detected.
    pub ai_confidence: f64,
    pub ai_detected_type: Option<IssueType>,
    /// Resolution deadline, set once at creation and frozen afterwards.
    pub sla_due_at: Option<DateTime<Utc>>,
    pub escalation_level: u8,
    pub is_duplicate: bool,
    pub duplicate_of: Option<Uuid>,
    /// How many later reports point at this one as their original.
    pub duplicate_count: u32,
    pub created_by: Option<String>,
    pub assigned_to: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

impl Report {
    /// A fresh pending report with no triage fields filled in yet.
    pub fn new(
        issue_type: IssueType,
        title: impl Into<String>,
        description: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            issue_type,
            title: title.into(),
            description: description.into(),
            coordinates: None,
            address: None,
            municipality: None,
            status: ReportStatus::Pending,
            priority: None,
            priority_score: None,
            ai_confidence: 0.5,
            ai_detected_type: None,
            sla_due_at: None,
            escalation_level: 0,
            is_duplicate: false,
            duplicate_of: None,
            duplicate_count: 0,
            created_by: None,
            assigned_to: None,
            created_at,
            updated_at: created_at,
            resolved_at: None,
        }
    }
}
