//! Simulated AI issue-type detection.
//!
//! The production system this engine serves does not run a vision model;
//! it only needs a deterministic stand-in that yields a detected type and
//! a confidence in [0,1]. Detection here is keyword scoring over the
//! submission text: the type with the most keyword hits wins, and
//! confidence grows with the hit count.

mod keywords;

pub use keywords::KeywordClassifier;

use serde::{Deserialize, Serialize};

use civiq_core::report::IssueType;

/// Confidence assigned to a single keyword hit.
pub const BASE_CONFIDENCE: f64 = 0.55;
/// Confidence gained per additional hit, up to [`MAX_CONFIDENCE`].
pub const CONFIDENCE_PER_EXTRA_HIT: f64 = 0.1;
pub const MAX_CONFIDENCE: f64 = 0.95;

/// A detected issue type with its simulated confidence.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub issue_type: IssueType,
    pub confidence: f64,
}

/// Agreement between the citizen-declared type and the detected one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionStatus {
    /// Nothing detected — the declared type stands on its own.
    Predicted,
    /// Detection agrees with the declared type.
    Confirmed,
    /// Detection disagrees — worth a triage officer's look.
    Conflict,
}

impl DetectionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Predicted => "predicted",
            Self::Confirmed => "confirmed",
            Self::Conflict => "conflict",
        }
    }
}

/// Compare the declared type against a detection result.
pub fn agreement(declared: IssueType, detection: Option<&Detection>) -> DetectionStatus {
    match detection {
        None => DetectionStatus::Predicted,
        Some(d) if d.issue_type == declared => DetectionStatus::Confirmed,
        Some(_) => DetectionStatus::Conflict,
    }
}
