//! Near-duplicate detection over geospatial and temporal proximity.
//!
//! The check is advisory: a match records duplicate status on the new
//! submission, but the caller always persists the row.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::geo::haversine_meters;
use crate::report::{Coordinates, IssueType, Report};

pub const DEFAULT_RADIUS_METERS: f64 = 100.0;
pub const DEFAULT_WINDOW_HOURS: i64 = 72;

/// Parameters of a duplicate scan for one incoming submission.
#[derive(Debug, Clone, Copy)]
pub struct DuplicateQuery {
    pub location: Coordinates,
    pub issue_type: IssueType,
    pub radius_meters: f64,
    pub window_hours: i64,
    pub now: DateTime<Utc>,
}

impl DuplicateQuery {
    pub fn new(location: Coordinates, issue_type: IssueType, now: DateTime<Utc>) -> Self {
        Self {
            location,
            issue_type,
            radius_meters: DEFAULT_RADIUS_METERS,
            window_hours: DEFAULT_WINDOW_HOURS,
            now,
        }
    }
}

/// The closest qualifying prior report.
///
/// `distance_meters` is rounded to the nearest meter and `hours_ago` to
/// the nearest hour — both are display values; the window filter itself
/// uses exact elapsed time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DuplicateMatch {
    pub report_id: Uuid,
    pub title: String,
    pub distance_meters: f64,
    pub hours_ago: i64,
}

/// Find the nearest unresolved prior report of the same type within the
/// radius/window, or `None`.
///
/// Candidates without coordinates, of a different type, in a terminal
/// status, or that are themselves duplicates are skipped. Ties on
/// distance break toward the most recent report.
pub fn find_duplicate<'a, I>(candidates: I, query: &DuplicateQuery) -> Option<DuplicateMatch>
where
    I: IntoIterator<Item = &'a Report>,
{
    let cutoff = query.now - chrono::Duration::hours(query.window_hours);

    let mut best: Option<(&Report, f64)> = None;
    for report in candidates {
        if report.issue_type != query.issue_type
            || !report.status.is_open_for_duplicates()
            || report.is_duplicate
            || report.created_at < cutoff
            || report.created_at > query.now
        {
            continue;
        }
        let Some(coords) = report.coordinates else {
            continue;
        };

        let distance = haversine_meters(query.location, coords);
        if distance > query.radius_meters {
            continue;
        }

        let closer = match best {
            None => true,
            Some((current, current_distance)) => {
                distance < current_distance
                    || (distance == current_distance && report.created_at > current.created_at)
            }
        };
        if closer {
            best = Some((report, distance));
        }
    }

    best.map(|(report, distance)| {
        let elapsed = query.now - report.created_at;
        DuplicateMatch {
            report_id: report.id,
            title: report.title.clone(),
            distance_meters: distance.round(),
            hours_ago: (elapsed.num_seconds() as f64 / 3600.0).round() as i64,
        }
    })
}
