//! The triage engine: submission pipeline, staff transitions, and the
//! escalation sweep, all over the repository traits.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use civiq_classify::KeywordClassifier;
use civiq_core::audit::{AuditAction, AuditActor, AuditDraft};
use civiq_core::duplicate::{self, DuplicateMatch, DuplicateQuery};
use civiq_core::escalation::{hours_between, next_escalation};
use civiq_core::ratelimit::{DenyReason, RateLimitDecision};
use civiq_core::report::{Coordinates, IssueType, Report, ReportStatus};
use civiq_core::scoring::{self, Priority, PriorityScore, ScoreThresholds};
use civiq_notify::Notifier;
use civiq_store::Store;

use crate::clock::{Clock, SystemClock};
use crate::error::EngineError;

/// Tunables for the submission pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    pub thresholds: ScoreThresholds,
    pub duplicate_radius_meters: f64,
    pub duplicate_window_hours: i64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            thresholds: ScoreThresholds::default(),
            duplicate_radius_meters: duplicate::DEFAULT_RADIUS_METERS,
            duplicate_window_hours: duplicate::DEFAULT_WINDOW_HOURS,
        }
    }
}

/// A citizen submission before it becomes a persisted report.
#[derive(Debug, Clone)]
pub struct NewReport {
    pub issue_type: IssueType,
    pub title: String,
    pub description: String,
    pub coordinates: Option<Coordinates>,
    pub address: Option<String>,
    pub municipality: Option<String>,
    pub submitter_id: String,
    /// Emergency-category submissions bypass the scorer and land at
    /// critical priority.
    pub emergency: bool,
}

/// What the UI layer renders after a submission attempt.
#[derive(Debug, Clone)]
pub enum SubmissionOutcome {
    /// Gate closed; nothing was persisted.
    RateLimited {
        reason: DenyReason,
        reset_at: Option<DateTime<Utc>>,
    },
    /// Report persisted. A duplicate match is advisory and does not stop
    /// the submission.
    Accepted {
        report: Report,
        duplicate: Option<DuplicateMatch>,
        remaining_hourly: u32,
        remaining_daily: u32,
    },
}

/// One escalated report in a sweep result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EscalatedReport {
    pub report_id: Uuid,
    pub from_level: u8,
    pub to_level: u8,
}

/// A per-report failure the sweep tolerated and moved past.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepFailure {
    pub report_id: Uuid,
    pub error: String,
}

/// Result of one escalation sweep.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SweepReport {
    pub processed: usize,
    pub escalated: Vec<EscalatedReport>,
    pub failures: Vec<SweepFailure>,
}

/// The Priority/SLA engine. One instance serves every submission and the
/// periodic sweep; the store carries all shared state.
pub struct Engine<S, N> {
    store: Arc<S>,
    notifier: N,
    classifier: KeywordClassifier,
    config: EngineConfig,
    clock: Arc<dyn Clock>,
    sweep_active: AtomicBool,
}

impl<S: Store, N: Notifier> Engine<S, N> {
    pub fn new(store: Arc<S>, notifier: N) -> Self {
        Self {
            store,
            notifier,
            classifier: KeywordClassifier::builtin(),
            config: EngineConfig::default(),
            clock: Arc::new(SystemClock),
            sweep_active: AtomicBool::new(false),
        }
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Score an issue without submitting anything (UI preview).
    pub fn score_report(
        &self,
        issue_type: IssueType,
        ai_confidence: f64,
    ) -> Result<PriorityScore, EngineError> {
        let rules = self.store.priority_rules()?;
        Ok(scoring::score(
            &rules,
            issue_type,
            ai_confidence,
            self.clock.now(),
            &self.config.thresholds,
        ))
    }

    /// Resolution deadline for a tier, or `None` when the tier has no SLA
    /// row.
    pub fn sla_due_at(
        &self,
        priority: Priority,
        created_at: DateTime<Utc>,
    ) -> Result<Option<DateTime<Utc>>, EngineError> {
        Ok(self.store.sla_table()?.resolution_due(priority, created_at))
    }

    /// Stand-alone duplicate check (UI preview before submission).
    pub fn find_duplicate(
        &self,
        location: Coordinates,
        issue_type: IssueType,
    ) -> Result<Option<DuplicateMatch>, EngineError> {
        self.duplicate_scan(location, issue_type, self.clock.now())
    }

    fn duplicate_scan(
        &self,
        location: Coordinates,
        issue_type: IssueType,
        now: DateTime<Utc>,
    ) -> Result<Option<DuplicateMatch>, EngineError> {
        let cutoff = now - Duration::hours(self.config.duplicate_window_hours);
        let candidates = self.store.duplicate_candidates(issue_type, cutoff)?;
        let query = DuplicateQuery {
            location,
            issue_type,
            radius_meters: self.config.duplicate_radius_meters,
            window_hours: self.config.duplicate_window_hours,
            now,
        };
        Ok(duplicate::find_duplicate(&candidates, &query))
    }

    /// The submission pipeline: rate-limit gate, simulated detection,
    /// advisory duplicate scan, scoring, SLA stamping, persist + audit.
    ///
    /// The insert happens last, so a denial or an earlier failure leaves
    /// no partial report behind.
    pub fn submit(&self, new: NewReport) -> Result<SubmissionOutcome, EngineError> {
        let now = self.clock.now();

        let decision = self.store.check_and_consume(&new.submitter_id, now)?;
        let (remaining_hourly, remaining_daily) = match decision {
            RateLimitDecision::Denied { reason, reset_at } => {
                info!(
                    submitter = %new.submitter_id,
                    reason = reason.message(),
                    "submission rate-limited"
                );
                return Ok(SubmissionOutcome::RateLimited { reason, reset_at });
            }
            RateLimitDecision::Allowed {
                remaining_hourly,
                remaining_daily,
            } => (remaining_hourly, remaining_daily),
        };

        let mut report = Report::new(new.issue_type, new.title, new.description, now);
        report.coordinates = new.coordinates;
        report.address = new.address;
        report.municipality = new.municipality;
        report.created_by = Some(new.submitter_id.clone());

        let text = format!("{} {}", report.title, report.description);
        let detection = self.classifier.detect(&text);
        report.ai_detected_type = detection.map(|d| d.issue_type);
        report.ai_confidence = detection.map(|d| d.confidence).unwrap_or(0.5);

        let duplicate = match report.coordinates {
            Some(location) => self.scan_for_duplicate(&mut report, location, now)?,
            None => None,
        };

        let scored = if new.emergency {
            PriorityScore::emergency()
        } else {
            let rules = self.store.priority_rules()?;
            scoring::score(
                &rules,
                report.issue_type,
                report.ai_confidence,
                now,
                &self.config.thresholds,
            )
        };
        report.priority_score = Some(scored.score);
        report.priority = Some(scored.priority);
        report.sla_due_at = self
            .store
            .sla_table()?
            .resolution_due(scored.priority, report.created_at);

        let after = serde_json::to_value(&report)?;
        self.store.insert(report.clone())?;
        self.store.append_audit(AuditDraft::for_report(
            report.id.to_string(),
            AuditAction::Create,
            AuditActor::new(&new.submitter_id, "citizen"),
            None,
            Some(after),
            now,
        ))?;

        info!(
            report_id = %report.id,
            issue_type = %report.issue_type,
            priority = %scored.priority,
            score = scored.score,
            duplicate = duplicate.is_some(),
            "report submitted"
        );

        Ok(SubmissionOutcome::Accepted {
            report,
            duplicate,
            remaining_hourly,
            remaining_daily,
        })
    }

    /// Advisory duplicate scan; a match marks the new report and bumps
    /// the original's pointer count.
    fn scan_for_duplicate(
        &self,
        report: &mut Report,
        location: Coordinates,
        now: DateTime<Utc>,
    ) -> Result<Option<DuplicateMatch>, EngineError> {
        let Some(found) = self.duplicate_scan(location, report.issue_type, now)? else {
            return Ok(None);
        };

        report.is_duplicate = true;
        report.duplicate_of = Some(found.report_id);

        if let Some(mut original) = self.store.get(found.report_id)? {
            let before = serde_json::to_value(&original)?;
            original.duplicate_count += 1;
            original.updated_at = now;
            let after = serde_json::to_value(&original)?;
            self.store.update(&original)?;
            self.store.append_audit(AuditDraft::for_report(
                original.id.to_string(),
                AuditAction::Update,
                AuditActor::new(
                    report.created_by.as_deref().unwrap_or("unknown"),
                    "citizen",
                ),
                Some(before),
                Some(after),
                now,
            ))?;
        }

        Ok(Some(found))
    }

    /// Staff-initiated status transition. Reopening goes through
    /// [`reopen`](Self::reopen) instead, which enforces the submitter
    /// check and its side effects.
    pub fn update_status(
        &self,
        id: Uuid,
        new_status: ReportStatus,
        actor: &AuditActor,
    ) -> Result<Report, EngineError> {
        let mut report = self
            .store
            .get(id)?
            .ok_or(EngineError::UnknownReport(id))?;

        if new_status == ReportStatus::Reopened
            || !report.status.can_transition_to(new_status)
        {
            return Err(EngineError::InvalidTransition {
                from: report.status,
                to: new_status,
            });
        }

        let now = self.clock.now();
        let before = serde_json::to_value(&report)?;
        report.status = new_status;
        if new_status == ReportStatus::Resolved {
            report.resolved_at = Some(now);
        }
        report.updated_at = now;
        self.persist_update(&report, before, actor, now)?;

        info!(report_id = %id, status = %new_status, actor = %actor.id, "status updated");
        Ok(report)
    }

    /// Submitter-initiated reopen of a resolved report. Counts as a fresh
    /// escalation signal: the level goes up by one and the resolution
    /// stamp is cleared.
    pub fn reopen(&self, id: Uuid, actor: &AuditActor) -> Result<Report, EngineError> {
        let mut report = self
            .store
            .get(id)?
            .ok_or(EngineError::UnknownReport(id))?;

        if !report.status.can_transition_to(ReportStatus::Reopened) {
            return Err(EngineError::InvalidTransition {
                from: report.status,
                to: ReportStatus::Reopened,
            });
        }
        if report.created_by.as_deref() != Some(actor.id.as_str()) {
            return Err(EngineError::NotSubmitter);
        }

        let now = self.clock.now();
        let before = serde_json::to_value(&report)?;
        report.status = ReportStatus::Reopened;
        report.resolved_at = None;
        report.escalation_level += 1;
        report.updated_at = now;
        self.persist_update(&report, before, actor, now)?;

        info!(
            report_id = %id,
            escalation_level = report.escalation_level,
            "report reopened"
        );
        Ok(report)
    }

    /// Assign a report to a staff member.
    pub fn assign(
        &self,
        id: Uuid,
        staff_id: &str,
        actor: &AuditActor,
    ) -> Result<Report, EngineError> {
        let mut report = self
            .store
            .get(id)?
            .ok_or(EngineError::UnknownReport(id))?;

        let now = self.clock.now();
        let before = serde_json::to_value(&report)?;
        report.assigned_to = Some(staff_id.to_string());
        report.updated_at = now;
        self.persist_update(&report, before, actor, now)?;
        Ok(report)
    }

    fn persist_update(
        &self,
        report: &Report,
        before: serde_json::Value,
        actor: &AuditActor,
        now: DateTime<Utc>,
    ) -> Result<(), EngineError> {
        let after = serde_json::to_value(report)?;
        self.store.update(report)?;
        self.store.append_audit(AuditDraft::for_report(
            report.id.to_string(),
            AuditAction::Update,
            actor.clone(),
            Some(before),
            Some(after),
            now,
        ))?;
        Ok(())
    }

    /// One escalation sweep over every active report with an SLA deadline.
    ///
    /// Refuses to overlap a running sweep. Idempotent per threshold
    /// crossing: the level guard compares against each report's current
    /// level, so an immediate rerun escalates nothing further. One
    /// report's persistence failure is recorded and the scan continues.
    pub async fn run_sweep(&self) -> Result<SweepReport, EngineError> {
        if self.sweep_active.swap(true, Ordering::SeqCst) {
            return Err(EngineError::SweepAlreadyRunning);
        }
        let result = self.sweep_inner().await;
        self.sweep_active.store(false, Ordering::SeqCst);
        result
    }

    async fn sweep_inner(&self) -> Result<SweepReport, EngineError> {
        let now = self.clock.now();
        let reports = self.store.active_with_sla()?;
        let mut sweep = SweepReport {
            processed: reports.len(),
            ..SweepReport::default()
        };

        for mut report in reports {
            let Some(priority) = report.priority else {
                continue;
            };
            let Some(config) = self.store.sla_config(priority)? else {
                continue;
            };

            let hours = hours_between(report.created_at, now);
            let Some(step) = next_escalation(hours, &config, report.escalation_level) else {
                continue;
            };

            let before = serde_json::to_value(&report)?;
            report.escalation_level = step.to;
            report.updated_at = now;
            let outcome = self
                .store
                .update(&report)
                .and_then(|()| {
                    self.store.append_escalation(
                        report.id,
                        step.from,
                        step.to,
                        step.reason(hours),
                        now,
                    )
                })
                .and_then(|_| {
                    self.store.append_audit(AuditDraft::for_report(
                        report.id.to_string(),
                        AuditAction::Update,
                        AuditActor::scheduler(),
                        Some(before),
                        serde_json::to_value(&report).ok(),
                        now,
                    ))
                });

            match outcome {
                Ok(_) => {
                    info!(
                        report_id = %report.id,
                        from = step.from,
                        to = step.to,
                        hours_elapsed = hours,
                        "report escalated"
                    );
                    if let Err(err) = self.notifier.notify(report.id, step.to).await {
                        warn!(report_id = %report.id, error = %err, "escalation notification failed");
                    }
                    sweep.escalated.push(EscalatedReport {
                        report_id: report.id,
                        from_level: step.from,
                        to_level: step.to,
                    });
                }
                Err(err) => {
                    warn!(report_id = %report.id, error = %err, "escalation persistence failed");
                    sweep.failures.push(SweepFailure {
                        report_id: report.id,
                        error: err.to_string(),
                    });
                }
            }
        }

        info!(
            processed = sweep.processed,
            escalated = sweep.escalated.len(),
            failures = sweep.failures.len(),
            "escalation sweep finished"
        );
        Ok(sweep)
    }
}
