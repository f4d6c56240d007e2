//! Repository interfaces, one per entity family.
//!
//! The engine only sees these traits; the backing store decides how rows
//! are kept. All operations are synchronous — each call is one short
//! transaction against the submitter's or report's row.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use civiq_core::audit::{AuditDraft, AuditLogEntry};
use civiq_core::escalation::Escalation;
use civiq_core::ratelimit::{RateLimitDecision, RateLimitRecord};
use civiq_core::report::{IssueType, Report};
use civiq_core::scoring::{Priority, RuleSet};
use civiq_core::sla::{SlaConfig, SlaTable};

use crate::StoreError;

pub trait ReportStore {
    fn insert(&self, report: Report) -> Result<(), StoreError>;
    fn get(&self, id: Uuid) -> Result<Option<Report>, StoreError>;
    /// Whole-row replace; `NotFound` when the id was never inserted.
    fn update(&self, report: &Report) -> Result<(), StoreError>;
    fn list(&self) -> Result<Vec<Report>, StoreError>;
    /// Reports the escalation sweep scans: active status and a tracked
    /// SLA deadline.
    fn active_with_sla(&self) -> Result<Vec<Report>, StoreError>;
    /// Candidate originals for a duplicate scan: same issue type, created
    /// at or after `cutoff`. Status/coordinate filtering happens in the
    /// matcher.
    fn duplicate_candidates(
        &self,
        issue_type: IssueType,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<Report>, StoreError>;
}

pub trait ConfigStore {
    fn sla_config(&self, priority: Priority) -> Result<Option<SlaConfig>, StoreError>;
    fn sla_table(&self) -> Result<SlaTable, StoreError>;
    fn priority_rules(&self) -> Result<RuleSet, StoreError>;
    fn set_sla_table(&self, table: SlaTable) -> Result<(), StoreError>;
    fn set_priority_rules(&self, rules: RuleSet) -> Result<(), StoreError>;
}

pub trait RateLimitStore {
    /// Run the rate-limit decision for one submitter, creating the record
    /// lazily. The whole read-modify-write holds the store's lock, so two
    /// concurrent submissions from one submitter serialize.
    fn check_and_consume(
        &self,
        submitter_id: &str,
        now: DateTime<Utc>,
    ) -> Result<RateLimitDecision, StoreError>;
    fn rate_limit_record(&self, submitter_id: &str)
        -> Result<Option<RateLimitRecord>, StoreError>;
    fn set_trusted(&self, submitter_id: &str, trusted: bool, now: DateTime<Utc>)
        -> Result<(), StoreError>;
    fn set_blocked(
        &self,
        submitter_id: &str,
        blocked_until: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError>;
}

pub trait EscalationStore {
    /// Append one escalation log row, assigning its sequential id.
    fn append_escalation(
        &self,
        report_id: Uuid,
        from_level: u8,
        to_level: u8,
        reason: String,
        created_at: DateTime<Utc>,
    ) -> Result<Escalation, StoreError>;
    fn escalations_for(&self, report_id: Uuid) -> Result<Vec<Escalation>, StoreError>;
    fn escalations(&self) -> Result<Vec<Escalation>, StoreError>;
}

pub trait AuditStore {
    /// Seal and append a draft, assigning seq and chaining hashes.
    fn append_audit(&self, draft: AuditDraft) -> Result<AuditLogEntry, StoreError>;
    fn audit_for(&self, record_id: &str) -> Result<Vec<AuditLogEntry>, StoreError>;
    fn audit_log(&self) -> Result<Vec<AuditLogEntry>, StoreError>;
    /// Verify the stored chain; `Err(seq)` names the first bad entry.
    fn verify_audit_chain(&self) -> Result<Result<(), u64>, StoreError>;
}

/// Umbrella trait the engine is generic over.
pub trait Store:
    ReportStore + ConfigStore + RateLimitStore + EscalationStore + AuditStore + Send + Sync
{
}

impl<T> Store for T where
    T: ReportStore + ConfigStore + RateLimitStore + EscalationStore + AuditStore + Send + Sync
{
}
