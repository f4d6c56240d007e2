//! In-memory store with optional JSON snapshot persistence.
//!
//! Supports both ephemeral and file-backed modes. Use [`open`](MemStore::open)
//! for ephemeral tables and [`open_persistent`](MemStore::open_persistent)
//! for a store that reloads its snapshot across process restarts; mutating
//! callers decide when to [`save`](MemStore::save).

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use civiq_core::audit::{self, AuditDraft, AuditLogEntry};
use civiq_core::escalation::Escalation;
use civiq_core::ratelimit::{RateLimitDecision, RateLimitRecord};
use civiq_core::report::{IssueType, Report};
use civiq_core::scoring::{Priority, RuleSet};
use civiq_core::sla::{SlaConfig, SlaTable};

use crate::StoreError;
use crate::traits::{AuditStore, ConfigStore, EscalationStore, RateLimitStore, ReportStore};

/// Every table, serialized as one snapshot document.
#[derive(Debug, Serialize, Deserialize)]
struct Tables {
    reports: HashMap<Uuid, Report>,
    sla_table: SlaTable,
    priority_rules: RuleSet,
    rate_limits: HashMap<String, RateLimitRecord>,
    escalations: Vec<Escalation>,
    audit_log: Vec<AuditLogEntry>,
}

impl Default for Tables {
    fn default() -> Self {
        Self {
            reports: HashMap::new(),
            sla_table: SlaTable::builtin(),
            priority_rules: RuleSet::builtin(),
            rate_limits: HashMap::new(),
            escalations: Vec::new(),
            audit_log: Vec::new(),
        }
    }
}

/// The store behind every repository trait.
pub struct MemStore {
    tables: RwLock<Tables>,
    path: Option<PathBuf>,
}

impl MemStore {
    /// An ephemeral store seeded with the builtin SLA table and rules.
    pub fn open() -> Self {
        Self {
            tables: RwLock::new(Tables::default()),
            path: None,
        }
    }

    /// A file-backed store. When the snapshot file exists its tables are
    /// loaded; otherwise the store starts from the builtin seed and the
    /// file appears on the first [`save`](Self::save).
    pub fn open_persistent(path: &Path) -> Result<Self, StoreError> {
        let tables = if path.exists() {
            let bytes = std::fs::read(path)?;
            let tables: Tables = serde_json::from_slice(&bytes)?;
            info!(
                path = %path.display(),
                reports = tables.reports.len(),
                "loaded store snapshot"
            );
            tables
        } else {
            Tables::default()
        };
        Ok(Self {
            tables: RwLock::new(tables),
            path: Some(path.to_path_buf()),
        })
    }

    /// Write the snapshot via a temp file and rename, so a crash mid-write
    /// never truncates the previous snapshot.
    pub fn save(&self) -> Result<(), StoreError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let tables = self.read();
        let bytes = serde_json::to_vec_pretty(&*tables)?;
        let tmp = path.with_extension("tmp");
        std::fs::write(&tmp, &bytes)?;
        std::fs::rename(&tmp, path)?;
        info!(path = %path.display(), bytes = bytes.len(), "saved store snapshot");
        Ok(())
    }

    fn read(&self) -> RwLockReadGuard<'_, Tables> {
        self.tables.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Tables> {
        self.tables.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for MemStore {
    fn default() -> Self {
        Self::open()
    }
}

impl ReportStore for MemStore {
    fn insert(&self, report: Report) -> Result<(), StoreError> {
        self.write().reports.insert(report.id, report);
        Ok(())
    }

    fn get(&self, id: Uuid) -> Result<Option<Report>, StoreError> {
        Ok(self.read().reports.get(&id).cloned())
    }

    fn update(&self, report: &Report) -> Result<(), StoreError> {
        let mut tables = self.write();
        match tables.reports.get_mut(&report.id) {
            Some(row) => {
                *row = report.clone();
                Ok(())
            }
            None => Err(StoreError::NotFound {
                table: "reports",
                id: report.id.to_string(),
            }),
        }
    }

    fn list(&self) -> Result<Vec<Report>, StoreError> {
        let mut reports: Vec<Report> = self.read().reports.values().cloned().collect();
        reports.sort_by_key(|r| r.created_at);
        Ok(reports)
    }

    fn active_with_sla(&self) -> Result<Vec<Report>, StoreError> {
        let mut reports: Vec<Report> = self
            .read()
            .reports
            .values()
            .filter(|r| r.status.is_active() && r.sla_due_at.is_some())
            .cloned()
            .collect();
        reports.sort_by_key(|r| r.created_at);
        Ok(reports)
    }

    fn duplicate_candidates(
        &self,
        issue_type: IssueType,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<Report>, StoreError> {
        Ok(self
            .read()
            .reports
            .values()
            .filter(|r| r.issue_type == issue_type && r.created_at >= cutoff)
            .cloned()
            .collect())
    }
}

impl ConfigStore for MemStore {
    fn sla_config(&self, priority: Priority) -> Result<Option<SlaConfig>, StoreError> {
        Ok(self.read().sla_table.get(priority).copied())
    }

    fn sla_table(&self) -> Result<SlaTable, StoreError> {
        Ok(self.read().sla_table.clone())
    }

    fn priority_rules(&self) -> Result<RuleSet, StoreError> {
        Ok(self.read().priority_rules.clone())
    }

    fn set_sla_table(&self, table: SlaTable) -> Result<(), StoreError> {
        self.write().sla_table = table;
        Ok(())
    }

    fn set_priority_rules(&self, rules: RuleSet) -> Result<(), StoreError> {
        self.write().priority_rules = rules;
        Ok(())
    }
}

impl RateLimitStore for MemStore {
    fn check_and_consume(
        &self,
        submitter_id: &str,
        now: DateTime<Utc>,
    ) -> Result<RateLimitDecision, StoreError> {
        let mut tables = self.write();
        let record = tables
            .rate_limits
            .entry(submitter_id.to_string())
            .or_insert_with(|| RateLimitRecord::new(submitter_id, now));
        Ok(record.check_and_consume(now))
    }

    fn rate_limit_record(
        &self,
        submitter_id: &str,
    ) -> Result<Option<RateLimitRecord>, StoreError> {
        Ok(self.read().rate_limits.get(submitter_id).cloned())
    }

    fn set_trusted(
        &self,
        submitter_id: &str,
        trusted: bool,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut tables = self.write();
        let record = tables
            .rate_limits
            .entry(submitter_id.to_string())
            .or_insert_with(|| RateLimitRecord::new(submitter_id, now));
        record.is_trusted = trusted;
        Ok(())
    }

    fn set_blocked(
        &self,
        submitter_id: &str,
        blocked_until: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut tables = self.write();
        let record = tables
            .rate_limits
            .entry(submitter_id.to_string())
            .or_insert_with(|| RateLimitRecord::new(submitter_id, now));
        record.is_blocked = blocked_until.is_none_or(|until| until > now);
        record.blocked_until = blocked_until;
        Ok(())
    }
}

impl EscalationStore for MemStore {
    fn append_escalation(
        &self,
        report_id: Uuid,
        from_level: u8,
        to_level: u8,
        reason: String,
        created_at: DateTime<Utc>,
    ) -> Result<Escalation, StoreError> {
        let mut tables = self.write();
        let entry = Escalation {
            id: tables.escalations.len() as u64 + 1,
            report_id,
            from_level,
            to_level,
            reason,
            created_at,
        };
        tables.escalations.push(entry.clone());
        Ok(entry)
    }

    fn escalations_for(&self, report_id: Uuid) -> Result<Vec<Escalation>, StoreError> {
        Ok(self
            .read()
            .escalations
            .iter()
            .filter(|e| e.report_id == report_id)
            .cloned()
            .collect())
    }

    fn escalations(&self) -> Result<Vec<Escalation>, StoreError> {
        Ok(self.read().escalations.clone())
    }
}

impl AuditStore for MemStore {
    fn append_audit(&self, draft: AuditDraft) -> Result<AuditLogEntry, StoreError> {
        let mut tables = self.write();
        let seq = tables.audit_log.len() as u64 + 1;
        let prev_hash = tables
            .audit_log
            .last()
            .map(|e| e.hash.clone())
            .unwrap_or_else(|| audit::GENESIS_HASH.to_string());
        let entry = draft.seal(seq, &prev_hash);
        tables.audit_log.push(entry.clone());
        Ok(entry)
    }

    fn audit_for(&self, record_id: &str) -> Result<Vec<AuditLogEntry>, StoreError> {
        Ok(self
            .read()
            .audit_log
            .iter()
            .filter(|e| e.record_id == record_id)
            .cloned()
            .collect())
    }

    fn audit_log(&self) -> Result<Vec<AuditLogEntry>, StoreError> {
        Ok(self.read().audit_log.clone())
    }

    fn verify_audit_chain(&self) -> Result<Result<(), u64>, StoreError> {
        Ok(audit::verify_chain(&self.read().audit_log))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use civiq_core::audit::{AuditAction, AuditActor};
    use civiq_core::report::ReportStatus;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 5, 1, 10, 0, 0).unwrap()
    }

    fn sample_report() -> Report {
        Report::new(IssueType::Pothole, "hole", "deep hole", now())
    }

    #[test]
    fn insert_then_get_round_trips() {
        let store = MemStore::open();
        let report = sample_report();
        let id = report.id;
        store.insert(report).unwrap();
        assert_eq!(store.get(id).unwrap().unwrap().title, "hole");
    }

    #[test]
    fn update_unknown_report_is_not_found() {
        let store = MemStore::open();
        let report = sample_report();
        let err = store.update(&report).unwrap_err();
        assert!(matches!(err, StoreError::NotFound { table: "reports", .. }));
    }

    #[test]
    fn active_with_sla_filters_status_and_deadline() {
        let store = MemStore::open();

        let mut tracked = sample_report();
        tracked.sla_due_at = Some(now() + chrono::Duration::hours(72));
        store.insert(tracked.clone()).unwrap();

        let untracked = sample_report();
        store.insert(untracked).unwrap();

        let mut resolved = sample_report();
        resolved.status = ReportStatus::Resolved;
        resolved.sla_due_at = Some(now() + chrono::Duration::hours(72));
        store.insert(resolved).unwrap();

        let active = store.active_with_sla().unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id, tracked.id);
    }

    #[test]
    fn duplicate_candidates_filter_type_and_cutoff() {
        let store = MemStore::open();
        let fresh = sample_report();
        store.insert(fresh.clone()).unwrap();

        let mut stale = sample_report();
        stale.created_at = now() - chrono::Duration::hours(100);
        store.insert(stale).unwrap();

        let mut other_type = sample_report();
        other_type.issue_type = IssueType::Garbage;
        store.insert(other_type).unwrap();

        let cutoff = now() - chrono::Duration::hours(72);
        let candidates = store
            .duplicate_candidates(IssueType::Pothole, cutoff)
            .unwrap();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].id, fresh.id);
    }

    #[test]
    fn config_seeds_with_builtins() {
        let store = MemStore::open();
        assert!(store.sla_config(Priority::High).unwrap().is_some());
        assert_eq!(
            store.priority_rules().unwrap().base_weight(IssueType::Streetlight),
            0.8
        );
    }

    #[test]
    fn rate_limit_record_created_lazily() {
        let store = MemStore::open();
        assert!(store.rate_limit_record("c-1").unwrap().is_none());
        let decision = store.check_and_consume("c-1", now()).unwrap();
        assert!(decision.is_allowed());
        let record = store.rate_limit_record("c-1").unwrap().unwrap();
        assert_eq!(record.hourly_count, 1);
        assert_eq!(record.daily_count, 1);
    }

    #[test]
    fn trust_flag_survives_consumption() {
        let store = MemStore::open();
        store.set_trusted("c-2", true, now()).unwrap();
        for i in 0..5 {
            let d = store
                .check_and_consume("c-2", now() + chrono::Duration::minutes(i))
                .unwrap();
            assert!(d.is_allowed(), "trusted submission {i}");
        }
    }

    #[test]
    fn escalations_get_sequential_ids() {
        let store = MemStore::open();
        let report_id = Uuid::new_v4();
        let first = store
            .append_escalation(report_id, 0, 1, "late".into(), now())
            .unwrap();
        let second = store
            .append_escalation(report_id, 1, 2, "later".into(), now())
            .unwrap();
        assert_eq!(first.id, 1);
        assert_eq!(second.id, 2);
        assert_eq!(store.escalations_for(report_id).unwrap().len(), 2);
    }

    #[test]
    fn audit_entries_chain_and_verify() {
        let store = MemStore::open();
        for i in 0..3 {
            let draft = AuditDraft::for_report(
                format!("r-{i}"),
                AuditAction::Update,
                AuditActor::new("staff-1", "staff"),
                Some(serde_json::json!({"v": i})),
                Some(serde_json::json!({"v": i + 1})),
                now(),
            );
            store.append_audit(draft).unwrap();
        }
        let log = store.audit_log().unwrap();
        assert_eq!(log.len(), 3);
        assert_eq!(log[0].prev_hash, audit::GENESIS_HASH);
        assert_eq!(log[1].prev_hash, log[0].hash);
        assert_eq!(store.verify_audit_chain().unwrap(), Ok(()));
    }

    #[test]
    fn snapshot_round_trips_every_table() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("civiq.json");

        let store = MemStore::open_persistent(&path).unwrap();
        let report = sample_report();
        let report_id = report.id;
        store.insert(report).unwrap();
        store.check_and_consume("c-1", now()).unwrap();
        store
            .append_escalation(report_id, 0, 1, "late".into(), now())
            .unwrap();
        let draft = AuditDraft::for_report(
            report_id.to_string(),
            AuditAction::Create,
            AuditActor::new("c-1", "citizen"),
            None,
            Some(serde_json::json!({"status": "pending"})),
            now(),
        );
        store.append_audit(draft).unwrap();
        store.save().unwrap();
        drop(store);

        let reopened = MemStore::open_persistent(&path).unwrap();
        assert!(reopened.get(report_id).unwrap().is_some());
        assert_eq!(
            reopened.rate_limit_record("c-1").unwrap().unwrap().hourly_count,
            1
        );
        assert_eq!(reopened.escalations().unwrap().len(), 1);
        assert_eq!(reopened.verify_audit_chain().unwrap(), Ok(()));

        // The chain keeps extending from the reloaded tip.
        let draft = AuditDraft::for_report(
            report_id.to_string(),
            AuditAction::Update,
            AuditActor::new("staff-1", "staff"),
            Some(serde_json::json!({"status": "pending"})),
            Some(serde_json::json!({"status": "in_progress"})),
            now(),
        );
        reopened.append_audit(draft).unwrap();
        assert_eq!(reopened.verify_audit_chain().unwrap(), Ok(()));
    }

    #[test]
    fn save_without_path_is_a_no_op() {
        let store = MemStore::open();
        store.insert(sample_report()).unwrap();
        store.save().unwrap();
    }

    #[test]
    fn open_persistent_missing_file_starts_from_seed() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("new.json");
        let store = MemStore::open_persistent(&path).unwrap();
        assert!(store.list().unwrap().is_empty());
        assert!(store.sla_config(Priority::Low).unwrap().is_some());
        assert!(!path.exists());
        store.save().unwrap();
        assert!(path.exists());
    }
}
