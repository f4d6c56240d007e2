//! Tamper-evident audit log for report mutations.
//!
//! Every create/update to a report appends exactly one entry carrying the
//! full before/after state and the changed-field list. Entries are
//! hash-chained: each entry commits to its predecessor's hash, so edits
//! anywhere in the history break verification from that point on.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

/// Hash of the (empty) history before the first entry.
pub const GENESIS_HASH: &str = "0000000000000000000000000000000000000000000000000000000000000000";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    Create,
    Update,
    Delete,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

/// Who performed a mutation; supplied by the identity layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditActor {
    pub id: String,
    pub role: String,
}

impl AuditActor {
    pub fn new(id: impl Into<String>, role: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            role: role.into(),
        }
    }

    /// The actor recorded for sweep-driven mutations.
    pub fn scheduler() -> Self {
        Self::new("escalation-scheduler", "system")
    }
}

/// One append-only audit entry. Immutable once written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditLogEntry {
    pub seq: u64,
    pub table_name: String,
    pub record_id: String,
    pub action: AuditAction,
    pub actor: String,
    pub actor_role: String,
    pub before: Option<Value>,
    pub after: Option<Value>,
    pub changed_fields: Vec<String>,
    pub prev_hash: String,
    pub hash: String,
    pub recorded_at: DateTime<Utc>,
}

/// Fields for a new entry before the store assigns seq and chain hashes.
#[derive(Debug, Clone)]
pub struct AuditDraft {
    pub table_name: String,
    pub record_id: String,
    pub action: AuditAction,
    pub actor: AuditActor,
    pub before: Option<Value>,
    pub after: Option<Value>,
    pub recorded_at: DateTime<Utc>,
}

impl AuditDraft {
    /// Draft an entry for a report mutation; the changed-field list is
    /// derived from the two states.
    pub fn for_report(
        record_id: impl Into<String>,
        action: AuditAction,
        actor: AuditActor,
        before: Option<Value>,
        after: Option<Value>,
        recorded_at: DateTime<Utc>,
    ) -> Self {
        Self {
            table_name: "reports".to_string(),
            record_id: record_id.into(),
            action,
            actor,
            before,
            after,
            recorded_at,
        }
    }

    /// Seal the draft into a chained entry.
    pub fn seal(self, seq: u64, prev_hash: &str) -> AuditLogEntry {
        let changed = changed_fields(self.before.as_ref(), self.after.as_ref());
        let mut entry = AuditLogEntry {
            seq,
            table_name: self.table_name,
            record_id: self.record_id,
            action: self.action,
            actor: self.actor.id,
            actor_role: self.actor.role,
            before: self.before,
            after: self.after,
            changed_fields: changed,
            prev_hash: prev_hash.to_string(),
            hash: String::new(),
            recorded_at: self.recorded_at,
        };
        entry.hash = entry_hash(&entry);
        entry
    }
}

/// Top-level JSON keys whose value differs between the two states.
///
/// Keys present on only one side count as changed. Order is sorted for
/// stable output.
pub fn changed_fields(before: Option<&Value>, after: Option<&Value>) -> Vec<String> {
    let empty = serde_json::Map::new();
    let before_map = before.and_then(Value::as_object).unwrap_or(&empty);
    let after_map = after.and_then(Value::as_object).unwrap_or(&empty);

    let mut fields: Vec<String> = before_map
        .iter()
        .filter(|(key, value)| after_map.get(*key) != Some(value))
        .map(|(key, _)| key.clone())
        .collect();
    for key in after_map.keys() {
        if !before_map.contains_key(key) {
            fields.push(key.clone());
        }
    }
    fields.sort();
    fields.dedup();
    fields
}

/// Hash an entry's content together with its predecessor's hash.
pub fn entry_hash(entry: &AuditLogEntry) -> String {
    let mut hasher = Sha256::new();
    hasher.update(entry.prev_hash.as_bytes());
    hasher.update(entry.seq.to_be_bytes());
    hasher.update(entry.table_name.as_bytes());
    hasher.update(entry.record_id.as_bytes());
    hasher.update(entry.action.as_str().as_bytes());
    hasher.update(entry.actor.as_bytes());
    hasher.update(entry.actor_role.as_bytes());
    if let Some(before) = &entry.before {
        hasher.update(before.to_string().as_bytes());
    }
    if let Some(after) = &entry.after {
        hasher.update(after.to_string().as_bytes());
    }
    hasher.update(entry.changed_fields.join(",").as_bytes());
    hasher.update(entry.recorded_at.to_rfc3339().as_bytes());
    to_hex(&hasher.finalize())
}

/// Verify a chain slice taken from the start of the log.
///
/// Returns the seq of the first entry whose linkage or content hash fails,
/// or `Ok(())` for an intact chain.
pub fn verify_chain(entries: &[AuditLogEntry]) -> Result<(), u64> {
    let mut prev = GENESIS_HASH.to_string();
    for entry in entries {
        if entry.prev_hash != prev || entry_hash(entry) != entry.hash {
            return Err(entry.seq);
        }
        prev = entry.hash.clone();
    }
    Ok(())
}

fn to_hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        out.push_str(&format!("{b:02x}"));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 2, 1, 8, 0, 0).unwrap()
    }

    fn draft(record: &str, action: AuditAction, before: Option<Value>, after: Option<Value>) -> AuditDraft {
        AuditDraft::for_report(record, action, AuditActor::new("staff-1", "staff"), before, after, at())
    }

    #[test]
    fn changed_fields_diffs_top_level_keys() {
        let before = json!({"status": "pending", "title": "hole", "escalation_level": 0});
        let after = json!({"status": "in_progress", "title": "hole", "escalation_level": 0});
        assert_eq!(
            changed_fields(Some(&before), Some(&after)),
            vec!["status".to_string()]
        );
    }

    #[test]
    fn create_marks_every_field_changed() {
        let after = json!({"status": "pending", "title": "hole"});
        let fields = changed_fields(None, Some(&after));
        assert_eq!(fields, vec!["status".to_string(), "title".to_string()]);
    }

    #[test]
    fn identical_states_change_nothing() {
        let state = json!({"a": 1, "b": 2});
        assert!(changed_fields(Some(&state), Some(&state)).is_empty());
    }

    #[test]
    fn sealed_entry_carries_its_own_hash() {
        let entry = draft("r-1", AuditAction::Create, None, Some(json!({"x": 1})))
            .seal(1, GENESIS_HASH);
        assert_eq!(entry.hash, entry_hash(&entry));
        assert_eq!(entry.prev_hash, GENESIS_HASH);
        assert_eq!(entry.hash.len(), 64);
    }

    #[test]
    fn intact_chain_verifies() {
        let first = draft("r-1", AuditAction::Create, None, Some(json!({"x": 1})))
            .seal(1, GENESIS_HASH);
        let second = draft(
            "r-1",
            AuditAction::Update,
            Some(json!({"x": 1})),
            Some(json!({"x": 2})),
        )
        .seal(2, &first.hash);
        assert_eq!(verify_chain(&[first, second]), Ok(()));
    }

    #[test]
    fn tampered_entry_breaks_the_chain() {
        let first = draft("r-1", AuditAction::Create, None, Some(json!({"x": 1})))
            .seal(1, GENESIS_HASH);
        let mut second = draft(
            "r-1",
            AuditAction::Update,
            Some(json!({"x": 1})),
            Some(json!({"x": 2})),
        )
        .seal(2, &first.hash);
        let third = draft(
            "r-1",
            AuditAction::Update,
            Some(json!({"x": 2})),
            Some(json!({"x": 3})),
        )
        .seal(3, &second.hash);

        second.after = Some(json!({"x": 99}));
        assert_eq!(verify_chain(&[first, second, third]), Err(2));
    }

    #[test]
    fn broken_linkage_is_detected() {
        let first = draft("r-1", AuditAction::Create, None, Some(json!({"x": 1})))
            .seal(1, GENESIS_HASH);
        // Second entry chained to the wrong predecessor.
        let second = draft(
            "r-1",
            AuditAction::Update,
            Some(json!({"x": 1})),
            Some(json!({"x": 2})),
        )
        .seal(2, GENESIS_HASH);
        assert_eq!(verify_chain(&[first, second]), Err(2));
    }

    #[test]
    fn empty_chain_is_valid() {
        assert_eq!(verify_chain(&[]), Ok(()));
    }

    #[test]
    fn scheduler_actor_is_system_role() {
        let actor = AuditActor::scheduler();
        assert_eq!(actor.role, "system");
    }
}
