//! Terminal rendering for reports and engine results.
//!
//! Single reports render as a grouped, human-readable card; lists render
//! one line per report.

use chrono::{DateTime, Utc};

use civiq_core::audit::AuditLogEntry;
use civiq_core::escalation::Escalation;
use civiq_core::duplicate::DuplicateMatch;
use civiq_core::ratelimit::DenyReason;
use civiq_core::report::Report;
use civiq_engine::SweepReport;

fn stamp(t: DateTime<Utc>) -> String {
    t.format("%Y-%m-%d %H:%M UTC").to_string()
}

fn opt(value: &Option<String>) -> &str {
    value.as_deref().unwrap_or("—")
}

/// Vertical card for one report, grouped by section.
pub fn print_report(report: &Report) {
    println!("── report {} ──", report.id);

    println!("  [identity]");
    println!("    type:         {}", report.issue_type);
    println!("    title:        {}", report.title);
    println!("    description:  {}", report.description);
    println!("    submitted by: {}", opt(&report.created_by));
    println!("    assigned to:  {}", opt(&report.assigned_to));

    println!("  [location]");
    match report.coordinates {
        Some(c) => println!("    lat/lng:      {:.6}, {:.6}", c.latitude, c.longitude),
        None => println!("    lat/lng:      —"),
    }
    println!("    address:      {}", opt(&report.address));
    println!("    municipality: {}", opt(&report.municipality));

    println!("  [triage]");
    println!("    status:       {}", report.status);
    match (report.priority, report.priority_score) {
        (Some(priority), Some(score)) => {
            println!("    priority:     {priority} (score {score:.3})");
        }
        _ => println!("    priority:     not scored"),
    }
    match report.ai_detected_type {
        Some(detected) => println!(
            "    ai detection: {} (confidence {:.2})",
            detected, report.ai_confidence
        ),
        None => println!("    ai detection: none (confidence {:.2})", report.ai_confidence),
    }

    println!("  [sla]");
    match report.sla_due_at {
        Some(due) => println!("    due:          {}", stamp(due)),
        None => println!("    due:          untracked"),
    }
    println!("    escalation:   level {}", report.escalation_level);

    if report.is_duplicate || report.duplicate_count > 0 {
        println!("  [duplicates]");
        if let Some(original) = report.duplicate_of {
            println!("    duplicate of: {original}");
        }
        if report.duplicate_count > 0 {
            println!("    duplicates:   {} reports point here", report.duplicate_count);
        }
    }

    println!("  [timestamps]");
    println!("    created:      {}", stamp(report.created_at));
    println!("    updated:      {}", stamp(report.updated_at));
    if let Some(resolved) = report.resolved_at {
        println!("    resolved:     {}", stamp(resolved));
    }
}

/// One line per report.
pub fn print_report_lines(reports: &[Report]) {
    if reports.is_empty() {
        println!("no reports");
        return;
    }
    for report in reports {
        let priority = report
            .priority
            .map(|p| p.as_str())
            .unwrap_or("unscored");
        println!(
            "{}  {:12} {:11} L{}  {}",
            report.id, report.issue_type, priority, report.escalation_level, report.title
        );
    }
    println!("{} report(s)", reports.len());
}

pub fn print_rate_limited(reason: DenyReason, reset_at: Option<DateTime<Utc>>) {
    match reset_at {
        Some(at) => println!("submission denied: {} (try again after {})", reason.message(), stamp(at)),
        None => println!("submission denied: {}", reason.message()),
    }
}

pub fn print_duplicate_warning(found: &DuplicateMatch) {
    println!(
        "possible duplicate of {} ({:?}) — {:.0}m away, reported {}h ago",
        found.report_id, found.title, found.distance_meters, found.hours_ago
    );
}

pub fn print_sweep(sweep: &SweepReport) {
    println!(
        "sweep: {} active report(s) scanned, {} escalated, {} failure(s)",
        sweep.processed,
        sweep.escalated.len(),
        sweep.failures.len()
    );
    for e in &sweep.escalated {
        println!("  {}  level {} -> {}", e.report_id, e.from_level, e.to_level);
    }
    for f in &sweep.failures {
        println!("  {}  FAILED: {}", f.report_id, f.error);
    }
}

pub fn print_audit(entries: &[AuditLogEntry], chain: Result<(), u64>) {
    if entries.is_empty() {
        println!("no audit entries");
        return;
    }
    for entry in entries {
        println!(
            "#{:<4} {}  {:7} by {} ({})  [{}]",
            entry.seq,
            stamp(entry.recorded_at),
            entry.action.as_str(),
            entry.actor,
            entry.actor_role,
            entry.changed_fields.join(", ")
        );
    }
    match chain {
        Ok(()) => println!("audit chain: intact"),
        Err(seq) => println!("audit chain: BROKEN at entry #{seq}"),
    }
}

pub fn print_escalations(entries: &[Escalation]) {
    if entries.is_empty() {
        println!("no escalations");
        return;
    }
    for e in entries {
        println!(
            "#{:<4} {}  level {} -> {}  {}",
            e.id,
            stamp(e.created_at),
            e.from_level,
            e.to_level,
            e.reason
        );
    }
}
