use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use uuid::Uuid;

use civiq_core::audit::AuditActor;
use civiq_core::report::{Coordinates, IssueType, ReportStatus};
use civiq_engine::{Engine, NewReport, SubmissionOutcome};
use civiq_notify::{LogNotifier, Notifier, WebhookNotifier};
use civiq_store::{AuditStore, EscalationStore, MemStore, RateLimitStore, ReportStore};

mod display;

#[derive(Parser)]
#[command(name = "civiq", version, about = "Civic-issue triage engine")]
struct Cli {
    /// Snapshot file for persistent state; ephemeral when omitted.
    #[arg(long, global = true, env = "CIVIQ_DB")]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Submit a citizen report through the triage pipeline.
    Submit {
        #[arg(long = "type")]
        issue_type: IssueType,
        #[arg(long)]
        title: String,
        #[arg(long)]
        description: String,
        #[arg(long, requires = "lng")]
        lat: Option<f64>,
        #[arg(long, requires = "lat")]
        lng: Option<f64>,
        #[arg(long)]
        address: Option<String>,
        #[arg(long)]
        municipality: Option<String>,
        #[arg(long)]
        submitter: String,
        /// Emergency-category submission: forced critical priority.
        #[arg(long)]
        emergency: bool,
    },
    /// List reports, optionally filtered by status.
    List {
        #[arg(long)]
        status: Option<ReportStatus>,
    },
    /// Show one report as a card.
    Show { id: Uuid },
    /// Staff status transition.
    Status {
        id: Uuid,
        status: ReportStatus,
        #[arg(long)]
        actor: String,
        #[arg(long, default_value = "staff")]
        role: String,
    },
    /// Submitter-initiated reopen of a resolved report.
    Reopen {
        id: Uuid,
        #[arg(long)]
        actor: String,
    },
    /// Assign a report to a staff member.
    Assign {
        id: Uuid,
        staff: String,
        #[arg(long)]
        actor: String,
    },
    /// Run one escalation sweep over active reports.
    Sweep {
        /// POST escalation events to this base URL instead of logging.
        #[arg(long)]
        webhook: Option<String>,
    },
    /// Show the audit trail for a report.
    Audit { id: Uuid },
    /// Show the escalation log for a report.
    Escalations { id: Uuid },
    /// Raise (or revoke) a submitter's rate-limit trust tier.
    Trust {
        submitter: String,
        #[arg(long)]
        revoke: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();
    tracing::info!("civiq v{}", env!("CARGO_PKG_VERSION"));
    let cli = Cli::parse();

    let store = match &cli.db {
        Some(path) => MemStore::open_persistent(path)
            .with_context(|| format!("opening snapshot {}", path.display()))?,
        None => MemStore::open(),
    };
    let store = Arc::new(store);

    let notifier: Box<dyn Notifier> = match &cli.command {
        Command::Sweep {
            webhook: Some(url), ..
        } => Box::new(WebhookNotifier::new(url.clone())),
        _ => Box::new(LogNotifier),
    };
    let engine = Engine::new(store.clone(), notifier);

    match cli.command {
        Command::Submit {
            issue_type,
            title,
            description,
            lat,
            lng,
            address,
            municipality,
            submitter,
            emergency,
        } => {
            let coordinates = match (lat, lng) {
                (Some(latitude), Some(longitude)) => Some(Coordinates {
                    latitude,
                    longitude,
                }),
                _ => None,
            };
            let outcome = engine.submit(NewReport {
                issue_type,
                title,
                description,
                coordinates,
                address,
                municipality,
                submitter_id: submitter,
                emergency,
            })?;
            match outcome {
                SubmissionOutcome::RateLimited { reason, reset_at } => {
                    display::print_rate_limited(reason, reset_at);
                }
                SubmissionOutcome::Accepted {
                    report,
                    duplicate,
                    remaining_hourly,
                    remaining_daily,
                } => {
                    display::print_report(&report);
                    if let Some(found) = duplicate {
                        display::print_duplicate_warning(&found);
                    }
                    println!(
                        "submissions left: {remaining_hourly} this hour, {remaining_daily} today"
                    );
                }
            }
        }
        Command::List { status } => {
            let mut reports = store.list()?;
            if let Some(status) = status {
                reports.retain(|r| r.status == status);
            }
            display::print_report_lines(&reports);
        }
        Command::Show { id } => {
            let Some(report) = store.get(id)? else {
                bail!("no report with id {id}");
            };
            display::print_report(&report);
        }
        Command::Status {
            id,
            status,
            actor,
            role,
        } => {
            let report = engine.update_status(id, status, &AuditActor::new(actor, role))?;
            display::print_report(&report);
        }
        Command::Reopen { id, actor } => {
            let report = engine.reopen(id, &AuditActor::new(actor, "citizen"))?;
            display::print_report(&report);
        }
        Command::Assign { id, staff, actor } => {
            let report = engine.assign(id, &staff, &AuditActor::new(actor, "staff"))?;
            display::print_report(&report);
        }
        Command::Sweep { .. } => {
            let sweep = engine.run_sweep().await?;
            display::print_sweep(&sweep);
        }
        Command::Audit { id } => {
            let entries = store.audit_for(&id.to_string())?;
            let chain = store.verify_audit_chain()?;
            display::print_audit(&entries, chain);
        }
        Command::Escalations { id } => {
            let entries = store.escalations_for(id)?;
            display::print_escalations(&entries);
        }
        Command::Trust { submitter, revoke } => {
            store.set_trusted(&submitter, !revoke, chrono::Utc::now())?;
            println!(
                "{submitter} is now {}",
                if revoke { "untrusted" } else { "trusted" }
            );
        }
    }

    store.save()?;
    Ok(())
}
