use thiserror::Error;
use uuid::Uuid;

use civiq_core::report::ReportStatus;
use civiq_store::StoreError;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("invalid status transition: {from} -> {to}")]
    InvalidTransition {
        from: ReportStatus,
        to: ReportStatus,
    },

    #[error("unknown report: {0}")]
    UnknownReport(Uuid),

    #[error("only the original submitter may reopen a report")]
    NotSubmitter,

    #[error("an escalation sweep is already running")]
    SweepAlreadyRunning,

    #[error("failed to encode report state: {0}")]
    Encode(#[from] serde_json::Error),
}
