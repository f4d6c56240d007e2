use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{table} record not found: {id}")]
    NotFound { table: &'static str, id: String },

    #[error("snapshot i/o error: {0}")]
    Snapshot(#[from] std::io::Error),

    #[error("corrupt snapshot: {0}")]
    Corrupt(#[from] serde_json::Error),
}
