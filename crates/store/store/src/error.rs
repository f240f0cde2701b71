use thiserror::Error;

/// Errors from the tabular store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{table}: row not found: {id}")]
    NotFound { table: &'static str, id: String },

    /// A unique constraint rejected the write. Callers that treat the
    /// collision as "row already exists" (alert creation, queue enqueue)
    /// match on this variant and look the existing row up.
    #[error("{table}: unique constraint violated: {constraint}")]
    UniqueViolation {
        table: &'static str,
        constraint: &'static str,
    },

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("backend error: {0}")]
    Backend(String),
}
