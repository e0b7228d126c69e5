use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization/deserialization error: {0}")]
    Serialization(String),

    #[error("Item not found: {0}")]
    NotFound(String),

    #[error("Database backend error: {0}")]
    Backend(#[from] Box<dyn std::error::Error + Send + Sync>),

    #[error("Database connection error: {0}")]
    Connection(String),

    #[error("Database operation error: {0}")]
    Database(String),

    #[error("device JID must be known before accessing database")]
    DeviceIdMustBeSet,

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Pre-key ID space exhausted (max {max})")]
    PreKeyIdsExhausted { max: u32 },
}

impl StoreError {
    /// Failures of the underlying engine that may succeed on a later attempt.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            StoreError::Io(_)
                | StoreError::Backend(_)
                | StoreError::Connection(_)
                | StoreError::Database(_)
        )
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }

    /// Caller bugs: retrying cannot help.
    pub fn is_invariant_violation(&self) -> bool {
        matches!(
            self,
            StoreError::DeviceIdMustBeSet
                | StoreError::InvalidArgument(_)
                | StoreError::PreKeyIdsExhausted { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;
