//! Error taxonomy for the persistence engine
//!
//! Validation-class errors propagate unmodified to the caller of a save.
//! Integrity checks and migrations report findings as data instead.

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors that can occur while persisting or loading content
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A local invariant would be broken by the requested operation.
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    #[error(
        "Property type '{property_type}' varies by more than its content type '{content_type}' allows"
    )]
    VariationMismatch {
        content_type: String,
        property_type: String,
    },

    #[error("Entity {id} cannot be saved without a name")]
    EmptyName { id: i32 },

    /// A batched statement would exceed the store's parameter ceiling.
    #[error("Not supported: {0}")]
    NotSupported(String),

    /// An object-type tag with no known mapping was found. Never expected at
    /// runtime; callers should not attempt recovery.
    #[error("Unexpected object type: {0}")]
    UnexpectedObjectType(String),

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },

    #[error("Alias '{0}' is already in use")]
    DuplicateAlias(String),

    #[error("Invalid ordering: {0}")]
    InvalidOrdering(String),

    /// Raised in strict loading mode when one version id resolves to more
    /// than one row set.
    #[error("Version {0} resolved to more than one property row set")]
    DuplicateVersion(i32),

    #[error("Corrupt stored data: {0}")]
    Corrupt(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
}

impl StoreError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        StoreError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Whether the error belongs to the validation class (rejected input)
    /// rather than a storage or schema failure.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            StoreError::InvariantViolation(_)
                | StoreError::VariationMismatch { .. }
                | StoreError::EmptyName { .. }
                | StoreError::DuplicateAlias(_)
                | StoreError::InvalidOrdering(_)
        )
    }
}
