use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum TenantryError {
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Index not found: {0}")]
    IndexNotFound(String),

    #[error("Index already exists: {0}")]
    IndexAlreadyExists(String),

    #[error("Conflicting mapping for field '{field}' between types '{first}' and '{second}'")]
    SchemaConflict {
        field: String,
        first: String,
        second: String,
    },

    #[error("Alias swap failed for '{alias}': {reason}")]
    AliasSwapFailed { alias: String, reason: String },

    #[error("Forbidden: {doc_type}/{id}")]
    Forbidden { doc_type: String, id: String },

    #[error("Not authorized to modify {doc_type}/{id}")]
    NotAuthorized { doc_type: String, id: String },

    #[error("Document not found: {doc_type}/{id}")]
    NotFound { doc_type: String, id: String },

    #[error("Document already exists: {doc_type}/{id}")]
    Conflict { doc_type: String, id: String },

    #[error("Invalid document: {0}")]
    InvalidDocument(String),

    #[error("JSON error: {0}")]
    Json(String),
}

pub type Result<T> = std::result::Result<T, TenantryError>;

impl From<serde_json::Error> for TenantryError {
    fn from(e: serde_json::Error) -> Self {
        TenantryError::Json(e.to_string())
    }
}

impl TenantryError {
    /// Whether a failed migration run may simply be re-invoked from current
    /// alias state (the old generation is still authoritative).
    pub fn is_retryable_migration_error(&self) -> bool {
        matches!(
            self,
            TenantryError::StoreUnavailable(_) | TenantryError::AliasSwapFailed { .. }
        )
    }
}
