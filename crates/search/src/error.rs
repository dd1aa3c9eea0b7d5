use thiserror::Error;

/// Error taxonomy for the tenant search core.
///
/// Per-document failures during a build are collected into
/// [`crate::builder::IndexBuildResult::errors`] rather than raised here;
/// these variants are for whole-segment or query-time failures that a
/// caller must handle structurally.
#[derive(Error, Debug)]
pub enum SearchError {
    #[error("storage error: {0}")]
    Storage(String),

    #[error("index version error: {0} (reindex required)")]
    IndexVersion(String),

    #[error("document load error: {0}")]
    DocumentLoad(String),

    #[error("schema mismatch: {0}")]
    SchemaMismatch(String),

    #[error("query timed out before completion")]
    QueryTimeout,

    #[error("duplicate document for unique field: {0}")]
    DuplicateDocument(String),

    #[error("no search index for tenant {0}")]
    IndexMissing(String),
}

pub type Result<T> = std::result::Result<T, SearchError>;

impl SearchError {
    pub fn storage(msg: impl Into<String>) -> Self {
        SearchError::Storage(msg.into())
    }

    pub fn index_version(msg: impl Into<String>) -> Self {
        SearchError::IndexVersion(msg.into())
    }

    pub fn document_load(msg: impl Into<String>) -> Self {
        SearchError::DocumentLoad(msg.into())
    }
}
