//! Error types for the DryScan core — one variant per error kind named in the
//! duplication-engine design, each carrying enough context to point the user
//! at the offending file, key, or config entry.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias used throughout the core.
pub type Result<T> = std::result::Result<T, DryError>;

#[derive(Error, Debug)]
pub enum DryError {
    /// The config file is unparseable or violates the schema (unknown key,
    /// wrong type, threshold out of range, ...). Fatal for the invoking
    /// operation.
    #[error("invalid config at {path}: {detail}")]
    ConfigInvalid { path: PathBuf, detail: String },

    /// A requested scan target (repo root, explicit file) does not exist.
    #[error("path not found: {}", path.display())]
    PathNotFound { path: PathBuf },

    /// An explicit scan of a single file hit an unsupported extension. Only
    /// raised for explicit targets — directory walks silently skip these.
    #[error("unsupported file type: {}", path.display())]
    UnsupportedFile { path: PathBuf },

    /// The extractor failed on a file. Per-file fatal: the file is skipped
    /// with this diagnostic and its `FileRecord` is left untouched so the
    /// next run retries it.
    #[error("failed to parse {path}: {detail}")]
    ParseFailure { path: String, detail: String },

    /// A store operation was attempted before `init`. Programming error.
    #[error("index store used before initialization at {path}")]
    StoreUninitialized { path: PathBuf },

    /// The embedding provider returned an error (as opposed to an oversize
    /// skip, which is not an error — see `EmbeddingClient::embed`).
    #[error("embedding provider unavailable: {0}")]
    EmbeddingUnavailable(String),

    /// `applyExclusionFromLatestReport` found no report artifact.
    #[error("no report found in {}", dir.display())]
    ReportMissing { dir: PathBuf },

    /// `applyExclusionFromLatestReport` was given a shortId absent from the
    /// latest report.
    #[error("unknown short id: {0}")]
    ShortIdUnknown(String),

    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("index store error: {0}")]
    Store(#[from] sled::Error),

    #[error("serialization error: {0}")]
    Serialize(#[from] bincode::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl DryError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        DryError::Io { path: path.into(), source }
    }

    /// Short kind identifier, useful for log fields and test assertions.
    pub fn kind(&self) -> &'static str {
        match self {
            DryError::ConfigInvalid { .. } => "ConfigInvalid",
            DryError::PathNotFound { .. } => "PathNotFound",
            DryError::UnsupportedFile { .. } => "UnsupportedFile",
            DryError::ParseFailure { .. } => "ParseFailure",
            DryError::StoreUninitialized { .. } => "StoreUninitialized",
            DryError::EmbeddingUnavailable(_) => "EmbeddingUnavailable",
            DryError::ReportMissing { .. } => "ReportMissing",
            DryError::ShortIdUnknown(_) => "ShortIdUnknown",
            DryError::Io { .. } => "Io",
            DryError::Store(_) => "Store",
            DryError::Serialize(_) => "Serialize",
            DryError::Json(_) => "Json",
        }
    }
}
