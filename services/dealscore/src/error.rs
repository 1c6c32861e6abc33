use std::path::PathBuf;

/// Fatal pipeline failures. Per-record problems never surface here; they are
/// counted in [`crate::pipeline::PipelineReport`] instead.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// A required column is structurally absent, or the input is not an
    /// array of objects.
    #[error("schema error: {0}")]
    Schema(String),

    /// A present value violates an invariant (null `deal_id`).
    #[error("validation error: {0}")]
    Validation(String),

    #[error("failed to read {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse JSON in {path:?}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl PipelineError {
    pub fn schema(msg: impl Into<String>) -> Self {
        Self::Schema(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }
}

pub type PipelineResult<T> = std::result::Result<T, PipelineError>;
