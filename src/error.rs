use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum UploadError {
    #[error("malformed manifest: {reason}")]
    #[diagnostic(help("check the file formatting: tab separated, header row with a `fq1` column"))]
    MalformedManifest {
        reason: String,
        line: Option<usize>,
        row: Option<String>,
    },

    #[error("failed to read manifest at {0}")]
    ManifestRead(PathBuf),

    #[error("input file not found: {0}")]
    MissingInputFile(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),

    #[error("failed to encode job parameters: {0}")]
    Encode(String),

    #[error("could not obtain an upload session: {0}")]
    SessionAllocation(String),

    #[error("{endpoint} request failed: {message}")]
    Transport { endpoint: String, message: String },

    #[error("{endpoint} returned status {status}: {message}")]
    Status {
        endpoint: String,
        status: u16,
        message: String,
    },

    #[error("chunk {range} not accepted after {attempts} attempts: {last}")]
    ChunkRetriesExhausted {
        range: String,
        attempts: u32,
        last: String,
    },

    #[error("could not start the analysis job: {0}")]
    JobTrigger(String),

    #[error("upload incomplete for session {session}: {} file(s) not fully sent", .files.len())]
    #[diagnostic(help("report the session id to the CREMA administrators"))]
    IncompleteUpload { session: String, files: Vec<String> },

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl UploadError {
    pub fn malformed(reason: impl Into<String>) -> Self {
        UploadError::MalformedManifest {
            reason: reason.into(),
            line: None,
            row: None,
        }
    }

    /// True for failures that happened on the wire rather than locally.
    pub fn is_remote(&self) -> bool {
        matches!(
            self,
            UploadError::Transport { .. }
                | UploadError::Status { .. }
                | UploadError::ChunkRetriesExhausted { .. }
                | UploadError::SessionAllocation(_)
                | UploadError::JobTrigger(_)
                | UploadError::IncompleteUpload { .. }
        )
    }
}
