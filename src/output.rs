use std::io::{self, Write};

use serde::Serialize;

use crate::app::{ProgressSink, SubmitResult, UploadEvent};

#[derive(Debug, Clone, Copy)]
pub enum OutputMode {
    Human,
    Json,
}

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_submit(result: &SubmitResult) -> io::Result<()> {
        Self::print_json(result)
    }

    fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}

/// Renders progress as log lines on the tracing subscriber.
pub struct TracingSink;

impl ProgressSink for TracingSink {
    fn event(&self, event: UploadEvent) {
        match event {
            UploadEvent::ManifestRewritten { manifest, files } => {
                tracing::info!("rewritten manifest at {manifest}, {files} file(s) to upload");
            }
            UploadEvent::SessionAllocated { session } => {
                tracing::info!("upload session {session}");
            }
            UploadEvent::ParametersSaved { .. } => {
                tracing::info!("job information is sent to the server");
            }
            UploadEvent::ParametersNotSaved { session, reason } => {
                tracing::warn!("could not save job parameters for session {session}: {reason}");
            }
            UploadEvent::FileStarted { path, size, chunks } => {
                tracing::info!("uploading file {path} ({size} bytes, {chunks} chunk(s))");
            }
            UploadEvent::ChunkSent {
                path,
                range,
                attempts,
            } => {
                tracing::debug!(attempts, "{path}: sent {range}");
            }
            UploadEvent::ChunkRetry {
                path,
                range,
                attempt,
                max_attempts,
                reason,
            } => {
                tracing::warn!(
                    "{path}: {range} failed (attempt {attempt}/{max_attempts}): {reason}; retrying"
                );
            }
            UploadEvent::FileFinished {
                path,
                chunks,
                elapsed,
            } => {
                tracing::info!(
                    "finished uploading file {path} ({chunks} chunk(s) in {:.1}s)",
                    elapsed.as_secs_f64()
                );
            }
            UploadEvent::FileAbandoned {
                path,
                session,
                reason,
            } => {
                tracing::warn!(
                    "could not upload {path}: {reason}. Please report this id to the CREMA administrators: {session}"
                );
            }
            UploadEvent::ScratchRemoved { path } => {
                tracing::debug!("removed scratch directory {}", path.display());
            }
            UploadEvent::JobStarted { session, .. } => {
                tracing::info!("analysis started for session {session}");
            }
        }
    }
}
