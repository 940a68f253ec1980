use std::path::PathBuf;
use std::time::Duration;

use camino::Utf8PathBuf;
use serde::Serialize;

use crate::domain::{ByteRange, JobParameters, SessionId};
use crate::error::UploadError;
use crate::manifest::{ManifestRewriter, RewrittenManifest};
use crate::server::CremaServer;
use crate::upload::{ChunkedUploader, DEFAULT_CHUNK_SIZE, FileReport, RetryPolicy, Sleep};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadSettings {
    pub retry: RetryPolicy,
    pub chunk_size: usize,
    /// Refuse to start the job when any file could not be sent.
    pub fail_on_incomplete: bool,
}

impl Default for UploadSettings {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            fail_on_incomplete: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SubmitRequest {
    pub manifest: Utf8PathBuf,
    pub parameters: JobParameters,
    /// Where the scratch directory for the rewritten manifest is created.
    pub scratch_root: PathBuf,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubmitResult {
    pub session_id: SessionId,
    pub result_link: String,
    pub parameters_saved: bool,
    pub files: Vec<FileReport>,
    pub incomplete_files: Vec<String>,
    pub submitted_at: String,
}

#[derive(Debug, Clone)]
pub enum UploadEvent {
    ManifestRewritten {
        manifest: Utf8PathBuf,
        files: usize,
    },
    SessionAllocated {
        session: SessionId,
    },
    ParametersSaved {
        session: SessionId,
    },
    ParametersNotSaved {
        session: SessionId,
        reason: String,
    },
    FileStarted {
        path: Utf8PathBuf,
        size: u64,
        chunks: u64,
    },
    ChunkSent {
        path: Utf8PathBuf,
        range: ByteRange,
        attempts: u32,
    },
    ChunkRetry {
        path: Utf8PathBuf,
        range: ByteRange,
        attempt: u32,
        max_attempts: u32,
        reason: String,
    },
    FileFinished {
        path: Utf8PathBuf,
        chunks: usize,
        elapsed: Duration,
    },
    FileAbandoned {
        path: Utf8PathBuf,
        session: SessionId,
        reason: String,
    },
    ScratchRemoved {
        path: PathBuf,
    },
    JobStarted {
        session: SessionId,
        link: String,
    },
}

pub trait ProgressSink {
    fn event(&self, event: UploadEvent);
}

pub struct App<S: CremaServer, Z: Sleep> {
    server: S,
    sleeper: Z,
    settings: UploadSettings,
}

impl<S: CremaServer, Z: Sleep> App<S, Z> {
    pub fn new(server: S, sleeper: Z, settings: UploadSettings) -> Self {
        Self {
            server,
            sleeper,
            settings,
        }
    }

    pub fn server(&self) -> &S {
        &self.server
    }

    pub fn submit(
        &self,
        request: &SubmitRequest,
        sink: &dyn ProgressSink,
    ) -> Result<SubmitResult, UploadError> {
        // Everything local is validated before the first request goes out.
        let rewritten = ManifestRewriter::rewrite(&request.manifest, &request.scratch_root)?;
        sink.event(UploadEvent::ManifestRewritten {
            manifest: rewritten.manifest_path.clone(),
            files: rewritten.upload_set.len(),
        });
        verify_inputs(&rewritten)?;

        let session = self.server.allocate_session().map_err(|err| match err {
            UploadError::SessionAllocation(_) => err,
            other => UploadError::SessionAllocation(other.to_string()),
        })?;
        sink.event(UploadEvent::SessionAllocated {
            session: session.clone(),
        });

        let parameters_saved = match self.server.save_parameters(&session, &request.parameters) {
            Ok(()) => {
                sink.event(UploadEvent::ParametersSaved {
                    session: session.clone(),
                });
                true
            }
            Err(err) => {
                sink.event(UploadEvent::ParametersNotSaved {
                    session: session.clone(),
                    reason: err.to_string(),
                });
                false
            }
        };

        let uploader = ChunkedUploader::new(
            &self.server,
            &self.sleeper,
            self.settings.retry,
            self.settings.chunk_size,
        );
        let files = rewritten
            .upload_set
            .iter()
            .map(|path| uploader.upload_file(&session, path, sink))
            .collect::<Vec<_>>();

        let scratch_path = rewritten.scratch.path().to_path_buf();
        match rewritten.scratch.remove() {
            Ok(true) => sink.event(UploadEvent::ScratchRemoved { path: scratch_path }),
            Ok(false) => {}
            Err(err) => tracing::warn!("could not remove scratch directory: {err}"),
        }

        let incomplete_files = files
            .iter()
            .filter(|report| !report.is_complete())
            .map(|report| report.path.clone())
            .collect::<Vec<_>>();
        if self.settings.fail_on_incomplete && !incomplete_files.is_empty() {
            return Err(UploadError::IncompleteUpload {
                session: session.to_string(),
                files: incomplete_files,
            });
        }

        let result_link = self
            .server
            .run_job(&session, &request.parameters)
            .map_err(|err| match err {
                UploadError::JobTrigger(_) => err,
                other => UploadError::JobTrigger(other.to_string()),
            })?
            .trim()
            .to_string();
        if result_link.is_empty() {
            return Err(UploadError::JobTrigger(
                "server returned an empty result link".to_string(),
            ));
        }
        sink.event(UploadEvent::JobStarted {
            session: session.clone(),
            link: result_link.clone(),
        });

        Ok(SubmitResult {
            session_id: session,
            result_link,
            parameters_saved,
            files,
            incomplete_files,
            submitted_at: now_rfc3339(),
        })
    }
}

fn verify_inputs(rewritten: &RewrittenManifest) -> Result<(), UploadError> {
    for path in rewritten.input_files() {
        if !path.is_file() {
            return Err(UploadError::MissingInputFile(path.to_string()));
        }
    }
    Ok(())
}

fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339()
}
