use std::fs::File;
use std::io::Read;
use std::thread;
use std::time::{Duration, Instant};

use camino::Utf8Path;
use serde::{Deserialize, Serialize};

use crate::app::{ProgressSink, UploadEvent};
use crate::domain::{ByteRange, SessionId};
use crate::error::UploadError;
use crate::manifest::base_name;
use crate::server::{ChunkUpload, CremaServer};

pub const DEFAULT_CHUNK_SIZE: usize = 50_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts per chunk, including the first one.
    pub max_attempts: u32,
    /// Fixed pause between two attempts of the same chunk.
    pub backoff_seconds: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            backoff_seconds: 60,
        }
    }
}

impl RetryPolicy {
    pub fn backoff(&self) -> Duration {
        Duration::from_secs(self.backoff_seconds)
    }
}

pub trait Sleep: Send + Sync {
    fn sleep(&self, duration: Duration);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadSleep;

impl Sleep for ThreadSleep {
    fn sleep(&self, duration: Duration) {
        thread::sleep(duration);
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FileOutcome {
    Complete,
    Abandoned { reason: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct FileReport {
    pub path: String,
    pub size: u64,
    pub chunks_sent: usize,
    pub attempts: u32,
    #[serde(flatten)]
    pub outcome: FileOutcome,
}

impl FileReport {
    pub fn is_complete(&self) -> bool {
        self.outcome == FileOutcome::Complete
    }
}

pub fn chunk_count(total: u64, chunk_size: usize) -> u64 {
    total.div_ceil(chunk_size.max(1) as u64)
}

/// Ranges a file of `total` bytes is split into; empty for an empty file.
pub fn chunk_ranges(total: u64, chunk_size: usize) -> Vec<ByteRange> {
    let step = chunk_size.max(1) as u64;
    (0..chunk_count(total, chunk_size))
        .map(|idx| {
            let start = idx * step;
            ByteRange {
                start,
                end: (start + step).min(total),
                total,
            }
        })
        .collect()
}

pub struct ChunkedUploader<'a> {
    server: &'a dyn CremaServer,
    sleeper: &'a dyn Sleep,
    policy: RetryPolicy,
    chunk_size: usize,
}

impl<'a> ChunkedUploader<'a> {
    pub fn new(
        server: &'a dyn CremaServer,
        sleeper: &'a dyn Sleep,
        policy: RetryPolicy,
        chunk_size: usize,
    ) -> Self {
        Self {
            server,
            sleeper,
            policy,
            chunk_size: chunk_size.max(1),
        }
    }

    /// Sends one file. Failures are reported in the returned [`FileReport`]
    /// and never abort the caller's run.
    pub fn upload_file(
        &self,
        session: &SessionId,
        path: &Utf8Path,
        sink: &dyn ProgressSink,
    ) -> FileReport {
        let started = Instant::now();
        let mut report = FileReport {
            path: path.to_string(),
            size: 0,
            chunks_sent: 0,
            attempts: 0,
            outcome: FileOutcome::Complete,
        };

        match self.send_chunks(session, path, &mut report, sink) {
            Ok(()) => sink.event(UploadEvent::FileFinished {
                path: path.to_owned(),
                chunks: report.chunks_sent,
                elapsed: started.elapsed(),
            }),
            Err(err) => {
                let reason = err.to_string();
                sink.event(UploadEvent::FileAbandoned {
                    path: path.to_owned(),
                    session: session.clone(),
                    reason: reason.clone(),
                });
                report.outcome = FileOutcome::Abandoned { reason };
            }
        }
        report
    }

    fn send_chunks(
        &self,
        session: &SessionId,
        path: &Utf8Path,
        report: &mut FileReport,
        sink: &dyn ProgressSink,
    ) -> Result<(), UploadError> {
        let mut file = File::open(path)
            .map_err(|err| UploadError::Filesystem(format!("open {path}: {err}")))?;
        let total = file
            .metadata()
            .map_err(|err| UploadError::Filesystem(format!("stat {path}: {err}")))?
            .len();
        report.size = total;
        sink.event(UploadEvent::FileStarted {
            path: path.to_owned(),
            size: total,
            chunks: chunk_count(total, self.chunk_size),
        });

        let file_name = base_name(path);
        let capacity = usize::try_from(total)
            .unwrap_or(usize::MAX)
            .min(self.chunk_size);
        let mut buffer = Vec::with_capacity(capacity);
        let mut offset = 0u64;
        loop {
            buffer.clear();
            let read = (&mut file)
                .take(self.chunk_size as u64)
                .read_to_end(&mut buffer)
                .map_err(|err| UploadError::Filesystem(format!("read {path}: {err}")))?;
            if read == 0 {
                break;
            }

            let chunk = ChunkUpload {
                file_name: &file_name,
                range: ByteRange {
                    start: offset,
                    end: offset + read as u64,
                    total,
                },
                data: &buffer,
            };
            let attempts = self.send_with_retries(session, path, &chunk, sink)?;
            report.chunks_sent += 1;
            report.attempts += attempts;
            sink.event(UploadEvent::ChunkSent {
                path: path.to_owned(),
                range: chunk.range,
                attempts,
            });
            offset = chunk.range.end;
        }
        Ok(())
    }

    fn send_with_retries(
        &self,
        session: &SessionId,
        path: &Utf8Path,
        chunk: &ChunkUpload<'_>,
        sink: &dyn ProgressSink,
    ) -> Result<u32, UploadError> {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match self.server.upload_chunk(session, chunk) {
                Ok(()) => return Ok(attempt),
                Err(err) if attempt < max_attempts => {
                    sink.event(UploadEvent::ChunkRetry {
                        path: path.to_owned(),
                        range: chunk.range,
                        attempt,
                        max_attempts,
                        reason: err.to_string(),
                    });
                    self.sleeper.sleep(self.policy.backoff());
                }
                Err(err) => {
                    return Err(UploadError::ChunkRetriesExhausted {
                        range: chunk.range.to_string(),
                        attempts: attempt,
                        last: err.to_string(),
                    });
                }
            }
        }
    }
}
