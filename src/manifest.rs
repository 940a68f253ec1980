use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use camino::{Utf8Path, Utf8PathBuf};
use tempfile::{Builder, TempDir};

use crate::error::UploadError;
use crate::link;

pub const PRIMARY_COLUMN: &str = "fq1";
pub const MATE_COLUMN: &str = "fq2";
pub const MANIFEST_FILE_NAME: &str = "samples.tsv";
const SCRATCH_PREFIX: &str = ".crema_";

/// In-memory result of rewriting manifest text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestRewrite {
    pub content: String,
    pub local_files: BTreeSet<Utf8PathBuf>,
}

/// Rewritten manifest persisted to a scratch directory, plus everything that
/// has to be uploaded for it.
#[derive(Debug)]
pub struct RewrittenManifest {
    pub content: String,
    pub upload_set: BTreeSet<Utf8PathBuf>,
    pub manifest_path: Utf8PathBuf,
    pub scratch: ScratchDir,
}

impl RewrittenManifest {
    /// Upload set entries that are not the generated manifest.
    pub fn input_files(&self) -> impl Iterator<Item = &Utf8PathBuf> {
        self.upload_set
            .iter()
            .filter(move |path| **path != self.manifest_path)
    }
}

/// Owns the scratch directory holding the rewritten manifest. Dropping it
/// removes the directory as well.
#[derive(Debug)]
pub struct ScratchDir {
    dir: TempDir,
}

impl ScratchDir {
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Returns `Ok(false)` when the directory was already gone.
    pub fn remove(self) -> Result<bool, UploadError> {
        if !self.dir.path().exists() {
            return Ok(false);
        }
        let path = self.dir.path().display().to_string();
        self.dir
            .close()
            .map_err(|err| UploadError::Filesystem(format!("remove {path}: {err}")))?;
        Ok(true)
    }
}

pub struct ManifestRewriter;

impl ManifestRewriter {
    pub fn rewrite(
        manifest: &Utf8Path,
        scratch_parent: &Path,
    ) -> Result<RewrittenManifest, UploadError> {
        let text = fs::read_to_string(manifest)
            .map_err(|_| UploadError::ManifestRead(manifest.as_std_path().to_path_buf()))?;
        let ManifestRewrite {
            content,
            local_files,
        } = rewrite_manifest_text(&text)?;

        let dir = Builder::new()
            .prefix(SCRATCH_PREFIX)
            .tempdir_in(scratch_parent)
            .map_err(|err| {
                UploadError::Filesystem(format!(
                    "create scratch directory in {}: {err}",
                    scratch_parent.display()
                ))
            })?;
        let scratch = ScratchDir { dir };
        let manifest_path = Utf8PathBuf::from_path_buf(scratch.path().join(MANIFEST_FILE_NAME))
            .map_err(|path| {
                UploadError::Filesystem(format!("non UTF-8 scratch path: {}", path.display()))
            })?;
        fs::write(&manifest_path, &content)
            .map_err(|err| UploadError::Filesystem(format!("write {manifest_path}: {err}")))?;

        let mut upload_set = local_files;
        upload_set.insert(manifest_path.clone());

        tracing::debug!(
            files = upload_set.len(),
            manifest = %manifest_path,
            "manifest rewritten"
        );

        Ok(RewrittenManifest {
            content,
            upload_set,
            manifest_path,
            scratch,
        })
    }
}

pub fn rewrite_manifest_text(text: &str) -> Result<ManifestRewrite, UploadError> {
    let mut rows = text
        .lines()
        .enumerate()
        .map(|(idx, line)| (idx + 1, line.trim()))
        .filter(|(_, line)| !line.is_empty())
        .map(|(number, line)| {
            let fields = line.split('\t').map(str::to_string).collect::<Vec<_>>();
            (number, fields)
        });

    let (_, header) = rows
        .next()
        .ok_or_else(|| UploadError::malformed("manifest has no header row"))?;
    let primary = header
        .iter()
        .position(|field| field == PRIMARY_COLUMN)
        .ok_or_else(|| {
            UploadError::malformed(format!("header has no `{PRIMARY_COLUMN}` column"))
        })?;
    let mate = header.iter().position(|field| field == MATE_COLUMN);

    let mut lines = vec![header.join("\t")];
    let mut local_files = BTreeSet::new();
    for (number, mut fields) in rows {
        if fields.len() < primary + 1 {
            let row = fields.join("\t");
            return Err(UploadError::MalformedManifest {
                reason: format!(
                    "line {number} does not have enough values (need at least {}):\n->\t{row}",
                    primary + 1
                ),
                line: Some(number),
                row: Some(row),
            });
        }

        if fields[primary].trim().is_empty() {
            let row = fields.join("\t");
            return Err(UploadError::MalformedManifest {
                reason: format!("line {number} has an empty `{PRIMARY_COLUMN}` value:\n->\t{row}"),
                line: Some(number),
                row: Some(row),
            });
        }

        rewrite_field(&mut fields[primary], false, &mut local_files);
        if let Some(idx) = mate
            && let Some(field) = fields.get_mut(idx)
        {
            rewrite_field(field, true, &mut local_files);
        }
        lines.push(fields.join("\t"));
    }

    Ok(ManifestRewrite {
        content: lines.join("\n"),
        local_files,
    })
}

fn rewrite_field(field: &mut String, skip_empty: bool, local_files: &mut BTreeSet<Utf8PathBuf>) {
    let value = field.trim();
    if link::is_remote(value) {
        *field = value.to_string();
        return;
    }
    if skip_empty && value.is_empty() {
        return;
    }
    let path = Utf8PathBuf::from(value);
    let name = base_name(&path);
    local_files.insert(path);
    *field = name;
}

pub fn base_name(path: &Utf8Path) -> String {
    path.file_name()
        .map(str::to_string)
        .unwrap_or_else(|| path.as_str().to_string())
}
