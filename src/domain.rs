use std::fmt;
use std::str::FromStr;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::UploadError;

/// Value of the `submission` key in saved job parameters.
pub const SUBMISSION_TAG: &str = "uploader";

/// Value of the `method` field sent when starting a job.
pub const METHOD_TAG: &str = "crema_uploader";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum DataType {
    #[default]
    ChipSeq,
    AtacSeq,
}

impl DataType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataType::ChipSeq => "chip-seq",
            DataType::AtacSeq => "atac-seq",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Organism {
    #[default]
    Hg19,
    Mm10,
    Rn6,
}

impl Organism {
    pub fn as_str(&self) -> &'static str {
        match self {
            Organism::Hg19 => "hg19",
            Organism::Mm10 => "mm10",
            Organism::Rn6 => "rn6",
        }
    }
}

impl fmt::Display for Organism {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Server-assigned scratch directory name scoping one submission.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for SessionId {
    type Err = UploadError;

    /// Takes the first line of a `get_sd` response body.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let first = value.lines().next().unwrap_or_default();
        if first.is_empty() {
            return Err(UploadError::SessionAllocation(
                "server returned an empty session id".to_string(),
            ));
        }
        Ok(Self(first.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobParameters {
    pub email: String,
    pub project: String,
    pub organism: Organism,
    pub datatype: DataType,
    pub submission: &'static str,
}

impl JobParameters {
    pub fn new(email: String, project: String, organism: Organism, datatype: DataType) -> Self {
        Self {
            email,
            project,
            organism,
            datatype,
            submission: SUBMISSION_TAG,
        }
    }

    pub fn to_json(&self) -> Result<String, UploadError> {
        serde_json::to_string(self).map_err(|err| UploadError::Encode(err.to_string()))
    }
}

/// Half-open byte range `[start, end)` of a file of `total` bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
    pub total: u64,
}

impl ByteRange {
    pub fn len(&self) -> u64 {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

impl fmt::Display for ByteRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "bytes {}-{}/{}", self.start, self.end, self.total)
    }
}
