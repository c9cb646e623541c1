use std::fmt;
use std::str::FromStr;

use percent_encoding::percent_decode_str;
use serde::Serialize;
use url::Url;

use crate::error::SyncError;

pub const S3_SCHEME_PREFIX: &str = "s3://";

/// Absolute http/https address of the listing page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageUrl(Url);

impl PageUrl {
    pub fn as_url(&self) -> &Url {
        &self.0
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for PageUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for PageUrl {
    type Err = SyncError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let url = Url::parse(value.trim())
            .map_err(|err| SyncError::InvalidPageUrl(format!("{value}: {err}")))?;
        let is_valid = matches!(url.scheme(), "http" | "https") && url.has_host();
        if !is_valid {
            return Err(SyncError::InvalidPageUrl(value.to_string()));
        }
        Ok(Self(url))
    }
}

/// `s3://bucket/prefix` destination, split into its bucket and prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DestinationPath {
    bucket: String,
    prefix: String,
}

impl DestinationPath {
    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Full `s3://` form without a trailing separator. Destination keys are
    /// built under this string.
    pub fn as_uri(&self) -> String {
        if self.prefix.is_empty() {
            format!("{S3_SCHEME_PREFIX}{}", self.bucket)
        } else {
            format!("{S3_SCHEME_PREFIX}{}/{}", self.bucket, self.prefix)
        }
    }
}

impl fmt::Display for DestinationPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_uri())
    }
}

impl FromStr for DestinationPath {
    type Err = SyncError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        let rest = trimmed
            .strip_prefix(S3_SCHEME_PREFIX)
            .ok_or_else(|| SyncError::InvalidDestination(value.to_string()))?;
        let (bucket, prefix) = rest.split_once('/').unwrap_or((rest, ""));
        if bucket.is_empty() || bucket.contains(char::is_whitespace) {
            return Err(SyncError::InvalidDestination(value.to_string()));
        }
        Ok(Self {
            bucket: bucket.to_string(),
            prefix: prefix.trim_matches('/').to_string(),
        })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferMode {
    #[default]
    DryRun,
    Live,
}

impl TransferMode {
    pub fn from_execute_flag(execute: bool) -> Self {
        if execute {
            TransferMode::Live
        } else {
            TransferMode::DryRun
        }
    }
}

impl fmt::Display for TransferMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransferMode::DryRun => write!(f, "dry run"),
            TransferMode::Live => write!(f, "live"),
        }
    }
}

/// A file link discovered on the listing page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileReference {
    pub source_url: String,
    pub filename: String,
}

impl FileReference {
    /// Builds a reference from a resolved URL. The filename is the decoded
    /// last path segment; `source_url` stays encoded. Returns `None` for
    /// directory links and segments that do not decode to a plain UTF-8 name.
    pub fn from_url(url: &Url) -> Option<Self> {
        let segment = url
            .path_segments()
            .and_then(|mut segments| segments.next_back())?;
        let filename = percent_decode_str(segment).decode_utf8().ok()?;
        if filename.trim().is_empty() || filename.contains('/') {
            return None;
        }
        Some(Self {
            source_url: url.to_string(),
            filename: filename.into_owned(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Identifiers {
    Present { bank_id: String, sample_id: String },
    Absent,
}

impl Identifiers {
    pub fn bank_id(&self) -> Option<&str> {
        match self {
            Identifiers::Present { bank_id, .. } => Some(bank_id),
            Identifiers::Absent => None,
        }
    }

    pub fn sample_id(&self) -> Option<&str> {
        match self {
            Identifiers::Present { sample_id, .. } => Some(sample_id),
            Identifiers::Absent => None,
        }
    }

    pub fn is_present(&self) -> bool {
        matches!(self, Identifiers::Present { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransferTask {
    pub source_url: String,
    pub destination_key: String,
    pub filename: String,
    pub identifiers: Identifiers,
}
