use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum SyncError {
    #[error("invalid page URL: {0}")]
    #[diagnostic(help("expected an absolute http:// or https:// URL"))]
    InvalidPageUrl(String),

    #[error("invalid destination path: {0}")]
    #[diagnostic(help("expected s3://<bucket>/<prefix>"))]
    InvalidDestination(String),

    #[error("listing page request failed: {0}")]
    PageHttp(String),

    #[error("listing page returned status {status}: {message}")]
    PageStatus { status: u16, message: String },

    #[error("network error: {0}")]
    Network(String),

    #[error("source returned status {status}: {message}")]
    HttpStatus { status: u16, message: String },

    #[error("storage error: {0}")]
    Storage(String),

    #[error("invalid object key: {0}")]
    InvalidObjectKey(String),

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("failed to initialise runtime: {0}")]
    Runtime(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InputFormat,
    Network,
    Storage,
    Config,
}

impl SyncError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SyncError::InvalidPageUrl(_) | SyncError::InvalidDestination(_) => {
                ErrorKind::InputFormat
            }
            SyncError::PageHttp(_)
            | SyncError::PageStatus { .. }
            | SyncError::Network(_)
            | SyncError::HttpStatus { .. } => ErrorKind::Network,
            SyncError::Storage(_) | SyncError::InvalidObjectKey(_) => ErrorKind::Storage,
            SyncError::ConfigRead(_) | SyncError::ConfigParse(_) | SyncError::Runtime(_) => {
                ErrorKind::Config
            }
        }
    }
}
