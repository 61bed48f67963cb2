//! Upload-session and file-listing proxies to the downstream upload service.
//!
//! The downstream service sits behind [`UploaderClient`]; every call from the
//! services here goes through a [`CircuitBreaker`](crate::breaker::CircuitBreaker).

pub mod http;
pub mod service;

use async_trait::async_trait;
use thiserror::Error;

use crate::breaker::BreakerError;
use crate::models::uploads::{FileRecord, UploadSession, UploadStatus};

pub use http::HttpUploaderClient;
pub use service::{FilesService, MAX_FILE_SIZE, UploadsService};

/// Failure reported by the downstream service, by status class.
#[derive(Debug, Clone, Error)]
pub enum RpcError {
    #[error("uploader unavailable: {0}")]
    Unavailable(String),

    #[error("uploader resource exhausted: {0}")]
    ResourceExhausted(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("uploader call failed: {0}")]
    Other(String),
}

impl RpcError {
    /// Whether this error says the downstream is unhealthy. Caller-side
    /// errors (too large, unknown id) do not count against the breaker.
    pub fn counts_as_failure(&self) -> bool {
        matches!(self, RpcError::Unavailable(_) | RpcError::Other(_))
    }
}

/// Downstream upload/file service.
#[async_trait]
pub trait UploaderClient: Send + Sync {
    async fn start_upload(&self, email: &str, file_size: u64) -> Result<UploadSession, RpcError>;

    async fn upload_status(&self, upload_id: &str) -> Result<UploadStatus, RpcError>;

    async fn list_files(&self, email: &str) -> Result<Vec<FileRecord>, RpcError>;
}

/// Upload/file operation failure as seen by the HTTP layer.
#[derive(Debug, Error)]
pub enum UploadError {
    #[error("file size must be positive")]
    FileSizeInvalid,

    #[error("file size exceeds the maximum allowed")]
    FileSizeExceeded,

    #[error("upload not found")]
    UploadNotFound,

    #[error("service temporarily unavailable (circuit open)")]
    CircuitOpen,

    #[error("upload service unavailable")]
    ServiceUnavailable,

    #[error("upload service call failed: {0}")]
    Downstream(String),
}

impl From<BreakerError<RpcError>> for UploadError {
    fn from(e: BreakerError<RpcError>) -> Self {
        match e {
            BreakerError::Open(_) | BreakerError::TooManyRequests(_) => UploadError::CircuitOpen,
            BreakerError::Timeout(_) => UploadError::ServiceUnavailable,
            BreakerError::Inner(RpcError::ResourceExhausted(_)) => UploadError::FileSizeExceeded,
            BreakerError::Inner(RpcError::Unavailable(_)) => UploadError::ServiceUnavailable,
            BreakerError::Inner(RpcError::NotFound(_)) => UploadError::UploadNotFound,
            BreakerError::Inner(RpcError::Other(msg)) => UploadError::Downstream(msg),
        }
    }
}
