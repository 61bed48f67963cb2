//! Breaker-guarded upload and file services.

use std::sync::Arc;

use tracing::{debug, warn};

use super::{RpcError, UploadError, UploaderClient};
use crate::breaker::{BreakerSettings, BreakerState, CircuitBreaker};
use crate::models::uploads::{FileRecord, UploadSession, UploadStatus};

/// Largest accepted upload: 10 GiB.
pub const MAX_FILE_SIZE: i64 = 10 * 1024 * 1024 * 1024;

/// Opens upload sessions and reports their progress.
#[derive(Clone)]
pub struct UploadsService {
    client: Arc<dyn UploaderClient>,
    start_breaker: Arc<CircuitBreaker>,
    status_breaker: Arc<CircuitBreaker>,
}

impl UploadsService {
    pub fn new(client: Arc<dyn UploaderClient>) -> Self {
        Self::with_breakers(
            client,
            BreakerSettings::new("uploads.start"),
            BreakerSettings::new("uploads.status"),
        )
    }

    pub fn with_breakers(
        client: Arc<dyn UploaderClient>,
        start: BreakerSettings,
        status: BreakerSettings,
    ) -> Self {
        Self {
            client,
            start_breaker: Arc::new(CircuitBreaker::new(start)),
            status_breaker: Arc::new(CircuitBreaker::new(status)),
        }
    }

    /// Open a chunked-upload session for `email`.
    pub async fn start_upload(
        &self,
        email: &str,
        file_size: i64,
    ) -> Result<UploadSession, UploadError> {
        if file_size <= 0 {
            return Err(UploadError::FileSizeInvalid);
        }
        if file_size > MAX_FILE_SIZE {
            return Err(UploadError::FileSizeExceeded);
        }
        // Checked positive above.
        let size = file_size as u64;

        let session = self
            .start_breaker
            .call_filtered(
                || self.client.start_upload(email, size),
                RpcError::counts_as_failure,
            )
            .await
            .map_err(|e| {
                warn!(%email, file_size, error = %e, "start upload failed");
                UploadError::from(e)
            })?;
        debug!(%email, upload_id = %session.upload_id, chunks = session.total_chunks, "upload started");
        Ok(session)
    }

    /// Progress of an upload session.
    pub async fn upload_status(&self, upload_id: &str) -> Result<UploadStatus, UploadError> {
        self.status_breaker
            .call_filtered(
                || self.client.upload_status(upload_id),
                RpcError::counts_as_failure,
            )
            .await
            .map_err(UploadError::from)
    }

    /// Breaker states, for readiness reporting.
    pub fn breaker_states(&self) -> Vec<(String, BreakerState)> {
        [&self.start_breaker, &self.status_breaker]
            .iter()
            .map(|b| (b.name().to_string(), b.state()))
            .collect()
    }
}

/// Lists a user's completed files.
#[derive(Clone)]
pub struct FilesService {
    client: Arc<dyn UploaderClient>,
    breaker: Arc<CircuitBreaker>,
}

impl FilesService {
    pub fn new(client: Arc<dyn UploaderClient>) -> Self {
        Self::with_breaker(client, BreakerSettings::new("files.list"))
    }

    pub fn with_breaker(client: Arc<dyn UploaderClient>, settings: BreakerSettings) -> Self {
        Self {
            client,
            breaker: Arc::new(CircuitBreaker::new(settings)),
        }
    }

    pub async fn list_files(&self, email: &str) -> Result<Vec<FileRecord>, UploadError> {
        self.breaker
            .call_filtered(|| self.client.list_files(email), RpcError::counts_as_failure)
            .await
            .map_err(|e| {
                warn!(%email, error = %e, "list files failed");
                UploadError::from(e)
            })
    }

    pub fn breaker_state(&self) -> (String, BreakerState) {
        (self.breaker.name().to_string(), self.breaker.state())
    }
}
