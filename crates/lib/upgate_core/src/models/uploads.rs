//! Upload session and file records relayed from the downstream upload service.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A newly opened chunked-upload session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadSession {
    pub upload_id: String,
    pub total_chunks: u32,
    pub upload_urls: Vec<String>,
}

/// Progress of an upload session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadStatus {
    pub status: String,
    pub progress: f32,
    #[serde(default)]
    pub message: String,
}

/// A completed file owned by a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    pub file_id: String,
    pub upload_id: String,
    pub owner_email: String,
    #[serde(rename = "file_size")]
    pub size: u64,
    pub total_chunks: u32,
    pub checksum: String,
    pub created_at: DateTime<Utc>,
}
