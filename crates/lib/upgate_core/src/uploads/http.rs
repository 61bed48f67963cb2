//! JSON-over-HTTP client for the downstream upload service.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use url::Url;

use super::{RpcError, UploaderClient};
use crate::models::uploads::{FileRecord, UploadSession, UploadStatus};

#[derive(Serialize)]
struct StartUploadRequest<'a> {
    user_email: &'a str,
    file_size: u64,
}

#[derive(Deserialize)]
struct FilesReply {
    #[serde(default)]
    files: Vec<FileRecord>,
}

/// [`UploaderClient`] speaking JSON to `base_url`.
///
/// Endpoints: `POST uploads`, `GET uploads/{id}/status`, `GET files?email=`.
#[derive(Clone)]
pub struct HttpUploaderClient {
    base: Url,
    http: reqwest::Client,
}

impl HttpUploaderClient {
    pub fn new(base_url: &str) -> Result<Self, RpcError> {
        let base = Url::parse(base_url)
            .map_err(|e| RpcError::Other(format!("invalid uploader url {base_url}: {e}")))?;
        if base.cannot_be_a_base() {
            return Err(RpcError::Other(format!(
                "uploader url {base_url} cannot be a base"
            )));
        }
        let http = reqwest::Client::builder()
            .user_agent(concat!("upgate/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| RpcError::Other(e.to_string()))?;
        Ok(Self { base, http })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, RpcError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| RpcError::Other("uploader url cannot be a base".into()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn decode<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, RpcError> {
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(classify_status(status, body));
        }
        resp.json::<T>()
            .await
            .map_err(|e| RpcError::Other(format!("decode reply: {e}")))
    }
}

/// Map a non-success status to its error class.
fn classify_status(status: StatusCode, body: String) -> RpcError {
    let detail = if body.is_empty() {
        status.to_string()
    } else {
        format!("{status}: {body}")
    };
    match status {
        StatusCode::SERVICE_UNAVAILABLE | StatusCode::BAD_GATEWAY | StatusCode::GATEWAY_TIMEOUT => {
            RpcError::Unavailable(detail)
        }
        StatusCode::PAYLOAD_TOO_LARGE | StatusCode::TOO_MANY_REQUESTS => {
            RpcError::ResourceExhausted(detail)
        }
        StatusCode::NOT_FOUND => RpcError::NotFound(detail),
        _ => RpcError::Other(detail),
    }
}

fn transport_error(e: reqwest::Error) -> RpcError {
    if e.is_connect() || e.is_timeout() {
        RpcError::Unavailable(e.to_string())
    } else {
        RpcError::Other(e.to_string())
    }
}

#[async_trait]
impl UploaderClient for HttpUploaderClient {
    async fn start_upload(&self, email: &str, file_size: u64) -> Result<UploadSession, RpcError> {
        let resp = self
            .http
            .post(self.endpoint(&["uploads"])?)
            .json(&StartUploadRequest {
                user_email: email,
                file_size,
            })
            .send()
            .await
            .map_err(transport_error)?;
        Self::decode(resp).await
    }

    async fn upload_status(&self, upload_id: &str) -> Result<UploadStatus, RpcError> {
        let resp = self
            .http
            .get(self.endpoint(&["uploads", upload_id, "status"])?)
            .send()
            .await
            .map_err(transport_error)?;
        Self::decode(resp).await
    }

    async fn list_files(&self, email: &str) -> Result<Vec<FileRecord>, RpcError> {
        let resp = self
            .http
            .get(self.endpoint(&["files"])?)
            .query(&[("email", email)])
            .send()
            .await
            .map_err(transport_error)?;
        let reply: FilesReply = Self::decode(resp).await?;
        Ok(reply.files)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoints_are_joined_and_escaped() {
        let client = HttpUploaderClient::new("http://uploader:8080/api/").unwrap();
        let url = client.endpoint(&["uploads", "a/b", "status"]).unwrap();
        assert_eq!(url.as_str(), "http://uploader:8080/api/uploads/a%2Fb/status");

        let bare = HttpUploaderClient::new("http://uploader:8080").unwrap();
        assert_eq!(
            bare.endpoint(&["files"]).unwrap().as_str(),
            "http://uploader:8080/files"
        );
    }

    #[test]
    fn rejects_unusable_base_url() {
        assert!(HttpUploaderClient::new("not a url").is_err());
        assert!(HttpUploaderClient::new("mailto:ops@example.com").is_err());
    }

    #[test]
    fn statuses_are_classified() {
        assert!(matches!(
            classify_status(StatusCode::SERVICE_UNAVAILABLE, String::new()),
            RpcError::Unavailable(_)
        ));
        assert!(matches!(
            classify_status(StatusCode::PAYLOAD_TOO_LARGE, "too big".into()),
            RpcError::ResourceExhausted(_)
        ));
        assert!(matches!(
            classify_status(StatusCode::NOT_FOUND, String::new()),
            RpcError::NotFound(_)
        ));
        assert!(matches!(
            classify_status(StatusCode::INTERNAL_SERVER_ERROR, String::new()),
            RpcError::Other(_)
        ));
    }

    #[test]
    fn files_reply_defaults_to_empty() {
        let reply: FilesReply = serde_json::from_str("{}").unwrap();
        assert!(reply.files.is_empty());
    }
}
