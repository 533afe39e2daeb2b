//! HTTP client for the encrypted inbox service
//!
//! Routes (all plain-text or raw-byte bodies):
//! - `GET  /ping`, `GET /flush`
//! - `GET  /{id}/pk` and `POST /{id}/{pk,rek,rok}` (multipart, field named like the route)
//! - `POST /{id}/send` (multipart field `ct`)
//! - `GET  /{id}/inbox/len`, `GET /{id}/inbox/{index}`

use crate::endpoint::Endpoint;
use reqwest::multipart::{Form, Part};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// The two inbox operations the demo run depends on
#[allow(async_fn_in_trait)]
pub trait Inbox {
    /// Download the recipient's public key to `dest`, returning its size
    async fn fetch_public_key(&self, dest: &Path) -> Result<usize, InboxError>;

    /// Upload one ciphertext, returning the server's reply text
    async fn send_ciphertext(&self, ciphertext: Vec<u8>) -> Result<String, InboxError>;
}

#[derive(Debug, thiserror::Error)]
pub enum InboxError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Server answered {status}: {body}")]
    Status { status: u16, body: String },
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Unexpected response: {0}")]
    InvalidResponse(String),
}

/// Key material a recipient registers with the server
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyKind {
    /// `pk`
    Public,
    /// `rek`
    Relinearization,
    /// `rok`
    Rotation,
}

impl KeyKind {
    /// Route segment and multipart field name
    pub fn route(&self) -> &'static str {
        match self {
            KeyKind::Public => "pk",
            KeyKind::Relinearization => "rek",
            KeyKind::Rotation => "rok",
        }
    }
}

/// Client bound to one endpoint and one recipient inbox
pub struct InboxClient {
    http: reqwest::Client,
    endpoint: Endpoint,
    recipient: u32,
}

impl InboxClient {
    pub fn new(endpoint: Endpoint, recipient: u32, timeout: Duration) -> Result<Self, InboxError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(http, endpoint, recipient))
    }

    pub fn with_client(http: reqwest::Client, endpoint: Endpoint, recipient: u32) -> Self {
        Self {
            http,
            endpoint,
            recipient,
        }
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn recipient(&self) -> u32 {
        self.recipient
    }

    /// Liveness check; the server answers `pong`
    pub async fn ping(&self) -> Result<(), InboxError> {
        let body = self.get_text(&self.endpoint.url("ping")).await?;
        if body.trim() == "pong" {
            Ok(())
        } else {
            Err(InboxError::InvalidResponse(body))
        }
    }

    /// Drop every enrolled user and inbox on the server
    pub async fn flush(&self) -> Result<String, InboxError> {
        self.get_text(&self.endpoint.url("flush")).await
    }

    /// Upload a key file, enrolling the recipient if needed
    pub async fn upload_key(&self, kind: KeyKind, path: &Path) -> Result<String, InboxError> {
        let bytes = tokio::fs::read(path).await.map_err(|source| InboxError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| kind.route().to_string());

        info!(kind = kind.route(), bytes = bytes.len(), "uploading key");
        let form = Form::new().part(kind.route(), Part::bytes(bytes).file_name(file_name));
        let url = self.endpoint.recipient_url(self.recipient, kind.route());
        let resp = self.http.post(&url).multipart(form).send().await?;
        Ok(check(resp).await?.text().await?)
    }

    /// Number of messages in the recipient's inbox
    pub async fn inbox_len(&self) -> Result<usize, InboxError> {
        let body = self
            .get_text(&self.endpoint.recipient_url(self.recipient, "inbox/len"))
            .await?;
        body.trim()
            .parse()
            .map_err(|_| InboxError::InvalidResponse(body))
    }

    /// Download the processed ciphertext stored at `index` to `dest`.
    /// Positions start at 0; the server answers 400 past the end.
    pub async fn fetch_result(&self, index: usize, dest: &Path) -> Result<usize, InboxError> {
        let url = self
            .endpoint
            .recipient_url(self.recipient, &format!("inbox/{}", index));
        self.download(&url, dest).await
    }

    async fn get_text(&self, url: &str) -> Result<String, InboxError> {
        debug!(%url, "GET");
        let resp = self.http.get(url).send().await?;
        Ok(check(resp).await?.text().await?)
    }

    async fn download(&self, url: &str, dest: &Path) -> Result<usize, InboxError> {
        debug!(%url, dest = %dest.display(), "GET");
        let resp = self.http.get(url).send().await?;
        let bytes = check(resp).await?.bytes().await?;

        if let Some(parent) = dest.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| InboxError::Io {
                    path: parent.to_path_buf(),
                    source,
                })?;
        }
        tokio::fs::write(dest, &bytes)
            .await
            .map_err(|source| InboxError::Io {
                path: dest.to_path_buf(),
                source,
            })?;
        Ok(bytes.len())
    }
}

impl Inbox for InboxClient {
    async fn fetch_public_key(&self, dest: &Path) -> Result<usize, InboxError> {
        let url = self.endpoint.recipient_url(self.recipient, "pk");
        self.download(&url, dest).await
    }

    async fn send_ciphertext(&self, ciphertext: Vec<u8>) -> Result<String, InboxError> {
        let url = self.endpoint.recipient_url(self.recipient, "send");
        debug!(%url, bytes = ciphertext.len(), "POST");
        let form = Form::new().part("ct", Part::bytes(ciphertext).file_name("ct"));
        let resp = self.http.post(&url).multipart(form).send().await?;
        Ok(check(resp).await?.text().await?)
    }
}

/// Turn a non-2xx response into `InboxError::Status`
async fn check(resp: reqwest::Response) -> Result<reqwest::Response, InboxError> {
    let status = resp.status();
    if status.is_success() {
        Ok(resp)
    } else {
        let body = resp.text().await.unwrap_or_default();
        Err(InboxError::Status {
            status: status.as_u16(),
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_routes() {
        assert_eq!(KeyKind::Public.route(), "pk");
        assert_eq!(KeyKind::Relinearization.route(), "rek");
        assert_eq!(KeyKind::Rotation.route(), "rok");
    }
}
