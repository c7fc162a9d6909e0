//! HTTP client for the hotstage server API.

use std::path::Path;

use anyhow::{Context, Result};
use reqwest::header::CONTENT_LENGTH;
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use tokio_util::io::ReaderStream;
use url::Url;

// ─────────────────────────────────────────────────────────────────────────────
// Types
// ─────────────────────────────────────────────────────────────────────────────

/// Health check response from the server.
#[derive(Debug, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Error body returned by the server.
#[derive(Debug, Deserialize)]
struct ErrorResponse {
    #[serde(default)]
    code: String,
    message: String,
}

/// Result of staging one file.
#[derive(Debug, Serialize, Deserialize)]
pub struct UploadResponse {
    pub kind: String,
    pub path: String,
    #[serde(default)]
    pub etag: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub backup_dir: Option<String>,
}

/// Reload result.
#[derive(Debug, Serialize, Deserialize)]
pub struct ReloadResponse {
    pub status: String,
    #[serde(default)]
    pub target: String,
    #[serde(default)]
    pub msg: Vec<String>,
}

impl ReloadResponse {
    pub fn succeeded(&self) -> bool {
        self.status == "OK"
    }
}

/// Per-directory counts in a session status.
#[derive(Debug, Serialize, Deserialize)]
pub struct DirectoryInfo {
    pub dir: String,
    #[serde(default)]
    pub backup_dir: Option<String>,
    pub db_files: usize,
    pub xml_files: usize,
    pub server_files: usize,
}

/// Store counters in a session status.
#[derive(Debug, Serialize, Deserialize)]
pub struct StoreInfo {
    pub live: usize,
    pub capacity: usize,
    pub expiry_buckets: usize,
}

/// Session status.
#[derive(Debug, Serialize, Deserialize)]
pub struct SessionInfo {
    pub phase: String,
    pub live: bool,
    #[serde(default)]
    pub ttl_secs: Option<i64>,
    #[serde(default)]
    pub directories: Vec<DirectoryInfo>,
    pub store: StoreInfo,
}

// ─────────────────────────────────────────────────────────────────────────────
// Client
// ─────────────────────────────────────────────────────────────────────────────

/// Client for the hotstage server.
pub struct Client {
    base_url: Url,
    http: reqwest::Client,
    token: Option<String>,
}

impl Client {
    /// Create a new client for the given server URL.
    pub fn new(base_url: &str, token: Option<String>) -> Result<Self> {
        let base_url =
            Url::parse(base_url).with_context(|| format!("Invalid server URL: {}", base_url))?;

        Ok(Self {
            base_url,
            http: reqwest::Client::new(),
            token,
        })
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        match self.token {
            Some(ref token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// Check server health.
    pub async fn health(&self) -> Result<HealthResponse> {
        let url = self.base_url.join("/health")?;

        let response = self.http.get(url).send().await?;

        if !response.status().is_success() {
            anyhow::bail!("Server returned error: {}", response.status());
        }

        let health: HealthResponse = response.json().await?;
        Ok(health)
    }

    /// Stream `file` to `<dir>/<file name>` under session `uuid`.
    ///
    /// With `overwrite` the upload is a save (`PUT`); without it the upload
    /// is a create (`POST`) that fails if the target already exists.
    pub async fn upload(
        &self,
        uuid: &str,
        dir: &str,
        file: &Path,
        overwrite: bool,
    ) -> Result<UploadResponse> {
        let name = file
            .file_name()
            .and_then(|n| n.to_str())
            .with_context(|| format!("Not a file name: {}", file.display()))?;
        let url = self.base_url.join(&format!(
            "/api/v1/resources{}/{}",
            dir.trim_end_matches('/'),
            name
        ))?;

        let handle = tokio::fs::File::open(file)
            .await
            .with_context(|| format!("Failed to open {}", file.display()))?;
        let len = handle.metadata().await?.len();
        let body = reqwest::Body::wrap_stream(ReaderStream::new(handle));

        let builder = if overwrite {
            self.http.put(url)
        } else {
            self.http.post(url)
        };
        let response = self
            .authorized(builder)
            .query(&[("uuid", uuid), ("dir", dir)])
            .header(CONTENT_LENGTH, len)
            .body(body)
            .send()
            .await?;

        Ok(check(response).await?.json().await?)
    }

    /// Ask the server to reload everything session `uuid` staged.
    ///
    /// A failed execution still returns the server's report.
    pub async fn reload(&self, uuid: &str) -> Result<ReloadResponse> {
        let url = self.base_url.join("/api/v1/reload")?;
        let response = self
            .authorized(self.http.post(url))
            .query(&[("uuid", uuid)])
            .send()
            .await?;

        if response.status() == StatusCode::INTERNAL_SERVER_ERROR {
            let body = response.text().await?;
            if let Ok(report) = serde_json::from_str::<ReloadResponse>(&body) {
                return Ok(report);
            }
            anyhow::bail!("Server error: {}", body);
        }

        Ok(check(response).await?.json().await?)
    }

    /// Session status as seen by `uuid`.
    pub async fn session(&self, uuid: &str) -> Result<SessionInfo> {
        let url = self.base_url.join("/api/v1/session")?;
        let response = self
            .authorized(self.http.get(url))
            .query(&[("uuid", uuid)])
            .send()
            .await?;

        Ok(check(response).await?.json().await?)
    }
}

/// Turn a non-success response into an error carrying the server's message.
async fn check(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    match serde_json::from_str::<ErrorResponse>(&body) {
        Ok(error) if !error.code.is_empty() => {
            anyhow::bail!("{} ({}): {}", status, error.code, error.message)
        }
        Ok(error) => anyhow::bail!("{}: {}", status, error.message),
        Err(_) => anyhow::bail!("{}: {}", status, body.trim()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_url_rejected() {
        assert!(Client::new("not a url", None).is_err());
        assert!(Client::new("http://localhost:8080", None).is_ok());
    }

    #[test]
    fn test_reload_response_parsing() {
        let report: ReloadResponse = serde_json::from_str(
            r#"{"status":"Error","target":"*.*.*.*","msg":["reload *.*.*.* [failed]"]}"#,
        )
        .unwrap();
        assert!(!report.succeeded());
        assert_eq!(report.msg.len(), 1);
    }

    #[test]
    fn test_session_info_parsing() {
        let info: SessionInfo = serde_json::from_str(
            r#"{"phase":"staging","live":true,"ttl_secs":3599,
                "directories":[{"dir":"/r/wedo/ServerConfig","db_files":0,"xml_files":0,"server_files":2}],
                "store":{"live":1,"capacity":1,"expiry_buckets":1}}"#,
        )
        .unwrap();
        assert_eq!(info.phase, "staging");
        assert_eq!(info.directories[0].server_files, 2);
        assert_eq!(info.store.capacity, 1);
    }
}
