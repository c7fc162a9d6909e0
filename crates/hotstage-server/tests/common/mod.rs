//! Common test utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::Client;
use tempfile::TempDir;
use tokio::task::JoinHandle;
use tokio::time::timeout;

use hotstage_reload::{ExecutionReport, ReloadCoordinator, ReloadExecutor, ReloadSettings};
use hotstage_server::{Server, ServerConfig};
use hotstage_session::{ExpiringSessionStore, StoreConfig};

/// Manifest location inside the staged tree.
pub const MANIFEST_PATH: &str = "wedo/ClientConfig/CSCommon/DB/SvrLoadList.xml";

/// Upload directory for client databases.
pub const DB_DIR: &str = "/wedo/ClientConfig/CSCommon/DB";

const MANIFEST: &str = r#"<root>
    <server name="GameSvr"><excel name="ItemConfig"/></server>
    <server name="MatchSvr"><excel name="MatchConfig"/></server>
    <server name="MonitorSvr"><excel name="ItemConfig"/></server>
</root>"#;

/// Executor that records every target and answers with a fixed outcome.
pub struct FakeExecutor {
    calls: Mutex<Vec<String>>,
    success: bool,
}

impl FakeExecutor {
    pub fn new(success: bool) -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            success,
        })
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl ReloadExecutor for FakeExecutor {
    async fn execute(&self, target: &str) -> ExecutionReport {
        self.calls.lock().push(target.to_string());
        if self.success {
            ExecutionReport::succeeded(vec![format!("reload {} [succeed]", target)])
        } else {
            ExecutionReport::failed(vec![format!("reload {} [failed]", target)])
        }
    }
}

/// A test server that runs in the background.
pub struct TestServer {
    /// The server's address.
    pub addr: SocketAddr,
    /// The auth token for the server.
    pub token: String,
    /// HTTP client configured for this server.
    pub client: Client,
    /// Reload executor standing in for the console script.
    pub executor: Arc<FakeExecutor>,
    /// Handle to the server task.
    _handle: JoinHandle<()>,
    /// Staging root.
    pub temp_dir: TempDir,
}

impl TestServer {
    /// Start a new test server whose reloads succeed.
    pub async fn start() -> Result<Self> {
        Self::start_with_executor(FakeExecutor::new(true)).await
    }

    /// Start a new test server with the given executor.
    pub async fn start_with_executor(executor: Arc<FakeExecutor>) -> Result<Self> {
        let temp_dir = TempDir::new()?;
        let token = "test-token".to_string();

        let manifest = temp_dir.path().join(MANIFEST_PATH);
        if let Some(parent) = manifest.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&manifest, MANIFEST)?;

        // Find an available port
        let addr = find_available_port().await?;

        let config = ServerConfig::new(Some(token.clone()))
            .with_bind_address(addr)
            .with_root(temp_dir.path())
            .with_rate_limiting(false)
            .with_request_logging(false);

        let coordinator = ReloadCoordinator::new(
            ExpiringSessionStore::new(StoreConfig::default()),
            executor.clone(),
            ReloadSettings::new(manifest),
        );

        // Start server in background
        let server = Server::new(config, coordinator);
        let handle = tokio::spawn(async move {
            let _ = server.run_on(addr).await;
        });

        // Wait for server to be ready
        let client = Client::new();
        wait_for_server(&client, addr).await?;

        Ok(Self {
            addr,
            token,
            client,
            executor,
            _handle: handle,
            temp_dir,
        })
    }

    /// Get the base URL for the server.
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Get an authenticated GET request builder.
    pub fn get(&self, path: &str) -> reqwest::RequestBuilder {
        self.client
            .get(format!("{}{}", self.base_url(), path))
            .bearer_auth(&self.token)
    }

    /// Get an authenticated POST request builder.
    pub fn post(&self, path: &str) -> reqwest::RequestBuilder {
        self.client
            .post(format!("{}{}", self.base_url(), path))
            .bearer_auth(&self.token)
    }

    /// Get an authenticated PUT request builder.
    pub fn put(&self, path: &str) -> reqwest::RequestBuilder {
        self.client
            .put(format!("{}{}", self.base_url(), path))
            .bearer_auth(&self.token)
    }

    /// Save `body` to `<dir>/<name>` under session `uuid`.
    pub async fn upload(
        &self,
        uuid: &str,
        dir: &str,
        name: &str,
        body: &'static str,
    ) -> Result<reqwest::Response> {
        let path = format!("/api/v1/resources{}/{}", dir, name);
        Ok(self
            .put(&path)
            .query(&[("uuid", uuid), ("dir", dir)])
            .body(body)
            .send()
            .await?)
    }

    /// Ask for a reload under session `uuid`.
    pub async fn reload(&self, uuid: &str) -> Result<reqwest::Response> {
        Ok(self
            .post("/api/v1/reload")
            .query(&[("uuid", uuid)])
            .send()
            .await?)
    }

    /// Path of a root-relative file on disk.
    pub fn disk_path(&self, rel: &str) -> std::path::PathBuf {
        self.temp_dir.path().join(rel.trim_start_matches('/'))
    }

    /// Check if server is healthy.
    pub async fn health(&self) -> Result<bool> {
        let resp = self
            .client
            .get(format!("{}/health", self.base_url()))
            .send()
            .await?;
        Ok(resp.status().is_success())
    }
}

/// Find an available port for the test server.
async fn find_available_port() -> Result<SocketAddr> {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    drop(listener);
    Ok(addr)
}

/// Wait for the server to become ready.
async fn wait_for_server(client: &Client, addr: SocketAddr) -> Result<()> {
    let url = format!("http://{}/health", addr);

    let result = timeout(Duration::from_secs(5), async {
        loop {
            match client.get(&url).send().await {
                Ok(resp) if resp.status().is_success() => return Ok(()),
                _ => tokio::time::sleep(Duration::from_millis(50)).await,
            }
        }
    })
    .await;

    match result {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(e),
        Err(_) => anyhow::bail!("Timeout waiting for server to start"),
    }
}
