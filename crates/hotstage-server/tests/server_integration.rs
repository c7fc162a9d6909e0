//! Server integration tests.
//!
//! These tests verify the server starts correctly and guards its API.

mod common;

use anyhow::Result;

#[tokio::test]
async fn test_server_starts_and_responds_to_health() -> Result<()> {
    let server = common::TestServer::start().await?;

    let healthy = server.health().await?;
    assert!(healthy, "Server should be healthy");

    Ok(())
}

#[tokio::test]
async fn test_server_health_returns_version() -> Result<()> {
    let server = common::TestServer::start().await?;

    let resp = server
        .client
        .get(format!("{}/health", server.base_url()))
        .send()
        .await?;

    assert!(resp.status().is_success());

    let body: serde_json::Value = resp.json().await?;
    assert_eq!(body["status"], "ok");
    assert!(body.get("version").is_some());

    Ok(())
}

#[tokio::test]
async fn test_api_requires_auth() -> Result<()> {
    let server = common::TestServer::start().await?;

    let resp = server
        .client
        .get(format!("{}/api/v1/session?uuid=abc", server.base_url()))
        .send()
        .await?;

    assert_eq!(resp.status().as_u16(), 401);

    Ok(())
}

#[tokio::test]
async fn test_api_rejects_invalid_auth() -> Result<()> {
    let server = common::TestServer::start().await?;

    let resp = server
        .client
        .get(format!("{}/api/v1/session?uuid=abc", server.base_url()))
        .bearer_auth("wrong-token")
        .send()
        .await?;

    assert_eq!(resp.status().as_u16(), 401);

    Ok(())
}

#[tokio::test]
async fn test_api_accepts_valid_auth() -> Result<()> {
    let server = common::TestServer::start().await?;

    let resp = server.get("/api/v1/session?uuid=abc").send().await?;
    assert!(resp.status().is_success());

    let body: serde_json::Value = resp.json().await?;
    assert_eq!(body["phase"], "idle");
    assert_eq!(body["live"], false);

    Ok(())
}

#[tokio::test]
async fn test_unknown_route_is_404() -> Result<()> {
    let server = common::TestServer::start().await?;

    let resp = server.get("/api/v1/nonexistent").send().await?;
    assert_eq!(resp.status().as_u16(), 404);

    Ok(())
}
