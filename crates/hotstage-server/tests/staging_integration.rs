//! Upload and reload flows against a running server.

mod common;

use anyhow::Result;
use common::{DB_DIR, FakeExecutor, TestServer};

#[tokio::test]
async fn test_upload_without_uuid_or_dir_is_forbidden() -> Result<()> {
    let server = TestServer::start().await?;

    let resp = server
        .put("/api/v1/resources/wedo/ClientConfig/CSCommon/DB/ItemConfig.db")
        .query(&[("dir", DB_DIR)])
        .body("data")
        .send()
        .await?;
    assert_eq!(resp.status().as_u16(), 403);
    let body: serde_json::Value = resp.json().await?;
    assert!(body["message"].as_str().unwrap_or_default().contains("without uuid"));

    let resp = server
        .put("/api/v1/resources/wedo/ClientConfig/CSCommon/DB/ItemConfig.db")
        .query(&[("uuid", "abc")])
        .body("data")
        .send()
        .await?;
    assert_eq!(resp.status().as_u16(), 403);

    Ok(())
}

#[tokio::test]
async fn test_upload_sets_etag_and_writes_file() -> Result<()> {
    let server = TestServer::start().await?;

    let resp = server.upload("abc", DB_DIR, "ItemConfig.db", "items").await?;
    assert_eq!(resp.status().as_u16(), 200);
    let etag = resp
        .headers()
        .get("etag")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    assert!(etag.is_some_and(|e| e.starts_with('"')));

    let written = std::fs::read_to_string(server.disk_path(&format!("{}/ItemConfig.db", DB_DIR)))?;
    assert_eq!(written, "items");

    let status: serde_json::Value = server
        .get("/api/v1/session?uuid=abc")
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(status["phase"], "staging");
    assert_eq!(status["live"], true);
    assert_eq!(status["directories"][0]["db_files"], 1);

    Ok(())
}

#[tokio::test]
async fn test_second_session_is_refused_while_first_is_staging() -> Result<()> {
    let server = TestServer::start().await?;

    let resp = server.upload("first", DB_DIR, "ItemConfig.db", "a").await?;
    assert_eq!(resp.status().as_u16(), 200);

    let resp = server.upload("second", DB_DIR, "MatchConfig.db", "b").await?;
    assert_eq!(resp.status().as_u16(), 403);
    let body: serde_json::Value = resp.json().await?;
    assert!(body["message"].as_str().unwrap_or_default().contains("hot reloading"));

    let resp = server.reload("second").await?;
    assert_eq!(resp.status().as_u16(), 403);
    assert!(server.executor.calls().is_empty());

    Ok(())
}

#[tokio::test]
async fn test_concurrent_first_uploads_admit_one_session() -> Result<()> {
    let server = TestServer::start().await?;

    let (a, b) = tokio::join!(
        server.upload("alpha", DB_DIR, "ItemConfig.db", "a"),
        server.upload("beta", DB_DIR, "MatchConfig.db", "b"),
    );
    let mut statuses = [a?.status().as_u16(), b?.status().as_u16()];
    statuses.sort();
    assert_eq!(statuses, [200, 403]);

    Ok(())
}

#[tokio::test]
async fn test_create_conflict_and_override() -> Result<()> {
    let server = TestServer::start().await?;
    let path = "/api/v1/resources/wedo/ServerConfig/svr.xml";

    let create = |override_flag: &'static str| {
        server
            .post(path)
            .query(&[
                ("uuid", "abc"),
                ("dir", "/wedo/ServerConfig"),
                ("override", override_flag),
            ])
            .body("<svr/>")
            .send()
    };

    assert_eq!(create("false").await?.status().as_u16(), 200);
    assert_eq!(create("false").await?.status().as_u16(), 409);
    assert_eq!(create("true").await?.status().as_u16(), 200);

    Ok(())
}

#[tokio::test]
async fn test_overwrite_backs_up_previous_version() -> Result<()> {
    let server = TestServer::start().await?;

    server.upload("abc", DB_DIR, "ItemConfig.db", "v1").await?;
    let resp = server.upload("abc", DB_DIR, "ItemConfig.db", "v2").await?;
    assert_eq!(resp.status().as_u16(), 200);

    let body: serde_json::Value = resp.json().await?;
    let backup = body["backup_dir"].as_str().unwrap_or_default().to_string();
    assert!(backup.starts_with(&format!("{}_abc_", DB_DIR)));

    let saved = std::fs::read_to_string(server.disk_path(&backup).join("ItemConfig.db"))?;
    assert_eq!(saved, "v1");

    Ok(())
}

#[tokio::test]
async fn test_path_escape_is_rejected() -> Result<()> {
    let server = TestServer::start().await?;

    let resp = server
        .put("/api/v1/resources/wedo/..%2F..%2Fescape.txt")
        .query(&[("uuid", "abc"), ("dir", "/wedo")])
        .body("x")
        .send()
        .await?;
    assert_eq!(resp.status().as_u16(), 400);

    Ok(())
}

#[tokio::test]
async fn test_put_directory_is_method_not_allowed() -> Result<()> {
    let server = TestServer::start().await?;

    let resp = server
        .put("/api/v1/resources/wedo/ClientConfig/New/")
        .query(&[("uuid", "abc"), ("dir", "/wedo/ClientConfig")])
        .send()
        .await?;
    assert_eq!(resp.status().as_u16(), 405);

    Ok(())
}

#[tokio::test]
async fn test_reload_targets_roles_from_manifest() -> Result<()> {
    let server = TestServer::start().await?;

    server.upload("abc", DB_DIR, "ItemConfig.db", "items").await?;
    let resp = server.reload("abc").await?;
    assert_eq!(resp.status().as_u16(), 200);

    let body: serde_json::Value = resp.json().await?;
    assert_eq!(body["status"], "OK");
    assert_eq!(body["target"], "*.*.[13].*");
    assert_eq!(server.executor.calls(), vec!["*.*.[13].*".to_string()]);

    // The slot is free again for a new session.
    let resp = server.upload("next", DB_DIR, "MatchConfig.db", "m").await?;
    assert_eq!(resp.status().as_u16(), 200);

    Ok(())
}

#[tokio::test]
async fn test_reload_merges_roles() -> Result<()> {
    let server = TestServer::start().await?;

    server.upload("abc", DB_DIR, "ItemConfig.db", "items").await?;
    server.upload("abc", DB_DIR, "MatchConfig.db", "match").await?;
    let body: serde_json::Value = server.reload("abc").await?.json().await?;

    assert_eq!(body["target"], "*.*.[13,17].*");

    Ok(())
}

#[tokio::test]
async fn test_reload_with_xml_is_full_reload() -> Result<()> {
    let server = TestServer::start().await?;

    server.upload("abc", DB_DIR, "ItemConfig.db", "items").await?;
    server.upload("abc", DB_DIR, "Labels.xml", "<x/>").await?;
    let body: serde_json::Value = server.reload("abc").await?.json().await?;

    assert_eq!(body["target"], "*.*.*.*");

    Ok(())
}

#[tokio::test]
async fn test_reload_with_nothing_mapped_skips_executor() -> Result<()> {
    let server = TestServer::start().await?;

    server.upload("abc", DB_DIR, "Unmapped.db", "u").await?;
    let resp = server.reload("abc").await?;
    assert_eq!(resp.status().as_u16(), 200);

    let body: serde_json::Value = resp.json().await?;
    assert_eq!(body["msg"][0], "nothing to reload");
    assert_eq!(body["target"], "");
    assert!(server.executor.calls().is_empty());

    Ok(())
}

#[tokio::test]
async fn test_failed_reload_is_500_and_clears_session() -> Result<()> {
    let server = TestServer::start_with_executor(FakeExecutor::new(false)).await?;

    server
        .upload("abc", "/wedo/ServerConfig", "svr.xml", "<svr/>")
        .await?;
    let resp = server.reload("abc").await?;
    assert_eq!(resp.status().as_u16(), 500);

    let body: serde_json::Value = resp.json().await?;
    assert_eq!(body["status"], "Error");
    assert_eq!(body["msg"][0], "reload *.*.*.* [failed]");

    // The token is gone, so a second reload is refused.
    assert_eq!(server.reload("abc").await?.status().as_u16(), 403);

    Ok(())
}
