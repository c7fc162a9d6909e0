//! Filesystem side of staging an upload.
//!
//! Every step that touches the session store runs under the coordinator's
//! [`StagingGuard`], which stays held until the file is written and
//! recorded. The backup rename and the cache update for one upload
//! therefore never interleave with another upload or with a reload.

use std::path::{Component, Path, PathBuf};
use std::time::UNIX_EPOCH;

use axum::body::Bytes;
use futures::{Stream, StreamExt};
use hotstage_reload::{ReloadCoordinator, StagingGuard};
use hotstage_session::ConfigCategory;
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::error::{Result, ServerError};

/// How an upload treats an existing target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadMode {
    /// `POST`: refuse to replace an existing file unless overriding.
    Create { override_existing: bool },
    /// `PUT`: always replace.
    Save,
}

/// One upload as the client described it.
#[derive(Debug, Clone)]
pub struct UploadRequest<'a> {
    /// Session token.
    pub token: &'a str,
    /// Upload directory, root-relative (e.g. `/wedo/ClientConfig/CSCommon/DB`).
    pub dir: &'a str,
    /// Target path, root-relative. A trailing `/` names a directory.
    pub path: &'a str,
    pub mode: UploadMode,
}

/// Result of a successful upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StageOutcome {
    /// A directory was created.
    Directory { path: String },
    /// A file was written.
    File {
        path: String,
        etag: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        category: Option<ConfigCategory>,
        /// Backup directory the previous version was moved into.
        #[serde(skip_serializing_if = "Option::is_none")]
        backup_dir: Option<String>,
    },
}

/// Stages uploads into a file tree rooted at `root`.
#[derive(Debug, Clone)]
pub struct Stager {
    root: PathBuf,
}

impl Stager {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a root-relative path onto the filesystem.
    ///
    /// `..` components are rejected so nothing escapes `root`.
    pub fn resolve(&self, rel: &str) -> Result<PathBuf> {
        let mut resolved = self.root.clone();
        for component in Path::new(rel.trim_start_matches('/')).components() {
            match component {
                Component::Normal(part) => resolved.push(part),
                Component::CurDir => {}
                Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                    return Err(ServerError::BadRequest(format!(
                        "Path must stay inside the staging root: {}",
                        rel
                    )));
                }
            }
        }
        Ok(resolved)
    }

    /// Admit the upload, then create the directory or write the file.
    pub async fn stage<S, E>(
        &self,
        coordinator: &ReloadCoordinator,
        request: UploadRequest<'_>,
        body: S,
    ) -> Result<StageOutcome>
    where
        S: Stream<Item = std::result::Result<Bytes, E>>,
        E: std::fmt::Display,
    {
        if request.token.is_empty() {
            return Err(ServerError::Forbidden(
                "Operation is prohibited without uuid".to_string(),
            ));
        }
        if request.dir.is_empty() {
            return Err(ServerError::Forbidden(
                "Operation is prohibited without upload directory".to_string(),
            ));
        }

        let guard = coordinator.begin_upload(request.token).await?;
        let target = self.resolve(request.path)?;

        if request.path.ends_with('/') {
            if request.mode == UploadMode::Save {
                return Err(ServerError::MethodNotAllowed(
                    "directories can only be created with POST".to_string(),
                ));
            }
            fs::create_dir_all(&target).await?;
            debug!(session = %request.token, path = %request.path, "Created directory");
            return Ok(StageOutcome::Directory {
                path: request.path.to_string(),
            });
        }

        let exists = fs::try_exists(&target).await?;
        if exists
            && matches!(
                request.mode,
                UploadMode::Create {
                    override_existing: false
                }
            )
        {
            return Err(ServerError::Conflict(format!(
                "{} already exists",
                request.path
            )));
        }

        let name = relative_name(request.dir, request.path)?;
        let abs_dir = self.resolve(request.dir)?;
        fs::create_dir_all(&abs_dir).await?;
        let abs_dir_str = abs_dir.to_string_lossy();
        guard.ensure_directory(&abs_dir_str)?;

        let backup_dir = if exists {
            Some(self.back_up(&guard, &request, &abs_dir_str, &target, name).await?)
        } else {
            None
        };

        if let Err(e) = write_body(&target, body).await {
            if let Err(cleanup) = fs::remove_file(&target).await {
                warn!(path = %target.display(), error = %cleanup, "Failed to remove partial upload");
            }
            return Err(e);
        }

        let etag = etag_for(&target).await?;
        let full_path = target.to_string_lossy();
        let category = guard.record_upload(request.dir, &abs_dir_str, &full_path)?;

        info!(
            session = %request.token,
            path = %request.path,
            category = ?category,
            "Staged upload"
        );

        Ok(StageOutcome::File {
            path: request.path.to_string(),
            etag,
            category,
            backup_dir,
        })
    }

    /// Move the current version of `target` into the session's backup
    /// directory for `abs_dir`, keeping its path below the upload directory.
    async fn back_up(
        &self,
        guard: &StagingGuard<'_>,
        request: &UploadRequest<'_>,
        abs_dir: &str,
        target: &Path,
        name: &str,
    ) -> Result<String> {
        let backup = guard.backup_dir(abs_dir, || backup_name(request.dir, request.token))?;
        let destination = self.resolve(&backup)?.join(name);
        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::rename(target, &destination).await?;
        debug!(
            from = %target.display(),
            to = %destination.display(),
            "Backed up overwritten file"
        );
        Ok(backup)
    }
}

/// Backup directory name: `<dir>_<token>_<YYYYMMDD_HHMMSS>` in local time.
pub fn backup_name(dir: &str, token: &str) -> String {
    let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
    format!("{}_{}_{}", dir.trim_end_matches('/'), token, timestamp)
}

/// Path of `path` below `dir`. Fails if `path` is not inside `dir`.
fn relative_name<'a>(dir: &str, path: &'a str) -> Result<&'a str> {
    let dir = dir.trim_end_matches('/');
    path.strip_prefix(dir)
        .and_then(|rest| rest.strip_prefix('/'))
        .filter(|rest| !rest.is_empty())
        .ok_or_else(|| {
            ServerError::BadRequest(format!("{} is not inside upload directory {}", path, dir))
        })
}

async fn write_body<S, E>(target: &Path, body: S) -> Result<()>
where
    S: Stream<Item = std::result::Result<Bytes, E>>,
    E: std::fmt::Display,
{
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent).await?;
    }

    let mut body = std::pin::pin!(body);
    let mut file = fs::File::create(target).await?;
    while let Some(chunk) = body.next().await {
        let chunk = chunk
            .map_err(|e| ServerError::BadRequest(format!("Failed to read request body: {}", e)))?;
        file.write_all(&chunk).await?;
    }
    file.flush().await?;
    Ok(())
}

/// `"<mtime-nanos-hex><size-hex>"`.
async fn etag_for(path: &Path) -> Result<String> {
    let meta = fs::metadata(path).await?;
    let nanos = meta
        .modified()?
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();
    Ok(format!("\"{:x}{:x}\"", nanos, meta.len()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::testing::test_state;
    use futures::stream;
    use std::convert::Infallible;

    const DIR: &str = "/wedo/ClientConfig/CSCommon/DB";

    fn body(bytes: &'static [u8]) -> impl Stream<Item = std::result::Result<Bytes, Infallible>> {
        stream::iter(vec![Ok(Bytes::from_static(bytes))])
    }

    fn put<'a>(token: &'a str, path: &'a str) -> UploadRequest<'a> {
        UploadRequest {
            token,
            dir: DIR,
            path,
            mode: UploadMode::Save,
        }
    }

    #[test]
    fn test_resolve_rejects_parent_components() {
        let stager = Stager::new("/srv/root");
        assert_eq!(
            stager.resolve("/wedo/a.db").unwrap(),
            PathBuf::from("/srv/root/wedo/a.db")
        );
        assert_eq!(
            stager.resolve("wedo/./a.db").unwrap(),
            PathBuf::from("/srv/root/wedo/a.db")
        );
        assert!(matches!(
            stager.resolve("/wedo/../../etc/passwd"),
            Err(ServerError::BadRequest(_))
        ));
    }

    #[test]
    fn test_relative_name() {
        assert_eq!(relative_name(DIR, "/wedo/ClientConfig/CSCommon/DB/Item.db").unwrap(), "Item.db");
        assert_eq!(relative_name("/wedo/ServerConfig/", "/wedo/ServerConfig/a/b.xml").unwrap(), "a/b.xml");
        assert!(relative_name(DIR, "/wedo/ClientConfig/CSCommon/DBX/Item.db").is_err());
        assert!(relative_name(DIR, DIR).is_err());
    }

    #[test]
    fn test_backup_name_format() {
        let name = backup_name("/wedo/ServerConfig/", "tok");
        let stamp = name.strip_prefix("/wedo/ServerConfig_tok_").unwrap();
        assert_eq!(stamp.len(), "20240101_000000".len());
        assert_eq!(&stamp[8..9], "_");
    }

    #[tokio::test]
    async fn test_missing_token_or_dir_is_forbidden() {
        let root = tempfile::tempdir().unwrap();
        let (state, _) = test_state(root.path(), None);

        let mut request = put("", "/wedo/ClientConfig/CSCommon/DB/Item.db");
        let err = state
            .stager
            .stage(&state.coordinator, request.clone(), body(b"x"))
            .await
            .unwrap_err();
        assert!(matches!(err, ServerError::Forbidden(ref m) if m.contains("without uuid")));

        request.token = "tok";
        request.dir = "";
        let err = state
            .stager
            .stage(&state.coordinator, request, body(b"x"))
            .await
            .unwrap_err();
        assert!(matches!(err, ServerError::Forbidden(ref m) if m.contains("upload directory")));
        assert_eq!(state.coordinator.store().size(), 0);
    }

    #[tokio::test]
    async fn test_stage_writes_and_records() {
        let root = tempfile::tempdir().unwrap();
        let (state, _) = test_state(root.path(), None);

        let outcome = state
            .stager
            .stage(
                &state.coordinator,
                put("tok", "/wedo/ClientConfig/CSCommon/DB/Item.db"),
                body(b"payload"),
            )
            .await
            .unwrap();

        let StageOutcome::File {
            etag,
            category,
            backup_dir,
            ..
        } = outcome
        else {
            panic!("expected a file outcome");
        };
        assert!(etag.starts_with('"') && etag.ends_with('"'));
        assert_eq!(category, Some(ConfigCategory::ClientDb));
        assert_eq!(backup_dir, None);

        let written = root.path().join("wedo/ClientConfig/CSCommon/DB/Item.db");
        assert_eq!(std::fs::read(&written).unwrap(), b"payload");

        let snapshot = state.coordinator.store().get("tok").unwrap();
        let abs_dir = root.path().join("wedo/ClientConfig/CSCommon/DB");
        let entry = snapshot.directory(&abs_dir.to_string_lossy()).unwrap();
        assert!(entry.db_files().contains(written.to_string_lossy().as_ref()));
    }

    #[tokio::test]
    async fn test_overwrite_moves_previous_version_to_backup() {
        let root = tempfile::tempdir().unwrap();
        let (state, _) = test_state(root.path(), None);
        let path = "/wedo/ClientConfig/CSCommon/DB/Item.db";

        state
            .stager
            .stage(&state.coordinator, put("tok", path), body(b"v1"))
            .await
            .unwrap();
        let second = state
            .stager
            .stage(&state.coordinator, put("tok", path), body(b"v2"))
            .await
            .unwrap();
        let third = state
            .stager
            .stage(&state.coordinator, put("tok", path), body(b"v3"))
            .await
            .unwrap();

        let backup_of = |outcome: &StageOutcome| match outcome {
            StageOutcome::File { backup_dir, .. } => backup_dir.clone(),
            StageOutcome::Directory { .. } => None,
        };
        let backup = backup_of(&second).unwrap();
        assert!(backup.starts_with("/wedo/ClientConfig/CSCommon/DB_tok_"));
        assert_eq!(backup_of(&third).as_deref(), Some(backup.as_str()));

        let current = root.path().join("wedo/ClientConfig/CSCommon/DB/Item.db");
        assert_eq!(std::fs::read(current).unwrap(), b"v3");
        let saved = state.stager.resolve(&backup).unwrap().join("Item.db");
        assert_eq!(std::fs::read(saved).unwrap(), b"v2");
    }

    #[tokio::test]
    async fn test_create_conflicts_unless_override() {
        let root = tempfile::tempdir().unwrap();
        let (state, _) = test_state(root.path(), None);
        let path = "/wedo/ServerConfig/svr.xml";
        let create = |override_existing| UploadRequest {
            token: "tok",
            dir: "/wedo/ServerConfig",
            path,
            mode: UploadMode::Create { override_existing },
        };

        state
            .stager
            .stage(&state.coordinator, create(false), body(b"a"))
            .await
            .unwrap();
        let err = state
            .stager
            .stage(&state.coordinator, create(false), body(b"b"))
            .await
            .unwrap_err();
        assert!(matches!(err, ServerError::Conflict(_)));

        let outcome = state
            .stager
            .stage(&state.coordinator, create(true), body(b"c"))
            .await
            .unwrap();
        assert!(matches!(
            outcome,
            StageOutcome::File {
                category: Some(ConfigCategory::Server),
                backup_dir: Some(_),
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_directory_paths() {
        let root = tempfile::tempdir().unwrap();
        let (state, _) = test_state(root.path(), None);
        let path = "/wedo/ClientConfig/New/";

        let err = state
            .stager
            .stage(&state.coordinator, put("tok", path), body(b""))
            .await
            .unwrap_err();
        assert!(matches!(err, ServerError::MethodNotAllowed(_)));

        let request = UploadRequest {
            mode: UploadMode::Create {
                override_existing: false,
            },
            ..put("tok", path)
        };
        let outcome = state
            .stager
            .stage(&state.coordinator, request, body(b""))
            .await
            .unwrap();
        assert!(matches!(outcome, StageOutcome::Directory { .. }));
        assert!(root.path().join("wedo/ClientConfig/New").is_dir());
    }

    #[tokio::test]
    async fn test_failed_body_removes_partial_file() {
        let root = tempfile::tempdir().unwrap();
        let (state, _) = test_state(root.path(), None);
        let chunks = stream::iter(vec![
            Ok(Bytes::from_static(b"partial")),
            Err("connection reset"),
        ]);

        let err = state
            .stager
            .stage(
                &state.coordinator,
                put("tok", "/wedo/ClientConfig/CSCommon/DB/Item.db"),
                chunks,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ServerError::BadRequest(_)));

        assert!(!root.path().join("wedo/ClientConfig/CSCommon/DB/Item.db").exists());
        let snapshot = state.coordinator.store().get("tok").unwrap();
        assert!(snapshot.directories.values().all(|entry| entry.is_empty()));
    }

    #[tokio::test]
    async fn test_second_token_is_busy() {
        let root = tempfile::tempdir().unwrap();
        let (state, _) = test_state(root.path(), None);

        state
            .stager
            .stage(
                &state.coordinator,
                put("first", "/wedo/ClientConfig/CSCommon/DB/Item.db"),
                body(b"a"),
            )
            .await
            .unwrap();
        let err = state
            .stager
            .stage(
                &state.coordinator,
                put("second", "/wedo/ClientConfig/CSCommon/DB/Other.db"),
                body(b"b"),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ServerError::Forbidden(ref m) if m.contains("hot reloading")));
    }
}
