//! Upload endpoints.
//!
//! `POST /resources/{*path}` creates, `PUT /resources/{*path}` saves.

use axum::{
    Json,
    body::Body,
    extract::{Path, Query, State},
    http::{HeaderValue, Uri, header::ETAG},
    response::{IntoResponse, Response},
};
use serde::Deserialize;

use crate::error::Result;
use crate::staging::{StageOutcome, UploadMode, UploadRequest};
use crate::state::AppState;

/// Query parameters shared by create and save.
#[derive(Debug, Default, Deserialize)]
pub struct UploadQuery {
    /// Session token.
    #[serde(default)]
    pub uuid: String,

    /// Upload directory, root-relative.
    #[serde(default)]
    pub dir: String,

    /// `true` lets `POST` replace an existing file.
    #[serde(default, rename = "override")]
    pub override_existing: Option<String>,
}

impl UploadQuery {
    fn overrides(&self) -> bool {
        self.override_existing.as_deref() == Some("true")
    }
}

/// POST /resources/{*path} - create a file or directory.
pub async fn create_resource_handler(
    State(state): State<AppState>,
    Path(path): Path<String>,
    Query(query): Query<UploadQuery>,
    uri: Uri,
    body: Body,
) -> Result<Response> {
    let mode = UploadMode::Create {
        override_existing: query.overrides(),
    };
    stage(state, path, query, uri, mode, body).await
}

/// PUT /resources/{*path} - save a file, replacing any existing one.
pub async fn save_resource_handler(
    State(state): State<AppState>,
    Path(path): Path<String>,
    Query(query): Query<UploadQuery>,
    uri: Uri,
    body: Body,
) -> Result<Response> {
    stage(state, path, query, uri, UploadMode::Save, body).await
}

async fn stage(
    state: AppState,
    path: String,
    query: UploadQuery,
    uri: Uri,
    mode: UploadMode,
    body: Body,
) -> Result<Response> {
    let path = resource_path(&path, &uri);
    let request = UploadRequest {
        token: &query.uuid,
        dir: &query.dir,
        path: &path,
        mode,
    };

    let outcome = state
        .stager
        .stage(&state.coordinator, request, body.into_data_stream())
        .await?;

    let mut response = Json(&outcome).into_response();
    if let StageOutcome::File { etag, .. } = &outcome
        && let Ok(value) = HeaderValue::from_str(etag)
    {
        response.headers_mut().insert(ETAG, value);
    }
    Ok(response)
}

/// Root-relative path of the resource, keeping a trailing `/`.
fn resource_path(captured: &str, uri: &Uri) -> String {
    let mut path = format!("/{}", captured.trim_start_matches('/'));
    if uri.path().ends_with('/') && !path.ends_with('/') {
        path.push('/');
    }
    path
}
