#![allow(dead_code)]

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::body::Body;
use axum::http::{Method, Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use tempfile::TempDir;
use tower::ServiceExt;

use mole_api::config::ServerConfig;
use mole_api::router::build_app_router;
use mole_api::state::AppState;
use mole_core::error::CoreError;
use mole_core::fetch::StructureSource;
use mole_core::manager::JobManager;

/// Tool that writes channel data next to its input and exits cleanly.
pub const SUCCEEDS: &str = r#"out="$(dirname "$1")"
mkdir -p "$out/json"
echo '{"Channels":[]}' > "$out/json/data.json"
"#;

/// Tool that reports a diagnostic on its error stream.
pub const FAILS: &str = "echo 'bad input' >&2\n";

pub const STRUCTURE: &[u8] = b"data_1TQN\nATOM 1 N MET A 1\n";

/// Serves the same structure for every identifier.
pub struct FakeSource;

#[async_trait::async_trait]
impl StructureSource for FakeSource {
    async fn fetch_structure(
        &self,
        _structure_id: &str,
        _assembly_id: Option<&str>,
    ) -> Result<Vec<u8>, CoreError> {
        Ok(STRUCTURE.to_vec())
    }

    async fn preferred_assembly(&self, _structure_id: &str) -> Result<Option<String>, CoreError> {
        Ok(None)
    }
}

/// A running application over a temporary working directory.
pub struct TestApp {
    pub router: Router,
    pub manager: Arc<JobManager>,
    pub workspace: TempDir,
    _tools: TempDir,
}

fn write_tool(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/bash\n{body}")).expect("write tool");
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).expect("chmod tool");
    path
}

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config(working_directory: &Path, mole: PathBuf, pores: PathBuf) -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        working_directory: working_directory.to_path_buf(),
        max_concurrent_computations: 4,
        mole_executable: mole,
        pores_executable: pores,
        pymol_path: "pymol".to_string(),
        membed_path: "membed".to_string(),
        coordinate_server_url: "http://127.0.0.1:9".to_string(),
        assembly_metadata_url: "http://127.0.0.1:9".to_string(),
        fetch_timeout_secs: 1,
        max_upload_bytes: 1024 * 1024,
    }
}

/// Build the full application router with every middleware layer, running
/// `mole_body` as the channel tool.
pub fn build_test_app(mole_body: &str) -> TestApp {
    let workspace = tempfile::tempdir().expect("workspace");
    let tools = tempfile::tempdir().expect("tools");
    let mole = write_tool(tools.path(), "mole.sh", mole_body);
    let pores = write_tool(tools.path(), "pores.sh", SUCCEEDS);

    let config = test_config(workspace.path(), mole, pores);
    let manager = JobManager::new(config.manager_config(), Arc::new(FakeSource)).expect("manager");

    let state = AppState {
        manager: Arc::clone(&manager),
        config: Arc::new(config.clone()),
    };

    TestApp {
        router: build_app_router(state, &config),
        manager,
        workspace,
        _tools: tools,
    }
}

pub async fn send(app: &Router, request: Request<Body>) -> Response<axum::body::Body> {
    app.clone().oneshot(request).await.expect("request")
}

pub async fn get(app: &Router, uri: &str) -> Response<Body> {
    let request = Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .expect("request");
    send(app, request).await
}

pub async fn post(app: &Router, uri: &str, body: impl Into<Body>) -> Response<Body> {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header("content-type", "application/json")
        .body(body.into())
        .expect("request");
    send(app, request).await
}

pub async fn delete(app: &Router, uri: &str) -> Response<Body> {
    let request = Request::builder()
        .method(Method::DELETE)
        .uri(uri)
        .body(Body::empty())
        .expect("request");
    send(app, request).await
}

/// POST a single-file multipart form.
pub async fn upload(app: &Router, field: &str, file_name: &str, content: &[u8]) -> Response<Body> {
    let boundary = "mole-test-boundary";
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"{field}\"; \
             filename=\"{file_name}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(content);
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());

    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/v1/jobs/upload")
        .header(
            "content-type",
            format!("multipart/form-data; boundary={boundary}"),
        )
        .body(Body::from(body))
        .expect("request");
    send(app, request).await
}

pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    response
        .into_body()
        .collect()
        .await
        .expect("body")
        .to_bytes()
        .to_vec()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    serde_json::from_slice(&body_bytes(response).await).expect("json body")
}
