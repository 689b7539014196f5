//! In-process stand-in for the QAtron control-plane API.
//!
//! Serves the subset of `/api/v1` the board talks to, backed by JSON values
//! held in memory, and records what each request carried so tests can assert
//! on headers, encodings and request counts.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Form, Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};

use qatron_board::client::BoardClient;
use qatron_board::session::SessionStore;
use qatron_board::Board;

pub const TOKEN: &str = "token-abc";
pub const USERNAME: &str = "admin";
pub const PASSWORD: &str = "admin123";
pub const ORGANIZATION_ID: i64 = 3;

type Shared = Arc<MockState>;

#[derive(Default)]
pub struct MockState {
    pub projects: Mutex<Vec<Value>>,
    pub runs: Mutex<Vec<Value>>,
    pub suites: Mutex<HashMap<i64, Vec<Value>>>,
    pub environments: Mutex<HashMap<i64, Vec<Value>>>,
    pub features: Mutex<HashMap<i64, Vec<Value>>>,
    /// `Authorization` header of every authenticated request, in order.
    pub auth_headers: Mutex<Vec<Option<String>>>,
    /// "METHOD /path" of every request, in order.
    pub requests: Mutex<Vec<String>>,
    pub login_content_types: Mutex<Vec<String>>,
    pub created_projects: Mutex<Vec<Value>>,
    /// Number of upcoming run reads that answer 500.
    pub run_read_failures: AtomicUsize,
    pub fail_create_run: Mutex<Option<(StatusCode, Value)>>,
    pub fail_trigger: Mutex<Option<(StatusCode, Value)>>,
    pub fail_ingest: Mutex<Option<(StatusCode, Value)>>,
    /// Answer 401 to every authenticated request.
    pub revoked: AtomicBool,
    /// Make `/auth/me` answer 500.
    pub me_unavailable: AtomicBool,
}

impl MockState {
    pub fn new() -> Shared {
        Arc::new(Self::default())
    }

    pub fn add_project(&self, id: i64, name: &str) {
        self.projects.lock().unwrap().push(project_json(id, name, None));
    }

    pub fn add_suite(&self, project_id: i64, id: i64, name: &str) {
        self.suites
            .lock()
            .unwrap()
            .entry(project_id)
            .or_default()
            .push(json!({ "id": id, "name": name, "layer": "api" }));
    }

    pub fn add_environment(&self, project_id: i64, id: i64, name: &str) {
        self.environments
            .lock()
            .unwrap()
            .entry(project_id)
            .or_default()
            .push(json!({ "id": id, "name": name, "base_url": format!("https://{}.example.test", name) }));
    }

    pub fn add_run(&self, id: i64, status: &str, project_id: i64) {
        self.runs
            .lock()
            .unwrap()
            .push(run_json(id, status, project_id, 1, 1, None));
    }

    pub fn run_status(&self, id: i64) -> Option<String> {
        self.runs
            .lock()
            .unwrap()
            .iter()
            .find(|r| r["id"] == id)
            .and_then(|r| r["status"].as_str().map(str::to_string))
    }

    pub fn count(&self, request: &str) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.as_str() == request)
            .count()
    }

    pub fn total_requests(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn last_auth_header(&self) -> Option<String> {
        self.auth_headers.lock().unwrap().last().cloned().flatten()
    }
}

pub fn project_json(id: i64, name: &str, description: Option<&str>) -> Value {
    json!({
        "id": id,
        "name": name,
        "description": description,
        "repo_url": format!("https://git.example.test/{}.git", name.to_lowercase()),
        "repo_auth_method": "token",
        "organization_id": ORGANIZATION_ID,
        "created_at": "2025-02-18T10:30:00Z",
        "updated_at": null,
    })
}

pub fn run_json(
    id: i64,
    status: &str,
    project_id: i64,
    suite_id: i64,
    environment_id: i64,
    branch: Option<&str>,
) -> Value {
    json!({
        "id": id,
        "status": status,
        "project_id": project_id,
        "suite_id": suite_id,
        "environment_id": environment_id,
        "branch": branch,
        "commit": null,
        "total_tests": 0,
        "passed_tests": 0,
        "failed_tests": 0,
        "skipped_tests": 0,
        "created_at": "2025-02-18T10:30:00Z",
    })
}

fn detail(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "detail": message }))).into_response()
}

fn record(state: &MockState, request: String) {
    state.requests.lock().unwrap().push(request);
}

/// Record the request and check its bearer credential.
fn authorize(state: &MockState, headers: &HeaderMap, request: String) -> Result<(), Response> {
    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    state.auth_headers.lock().unwrap().push(auth.clone());
    record(state, request);

    let expected = format!("Bearer {}", TOKEN);
    if state.revoked.load(Ordering::SeqCst) || auth.as_deref() != Some(expected.as_str()) {
        return Err(detail(StatusCode::UNAUTHORIZED, "Could not validate credentials"));
    }
    Ok(())
}

fn take_failure(slot: &Mutex<Option<(StatusCode, Value)>>) -> Option<Response> {
    slot.lock()
        .unwrap()
        .take()
        .map(|(status, body)| (status, Json(body)).into_response())
}

fn take_read_failure(state: &MockState) -> Option<Response> {
    let remaining = state.run_read_failures.load(Ordering::SeqCst);
    if remaining == 0 {
        return None;
    }
    state.run_read_failures.store(remaining - 1, Ordering::SeqCst);
    Some(detail(StatusCode::INTERNAL_SERVER_ERROR, "Database unavailable"))
}

// ============================================================
// Auth
// ============================================================

async fn login(
    State(state): State<Shared>,
    headers: HeaderMap,
    Form(form): Form<HashMap<String, String>>,
) -> Response {
    record(&state, "POST /auth/login".to_string());
    let content_type = headers
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    state.login_content_types.lock().unwrap().push(content_type);

    let username = form.get("username").map(String::as_str);
    let password = form.get("password").map(String::as_str);
    if username == Some(USERNAME) && password == Some(PASSWORD) {
        Json(json!({ "access_token": TOKEN, "token_type": "bearer" })).into_response()
    } else {
        detail(StatusCode::UNAUTHORIZED, "Incorrect username or password")
    }
}

async fn me(State(state): State<Shared>, headers: HeaderMap) -> Response {
    if let Err(r) = authorize(&state, &headers, "GET /auth/me".to_string()) {
        return r;
    }
    if state.me_unavailable.load(Ordering::SeqCst) {
        return detail(StatusCode::INTERNAL_SERVER_ERROR, "User service unavailable");
    }
    Json(json!({
        "id": 1,
        "email": "admin@example.test",
        "username": USERNAME,
        "full_name": "Admin",
        "is_active": true,
        "organization_id": ORGANIZATION_ID,
        "created_at": "2025-01-01T00:00:00Z",
    }))
    .into_response()
}

// ============================================================
// Projects
// ============================================================

async fn list_projects(State(state): State<Shared>, headers: HeaderMap) -> Response {
    if let Err(r) = authorize(&state, &headers, "GET /projects".to_string()) {
        return r;
    }
    Json(Value::Array(state.projects.lock().unwrap().clone())).into_response()
}

async fn create_project(
    State(state): State<Shared>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if let Err(r) = authorize(&state, &headers, "POST /projects".to_string()) {
        return r;
    }
    state.created_projects.lock().unwrap().push(body.clone());

    let mut projects = state.projects.lock().unwrap();
    let id = projects.len() as i64 + 1;
    let mut project = project_json(id, body["name"].as_str().unwrap_or_default(), None);
    project["description"] = body["description"].clone();
    project["repo_url"] = body["repo_url"].clone();
    project["repo_auth_method"] = body["repo_auth_method"].clone();
    project["organization_id"] = body["organization_id"].clone();
    projects.push(project.clone());
    (StatusCode::CREATED, Json(project)).into_response()
}

async fn get_project(
    State(state): State<Shared>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Response {
    if let Err(r) = authorize(&state, &headers, format!("GET /projects/{}", id)) {
        return r;
    }
    match state.projects.lock().unwrap().iter().find(|p| p["id"] == id) {
        Some(project) => Json(project.clone()).into_response(),
        None => detail(StatusCode::NOT_FOUND, "Project not found"),
    }
}

async fn update_project(
    State(state): State<Shared>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Json(body): Json<Value>,
) -> Response {
    if let Err(r) = authorize(&state, &headers, format!("PUT /projects/{}", id)) {
        return r;
    }
    let mut projects = state.projects.lock().unwrap();
    let Some(project) = projects.iter_mut().find(|p| p["id"] == id) else {
        return detail(StatusCode::NOT_FOUND, "Project not found");
    };
    if let Some(fields) = body.as_object() {
        for (key, value) in fields {
            project[key.as_str()] = value.clone();
        }
    }
    Json(project.clone()).into_response()
}

async fn delete_project(
    State(state): State<Shared>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Response {
    if let Err(r) = authorize(&state, &headers, format!("DELETE /projects/{}", id)) {
        return r;
    }
    let mut projects = state.projects.lock().unwrap();
    let before = projects.len();
    projects.retain(|p| p["id"] != id);
    if projects.len() == before {
        return detail(StatusCode::NOT_FOUND, "Project not found");
    }
    StatusCode::NO_CONTENT.into_response()
}

async fn list_suites(
    State(state): State<Shared>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Response {
    if let Err(r) = authorize(&state, &headers, format!("GET /projects/{}/suites", id)) {
        return r;
    }
    let suites = state.suites.lock().unwrap().get(&id).cloned().unwrap_or_default();
    Json(Value::Array(suites)).into_response()
}

async fn list_environments(
    State(state): State<Shared>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Response {
    if let Err(r) = authorize(&state, &headers, format!("GET /projects/{}/environments", id)) {
        return r;
    }
    let environments = state
        .environments
        .lock()
        .unwrap()
        .get(&id)
        .cloned()
        .unwrap_or_default();
    Json(Value::Array(environments)).into_response()
}

async fn ensure_defaults(
    State(state): State<Shared>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Response {
    if let Err(r) = authorize(&state, &headers, format!("POST /projects/{}/ensure-defaults", id)) {
        return r;
    }
    let mut created = Vec::new();
    {
        let mut suites = state.suites.lock().unwrap();
        let list = suites.entry(id).or_default();
        if list.is_empty() {
            list.push(json!({ "id": 100 + id, "name": "default", "layer": "api" }));
            created.push("suite");
        }
    }
    {
        let mut environments = state.environments.lock().unwrap();
        let list = environments.entry(id).or_default();
        if list.is_empty() {
            list.push(json!({ "id": 200 + id, "name": "default", "base_url": null }));
            created.push("environment");
        }
    }
    Json(json!({ "message": "Defaults ensured", "created": created })).into_response()
}

// ============================================================
// Runs
// ============================================================

async fn list_runs(
    State(state): State<Shared>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    if let Err(r) = authorize(&state, &headers, "GET /runs".to_string()) {
        return r;
    }
    if let Some(r) = take_read_failure(&state) {
        return r;
    }

    let project_id: Option<i64> = query.get("project_id").and_then(|v| v.parse().ok());
    let limit: Option<usize> = query.get("limit").and_then(|v| v.parse().ok());
    let runs: Vec<Value> = state
        .runs
        .lock()
        .unwrap()
        .iter()
        .rev()
        .filter(|r| project_id.map_or(true, |id| r["project_id"] == id))
        .filter(|r| {
            query
                .get("status")
                .map_or(true, |s| r["status"].as_str() == Some(s.as_str()))
        })
        .filter(|r| {
            query
                .get("branch")
                .map_or(true, |b| r["branch"].as_str() == Some(b.as_str()))
        })
        .take(limit.unwrap_or(usize::MAX))
        .cloned()
        .collect();
    Json(Value::Array(runs)).into_response()
}

async fn get_run(State(state): State<Shared>, headers: HeaderMap, Path(id): Path<i64>) -> Response {
    if let Err(r) = authorize(&state, &headers, format!("GET /runs/{}", id)) {
        return r;
    }
    if let Some(r) = take_read_failure(&state) {
        return r;
    }
    match state.runs.lock().unwrap().iter().find(|r| r["id"] == id) {
        Some(run) => Json(run.clone()).into_response(),
        None => detail(StatusCode::NOT_FOUND, "Run not found"),
    }
}

async fn create_run(
    State(state): State<Shared>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if let Err(r) = authorize(&state, &headers, "POST /runs".to_string()) {
        return r;
    }
    if let Some(r) = take_failure(&state.fail_create_run) {
        return r;
    }

    let (Some(project_id), Some(suite_id), Some(environment_id)) = (
        body["project_id"].as_i64(),
        body["suite_id"].as_i64(),
        body["environment_id"].as_i64(),
    ) else {
        return detail(StatusCode::UNPROCESSABLE_ENTITY, "project_id, suite_id and environment_id are required");
    };

    let mut runs = state.runs.lock().unwrap();
    let id = runs.iter().filter_map(|r| r["id"].as_i64()).max().unwrap_or(0) + 1;
    let run = run_json(
        id,
        "queued",
        project_id,
        suite_id,
        environment_id,
        body["branch"].as_str(),
    );
    runs.push(run.clone());
    (StatusCode::CREATED, Json(run)).into_response()
}

async fn update_run(
    State(state): State<Shared>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Json(body): Json<Value>,
) -> Response {
    if let Err(r) = authorize(&state, &headers, format!("PUT /runs/{}", id)) {
        return r;
    }
    let mut runs = state.runs.lock().unwrap();
    let Some(run) = runs.iter_mut().find(|r| r["id"] == id) else {
        return detail(StatusCode::NOT_FOUND, "Run not found");
    };
    if let Some(fields) = body.as_object() {
        for (key, value) in fields {
            run[key.as_str()] = value.clone();
        }
    }
    Json(run.clone()).into_response()
}

async fn trigger_run(
    State(state): State<Shared>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Response {
    if let Err(r) = authorize(&state, &headers, format!("POST /runs/{}/trigger", id)) {
        return r;
    }
    if let Some(r) = take_failure(&state.fail_trigger) {
        return r;
    }
    let mut runs = state.runs.lock().unwrap();
    let Some(run) = runs.iter_mut().find(|r| r["id"] == id) else {
        return detail(StatusCode::NOT_FOUND, "Run not found");
    };
    if run["status"] != "queued" {
        return detail(StatusCode::BAD_REQUEST, "Run is not queued");
    }
    run["status"] = json!("running");
    Json(json!({ "message": "Run triggered", "run_id": id })).into_response()
}

// ============================================================
// Features
// ============================================================

async fn list_features(
    State(state): State<Shared>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Response {
    if let Err(r) = authorize(&state, &headers, format!("GET /features/projects/{}/features", id)) {
        return r;
    }
    let features = state.features.lock().unwrap().get(&id).cloned().unwrap_or_default();
    Json(Value::Array(features)).into_response()
}

async fn ingest_features(
    State(state): State<Shared>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Json(body): Json<Value>,
) -> Response {
    let request = format!("POST /features/projects/{}/ingest-features-from-content", id);
    if let Err(r) = authorize(&state, &headers, request) {
        return r;
    }
    if let Some(r) = take_failure(&state.fail_ingest) {
        return r;
    }

    let items = body["features"].as_array().cloned().unwrap_or_default();
    let mut features = state.features.lock().unwrap();
    let list = features.entry(id).or_default();
    for item in &items {
        let next_id = list.len() as i64 + 1;
        list.push(parse_feature(
            next_id,
            item["file_path"].as_str().unwrap_or_default(),
            item["content"].as_str().unwrap_or_default(),
        ));
    }
    Json(json!({ "message": "Features ingested", "features_count": items.len() })).into_response()
}

/// Just enough Gherkin to produce named scenarios with steps.
fn parse_feature(id: i64, file_path: &str, content: &str) -> Value {
    let mut name = file_path.to_string();
    let mut scenarios: Vec<Value> = Vec::new();
    for line in content.lines().map(str::trim) {
        if let Some(rest) = line.strip_prefix("Feature:") {
            name = rest.trim().to_string();
        } else if let Some(rest) = line.strip_prefix("Scenario:") {
            let scenario_id = scenarios.len() as i64 + 1;
            scenarios.push(json!({
                "id": scenario_id,
                "name": rest.trim(),
                "type": "scenario",
                "tags": [],
                "steps": [],
            }));
        } else if let Some((keyword, text)) = line.split_once(' ') {
            if ["Given", "When", "Then", "And", "But"].contains(&keyword) {
                if let Some(steps) = scenarios
                    .last_mut()
                    .and_then(|s| s["steps"].as_array_mut())
                {
                    steps.push(json!({ "type": "step", "keyword": keyword, "text": text }));
                }
            }
        }
    }
    json!({
        "id": id,
        "name": name,
        "file_path": file_path,
        "description": null,
        "tags": [],
        "scenarios": scenarios,
    })
}

fn router(state: Shared) -> Router {
    let api = Router::new()
        .route("/auth/login", post(login))
        .route("/auth/me", get(me))
        .route("/projects", get(list_projects).post(create_project))
        .route(
            "/projects/{id}",
            get(get_project).put(update_project).delete(delete_project),
        )
        .route("/projects/{id}/suites", get(list_suites))
        .route("/projects/{id}/environments", get(list_environments))
        .route("/projects/{id}/ensure-defaults", post(ensure_defaults))
        .route("/runs", get(list_runs).post(create_run))
        .route("/runs/{id}", get(get_run).put(update_run))
        .route("/runs/{id}/trigger", post(trigger_run))
        .route("/features/projects/{id}/features", get(list_features))
        .route(
            "/features/projects/{id}/ingest-features-from-content",
            post(ingest_features),
        )
        .with_state(state);
    Router::new().nest("/api/v1", api)
}

/// Serve the mock on an ephemeral port and return its API base URL.
pub async fn spawn(state: Shared) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind mock server");
    let addr = listener.local_addr().expect("Failed to read mock address");
    tokio::spawn(async move {
        axum::serve(listener, router(state))
            .await
            .expect("Mock server failed");
    });
    format!("http://{}/api/v1", addr)
}

/// A client against `base_url` that retries reads once without delay.
pub fn client(base_url: &str, session: SessionStore) -> BoardClient {
    BoardClient::new(base_url, session).with_retry_policy(1, Duration::ZERO)
}

/// A board with no session yet.
pub async fn board(state: &Shared) -> Board {
    let base_url = spawn(state.clone()).await;
    Board::new(client(&base_url, SessionStore::in_memory()))
}

/// A board already holding the valid token.
pub async fn signed_in_board(state: &Shared) -> Board {
    let board = board(state).await;
    board.session().set_token(Some(TOKEN.to_string()));
    board
}
