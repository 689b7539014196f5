//! HTTP client for the QAtron control-plane API.
//!
//! Every request reads the session token at send time and attaches it as a
//! bearer credential. A 401 from any endpoint clears the session before the
//! error reaches the caller, so a rejected token never stays "signed in".

mod error;

use std::time::Duration;

use reqwest::{Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;

pub use error::{ClientError, ErrorDetail};

use crate::config::BoardConfig;
use crate::models::*;
use crate::session::SessionStore;

/// HTTP client for the control-plane API.
#[derive(Debug, Clone)]
pub struct BoardClient {
    base_url: String,
    session: SessionStore,
    client: Client,
    read_retries: u32,
    retry_delay: Duration,
}

impl BoardClient {
    /// Create with explicit configuration. Reads are retried once by default.
    pub fn new(base_url: impl Into<String>, session: SessionStore) -> Self {
        let base_url: String = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            session,
            client: Client::new(),
            read_retries: 1,
            retry_delay: Duration::from_millis(300),
        }
    }

    pub fn from_config(config: &BoardConfig, session: SessionStore) -> Self {
        Self::new(config.api_url.clone(), session)
            .with_retry_policy(config.read_retries, config.retry_delay())
    }

    pub fn with_retry_policy(mut self, read_retries: u32, retry_delay: Duration) -> Self {
        self.read_retries = read_retries;
        self.retry_delay = retry_delay;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn session(&self) -> &SessionStore {
        &self.session
    }

    /// Build a request, attaching whatever token the session holds right now.
    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        let mut req = self.client.request(method, &url);
        if let Some(token) = self.session.token() {
            req = req.bearer_auth(token);
        }
        req
    }

    /// Convert non-success responses into `ClientError`, clearing the session on 401.
    async fn check(&self, response: Response) -> Result<Response, ClientError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let err = ClientError::from_status(status, &body);
        if err.is_unauthorized() {
            tracing::warn!("Server rejected the session credential, signing out");
            self.session.logout();
        }
        Err(err)
    }

    async fn send<T: DeserializeOwned>(&self, req: RequestBuilder) -> Result<T, ClientError> {
        let response = self.check(req.send().await?).await?;
        Ok(response.json().await?)
    }

    async fn send_empty(&self, req: RequestBuilder) -> Result<(), ClientError> {
        self.check(req.send().await?).await?;
        Ok(())
    }

    /// GET with the read retry policy. The request is rebuilt per attempt so a
    /// retry never reuses a token that changed in between.
    async fn read<T, F>(&self, path: &str, build: F) -> Result<T, ClientError>
    where
        T: DeserializeOwned,
        F: Fn(RequestBuilder) -> RequestBuilder,
    {
        let mut attempt = 0;
        loop {
            match self.send(build(self.request(Method::GET, path))).await {
                Err(e) if e.is_retryable() && attempt < self.read_retries => {
                    attempt += 1;
                    tracing::debug!(
                        "GET {} failed ({}), retrying {}/{}",
                        path,
                        e,
                        attempt,
                        self.read_retries
                    );
                    tokio::time::sleep(self.retry_delay).await;
                }
                result => return result,
            }
        }
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        self.read(path, |req| req).await
    }

    // ============================================================
    // Auth
    // ============================================================

    /// Exchange credentials for a bearer token. Credentials are form-encoded.
    ///
    /// This does not touch the session; [`crate::Board::login`] stores the token.
    pub async fn login(&self, credentials: &LoginCredentials) -> Result<TokenResponse, ClientError> {
        let req = self.request(Method::POST, "/auth/login").form(credentials);
        self.send(req).await
    }

    pub async fn register(&self, input: &RegisterInput) -> Result<(), ClientError> {
        let req = self.request(Method::POST, "/auth/register").json(input);
        self.send_empty(req).await
    }

    pub async fn current_user(&self) -> Result<User, ClientError> {
        self.get("/auth/me").await
    }

    // ============================================================
    // Projects
    // ============================================================

    pub async fn list_projects(&self) -> Result<Vec<Project>, ClientError> {
        self.get("/projects").await
    }

    pub async fn get_project(&self, id: i64) -> Result<Project, ClientError> {
        self.get(&format!("/projects/{}", id)).await
    }

    pub async fn create_project(&self, input: &CreateProjectInput) -> Result<Project, ClientError> {
        let req = self.request(Method::POST, "/projects").json(input);
        self.send(req).await
    }

    pub async fn update_project(
        &self,
        id: i64,
        input: &UpdateProjectInput,
    ) -> Result<Project, ClientError> {
        let req = self
            .request(Method::PUT, &format!("/projects/{}", id))
            .json(input);
        self.send(req).await
    }

    pub async fn delete_project(&self, id: i64) -> Result<(), ClientError> {
        let req = self.request(Method::DELETE, &format!("/projects/{}", id));
        self.send_empty(req).await
    }

    pub async fn list_suites(&self, project_id: i64) -> Result<Vec<Suite>, ClientError> {
        self.get(&format!("/projects/{}/suites", project_id)).await
    }

    pub async fn list_environments(&self, project_id: i64) -> Result<Vec<Environment>, ClientError> {
        self.get(&format!("/projects/{}/environments", project_id))
            .await
    }

    /// Ask the server to create a minimal suite and environment for a project.
    pub async fn ensure_defaults(&self, project_id: i64) -> Result<EnsureDefaultsResponse, ClientError> {
        let req = self.request(
            Method::POST,
            &format!("/projects/{}/ensure-defaults", project_id),
        );
        self.send(req).await
    }

    // ============================================================
    // Runs
    // ============================================================

    pub async fn list_runs(&self, filters: &RunFilters) -> Result<Vec<Run>, ClientError> {
        self.read("/runs", |req| req.query(filters)).await
    }

    pub async fn get_run(&self, id: i64) -> Result<Run, ClientError> {
        self.get(&format!("/runs/{}", id)).await
    }

    pub async fn create_run(&self, input: &CreateRunInput) -> Result<Run, ClientError> {
        let req = self.request(Method::POST, "/runs").json(input);
        self.send(req).await
    }

    pub async fn update_run(&self, id: i64, input: &UpdateRunInput) -> Result<Run, ClientError> {
        let req = self
            .request(Method::PUT, &format!("/runs/{}", id))
            .json(input);
        self.send(req).await
    }

    /// Ask the server to hand a queued run to a worker.
    pub async fn trigger_run(&self, id: i64) -> Result<TriggerResponse, ClientError> {
        let req = self.request(Method::POST, &format!("/runs/{}/trigger", id));
        self.send(req).await
    }

    // ============================================================
    // Features
    // ============================================================

    pub async fn list_features(&self, project_id: i64) -> Result<Vec<ProjectFeature>, ClientError> {
        self.get(&format!("/features/projects/{}/features", project_id))
            .await
    }

    pub async fn ingest_features(
        &self,
        project_id: i64,
        items: Vec<IngestItem>,
    ) -> Result<IngestResponse, ClientError> {
        let req = self
            .request(
                Method::POST,
                &format!(
                    "/features/projects/{}/ingest-features-from-content",
                    project_id
                ),
            )
            .json(&IngestFeaturesInput { features: items });
        self.send(req).await
    }
}
