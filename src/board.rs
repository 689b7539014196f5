//! The board application shell.
//!
//! [`Board`] ties the session, the API client and the query cache together.
//! Queries go through the cache; mutations go straight to the API and mark the
//! affected cache entries stale on success. A failed mutation changes nothing.

use crate::cache::{QueryCache, QueryKey};
use crate::client::{BoardClient, ClientError};
use crate::config::BoardConfig;
use crate::models::*;
use crate::pages::{self, layout, login, Screen};
use crate::router::{self, Decision, Route};
use crate::session::SessionStore;

#[derive(Debug, Clone)]
pub struct Board {
    session: SessionStore,
    client: BoardClient,
    cache: QueryCache,
}

impl Board {
    /// Build a board around a client; the board shares the client's session.
    pub fn new(client: BoardClient) -> Self {
        Self {
            session: client.session().clone(),
            client,
            cache: QueryCache::new(),
        }
    }

    pub fn from_config(config: &BoardConfig, session: SessionStore) -> Self {
        Self::new(BoardClient::from_config(config, session))
    }

    pub fn session(&self) -> &SessionStore {
        &self.session
    }

    pub fn client(&self) -> &BoardClient {
        &self.client
    }

    pub fn cache(&self) -> &QueryCache {
        &self.cache
    }

    // ============================================================
    // Session
    // ============================================================

    /// Exchange credentials for a token and adopt it as the session.
    pub async fn login(&self, credentials: &LoginCredentials) -> Result<TokenResponse, ClientError> {
        let token = self.client.login(credentials).await?;
        self.session.set_token(Some(token.access_token.clone()));
        tracing::info!("Signed in as {}", credentials.username);
        Ok(token)
    }

    pub fn logout(&self) {
        self.session.logout();
    }

    pub async fn register(&self, input: &RegisterInput) -> Result<(), ClientError> {
        self.client.register(input).await
    }

    // ============================================================
    // Queries
    // ============================================================

    pub async fn current_user(&self) -> Result<User, ClientError> {
        self.cache
            .fetch(QueryKey::current_user(), || self.client.current_user())
            .await
    }

    pub async fn projects(&self) -> Result<Vec<Project>, ClientError> {
        self.cache
            .fetch(QueryKey::projects(), || self.client.list_projects())
            .await
    }

    pub async fn project(&self, id: i64) -> Result<Project, ClientError> {
        self.cache
            .fetch(QueryKey::project(id), || self.client.get_project(id))
            .await
    }

    pub async fn suites(&self, project_id: i64) -> Result<Vec<Suite>, ClientError> {
        self.cache
            .fetch(QueryKey::suites(project_id), || {
                self.client.list_suites(project_id)
            })
            .await
    }

    pub async fn environments(&self, project_id: i64) -> Result<Vec<Environment>, ClientError> {
        self.cache
            .fetch(QueryKey::environments(project_id), || {
                self.client.list_environments(project_id)
            })
            .await
    }

    pub async fn runs(&self, filters: &RunFilters) -> Result<Vec<Run>, ClientError> {
        self.cache
            .fetch(QueryKey::run_list(filters), || self.client.list_runs(filters))
            .await
    }

    pub async fn run(&self, id: i64) -> Result<Run, ClientError> {
        self.cache
            .fetch(QueryKey::run(id), || self.client.get_run(id))
            .await
    }

    pub async fn features(&self, project_id: i64) -> Result<Vec<ProjectFeature>, ClientError> {
        self.cache
            .fetch(QueryKey::features(project_id), || {
                self.client.list_features(project_id)
            })
            .await
    }

    // ============================================================
    // Mutations
    // ============================================================

    pub async fn create_project(&self, input: &CreateProjectInput) -> Result<Project, ClientError> {
        let project = self.client.create_project(input).await?;
        self.cache.invalidate(&QueryKey::projects());
        Ok(project)
    }

    pub async fn update_project(
        &self,
        id: i64,
        input: &UpdateProjectInput,
    ) -> Result<Project, ClientError> {
        let project = self.client.update_project(id, input).await?;
        self.cache.invalidate(&QueryKey::projects());
        self.cache.invalidate(&QueryKey::project(id));
        Ok(project)
    }

    pub async fn delete_project(&self, id: i64) -> Result<(), ClientError> {
        self.client.delete_project(id).await?;
        self.cache.invalidate(&QueryKey::projects());
        self.cache.invalidate(&QueryKey::project(id));
        Ok(())
    }

    /// Create a default suite and environment, then mark both lists stale.
    pub async fn ensure_defaults(&self, project_id: i64) -> Result<EnsureDefaultsResponse, ClientError> {
        let response = self.client.ensure_defaults(project_id).await?;
        self.cache.invalidate(&QueryKey::suites(project_id));
        self.cache.invalidate(&QueryKey::environments(project_id));
        Ok(response)
    }

    pub async fn create_run(&self, input: &CreateRunInput) -> Result<Run, ClientError> {
        let run = self.client.create_run(input).await?;
        self.cache.invalidate(&QueryKey::runs());
        tracing::info!("Queued run #{}", run.id);
        Ok(run)
    }

    pub async fn update_run(&self, id: i64, input: &UpdateRunInput) -> Result<Run, ClientError> {
        let run = self.client.update_run(id, input).await?;
        self.cache.invalidate(&QueryKey::run(id));
        self.cache.invalidate(&QueryKey::runs());
        Ok(run)
    }

    /// Trigger a queued run. On success both the run's detail and every run
    /// list are marked stale; on failure the cache is untouched.
    pub async fn trigger_run(&self, id: i64) -> Result<TriggerResponse, ClientError> {
        let response = self.client.trigger_run(id).await?;
        self.cache.invalidate(&QueryKey::run(id));
        self.cache.invalidate(&QueryKey::runs());
        tracing::info!("Triggered run #{}", id);
        Ok(response)
    }

    pub async fn ingest_features(
        &self,
        project_id: i64,
        items: Vec<IngestItem>,
    ) -> Result<IngestResponse, ClientError> {
        let response = self.client.ingest_features(project_id, items).await?;
        self.cache.invalidate(&QueryKey::features(project_id));
        Ok(response)
    }

    // ============================================================
    // Navigation
    // ============================================================

    /// Navigate to `path` and render the resulting screen.
    pub async fn open(&self, path: &str) -> Screen {
        self.open_with(path, |_| {}).await
    }

    /// Like [`Board::open`], reporting the page's loading message before its
    /// data is fetched.
    ///
    /// If the server rejects the session while the page loads, the client has
    /// already signed out, so guarding again lands on the login page.
    pub async fn open_with(&self, path: &str, on_pending: impl Fn(&str)) -> Screen {
        let mut path = path.to_string();
        loop {
            match router::guard(self.session.is_authenticated(), &path) {
                Decision::NoMatch => {
                    tracing::debug!("No route matches {}", path);
                    return Screen::new(path.clone(), pages::no_match_view(&path));
                }
                Decision::Redirect(to) => {
                    tracing::debug!("Redirecting {} to {}", path, to);
                    path = to.to_string();
                }
                Decision::Render(Route::Login) => {
                    return Screen::new(path, login::view(None));
                }
                Decision::Render(route) => {
                    on_pending(route.loading_message());
                    match pages::render(self, &route).await {
                        Ok(body) => return Screen::new(path, layout::frame(&route, &body)),
                        Err(e) if e.is_unauthorized() => {
                            if self.session.is_authenticated() {
                                self.session.logout();
                            }
                            continue;
                        }
                        Err(e) => {
                            tracing::warn!("Failed to load {}: {}", path, e);
                            let body = pages::load_error_view(&e);
                            return Screen::new(path, layout::frame(&route, &body));
                        }
                    }
                }
            }
        }
    }
}
