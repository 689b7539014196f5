use serde::{Deserialize, Serialize};

/// A project under test.
///
/// Projects point at a source repository that the worker clones when a run
/// executes. Suites and environments are scoped to a project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub repo_url: String,
    pub repo_auth_method: RepoAuthMethod,
    pub organization_id: i64,
    pub created_at: String,
    #[serde(default)]
    pub updated_at: Option<String>,
}

/// How the worker authenticates against the project repository.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepoAuthMethod {
    #[default]
    Token,
    Ssh,
}

impl RepoAuthMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Token => "token",
            Self::Ssh => "ssh",
        }
    }
}

/// Input for creating a new project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateProjectInput {
    pub name: String,
    pub description: Option<String>,
    pub repo_url: String,
    pub repo_auth_method: RepoAuthMethod,
    pub organization_id: i64,
}

/// Input for updating an existing project. All fields are optional for partial updates.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpdateProjectInput {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repo_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repo_auth_method: Option<RepoAuthMethod>,
}

/// A named grouping of tests at one testing layer (e.g. `api`, `ui`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suite {
    pub id: i64,
    pub name: String,
    pub layer: String,
}

/// A target a suite can be run against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Environment {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub base_url: Option<String>,
}

/// Result of asking the server to create a default suite and environment.
///
/// `created` names the artifacts that did not exist before the call; it is
/// empty when the project already had both.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnsureDefaultsResponse {
    pub message: String,
    #[serde(default)]
    pub created: Vec<String>,
}
