use crate::board::Board;
use crate::client::ClientError;
use crate::models::{CreateProjectInput, Project, RepoAuthMethod, UpdateProjectInput};

use super::{display_date, FormError};

pub const CREATE_PROJECT_FAILED: &str = "Failed to create project";
pub const UPDATE_PROJECT_FAILED: &str = "Failed to update project";
pub const FIELDS_REQUIRED: &str = "Name and Repository URL are required";

/// Organization used when the current user cannot be resolved.
pub const DEFAULT_ORGANIZATION_ID: i64 = 1;

/// The create/edit project form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectForm {
    pub name: String,
    pub description: String,
    pub repo_url: String,
    pub repo_auth_method: RepoAuthMethod,
}

impl ProjectForm {
    /// Pre-fill the form from an existing project for editing.
    pub fn from_project(project: &Project) -> Self {
        Self {
            name: project.name.clone(),
            description: project.description.clone().unwrap_or_default(),
            repo_url: project.repo_url.clone(),
            repo_auth_method: project.repo_auth_method,
        }
    }

    fn check_required(&self) -> Result<(), FormError> {
        if self.name.trim().is_empty() || self.repo_url.trim().is_empty() {
            return Err(FormError::invalid(FIELDS_REQUIRED));
        }
        Ok(())
    }

    pub fn to_create(&self, organization_id: i64) -> Result<CreateProjectInput, FormError> {
        self.check_required()?;
        Ok(CreateProjectInput {
            name: self.name.trim().to_string(),
            description: Some(self.description.trim().to_string()).filter(|d| !d.is_empty()),
            repo_url: self.repo_url.trim().to_string(),
            repo_auth_method: self.repo_auth_method,
            organization_id,
        })
    }

    pub fn to_update(&self) -> Result<UpdateProjectInput, FormError> {
        self.check_required()?;
        Ok(UpdateProjectInput {
            name: Some(self.name.trim().to_string()),
            description: Some(self.description.trim().to_string()),
            repo_url: Some(self.repo_url.trim().to_string()),
            repo_auth_method: Some(self.repo_auth_method),
        })
    }

    /// Create a project in the current user's organization.
    pub async fn create(&self, board: &Board) -> Result<Project, FormError> {
        // Validate before any request goes out, including the user lookup.
        self.check_required()?;
        let organization_id = match board.current_user().await {
            Ok(user) => user.organization_id,
            Err(e) if e.is_unauthorized() => {
                return Err(FormError::rejected(&e, CREATE_PROJECT_FAILED));
            }
            Err(e) => {
                tracing::debug!("Current user unavailable ({}), using default organization", e);
                DEFAULT_ORGANIZATION_ID
            }
        };
        let input = self.to_create(organization_id)?;
        board
            .create_project(&input)
            .await
            .map_err(|e| FormError::rejected(&e, CREATE_PROJECT_FAILED))
    }

    pub async fn update(&self, board: &Board, id: i64) -> Result<Project, FormError> {
        let input = self.to_update()?;
        board
            .update_project(id, &input)
            .await
            .map_err(|e| FormError::rejected(&e, UPDATE_PROJECT_FAILED))
    }
}

pub async fn render(board: &Board) -> Result<String, ClientError> {
    let projects = board.projects().await?;
    Ok(view(&projects))
}

pub fn view(projects: &[Project]) -> String {
    let mut output = String::from("Projects  (new project: qboard projects create)\n");
    if projects.is_empty() {
        output.push_str("\nNo projects yet.\n");
    }
    for project in projects {
        output.push_str(&format!(
            "\n#{} {}\n  {}\n  Repo:    {}\n  Auth:    {}\n  Created: {}\n  Features: /projects/{}/features   Runs: /runs?project_id={}\n",
            project.id,
            project.name,
            project
                .description
                .as_deref()
                .filter(|d| !d.is_empty())
                .unwrap_or("No description"),
            project.repo_url,
            project.repo_auth_method.as_str(),
            display_date(&project.created_at),
            project.id,
            project.id,
        ));
    }
    output
}
