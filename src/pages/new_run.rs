//! The run-creation form.
//!
//! Selecting a project clears any suite and environment picked for a previous
//! project before the new project's lists are requested. The two lists are
//! fetched concurrently; neither waits on the other.

use crate::board::Board;
use crate::client::ClientError;
use crate::models::{CreateRunInput, EnsureDefaultsResponse, Environment, Project, Run, Suite};

use super::FormError;

pub const CREATE_RUN_FAILED: &str = "Failed to create run";
pub const CREATE_DEFAULTS_FAILED: &str = "Failed to create defaults";
pub const SELECTION_REQUIRED: &str = "Please select project, suite, and environment";
const LOAD_OPTIONS_FAILED: &str = "Failed to load suites and environments";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewRunForm {
    project_id: Option<i64>,
    suite_id: Option<i64>,
    environment_id: Option<i64>,
    pub branch: String,
    /// `None` until loaded for the selected project.
    suites: Option<Vec<Suite>>,
    environments: Option<Vec<Environment>>,
    error: Option<String>,
}

impl NewRunForm {
    pub fn project_id(&self) -> Option<i64> {
        self.project_id
    }

    pub fn suite_id(&self) -> Option<i64> {
        self.suite_id
    }

    pub fn environment_id(&self) -> Option<i64> {
        self.environment_id
    }

    pub fn suites(&self) -> Option<&[Suite]> {
        self.suites.as_deref()
    }

    pub fn environments(&self) -> Option<&[Environment]> {
        self.environments.as_deref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Change the selected project, resetting everything that depended on the
    /// previous one. Nothing is fetched here.
    pub fn select_project(&mut self, project_id: Option<i64>) {
        self.project_id = project_id.filter(|id| *id > 0);
        self.suite_id = None;
        self.environment_id = None;
        self.suites = None;
        self.environments = None;
    }

    /// Fetch the suite and environment lists for the selected project.
    pub async fn load_options(&mut self, board: &Board) -> Result<(), ClientError> {
        let Some(project_id) = self.project_id else {
            return Ok(());
        };

        let (suites, environments) =
            tokio::join!(board.suites(project_id), board.environments(project_id));

        let mut first_error = None;
        match suites {
            Ok(list) => self.set_suites(list),
            Err(e) => first_error = Some(e),
        }
        match environments {
            Ok(list) => self.set_environments(list),
            Err(e) => first_error = first_error.or(Some(e)),
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Apply a fetched suite list. A selection no longer in the list is dropped.
    pub fn set_suites(&mut self, suites: Vec<Suite>) {
        if !self.suite_id.is_some_and(|id| suites.iter().any(|s| s.id == id)) {
            self.suite_id = None;
        }
        self.suites = Some(suites);
    }

    /// Apply a fetched environment list. A selection no longer in the list is dropped.
    pub fn set_environments(&mut self, environments: Vec<Environment>) {
        if !self
            .environment_id
            .is_some_and(|id| environments.iter().any(|e| e.id == id))
        {
            self.environment_id = None;
        }
        self.environments = Some(environments);
    }

    /// Select a project and load its options.
    pub async fn choose_project(&mut self, board: &Board, project_id: i64) -> Result<(), ClientError> {
        self.select_project(Some(project_id));
        self.load_options(board).await
    }

    /// Pick a suite from the loaded list.
    pub fn select_suite(&mut self, suite_id: i64) -> Result<(), FormError> {
        let listed = self
            .suites
            .as_ref()
            .is_some_and(|list| list.iter().any(|s| s.id == suite_id));
        if !listed {
            return Err(FormError::Invalid(format!(
                "Suite {} is not available for this project",
                suite_id
            )));
        }
        self.suite_id = Some(suite_id);
        Ok(())
    }

    /// Pick an environment from the loaded list.
    pub fn select_environment(&mut self, environment_id: i64) -> Result<(), FormError> {
        let listed = self
            .environments
            .as_ref()
            .is_some_and(|list| list.iter().any(|e| e.id == environment_id));
        if !listed {
            return Err(FormError::Invalid(format!(
                "Environment {} is not available for this project",
                environment_id
            )));
        }
        self.environment_id = Some(environment_id);
        Ok(())
    }

    fn has_no_suites(&self) -> bool {
        self.project_id.is_some() && self.suites.as_ref().is_some_and(Vec::is_empty)
    }

    fn has_no_environments(&self) -> bool {
        self.project_id.is_some() && self.environments.as_ref().is_some_and(Vec::is_empty)
    }

    /// Whether the "create default suite & environment" action is offered.
    pub fn needs_defaults(&self) -> bool {
        self.has_no_suites() || self.has_no_environments()
    }

    /// Submission requires all three selections and two non-empty lists.
    pub fn can_submit(&self) -> bool {
        self.project_id.is_some()
            && self.suite_id.is_some()
            && self.environment_id.is_some()
            && self.suites.as_ref().is_some_and(|l| !l.is_empty())
            && self.environments.as_ref().is_some_and(|l| !l.is_empty())
    }

    pub fn validate(&self) -> Result<CreateRunInput, FormError> {
        if !self.can_submit() {
            return Err(FormError::invalid(SELECTION_REQUIRED));
        }
        let (Some(project_id), Some(suite_id), Some(environment_id)) =
            (self.project_id, self.suite_id, self.environment_id)
        else {
            return Err(FormError::invalid(SELECTION_REQUIRED));
        };

        let branch = self.branch.trim();
        Ok(CreateRunInput {
            project_id,
            suite_id,
            environment_id,
            branch: (!branch.is_empty()).then(|| branch.to_string()),
        })
    }

    /// Ask the server for a default suite and environment, then reload both lists.
    pub async fn ensure_defaults(&mut self, board: &Board) -> Result<EnsureDefaultsResponse, FormError> {
        let Some(project_id) = self.project_id.filter(|_| self.needs_defaults()) else {
            return Err(FormError::invalid(
                "This project already has suites and environments",
            ));
        };

        match board.ensure_defaults(project_id).await {
            Ok(response) => {
                self.error = None;
                if let Err(e) = self.load_options(board).await {
                    let err = FormError::rejected(&e, LOAD_OPTIONS_FAILED);
                    self.error = Some(err.message().to_string());
                    return Err(err);
                }
                Ok(response)
            }
            Err(e) => Err(self.fail(FormError::rejected(&e, CREATE_DEFAULTS_FAILED))),
        }
    }

    /// Validate and create the run. A failure leaves every selection in place.
    pub async fn submit(&mut self, board: &Board) -> Result<Run, FormError> {
        self.error = None;
        let input = self.validate().map_err(|e| self.fail(e))?;

        match board.create_run(&input).await {
            Ok(run) => Ok(run),
            Err(e) => Err(self.fail(FormError::rejected(&e, CREATE_RUN_FAILED))),
        }
    }

    fn fail(&mut self, err: FormError) -> FormError {
        self.error = Some(err.message().to_string());
        err
    }
}

pub fn view(form: &NewRunForm, projects: &[Project]) -> String {
    let mut output = String::from(
        "New Run\n\nCreate a test run by selecting a project, suite, and environment. \
         The run will be queued and appear on the Runs list.\n",
    );

    if let Some(error) = form.error() {
        output.push_str(&format!("\nError: {}\n", error));
    }

    output.push_str("\nProject *\n");
    if projects.is_empty() {
        output.push_str("  (no projects)\n");
    }
    for project in projects {
        output.push_str(&option_line(
            form.project_id() == Some(project.id),
            project.id,
            &project.name,
        ));
    }

    if let Some(project_id) = form.project_id().filter(|_| form.needs_defaults()) {
        let missing = match (form.has_no_suites(), form.has_no_environments()) {
            (true, true) => "suites or environments",
            (true, false) => "suites",
            _ => "environments",
        };
        output.push_str(&format!(
            "\nThis project has no {}. Create default suite & environment: \
             qboard defaults ensure {}\n",
            missing, project_id
        ));
    }

    output.push_str("\nSuite *\n");
    for suite in form.suites().unwrap_or_default() {
        let label = format!("{} ({})", suite.name, suite.layer);
        output.push_str(&option_line(form.suite_id() == Some(suite.id), suite.id, &label));
    }

    output.push_str("\nEnvironment *\n");
    for env in form.environments().unwrap_or_default() {
        let label = match &env.base_url {
            Some(url) => format!("{} - {}", env.name, url),
            None => env.name.clone(),
        };
        output.push_str(&option_line(
            form.environment_id() == Some(env.id),
            env.id,
            &label,
        ));
    }

    output.push_str(&format!(
        "\nBranch (optional): {}\n",
        if form.branch.trim().is_empty() {
            "-"
        } else {
            form.branch.trim()
        }
    ));
    output.push_str(if form.can_submit() {
        "\n[Create run]\n"
    } else {
        "\n[Create run] (select project, suite, and environment)\n"
    });
    output
}

fn option_line(selected: bool, id: i64, label: &str) -> String {
    format!("  ({}) {:>4}  {}\n", if selected { "*" } else { " " }, id, label)
}
