use crate::board::Board;
use crate::client::ClientError;
use crate::models::{IngestItem, IngestResponse, ProjectFeature};

use super::FormError;

pub const INGEST_FAILED: &str = "Ingest failed";
pub const CONTENT_REQUIRED: &str = "Paste Gherkin feature content first";
/// Used when the file path is left blank.
pub const DEFAULT_FILE_PATH: &str = "feature.feature";

/// The paste-and-ingest form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestForm {
    pub file_path: String,
    pub content: String,
    error: Option<String>,
}

impl IngestForm {
    pub fn new(file_path: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            file_path: file_path.into(),
            content: content.into(),
            error: None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Empty content is rejected without a request.
    pub fn validate(&self) -> Result<IngestItem, FormError> {
        let content = self.content.trim();
        if content.is_empty() {
            return Err(FormError::invalid(CONTENT_REQUIRED));
        }
        let file_path = match self.file_path.trim() {
            "" => DEFAULT_FILE_PATH,
            path => path,
        };
        Ok(IngestItem {
            file_path: file_path.to_string(),
            content: content.to_string(),
        })
    }

    /// Submit the pasted content. On success the content is cleared; on
    /// failure it is kept so the form can be resubmitted.
    pub async fn submit(&mut self, board: &Board, project_id: i64) -> Result<IngestResponse, FormError> {
        self.error = None;
        let result = match self.validate() {
            Ok(item) => board
                .ingest_features(project_id, vec![item])
                .await
                .map_err(|e| FormError::rejected(&e, INGEST_FAILED)),
            Err(e) => Err(e),
        };

        match result {
            Ok(response) => {
                self.content.clear();
                Ok(response)
            }
            Err(e) => {
                self.error = Some(e.message().to_string());
                Err(e)
            }
        }
    }
}

pub async fn render(
    board: &Board,
    project_id: Option<i64>,
    ingest_error: Option<&str>,
) -> Result<String, ClientError> {
    let Some(id) = project_id else {
        return Ok(invalid_project_view());
    };

    let (project, features) = tokio::join!(board.project(id), board.features(id));
    let name = match project {
        Ok(p) => p.name,
        Err(e) if e.is_unauthorized() => return Err(e),
        Err(_) => format!("Project {}", id),
    };
    Ok(view(&name, &features?, ingest_error))
}

pub fn invalid_project_view() -> String {
    "Invalid project.\nBack to Projects: /projects\n".to_string()
}

pub fn view(project_name: &str, features: &[ProjectFeature], ingest_error: Option<&str>) -> String {
    let mut output = format!("Features - {}\n", project_name);

    output.push_str(
        "\nIngest feature from content\n  qboard features ingest <project> --file-path <path> <file>\n",
    );
    if let Some(error) = ingest_error {
        output.push_str(&format!("  Error: {}\n", error));
    }

    output.push_str("\nIngested features\n");
    if features.is_empty() {
        output.push_str(
            "  No features yet. Use the ingest command above to add a Gherkin feature file.\n",
        );
        return output;
    }

    for feature in features {
        output.push_str(&format!("\n  {}  ({})\n", feature.name, feature.file_path));
        if let Some(description) = feature.description.as_deref().filter(|d| !d.is_empty()) {
            output.push_str(&format!("    {}\n", description));
        }
        if !feature.tags.is_empty() {
            output.push_str(&format!("    Tags: {}\n", feature.tags.join(" ")));
        }
        for scenario in &feature.scenarios {
            output.push_str(&format!("    {}\n", scenario.name));
            for step in &scenario.steps {
                output.push_str(&format!("      {} {}\n", step.keyword.trim(), step.text));
            }
        }
    }
    output
}
