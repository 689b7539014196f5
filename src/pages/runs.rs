use crate::board::Board;
use crate::client::ClientError;
use crate::models::{Run, RunFilters, RunStatus};

use super::run_detail::TRIGGER_FAILED;
use super::{display_time, duration, or_na, table};

pub async fn render(
    board: &Board,
    filters: &RunFilters,
    trigger_error: Option<&str>,
) -> Result<String, ClientError> {
    let runs = board.runs(filters).await?;
    Ok(view(&runs, filters, trigger_error))
}

/// Trigger a queued run from the list.
///
/// Returns the message to show above the list when the server rejects the
/// trigger. A 401 is returned as an error so the caller can redirect.
pub async fn trigger(board: &Board, run_id: i64) -> Result<Option<String>, ClientError> {
    match board.trigger_run(run_id).await {
        Ok(_) => Ok(None),
        Err(e) if e.is_unauthorized() => Err(e),
        Err(e) => {
            tracing::warn!("Trigger of run #{} failed: {}", run_id, e);
            Ok(Some(e.message(TRIGGER_FAILED)))
        }
    }
}

pub fn view(runs: &[Run], filters: &RunFilters, trigger_error: Option<&str>) -> String {
    let mut output = String::from("Test Runs  (new run: /runs/new)\n");

    if let Some(error) = trigger_error {
        output.push_str(&format!("\nTrigger failed: {}\n", error));
    }

    let mut active = Vec::new();
    if let Some(project_id) = filters.project_id {
        active.push(format!("Project ID: {}", project_id));
    }
    if let Some(status) = filters.status {
        active.push(format!("Status: {}", status));
    }
    if let Some(branch) = &filters.branch {
        active.push(format!("Branch: {}", branch));
    }
    if !active.is_empty() {
        output.push_str(&format!("\nFiltered by {}\n", active.join(", ")));
    }

    if runs.is_empty() {
        output.push_str(
            "\nNo runs yet\n\
             Test runs will appear here when you create them. Once a run exists you'll see its \
             status (queued, running, completed, failed) and can open it for details.\n\
             To create a run via API: POST /api/v1/runs with project_id, suite_id, and environment_id.\n",
        );
        return output;
    }

    let rows: Vec<Vec<String>> = runs
        .iter()
        .map(|run| {
            let action = if run.status == RunStatus::Queued {
                format!("trigger | /runs/{}", run.id)
            } else {
                format!("/runs/{}", run.id)
            };
            vec![
                run.id.to_string(),
                run.status.to_string(),
                run.project_id.to_string(),
                run.suite_id.to_string(),
                or_na(run.branch.as_deref()),
                format!("{}/{}", run.passed_tests, run.total_tests),
                duration(run.duration_seconds),
                display_time(&run.created_at),
                action,
            ]
        })
        .collect();
    output.push('\n');
    output.push_str(&table(
        &[
            "ID", "Status", "Project", "Suite", "Branch", "Tests", "Duration", "Created", "Actions",
        ],
        &rows,
    ));

    if runs.iter().any(|r| r.status == RunStatus::Queued) {
        output.push_str(
            "\nIf runs stay queued after a trigger, ensure the orchestrator-worker and worker \
             services are running.\n",
        );
    }
    output
}
