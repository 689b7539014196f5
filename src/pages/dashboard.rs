use crate::board::Board;
use crate::client::ClientError;
use crate::models::{Project, Run, RunFilters, RunStatus};

use super::{display_time, or_na, table};

/// How many runs the dashboard fetches for its totals.
pub const DASHBOARD_RUN_LIMIT: u32 = 20;
const RECENT_RUNS: usize = 10;

/// Totals over the fetched window of runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStats {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub running: usize,
}

impl RunStats {
    pub fn from_runs(runs: &[Run]) -> Self {
        let count = |status: RunStatus| runs.iter().filter(|r| r.status == status).count();
        Self {
            total: runs.len(),
            passed: count(RunStatus::Completed),
            failed: count(RunStatus::Failed),
            running: count(RunStatus::Running),
        }
    }
}

pub async fn render(board: &Board) -> Result<String, ClientError> {
    let filters = RunFilters::recent(DASHBOARD_RUN_LIMIT);
    let (runs, projects) = tokio::join!(board.runs(&filters), board.projects());
    Ok(view(&runs?, &projects?))
}

pub fn view(runs: &[Run], projects: &[Project]) -> String {
    let stats = RunStats::from_runs(runs);
    let mut output = String::from("Dashboard\n\n");
    output.push_str(&format!(
        "Total Runs: {}   Passed: {}   Failed: {}   Running: {}\n",
        stats.total, stats.passed, stats.failed, stats.running
    ));

    output.push_str("\nRecent Runs\n");
    let rows: Vec<Vec<String>> = runs
        .iter()
        .take(RECENT_RUNS)
        .map(|run| {
            vec![
                run.id.to_string(),
                run.status.to_string(),
                run.project_id.to_string(),
                or_na(run.branch.as_deref()),
                format!("{}/{}", run.passed_tests, run.total_tests),
                display_time(&run.created_at),
            ]
        })
        .collect();
    output.push_str(&table(
        &["ID", "Status", "Project", "Branch", "Tests", "Created"],
        &rows,
    ));

    output.push_str("\nProjects\n");
    for project in projects {
        output.push_str(&format!(
            "\n  {}\n  {}\n  Repo: {}\n",
            project.name,
            project
                .description
                .as_deref()
                .filter(|d| !d.is_empty())
                .unwrap_or("No description"),
            project.repo_url
        ));
    }
    output
}
