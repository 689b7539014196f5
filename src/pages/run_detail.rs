use crate::board::Board;
use crate::client::ClientError;
use crate::models::{Run, RunStatus, TriggerResponse};

use super::{display_time, duration, or_na};

/// Fallback shown when a trigger fails without a server message.
pub const TRIGGER_FAILED: &str = "Trigger failed";

/// Result of the most recent trigger attempt on this page.
#[derive(Debug, Clone, PartialEq)]
pub enum TriggerOutcome {
    Idle,
    Triggered(TriggerResponse),
    Failed(String),
    /// Only queued runs offer a trigger; nothing was sent.
    NotQueued(RunStatus),
}

pub async fn render(
    board: &Board,
    run_id: Option<i64>,
    outcome: &TriggerOutcome,
) -> Result<String, ClientError> {
    let Some(id) = run_id else {
        return Ok(not_found_view());
    };
    match board.run(id).await {
        Ok(run) => Ok(view(&run, outcome)),
        Err(e) if e.is_not_found() => Ok(not_found_view()),
        Err(e) => Err(e),
    }
}

/// Trigger a queued run.
///
/// Errors loading the run propagate; a rejected trigger is reported as
/// [`TriggerOutcome::Failed`] with the message to show inline.
pub async fn trigger(board: &Board, run_id: i64) -> Result<TriggerOutcome, ClientError> {
    let run = board.run(run_id).await?;
    if run.status != RunStatus::Queued {
        return Ok(TriggerOutcome::NotQueued(run.status));
    }

    match board.trigger_run(run_id).await {
        Ok(response) => Ok(TriggerOutcome::Triggered(response)),
        Err(e) => {
            tracing::warn!("Trigger of run #{} failed: {}", run_id, e);
            Ok(TriggerOutcome::Failed(e.message(TRIGGER_FAILED)))
        }
    }
}

pub fn not_found_view() -> String {
    "Run not found\n".to_string()
}

pub fn view(run: &Run, outcome: &TriggerOutcome) -> String {
    let mut output = format!("Run #{}\n", run.id);

    if run.status == RunStatus::Queued {
        output.push_str("\n[Trigger run]  qboard runs trigger ");
        output.push_str(&run.id.to_string());
        output.push('\n');
    }
    match outcome {
        TriggerOutcome::Idle => {}
        TriggerOutcome::Triggered(_) => {
            output.push_str("Run triggered. Status may update shortly.\n");
        }
        TriggerOutcome::Failed(message) => {
            output.push_str(&format!("Trigger failed: {}\n", message));
        }
        TriggerOutcome::NotQueued(status) => {
            output.push_str(&format!(
                "Run #{} is {}; only queued runs can be triggered.\n",
                run.id, status
            ));
        }
    }
    if run.status == RunStatus::Queued {
        output.push_str(
            "Runs are executed by the worker (clone repo, run tests); output does not appear here.\n",
        );
    }

    output.push_str(&format!(
        "\nStatus:   {}\nProject:  {}\nSuite:    {}\nBranch:   {}\nCommit:   {}\nDuration: {}\n",
        run.status,
        run.project_id,
        run.suite_id,
        or_na(run.branch.as_deref()),
        or_na(run.commit.as_deref()),
        duration(run.duration_seconds),
    ));

    output.push_str(&format!(
        "\nTotal: {}   Passed: {}   Failed: {}   Skipped: {}\n",
        run.total_tests, run.passed_tests, run.failed_tests, run.skipped_tests
    ));

    output.push_str("\nTimeline\n");
    output.push_str(&format!("  Created:   {}\n", display_time(&run.created_at)));
    if let Some(started) = &run.started_at {
        output.push_str(&format!("  Started:   {}\n", display_time(started)));
    }
    if let Some(completed) = &run.completed_at {
        output.push_str(&format!("  Completed: {}\n", display_time(completed)));
    }
    output
}
