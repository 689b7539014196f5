//! Text renditions of the board's pages.
//!
//! Each page module exposes a pure `view` over already-fetched data plus an
//! async `render` that fetches through the [`Board`] and calls `view`. Pages
//! with forms keep the form state in a plain struct so its rules can be
//! exercised without a server.

pub mod configuration;
pub mod dashboard;
pub mod infrastructure;
pub mod layout;
pub mod login;
pub mod new_run;
pub mod project_features;
pub mod projects;
pub mod run_detail;
pub mod runs;

use chrono::{DateTime, NaiveDateTime};
use thiserror::Error;

use crate::board::Board;
use crate::client::ClientError;
use crate::models::RunFilters;
use crate::router::Route;

/// A rendered page and the path it was rendered for (after any redirect).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Screen {
    pub path: String,
    pub body: String,
}

impl Screen {
    pub fn new(path: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            body: body.into(),
        }
    }
}

/// Why a form submission did not go through.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormError {
    /// Caught before submission; nothing was sent.
    #[error("{0}")]
    Invalid(String),
    /// The server rejected the submission. Holds the message to show inline.
    #[error("{0}")]
    Rejected(String),
}

impl FormError {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid(message.into())
    }

    /// Turn a client error into the inline message for an action.
    pub fn rejected(err: &ClientError, fallback: &str) -> Self {
        Self::Rejected(err.message(fallback))
    }

    pub fn message(&self) -> &str {
        match self {
            Self::Invalid(m) | Self::Rejected(m) => m,
        }
    }
}

/// Fetch and render the body of a protected route.
pub async fn render(board: &Board, route: &Route) -> Result<String, ClientError> {
    match route {
        Route::Login => Ok(login::view(None)),
        Route::Dashboard => dashboard::render(board).await,
        Route::Runs { project_id } => {
            let filters = RunFilters {
                project_id: *project_id,
                ..RunFilters::default()
            };
            runs::render(board, &filters, None).await
        }
        Route::NewRun => {
            let form = new_run::NewRunForm::default();
            let projects = board.projects().await?;
            Ok(new_run::view(&form, &projects))
        }
        Route::RunDetail { run_id } => {
            run_detail::render(board, *run_id, &run_detail::TriggerOutcome::Idle).await
        }
        Route::Projects => projects::render(board).await,
        Route::ProjectFeatures { project_id } => {
            project_features::render(board, *project_id, None).await
        }
        Route::Infrastructure => Ok(infrastructure::view()),
        Route::Configuration => Ok(configuration::view()),
    }
}

pub fn no_match_view(path: &str) -> String {
    format!("No page at {}\n", path)
}

pub fn load_error_view(err: &ClientError) -> String {
    format!("Failed to load: {}\n", err.message("the server did not respond"))
}

// ============================================================
// Formatting helpers
// ============================================================

/// Render rows as a left-aligned table with a header rule.
pub(crate) fn table(headers: &[&str], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            if let Some(w) = widths.get_mut(i) {
                *w = (*w).max(cell.chars().count());
            }
        }
    }

    let mut output = String::new();
    let header: Vec<String> = headers.iter().map(|h| h.to_string()).collect();
    push_row(&mut output, &header, &widths);
    let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    push_row(&mut output, &rule, &widths);
    for row in rows {
        push_row(&mut output, row, &widths);
    }
    output
}

fn push_row(output: &mut String, cells: &[String], widths: &[usize]) {
    let line: Vec<String> = cells
        .iter()
        .zip(widths)
        .map(|(cell, width)| format!("{:<width$}", cell, width = width))
        .collect();
    output.push_str(line.join("  ").trim_end());
    output.push('\n');
}

/// Format a server timestamp for display; unparseable input is shown as-is.
pub(crate) fn display_time(raw: &str) -> String {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return dt.format("%Y-%m-%d %H:%M:%S").to_string();
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        return dt.format("%Y-%m-%d %H:%M:%S").to_string();
    }
    raw.to_string()
}

pub(crate) fn display_date(raw: &str) -> String {
    let full = display_time(raw);
    match full.split_once(' ') {
        Some((date, _)) if full != raw => date.to_string(),
        _ => full,
    }
}

pub(crate) fn or_na(value: Option<&str>) -> String {
    match value {
        Some(v) if !v.is_empty() => v.to_string(),
        _ => "N/A".to_string(),
    }
}

pub(crate) fn duration(seconds: Option<f64>) -> String {
    match seconds {
        Some(s) if s > 0.0 => format!("{}s", s),
        _ => "N/A".to_string(),
    }
}
