//! The navigation frame shared by every protected page.

use crate::router::{Route, NAV_ITEMS};

const APP_TITLE: &str = "QAtron";

/// Wrap a page body in the navigation frame, highlighting the active section.
pub fn frame(route: &Route, body: &str) -> String {
    let active = active_path(route);
    let nav: Vec<String> = NAV_ITEMS
        .iter()
        .map(|item| {
            if item.path == active {
                format!("[{}]", item.label)
            } else {
                item.label.to_string()
            }
        })
        .collect();

    let header = format!("{} | {} | Logout", APP_TITLE, nav.join("  "));
    let rule = "=".repeat(header.chars().count());

    let mut output = String::new();
    output.push_str(&header);
    output.push('\n');
    output.push_str(&rule);
    output.push_str("\n\n");
    output.push_str(body);
    if !body.ends_with('\n') {
        output.push('\n');
    }
    output
}

/// Only exact section paths are highlighted; nested pages highlight nothing.
fn active_path(route: &Route) -> String {
    match route {
        Route::Runs { .. } => "/runs".to_string(),
        other => other.path(),
    }
}
