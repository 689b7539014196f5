//! Client-side routes and the authentication guard.
//!
//! The guard is a pure function of the session's authentication status and
//! the requested path. It is re-evaluated on every navigation, so a session
//! cleared mid-operation redirects on the very next render.

use std::fmt;

pub const LOGIN_PATH: &str = "/login";
pub const HOME_PATH: &str = "/";

/// A page the board can show.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Login,
    Dashboard,
    /// Run list, optionally pre-filtered by `?project_id=`.
    Runs { project_id: Option<i64> },
    NewRun,
    /// `None` when the path segment is not a number.
    RunDetail { run_id: Option<i64> },
    Projects,
    /// `None` when the path segment is not a positive number.
    ProjectFeatures { project_id: Option<i64> },
    Infrastructure,
    Configuration,
}

impl Route {
    /// Match a path (with optional query string) against the route table.
    pub fn parse(path: &str) -> Option<Self> {
        let (path, query) = match path.split_once('?') {
            Some((p, q)) => (p, Some(q)),
            None => (path, None),
        };
        let path = match path.trim_end_matches('/') {
            "" => HOME_PATH,
            p => p,
        };
        let segments: Vec<&str> = path.trim_start_matches('/').split('/').collect();

        let route = match segments.as_slice() {
            [""] => Self::Dashboard,
            ["login"] => Self::Login,
            ["runs"] => Self::Runs {
                project_id: query.and_then(|q| query_param(q, "project_id")),
            },
            ["runs", "new"] => Self::NewRun,
            ["runs", id] => Self::RunDetail {
                run_id: id.parse().ok(),
            },
            ["projects"] => Self::Projects,
            ["projects", id, "features"] => Self::ProjectFeatures {
                project_id: id.parse().ok().filter(|id: &i64| *id > 0),
            },
            ["infrastructure"] => Self::Infrastructure,
            ["configuration"] => Self::Configuration,
            _ => return None,
        };
        Some(route)
    }

    /// Canonical path for this route.
    pub fn path(&self) -> String {
        match self {
            Self::Login => LOGIN_PATH.to_string(),
            Self::Dashboard => HOME_PATH.to_string(),
            Self::Runs { project_id: None } => "/runs".to_string(),
            Self::Runs {
                project_id: Some(id),
            } => format!("/runs?project_id={}", id),
            Self::NewRun => "/runs/new".to_string(),
            Self::RunDetail { run_id: Some(id) } => format!("/runs/{}", id),
            Self::RunDetail { run_id: None } => "/runs/0".to_string(),
            Self::Projects => "/projects".to_string(),
            Self::ProjectFeatures {
                project_id: Some(id),
            } => format!("/projects/{}/features", id),
            Self::ProjectFeatures { project_id: None } => "/projects/0/features".to_string(),
            Self::Infrastructure => "/infrastructure".to_string(),
            Self::Configuration => "/configuration".to_string(),
        }
    }

    /// Every route except the login page requires a session.
    pub fn is_protected(&self) -> bool {
        !matches!(self, Self::Login)
    }

    /// Text shown while the page's data is loading.
    pub fn loading_message(&self) -> &'static str {
        match self {
            Self::Runs { .. } => "Loading runs...",
            Self::RunDetail { .. } => "Loading run details...",
            Self::Projects => "Loading projects...",
            Self::ProjectFeatures { .. } => "Loading features...",
            _ => "Loading...",
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path())
    }
}

/// Outcome of guarding a navigation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Render the route. Protected routes render inside the navigation frame.
    Render(Route),
    /// Go to the given path instead. The requested path is not preserved.
    Redirect(&'static str),
    /// No route matches the path; nothing is rendered.
    NoMatch,
}

/// Decide what to show for `path` given the current authentication status.
pub fn guard(is_authenticated: bool, path: &str) -> Decision {
    match Route::parse(path) {
        None => Decision::NoMatch,
        Some(route) if route.is_protected() && !is_authenticated => Decision::Redirect(LOGIN_PATH),
        Some(route) => Decision::Render(route),
    }
}

/// One entry in the navigation sidebar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NavItem {
    pub path: &'static str,
    pub label: &'static str,
}

pub const NAV_ITEMS: &[NavItem] = &[
    NavItem {
        path: "/",
        label: "Dashboard",
    },
    NavItem {
        path: "/runs",
        label: "Runs",
    },
    NavItem {
        path: "/projects",
        label: "Projects",
    },
    NavItem {
        path: "/infrastructure",
        label: "Infrastructure",
    },
    NavItem {
        path: "/configuration",
        label: "Configuration",
    },
];

fn query_param(query: &str, name: &str) -> Option<i64> {
    query
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(k, _)| *k == name)
        .and_then(|(_, v)| v.parse().ok())
}
