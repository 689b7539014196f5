//! Resource shapes exchanged with the QAtron control plane.
//!
//! # Core Concepts
//!
//! Every entity here is owned by the server: identity is server-assigned and
//! lifecycle is server-managed. The board only displays these resources or
//! proposes mutations to them.
//!
//! - [`Project`]: A repository under test, with its [`Suite`]s and [`Environment`]s.
//! - [`Run`]: One execution of a suite against an environment.
//! - [`ProjectFeature`]: An ingested Gherkin feature, decomposed into
//!   [`FeatureScenario`]s and ordered [`ScenarioStep`]s.
//! - [`User`]: The authenticated identity behind the session token.

mod feature;
mod project;
mod run;
mod user;

pub use feature::*;
pub use project::*;
pub use run::*;
pub use user::*;
