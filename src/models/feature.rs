use serde::{Deserialize, Serialize};

/// A Gherkin feature file ingested into a project.
///
/// Features are parsed server-side: each feature decomposes into scenarios,
/// and each scenario into an ordered list of steps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectFeature {
    pub id: i64,
    pub name: String,
    pub file_path: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub scenarios: Vec<FeatureScenario>,
}

/// A scenario (or scenario outline) inside a feature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureScenario {
    pub id: i64,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub steps: Vec<ScenarioStep>,
}

/// One step of a scenario, e.g. keyword `Given`, text `I am on the home page`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioStep {
    #[serde(rename = "type")]
    pub kind: String,
    pub keyword: String,
    pub text: String,
}

/// Raw feature-file content submitted for ingestion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestItem {
    pub file_path: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestFeaturesInput {
    pub features: Vec<IngestItem>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestResponse {
    pub message: String,
    pub features_count: u32,
}
