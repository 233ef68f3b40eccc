//! Build Configuration
//!
//! Settings that select how a dependency graph is built. The evaluation mode
//! decides which visibility flags apply: collections and modifiers carry
//! separate viewport and render switches, and only the switch matching the
//! graph's mode is consulted.

use serde::{Deserialize, Serialize};

/// The purpose the graph is evaluated for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EvaluationMode {
    /// Interactive viewport evaluation.
    #[default]
    Viewport,
    /// Final render evaluation.
    Render,
}

/// Configuration for one dependency graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildConfig {
    /// Evaluation mode of the graph.
    #[serde(default)]
    pub mode: EvaluationMode,

    /// Name used in log output to tell graphs apart.
    #[serde(default = "default_debug_name")]
    pub debug_name: String,

    /// Pull every object of the database into the graph, not only the ones
    /// reachable from the view layer.
    #[serde(default)]
    pub build_all_objects: bool,
}

fn default_debug_name() -> String {
    "depsgraph".to_string()
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            mode: EvaluationMode::default(),
            debug_name: default_debug_name(),
            build_all_objects: false,
        }
    }
}

impl BuildConfig {
    /// Configuration for a render graph.
    pub fn render() -> Self {
        Self {
            mode: EvaluationMode::Render,
            ..Self::default()
        }
    }

    /// Parse a configuration from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
