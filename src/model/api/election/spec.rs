use serde::{Deserialize, Serialize};

/// An election specification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElectionSpec {
    /// Election title.
    pub title: String,
    /// Optional free-text description.
    #[serde(default)]
    pub description: String,
    /// Option labels, in the order they should be listed.
    #[serde(default)]
    pub options: Vec<String>,
}

/// A request to add one option to an existing election.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptionSpec {
    pub label: String,
}
