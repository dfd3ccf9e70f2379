use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{
    api::id::ApiId,
    db::election::{Election, ElectionOption},
};

/// A full, API-friendly election description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElectionDescription {
    /// Election unique ID.
    pub id: ApiId,
    pub title: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
    /// Options in creation order.
    pub options: Vec<OptionDescription>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionDescription {
    pub id: ApiId,
    pub label: String,
}

impl From<ElectionOption> for OptionDescription {
    fn from(option: ElectionOption) -> Self {
        Self {
            id: option.id.into(),
            label: option.label,
        }
    }
}

impl From<Election> for ElectionDescription {
    fn from(election: Election) -> Self {
        Self {
            id: election.id.into(),
            title: election.election.title,
            description: election.election.description,
            created_at: election.election.created_at,
            options: election
                .election
                .options
                .into_iter()
                .map(OptionDescription::from)
                .collect(),
        }
    }
}

/// A summary of an election, shorter than the full `ElectionDescription`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElectionSummary {
    /// Election unique ID.
    pub id: ApiId,
    pub title: String,
    pub created_at: DateTime<Utc>,
}

impl From<Election> for ElectionSummary {
    fn from(election: Election) -> Self {
        Self {
            id: election.id.into(),
            title: election.election.title,
            created_at: election.election.created_at,
        }
    }
}
