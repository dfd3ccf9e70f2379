use std::ops::{Deref, DerefMut};

use chrono::{DateTime, Utc};
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use serde::{Deserialize, Serialize};

use crate::model::mongodb::{now, Id};

/// Core election data, as stored in the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElectionCore {
    /// Election title, e.g. "President".
    pub title: String,
    /// Free-text description; may be empty.
    pub description: String,
    /// Creation time.
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    /// The options that can be voted for, in creation order.
    pub options: Vec<ElectionOption>,
    /// Bumped by every vote cast in this election, so that a concurrent
    /// deletion of the election conflicts with it.
    pub revision: u32,
}

/// A single option within an election.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElectionOption {
    /// Unique ID.
    pub id: Id,
    /// Option text.
    pub label: String,
}

impl ElectionOption {
    pub fn new(label: String) -> Self {
        Self {
            id: Id::new(),
            label,
        }
    }
}

/// An election from the database, with its unique ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Election {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub election: ElectionCore,
}

impl Election {
    /// Create a new election, created now.
    pub fn new(title: String, description: String, options: Vec<ElectionOption>) -> Self {
        Self {
            id: Id::new(),
            election: ElectionCore {
                title,
                description,
                created_at: now(),
                options,
                revision: 0,
            },
        }
    }

    /// Get the option with the given ID, if it belongs to this election.
    pub fn option(&self, option_id: Id) -> Option<&ElectionOption> {
        self.options.iter().find(|o| o.id == option_id)
    }
}

impl Deref for Election {
    type Target = ElectionCore;

    fn deref(&self) -> &Self::Target {
        &self.election
    }
}

impl DerefMut for Election {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.election
    }
}
