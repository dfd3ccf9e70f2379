use std::ops::Deref;

use chrono::{DateTime, Utc};
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use serde::{Deserialize, Serialize};

use crate::model::mongodb::{now, Id};

/// Core delegation data: `from_voter_id` hands their vote to `to_voter_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelegationCore {
    /// The delegator. Unique across the collection.
    pub from_voter_id: Id,
    /// The delegate, who gains one unit of weight.
    pub to_voter_id: Id,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
}

/// A delegation from the database, with its unique ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delegation {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub delegation: DelegationCore,
}

impl Delegation {
    pub fn new(from_voter_id: Id, to_voter_id: Id) -> Self {
        Self {
            id: Id::new(),
            delegation: DelegationCore {
                from_voter_id,
                to_voter_id,
                created_at: now(),
            },
        }
    }
}

impl Deref for Delegation {
    type Target = DelegationCore;

    fn deref(&self) -> &Self::Target {
        &self.delegation
    }
}
