use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{api::id::ApiId, db::vote::Vote};

/// A voter's choice in one election.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoteSpec {
    pub election: ApiId,
    pub option: ApiId,
}

/// Confirmation of a cast vote, including the weight it was counted with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteReceipt {
    pub id: ApiId,
    pub election: ApiId,
    pub option: ApiId,
    pub weight: u32,
    pub cast_at: DateTime<Utc>,
}

impl From<Vote> for VoteReceipt {
    fn from(vote: Vote) -> Self {
        Self {
            id: vote.id.into(),
            election: vote.election_id.into(),
            option: vote.option_id.into(),
            weight: vote.weight,
            cast_at: vote.cast_at,
        }
    }
}
