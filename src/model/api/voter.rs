use serde::{Deserialize, Serialize};

use crate::engine::VoterDeletion;
use crate::model::{
    api::{election::ElectionSummary, id::ApiId},
    db::voter::Voter,
};

/// A request to register a voter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoterSpec {
    pub name: String,
    pub external_id: String,
}

/// A voter as shown to admins and to the voter themselves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoterDescription {
    pub id: ApiId,
    pub name: String,
    pub external_id: String,
    /// False while the voter has delegated their vote.
    pub active: bool,
    pub suspended: bool,
    pub votes_cast: u32,
    pub can_vote: bool,
}

impl From<Voter> for VoterDescription {
    fn from(voter: Voter) -> Self {
        let can_vote = voter.can_vote();
        Self {
            id: voter.id.into(),
            name: voter.voter.name,
            external_id: voter.voter.external_id,
            active: voter.voter.active,
            suspended: voter.voter.suspended,
            votes_cast: voter.voter.votes_cast,
            can_vote,
        }
    }
}

/// Everything a voter needs to see before casting a vote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoterDashboard {
    pub voter: VoterDescription,
    /// Weight a vote cast right now would carry.
    pub weight: u32,
    pub delegations_received: u64,
    /// The voter this voter delegated to, if any.
    pub delegated_to: Option<ApiId>,
    /// Elections the voter has not voted in yet, oldest first.
    pub pending_elections: Vec<ElectionSummary>,
}

/// The outcome of deleting a voter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoterDeletionReport {
    pub delegations_removed: u64,
    pub votes_removed: u64,
    pub reactivated: Vec<ApiId>,
}

impl From<VoterDeletion> for VoterDeletionReport {
    fn from(deletion: VoterDeletion) -> Self {
        Self {
            delegations_removed: deletion.delegations_removed,
            votes_removed: deletion.votes_removed,
            reactivated: deletion.reactivated.into_iter().map(ApiId::from).collect(),
        }
    }
}
