use std::ops::{Deref, DerefMut};

use serde::{Deserialize, Serialize};

use crate::model::mongodb::Id;

/// Core voter data, as stored in the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoterCore {
    /// Externally issued identity, e.g. a national ID number. Unique.
    pub external_id: String,
    /// Display name.
    pub name: String,
    /// May this voter cast a personal vote?
    ///
    /// Only the delegation ledger changes this: it is false exactly while the
    /// voter has an outgoing delegation.
    pub active: bool,
    /// Administrative suspension, independent of delegation.
    pub suspended: bool,
    /// Number of votes this voter has cast, across all elections.
    pub votes_cast: u32,
    /// Bumped by transactions that rely on this voter existing without
    /// otherwise writing to it, so that a concurrent deletion conflicts.
    pub revision: u32,
}

impl VoterCore {
    /// Create a new, eligible voter.
    pub fn new(name: String, external_id: String) -> Self {
        Self {
            external_id,
            name,
            active: true,
            suspended: false,
            votes_cast: 0,
            revision: 0,
        }
    }

    /// Can this voter cast a ballot in person right now?
    pub fn can_vote(&self) -> bool {
        self.active && !self.suspended
    }
}

/// A voter from the database, with its unique ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Voter {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub voter: VoterCore,
}

impl Voter {
    /// Create a brand new voter with a fresh ID.
    pub fn new(name: String, external_id: String) -> Self {
        Self {
            id: Id::new(),
            voter: VoterCore::new(name, external_id),
        }
    }
}

impl Deref for Voter {
    type Target = VoterCore;

    fn deref(&self) -> &Self::Target {
        &self.voter
    }
}

impl DerefMut for Voter {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.voter
    }
}
