use log::info;
use mongodb::{
    bson::doc,
    options::{FindOneAndUpdateOptions, FindOptions, ReturnDocument},
    ClientSession,
};
use rocket::{futures::TryStreamExt, http::Status};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::{
    db::voter::Voter,
    mongodb::{is_duplicate_key_error, Id},
};

use super::{transaction, Engine};

/// Voter identity and eligibility.
///
/// The `active` flag is only ever written by the [`super::DelegationLedger`],
/// through the crate-private methods here.
pub struct VoterRegistry<'a> {
    engine: &'a Engine,
}

/// What a cascading voter deletion removed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoterDeletion {
    /// Delegations removed, whether the deleted voter was their source or target.
    pub delegations_removed: u64,
    /// Votes the deleted voter had cast.
    pub votes_removed: u64,
    /// Voters who had delegated to the deleted voter and can vote again.
    pub reactivated: Vec<Id>,
}

impl<'a> VoterRegistry<'a> {
    pub(super) fn new(engine: &'a Engine) -> Self {
        Self { engine }
    }

    /// Register a new voter. The external ID must be unique.
    pub async fn register(&self, name: String, external_id: String) -> Result<Voter> {
        let name = name.trim().to_string();
        let external_id = external_id.trim().to_string();
        if name.is_empty() || external_id.is_empty() {
            return Err(Error::Status(
                Status::BadRequest,
                "Voter name and external ID must not be empty".to_string(),
            ));
        }

        let voter = Voter::new(name, external_id);
        match self.engine.voters.insert_one(&voter, None).await {
            Ok(_) => {
                info!("Registered voter {} ({})", voter.id, voter.external_id);
                Ok(voter)
            }
            Err(e) if is_duplicate_key_error(&e) => {
                Err(Error::DuplicateVoter(voter.voter.external_id))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Resolve a voter by the external ID they identify themselves with.
    pub async fn lookup(&self, external_id: &str) -> Result<Voter> {
        self.engine
            .voters
            .find_one(doc! { "external_id": external_id.trim() }, None)
            .await?
            .ok_or_else(|| Error::not_found(format!("Voter with external ID '{external_id}'")))
    }

    pub async fn get(&self, voter_id: Id) -> Result<Voter> {
        self.engine
            .voters
            .find_one(voter_id.as_doc(), None)
            .await?
            .ok_or_else(|| Error::not_found(format!("Voter {voter_id}")))
    }

    /// All voters, ordered by name.
    pub async fn list(&self) -> Result<Vec<Voter>> {
        let options = FindOptions::builder().sort(doc! { "name": 1 }).build();
        let voters = self
            .engine
            .voters
            .find(None, options)
            .await?
            .try_collect()
            .await?;
        Ok(voters)
    }

    /// Administratively bar a voter from casting personal votes.
    ///
    /// This never touches `active`, so it cannot disagree with the ledger.
    pub async fn suspend(&self, voter_id: Id) -> Result<Voter> {
        let voter = self.set_suspended(voter_id, true).await?;
        info!("Suspended voter {voter_id}");
        Ok(voter)
    }

    /// Lift an administrative suspension.
    pub async fn reinstate(&self, voter_id: Id) -> Result<Voter> {
        let voter = self.set_suspended(voter_id, false).await?;
        info!("Reinstated voter {voter_id}");
        Ok(voter)
    }

    async fn set_suspended(&self, voter_id: Id, suspended: bool) -> Result<Voter> {
        let options = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::After)
            .build();
        self.engine
            .voters
            .find_one_and_update(
                voter_id.as_doc(),
                doc! { "$set": { "suspended": suspended } },
                options,
            )
            .await?
            .ok_or_else(|| Error::not_found(format!("Voter {voter_id}")))
    }

    /// Delete a voter along with every delegation they are part of and every
    /// vote they cast.
    ///
    /// This can silently lower other voters' effective weight: removing a
    /// delegation the deleted voter had made reduces its delegate's weight by one.
    /// Voters who had delegated to the deleted voter are reactivated, since
    /// their delegation no longer exists. Votes already cast by others keep
    /// the weight they were cast with.
    pub async fn delete(&self, voter_id: Id) -> Result<VoterDeletion> {
        let deletion = transaction::run(&self.engine.client, |mut session| async move {
            let result = self.delete_with_session(voter_id, &mut session).await;
            (session, result)
        })
        .await?;
        info!(
            "Deleted voter {voter_id}: {} delegations and {} votes removed, {} voters reactivated",
            deletion.delegations_removed,
            deletion.votes_removed,
            deletion.reactivated.len()
        );
        Ok(deletion)
    }

    async fn delete_with_session(
        &self,
        voter_id: Id,
        session: &mut ClientSession,
    ) -> Result<VoterDeletion> {
        let deleted = self
            .engine
            .voters
            .delete_one_with_session(voter_id.as_doc(), None, session)
            .await?;
        if deleted.deleted_count == 0 {
            return Err(Error::not_found(format!("Voter {voter_id}")));
        }

        // Delegators to this voter lose their delegation, so they regain their vote.
        let mut reactivated = Vec::new();
        let mut incoming = self
            .engine
            .delegations
            .find_with_session(doc! { "to_voter_id": voter_id }, None, session)
            .await?;
        while let Some(delegation) = incoming.next(session).await {
            reactivated.push(delegation?.from_voter_id);
        }
        if !reactivated.is_empty() {
            self.engine
                .voters
                .update_many_with_session(
                    doc! { "_id": { "$in": reactivated.clone() } },
                    doc! { "$set": { "active": true } },
                    None,
                    session,
                )
                .await?;
        }

        let filter = doc! {
            "$or": [{ "from_voter_id": voter_id }, { "to_voter_id": voter_id }],
        };
        let delegations_removed = self
            .engine
            .delegations
            .delete_many_with_session(filter, None, session)
            .await?
            .deleted_count;
        let votes_removed = self
            .engine
            .votes
            .delete_many_with_session(doc! { "voter_id": voter_id }, None, session)
            .await?
            .deleted_count;

        Ok(VoterDeletion {
            delegations_removed,
            votes_removed,
            reactivated,
        })
    }

    /// Mark a voter as delegated-out, provided they are active, not suspended,
    /// and have never voted. Returns whether the voter was updated.
    pub(super) async fn deactivate_for_delegation(
        &self,
        voter_id: Id,
        session: &mut ClientSession,
    ) -> Result<bool> {
        let filter = doc! {
            "_id": voter_id,
            "active": true,
            "suspended": false,
            "votes_cast": 0,
        };
        let result = self
            .engine
            .voters
            .update_one_with_session(filter, doc! { "$set": { "active": false } }, None, session)
            .await?;
        Ok(result.matched_count == 1)
    }

    /// Set the `active` flag unconditionally.
    pub(super) async fn set_active(
        &self,
        voter_id: Id,
        active: bool,
        session: &mut ClientSession,
    ) -> Result<()> {
        self.engine
            .voters
            .update_one_with_session(
                voter_id.as_doc(),
                doc! { "$set": { "active": active } },
                None,
                session,
            )
            .await?;
        Ok(())
    }

    /// Count a cast vote against the voter, provided they can still vote.
    /// Returns whether the voter was updated.
    ///
    /// Writing the voter document here is what makes a racing delegation and
    /// vote conflict: both touch the same document, so one of them aborts.
    pub(super) async fn record_vote_cast(
        &self,
        voter_id: Id,
        session: &mut ClientSession,
    ) -> Result<bool> {
        let filter = doc! {
            "_id": voter_id,
            "active": true,
            "suspended": false,
        };
        let result = self
            .engine
            .voters
            .update_one_with_session(filter, doc! { "$inc": { "votes_cast": 1 } }, None, session)
            .await?;
        Ok(result.matched_count == 1)
    }

    /// Bump the voter's revision, failing if they do not exist.
    ///
    /// A transaction that depends on a voter it otherwise only reads calls
    /// this, so that deleting the voter concurrently conflicts with it.
    pub(super) async fn pin(&self, voter_id: Id, session: &mut ClientSession) -> Result<()> {
        let result = self
            .engine
            .voters
            .update_one_with_session(
                voter_id.as_doc(),
                doc! { "$inc": { "revision": 1 } },
                None,
                session,
            )
            .await?;
        if result.matched_count == 0 {
            return Err(Error::not_found(format!("Voter {voter_id}")));
        }
        Ok(())
    }

    pub(super) async fn get_with_session(
        &self,
        voter_id: Id,
        session: &mut ClientSession,
    ) -> Result<Voter> {
        self.engine
            .voters
            .find_one_with_session(voter_id.as_doc(), None, session)
            .await?
            .ok_or_else(|| Error::not_found(format!("Voter {voter_id}")))
    }
}
