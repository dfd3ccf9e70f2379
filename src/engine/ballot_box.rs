use log::info;
use mongodb::{
    bson::doc,
    options::{FindOneAndUpdateOptions, FindOptions, ReturnDocument},
    ClientSession,
};
use rocket::futures::TryStreamExt;

use crate::error::{Error, Result};
use crate::model::{
    db::{election::Election, vote::Vote},
    mongodb::{is_duplicate_key_error, Id},
};

use super::{transaction, Engine};

/// Records votes, one per voter per election.
pub struct BallotBox<'a> {
    engine: &'a Engine,
}

impl<'a> BallotBox<'a> {
    pub(super) fn new(engine: &'a Engine) -> Self {
        Self { engine }
    }

    /// Cast `voter`'s vote for `option` in `election`, weighted by their
    /// effective weight at this moment.
    ///
    /// Every check and the insert run in one transaction, and the unique
    /// `(voter_id, election_id)` index turns a racing second insert into
    /// [`Error::DuplicateVote`].
    pub async fn cast_vote(&self, voter_id: Id, election_id: Id, option_id: Id) -> Result<Vote> {
        let vote = transaction::run(&self.engine.client, |mut session| async move {
            let result = self
                .cast_vote_with_session(voter_id, election_id, option_id, &mut session)
                .await;
            (session, result)
        })
        .await?;
        info!(
            "Voter {voter_id} voted for option {option_id} in election {election_id} with weight {}",
            vote.weight
        );
        Ok(vote)
    }

    async fn cast_vote_with_session(
        &self,
        voter_id: Id,
        election_id: Id,
        option_id: Id,
        session: &mut ClientSession,
    ) -> Result<Vote> {
        let registry = self.engine.registry();

        // Eligibility.
        let voter = registry.get_with_session(voter_id, session).await?;
        if !voter.active {
            return Err(Error::not_eligible(format!(
                "Voter {voter_id} has delegated their vote"
            )));
        }
        if voter.suspended {
            return Err(Error::not_eligible(format!("Voter {voter_id} is suspended")));
        }
        // `active` should already say this, but check the ledger itself too.
        if self
            .engine
            .ledger()
            .outgoing_with_session(voter_id, session)
            .await?
            .is_some()
        {
            return Err(Error::not_eligible(format!(
                "Voter {voter_id} has delegated their vote"
            )));
        }

        // Uniqueness.
        let election = self.pin_election(election_id, session).await?;
        let existing = self
            .engine
            .votes
            .find_one_with_session(
                doc! { "voter_id": voter_id, "election_id": election_id },
                None,
                session,
            )
            .await?;
        if existing.is_some() {
            return Err(Error::DuplicateVote);
        }

        // The option must belong to this election.
        if election.option(option_id).is_none() {
            return Err(self.missing_option_error(option_id, session).await?);
        }

        let weight = self
            .engine
            .weights()
            .effective_weight_with_session(voter_id, session)
            .await?;

        if !registry.record_vote_cast(voter_id, session).await? {
            return Err(Error::not_eligible(format!(
                "Voter {voter_id} can no longer vote"
            )));
        }

        let vote = Vote::new(voter_id, election_id, option_id, weight);
        match self
            .engine
            .votes
            .insert_one_with_session(&vote, None, session)
            .await
        {
            Ok(_) => Ok(vote),
            Err(e) if is_duplicate_key_error(&e) => Err(Error::DuplicateVote),
            Err(e) => Err(e.into()),
        }
    }

    /// Has the voter already voted in this election?
    pub async fn has_voted(&self, voter_id: Id, election_id: Id) -> Result<bool> {
        let count = self
            .engine
            .votes
            .count_documents(
                doc! { "voter_id": voter_id, "election_id": election_id },
                None,
            )
            .await?;
        Ok(count > 0)
    }

    /// Elections the voter has not voted in yet, oldest first.
    pub async fn eligible_elections(&self, voter_id: Id) -> Result<Vec<Election>> {
        // Fail for unknown voters rather than listing everything.
        self.engine.registry().get(voter_id).await?;

        let voted = self
            .engine
            .votes
            .distinct("election_id", doc! { "voter_id": voter_id }, None)
            .await?;
        let options = FindOptions::builder()
            .sort(doc! { "created_at": 1, "_id": 1 })
            .build();
        let elections = self
            .engine
            .elections
            .find(doc! { "_id": { "$nin": voted } }, options)
            .await?
            .try_collect()
            .await?;
        Ok(elections)
    }

    /// Fetch the election and bump its revision, so that deleting the
    /// election concurrently conflicts with this vote.
    async fn pin_election(
        &self,
        election_id: Id,
        session: &mut ClientSession,
    ) -> Result<Election> {
        let options = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::After)
            .build();
        self.engine
            .elections
            .find_one_and_update_with_session(
                election_id.as_doc(),
                doc! { "$inc": { "revision": 1 } },
                options,
                session,
            )
            .await?
            .ok_or_else(|| Error::not_found(format!("Election {election_id}")))
    }

    /// Distinguish an option from another election from one that does not exist.
    async fn missing_option_error(
        &self,
        option_id: Id,
        session: &mut ClientSession,
    ) -> Result<Error> {
        let owner = self
            .engine
            .elections
            .find_one_with_session(doc! { "options.id": option_id }, None, session)
            .await?;
        Ok(match owner {
            Some(_) => Error::OptionMismatch,
            None => Error::not_found(format!("Option {option_id}")),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::examples::{self, register};
    use crate::model::{db::voter::VoterCore, mongodb::Coll};

    #[backend_test]
    async fn cast_vote_records_weight(engine: Engine, votes: Coll<Vote>) {
        let a = register(&engine, VoterCore::example1()).await;
        let b = register(&engine, VoterCore::example2()).await;
        let election = examples::election(&engine).await;
        let option = election.options[1].id;

        engine.ledger().delegate(a.id, b.id).await.unwrap();
        let vote = engine
            .ballot_box()
            .cast_vote(b.id, election.id, option)
            .await
            .unwrap();
        assert_eq!(vote.weight, 2);
        assert_eq!(vote.voter_id, b.id);
        assert_eq!(vote.election_id, election.id);
        assert_eq!(vote.option_id, option);

        let stored = votes.find_one(vote.id.as_doc(), None).await.unwrap().unwrap();
        assert_eq!(stored.weight, 2);
        assert_eq!(engine.registry().get(b.id).await.unwrap().votes_cast, 1);
    }

    #[backend_test]
    async fn second_vote_is_rejected(engine: Engine, votes: Coll<Vote>) {
        let a = register(&engine, VoterCore::example1()).await;
        let election = examples::election(&engine).await;
        let ballot_box = engine.ballot_box();

        ballot_box
            .cast_vote(a.id, election.id, election.options[0].id)
            .await
            .unwrap();
        assert!(matches!(
            ballot_box
                .cast_vote(a.id, election.id, election.options[1].id)
                .await,
            Err(Error::DuplicateVote)
        ));
        assert_eq!(votes.count_documents(None, None).await.unwrap(), 1);
        assert_eq!(engine.registry().get(a.id).await.unwrap().votes_cast, 1);
    }

    #[backend_test]
    async fn delegated_voters_cannot_vote(engine: Engine, votes: Coll<Vote>) {
        let a = register(&engine, VoterCore::example1()).await;
        let b = register(&engine, VoterCore::example2()).await;
        let election = examples::election(&engine).await;

        engine.ledger().delegate(a.id, b.id).await.unwrap();
        assert!(matches!(
            engine
                .ballot_box()
                .cast_vote(a.id, election.id, election.options[0].id)
                .await,
            Err(Error::NotEligible(_))
        ));
        assert_eq!(votes.count_documents(None, None).await.unwrap(), 0);
    }

    #[backend_test]
    async fn suspended_voters_cannot_vote(engine: Engine) {
        let a = register(&engine, VoterCore::example1()).await;
        let election = examples::election(&engine).await;
        engine.registry().suspend(a.id).await.unwrap();

        let ballot_box = engine.ballot_box();
        assert!(matches!(
            ballot_box
                .cast_vote(a.id, election.id, election.options[0].id)
                .await,
            Err(Error::NotEligible(_))
        ));

        engine.registry().reinstate(a.id).await.unwrap();
        ballot_box
            .cast_vote(a.id, election.id, election.options[0].id)
            .await
            .unwrap();
    }

    #[backend_test]
    async fn option_must_belong_to_election(engine: Engine) {
        let a = register(&engine, VoterCore::example1()).await;
        let first = examples::election(&engine).await;
        let second = examples::election(&engine).await;
        let ballot_box = engine.ballot_box();

        assert!(matches!(
            ballot_box
                .cast_vote(a.id, first.id, second.options[0].id)
                .await,
            Err(Error::OptionMismatch)
        ));
        assert!(matches!(
            ballot_box.cast_vote(a.id, first.id, Id::new()).await,
            Err(Error::NotFound(_))
        ));
        assert!(matches!(
            ballot_box
                .cast_vote(a.id, Id::new(), first.options[0].id)
                .await,
            Err(Error::NotFound(_))
        ));
        assert!(matches!(
            ballot_box
                .cast_vote(Id::new(), first.id, first.options[0].id)
                .await,
            Err(Error::NotFound(_))
        ));
        assert_eq!(engine.registry().get(a.id).await.unwrap().votes_cast, 0);
    }

    #[backend_test]
    async fn revoked_delegator_votes_with_own_weight(engine: Engine) {
        let a = register(&engine, VoterCore::example1()).await;
        let b = register(&engine, VoterCore::example2()).await;
        let election = examples::election(&engine).await;

        let delegation = engine.ledger().delegate(a.id, b.id).await.unwrap();
        engine.ledger().revoke(delegation.id).await.unwrap();
        assert!(engine.registry().get(a.id).await.unwrap().active);

        let vote = engine
            .ballot_box()
            .cast_vote(a.id, election.id, election.options[0].id)
            .await
            .unwrap();
        assert_eq!(vote.weight, 1);
        assert_eq!(engine.weights().effective_weight(b.id).await.unwrap(), 1);
    }

    #[backend_test]
    async fn weight_is_fixed_at_cast_time(engine: Engine, votes: Coll<Vote>) {
        let a = register(&engine, VoterCore::example1()).await;
        let b = register(&engine, VoterCore::example2()).await;
        let election = examples::election(&engine).await;

        let delegation = engine.ledger().delegate(a.id, b.id).await.unwrap();
        let vote = engine
            .ballot_box()
            .cast_vote(b.id, election.id, election.options[0].id)
            .await
            .unwrap();
        engine.ledger().revoke(delegation.id).await.unwrap();

        let stored = votes.find_one(vote.id.as_doc(), None).await.unwrap().unwrap();
        assert_eq!(stored.weight, 2);
    }

    #[backend_test]
    async fn eligible_elections_exclude_voted(engine: Engine) {
        let a = register(&engine, VoterCore::example1()).await;
        let first = examples::election(&engine).await;
        let second = examples::election(&engine).await;
        let ballot_box = engine.ballot_box();

        let ids = |elections: Vec<Election>| elections.into_iter().map(|e| e.id).collect::<Vec<_>>();
        assert_eq!(
            ids(ballot_box.eligible_elections(a.id).await.unwrap()),
            vec![first.id, second.id]
        );
        assert!(!ballot_box.has_voted(a.id, first.id).await.unwrap());

        ballot_box
            .cast_vote(a.id, first.id, first.options[0].id)
            .await
            .unwrap();
        assert!(ballot_box.has_voted(a.id, first.id).await.unwrap());
        assert!(!ballot_box.has_voted(a.id, second.id).await.unwrap());
        assert_eq!(
            ids(ballot_box.eligible_elections(a.id).await.unwrap()),
            vec![second.id]
        );

        assert!(matches!(
            ballot_box.eligible_elections(Id::new()).await,
            Err(Error::NotFound(_))
        ));
    }

    #[backend_test]
    async fn concurrent_casts_record_one_vote(engine: Engine, votes: Coll<Vote>) {
        let a = register(&engine, VoterCore::example1()).await;
        let election = examples::election(&engine).await;
        let option = election.options[0].id;

        let first = engine.ballot_box();
        let second = engine.ballot_box();
        let (r1, r2) = rocket::futures::join!(
            first.cast_vote(a.id, election.id, option),
            second.cast_vote(a.id, election.id, option),
        );
        assert_eq!(r1.is_ok() as u32 + r2.is_ok() as u32, 1);
        assert!(matches!(r1.err().or(r2.err()), Some(Error::DuplicateVote)));
        assert_eq!(votes.count_documents(None, None).await.unwrap(), 1);
        assert_eq!(engine.registry().get(a.id).await.unwrap().votes_cast, 1);
    }

    #[backend_test]
    async fn racing_delegation_and_vote_stay_consistent(engine: Engine) {
        let a = register(&engine, VoterCore::example1()).await;
        let b = register(&engine, VoterCore::example2()).await;
        let election = examples::election(&engine).await;

        let ledger = engine.ledger();
        let ballot_box = engine.ballot_box();
        let (delegated, voted) = rocket::futures::join!(
            ledger.delegate(a.id, b.id),
            ballot_box.cast_vote(a.id, election.id, election.options[0].id),
        );
        assert!(delegated.is_ok() != voted.is_ok());
        assert!(matches!(
            delegated.err().or(voted.err()),
            Some(Error::NotEligible(_))
        ));

        let a = engine.registry().get(a.id).await.unwrap();
        assert_eq!(a.active, ledger.outgoing(a.id).await.unwrap().is_none());
        assert_eq!(a.votes_cast == 1, a.active);
    }
}
