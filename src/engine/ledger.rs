use log::info;
use mongodb::{bson::doc, options::FindOptions, ClientSession};
use rocket::futures::TryStreamExt;

use crate::error::{Error, Result};
use crate::model::{
    db::delegation::Delegation,
    mongodb::{is_duplicate_key_error, Id},
};

use super::{transaction, Engine};

/// Single-hop delegation edges.
///
/// Creating or removing a delegation and flipping the delegator's `active`
/// flag happen in one transaction, so no reader ever sees one without the other.
pub struct DelegationLedger<'a> {
    engine: &'a Engine,
}

impl<'a> DelegationLedger<'a> {
    pub(super) fn new(engine: &'a Engine) -> Self {
        Self { engine }
    }

    /// Record that `from` hands their vote to `to`, and make `from` inactive.
    ///
    /// A voter may have at most one outgoing delegation, must not have voted
    /// in any election yet, and must not be suspended. The delegate has no
    /// restrictions and may receive any number of delegations.
    pub async fn delegate(&self, from: Id, to: Id) -> Result<Delegation> {
        if from == to {
            return Err(Error::SelfDelegation);
        }

        let delegation = transaction::run(&self.engine.client, |mut session| async move {
            let result = self.delegate_with_session(from, to, &mut session).await;
            (session, result)
        })
        .await?;
        info!("Voter {from} delegated to voter {to} ({})", delegation.id);
        Ok(delegation)
    }

    async fn delegate_with_session(
        &self,
        from: Id,
        to: Id,
        session: &mut ClientSession,
    ) -> Result<Delegation> {
        let registry = self.engine.registry();
        let delegator = registry.get_with_session(from, session).await?;
        // Written rather than read, so a concurrent deletion of the delegate
        // cannot commit alongside this delegation.
        registry.pin(to, session).await?;

        if self.outgoing_with_session(from, session).await?.is_some() {
            return Err(Error::AlreadyDelegated);
        }
        if delegator.votes_cast > 0 {
            return Err(Error::not_eligible(format!(
                "Voter {from} has already voted and can no longer delegate"
            )));
        }
        if delegator.suspended {
            return Err(Error::not_eligible(format!("Voter {from} is suspended")));
        }

        if !registry.deactivate_for_delegation(from, session).await? {
            return Err(Error::not_eligible(format!(
                "Voter {from} can no longer delegate"
            )));
        }

        let delegation = Delegation::new(from, to);
        match self
            .engine
            .delegations
            .insert_one_with_session(&delegation, None, session)
            .await
        {
            Ok(_) => Ok(delegation),
            Err(e) if is_duplicate_key_error(&e) => Err(Error::AlreadyDelegated),
            Err(e) => Err(e.into()),
        }
    }

    /// Remove a delegation and make its delegator active again.
    ///
    /// Votes the delegate already cast keep the weight they were cast with.
    pub async fn revoke(&self, delegation_id: Id) -> Result<Delegation> {
        let delegation = transaction::run(&self.engine.client, |mut session| async move {
            let result = self.revoke_with_session(delegation_id, &mut session).await;
            (session, result)
        })
        .await?;
        info!(
            "Revoked delegation {delegation_id} from voter {} to voter {}",
            delegation.from_voter_id, delegation.to_voter_id
        );
        Ok(delegation)
    }

    async fn revoke_with_session(
        &self,
        delegation_id: Id,
        session: &mut ClientSession,
    ) -> Result<Delegation> {
        let delegation = self
            .engine
            .delegations
            .find_one_and_delete_with_session(delegation_id.as_doc(), None, session)
            .await?
            .ok_or_else(|| Error::not_found(format!("Delegation {delegation_id}")))?;
        self.engine
            .registry()
            .set_active(delegation.from_voter_id, true, session)
            .await?;
        Ok(delegation)
    }

    /// All delegations, oldest first.
    pub async fn list(&self) -> Result<Vec<Delegation>> {
        let options = FindOptions::builder()
            .sort(doc! { "created_at": 1, "_id": 1 })
            .build();
        let delegations = self
            .engine
            .delegations
            .find(None, options)
            .await?
            .try_collect()
            .await?;
        Ok(delegations)
    }

    /// The delegation the voter has made, if any.
    pub async fn outgoing(&self, voter_id: Id) -> Result<Option<Delegation>> {
        let delegation = self
            .engine
            .delegations
            .find_one(doc! { "from_voter_id": voter_id }, None)
            .await?;
        Ok(delegation)
    }

    pub(super) async fn outgoing_with_session(
        &self,
        voter_id: Id,
        session: &mut ClientSession,
    ) -> Result<Option<Delegation>> {
        let delegation = self
            .engine
            .delegations
            .find_one_with_session(doc! { "from_voter_id": voter_id }, None, session)
            .await?;
        Ok(delegation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::examples::{self, register};
    use crate::model::{
        db::voter::{Voter, VoterCore},
        mongodb::Coll,
    };

    /// `active` must be false exactly when the voter has an outgoing delegation.
    async fn assert_eligibility_invariant(engine: &Engine) {
        for voter in engine.registry().list().await.unwrap() {
            let outgoing = engine.ledger().outgoing(voter.id).await.unwrap();
            assert_eq!(
                voter.active,
                outgoing.is_none(),
                "eligibility out of sync for {}",
                voter.name
            );
        }
    }

    #[backend_test]
    async fn delegate_and_revoke(engine: Engine) {
        let a = register(&engine, VoterCore::example1()).await;
        let b = register(&engine, VoterCore::example2()).await;
        let ledger = engine.ledger();

        let delegation = ledger.delegate(a.id, b.id).await.unwrap();
        assert_eq!(delegation.from_voter_id, a.id);
        assert_eq!(delegation.to_voter_id, b.id);
        assert!(!engine.registry().get(a.id).await.unwrap().active);
        assert!(engine.registry().get(b.id).await.unwrap().active);
        assert_eligibility_invariant(&engine).await;

        let revoked = ledger.revoke(delegation.id).await.unwrap();
        assert_eq!(revoked.id, delegation.id);
        assert!(engine.registry().get(a.id).await.unwrap().active);
        assert!(ledger.outgoing(a.id).await.unwrap().is_none());
        assert_eligibility_invariant(&engine).await;
    }

    #[backend_test]
    async fn self_delegation_is_rejected(engine: Engine) {
        let a = register(&engine, VoterCore::example1()).await;
        assert!(matches!(
            engine.ledger().delegate(a.id, a.id).await,
            Err(Error::SelfDelegation)
        ));
        assert!(engine.registry().get(a.id).await.unwrap().active);
    }

    #[backend_test]
    async fn second_delegation_is_rejected(engine: Engine) {
        let a = register(&engine, VoterCore::example1()).await;
        let b = register(&engine, VoterCore::example2()).await;
        let c = register(&engine, VoterCore::example3()).await;
        let ledger = engine.ledger();

        ledger.delegate(a.id, b.id).await.unwrap();
        assert!(matches!(
            ledger.delegate(a.id, b.id).await,
            Err(Error::AlreadyDelegated)
        ));
        assert!(matches!(
            ledger.delegate(a.id, c.id).await,
            Err(Error::AlreadyDelegated)
        ));
        assert_eq!(ledger.list().await.unwrap().len(), 1);
        assert_eligibility_invariant(&engine).await;
    }

    #[backend_test]
    async fn delegation_needs_existing_voters(engine: Engine) {
        let a = register(&engine, VoterCore::example1()).await;
        let ledger = engine.ledger();

        assert!(matches!(
            ledger.delegate(a.id, Id::new()).await,
            Err(Error::NotFound(_))
        ));
        assert!(matches!(
            ledger.delegate(Id::new(), a.id).await,
            Err(Error::NotFound(_))
        ));
        assert!(engine.registry().get(a.id).await.unwrap().active);
    }

    #[backend_test]
    async fn voters_who_voted_cannot_delegate(engine: Engine) {
        let a = register(&engine, VoterCore::example1()).await;
        let b = register(&engine, VoterCore::example2()).await;
        let election = examples::election(&engine).await;
        engine
            .ballot_box()
            .cast_vote(a.id, election.id, election.options[0].id)
            .await
            .unwrap();

        assert!(matches!(
            engine.ledger().delegate(a.id, b.id).await,
            Err(Error::NotEligible(_))
        ));
        assert!(engine.registry().get(a.id).await.unwrap().active);
        assert!(engine.ledger().list().await.unwrap().is_empty());
    }

    #[backend_test]
    async fn suspended_voters_cannot_delegate(engine: Engine) {
        let a = register(&engine, VoterCore::example1()).await;
        let b = register(&engine, VoterCore::example2()).await;
        engine.registry().suspend(a.id).await.unwrap();

        assert!(matches!(
            engine.ledger().delegate(a.id, b.id).await,
            Err(Error::NotEligible(_))
        ));
        assert_eligibility_invariant(&engine).await;
    }

    #[backend_test]
    async fn revoking_unknown_delegation_fails(engine: Engine) {
        assert!(matches!(
            engine.ledger().revoke(Id::new()).await,
            Err(Error::NotFound(_))
        ));
    }

    #[backend_test]
    async fn racing_delegation_and_delegate_deletion_leave_no_dangling_edge(engine: Engine) {
        let a = register(&engine, VoterCore::example1()).await;
        let b = register(&engine, VoterCore::example2()).await;

        let ledger = engine.ledger();
        let registry = engine.registry();
        let (delegated, deleted) =
            rocket::futures::join!(ledger.delegate(a.id, b.id), registry.delete(b.id));

        // The deletion either removed the delegation or beat it to the delegate.
        assert!(deleted.is_ok(), "{deleted:?}");
        assert!(
            matches!(delegated, Ok(_) | Err(Error::NotFound(_))),
            "{delegated:?}"
        );
        assert!(engine.ledger().list().await.unwrap().is_empty());
        assert!(engine.registry().get(a.id).await.unwrap().active);
        assert_eligibility_invariant(&engine).await;
    }

    #[backend_test]
    async fn list_is_oldest_first(engine: Engine, voters: Coll<Voter>) {
        let a = register(&engine, VoterCore::example1()).await;
        let b = register(&engine, VoterCore::example2()).await;
        let c = register(&engine, VoterCore::example3()).await;
        let first = engine.ledger().delegate(a.id, c.id).await.unwrap();
        let second = engine.ledger().delegate(b.id, c.id).await.unwrap();

        let listed = engine
            .ledger()
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|d| d.id)
            .collect::<Vec<_>>();
        assert_eq!(listed, vec![first.id, second.id]);
        assert_eq!(
            voters
                .count_documents(doc! { "active": false }, None)
                .await
                .unwrap(),
            2
        );
    }
}
