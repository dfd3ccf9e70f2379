//! The delegation-weighted voting engine.
//!
//! Components, leaf first:
//!
//! - [`VoterRegistry`]: voter identity and eligibility flags.
//! - [`DelegationLedger`]: single-hop delegation edges, which decide `active`.
//! - [`WeightCalculator`]: a voter's effective weight, derived on demand.
//! - [`BallotBox`]: one vote per voter per election, weight fixed at cast time.
//! - [`TallyEngine`]: weighted totals per election option.
//!
//! [`ElectionCatalog`] holds the elections and their options.

use mongodb::{Client, Database};
use rocket::{
    request::{self, FromRequest, Request},
    State,
};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::model::{
    db::{delegation::Delegation, election::Election, vote::Vote, voter::Voter},
    mongodb::Coll,
};

pub mod ballot_box;
pub mod elections;
pub mod ledger;
pub mod registry;
pub mod tally;
pub mod transaction;
pub mod weight;

pub use ballot_box::BallotBox;
pub use elections::ElectionCatalog;
pub use ledger::DelegationLedger;
pub use registry::{VoterDeletion, VoterRegistry};
pub use tally::{ElectionTally, OptionTotal, TallyEngine};
pub use weight::WeightCalculator;

/// Handles on the database shared by every engine component.
///
/// Cheap to clone; every field is reference counted by the driver.
#[derive(Clone)]
pub struct Engine {
    client: Client,
    voters: Coll<Voter>,
    elections: Coll<Election>,
    delegations: Coll<Delegation>,
    votes: Coll<Vote>,
}

impl Engine {
    /// Create an engine over the given database. The client is used to start
    /// transactions and must be the one `db` was obtained from.
    pub fn new(client: &Client, db: &Database) -> Self {
        Self {
            client: client.clone(),
            voters: Coll::from_db(db),
            elections: Coll::from_db(db),
            delegations: Coll::from_db(db),
            votes: Coll::from_db(db),
        }
    }

    pub fn registry(&self) -> VoterRegistry<'_> {
        VoterRegistry::new(self)
    }

    pub fn ledger(&self) -> DelegationLedger<'_> {
        DelegationLedger::new(self)
    }

    pub fn weights(&self) -> WeightCalculator<'_> {
        WeightCalculator::new(self)
    }

    pub fn ballot_box(&self) -> BallotBox<'_> {
        BallotBox::new(self)
    }

    pub fn tallies(&self) -> TallyEngine<'_> {
        TallyEngine::new(self)
    }

    pub fn elections(&self) -> ElectionCatalog<'_> {
        ElectionCatalog::new(self)
    }

    /// Headline counts for the admin overview.
    pub async fn stats(&self) -> Result<Stats> {
        Ok(Stats {
            voters: self.voters.count_documents(None, None).await?,
            elections: self.elections.count_documents(None, None).await?,
            delegations: self.delegations.count_documents(None, None).await?,
            votes: self.votes.count_documents(None, None).await?,
        })
    }
}

/// Collection sizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stats {
    pub voters: u64,
    pub elections: u64,
    pub delegations: u64,
    pub votes: u64,
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for Engine {
    type Error = ();

    /// Build an engine from the managed database state.
    ///
    /// Panics iff the [`Client`] or [`Database`] is not managed by [`rocket::Rocket`].
    async fn from_request(req: &'r Request<'_>) -> request::Outcome<Self, Self::Error> {
        let client = req.guard::<&State<Client>>().await.unwrap();
        let db = req.guard::<&State<Database>>().await.unwrap();
        request::Outcome::Success(Engine::new(client, db))
    }
}
