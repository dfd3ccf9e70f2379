use mongodb::{bson::doc, ClientSession};

use crate::error::Result;
use crate::model::mongodb::Id;

use super::Engine;

/// Derives effective vote weights from the delegation ledger.
///
/// Nothing is cached: every call counts the delegations as they are now.
/// Eligibility is not checked here; a delegated-out voter still has a weight.
pub struct WeightCalculator<'a> {
    engine: &'a Engine,
}

impl<'a> WeightCalculator<'a> {
    pub(super) fn new(engine: &'a Engine) -> Self {
        Self { engine }
    }

    /// One for the voter plus one per voter who delegated directly to them.
    /// Delegations never chain: only direct delegations are counted.
    pub async fn effective_weight(&self, voter_id: Id) -> Result<u32> {
        Ok(weight_from_received(
            self.delegations_received(voter_id).await?,
        ))
    }

    /// Number of delegations pointing at the voter.
    pub async fn delegations_received(&self, voter_id: Id) -> Result<u64> {
        let received = self
            .engine
            .delegations
            .count_documents(doc! { "to_voter_id": voter_id }, None)
            .await?;
        Ok(received)
    }

    /// As [`Self::effective_weight`], read inside the caller's transaction.
    pub(super) async fn effective_weight_with_session(
        &self,
        voter_id: Id,
        session: &mut ClientSession,
    ) -> Result<u32> {
        let received = self
            .engine
            .delegations
            .count_documents_with_session(doc! { "to_voter_id": voter_id }, None, session)
            .await?;
        Ok(weight_from_received(received))
    }
}

fn weight_from_received(received: u64) -> u32 {
    u32::try_from(received)
        .unwrap_or(u32::MAX)
        .saturating_add(1)
}
