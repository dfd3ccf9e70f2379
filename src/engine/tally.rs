use std::collections::HashMap;

use log::debug;
use mongodb::{
    bson::{doc, Bson, Document},
    options::FindOptions,
};
use rocket::futures::TryStreamExt;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::{
    db::election::{Election, ElectionOption},
    mongodb::Id,
};

use super::Engine;

/// Weighted totals per option, computed from the stored votes.
pub struct TallyEngine<'a> {
    engine: &'a Engine,
}

/// The result of tallying one election.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElectionTally {
    pub election: Election,
    /// One entry per option, in option creation order.
    pub totals: Vec<OptionTotal>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionTotal {
    pub option: ElectionOption,
    /// Sum of the weights of the votes for this option.
    pub total: u64,
}

impl ElectionTally {
    /// Sum of all option totals.
    pub fn total_weight(&self) -> u64 {
        self.totals.iter().map(|t| t.total).sum()
    }
}

impl<'a> TallyEngine<'a> {
    pub(super) fn new(engine: &'a Engine) -> Self {
        Self { engine }
    }

    /// Tally a single election. Options nobody voted for total zero.
    pub async fn tally(&self, election_id: Id) -> Result<ElectionTally> {
        let election = self
            .engine
            .elections()
            .get(election_id)
            .await?;
        self.tally_election(election).await
    }

    /// Tally every election, newest first.
    pub async fn results(&self) -> Result<Vec<ElectionTally>> {
        let options = FindOptions::builder()
            .sort(doc! { "created_at": -1, "_id": -1 })
            .build();
        let elections: Vec<Election> = self
            .engine
            .elections
            .find(None, options)
            .await?
            .try_collect()
            .await?;

        let mut results = Vec::with_capacity(elections.len());
        for election in elections {
            results.push(self.tally_election(election).await?);
        }
        Ok(results)
    }

    async fn tally_election(&self, election: Election) -> Result<ElectionTally> {
        let pipeline = [
            doc! { "$match": { "election_id": election.id } },
            doc! { "$group": { "_id": "$option_id", "total": { "$sum": "$weight" } } },
        ];
        let sums: Vec<Document> = self
            .engine
            .votes
            .aggregate(pipeline, None)
            .await?
            .try_collect()
            .await?;

        let mut by_option = HashMap::with_capacity(sums.len());
        for sum in sums {
            let (option_id, total) = parse_sum(&sum)?;
            by_option.insert(option_id, total);
        }
        debug!(
            "Tallied election {} over {} voted options",
            election.id,
            by_option.len()
        );

        let totals = option_totals(&election, &by_option);
        Ok(ElectionTally { election, totals })
    }
}

/// Read one `$group` output document.
fn parse_sum(sum: &Document) -> Result<(Id, u64)> {
    let option_id = sum
        .get_object_id("_id")
        .map_err(|e| malformed(format!("option ID: {e}")))?;
    // `$sum` over 32-bit weights widens to 64 bits on overflow.
    let total = match sum.get("total") {
        Some(Bson::Int32(n)) => u64::try_from(*n),
        Some(Bson::Int64(n)) => u64::try_from(*n),
        other => return Err(malformed(format!("total: {other:?}"))),
    }
    .map_err(|e| malformed(format!("total: {e}")))?;
    Ok((option_id.into(), total))
}

fn malformed(detail: String) -> Error {
    Error::Status(
        rocket::http::Status::InternalServerError,
        format!("Malformed tally result, {detail}"),
    )
}

/// Pair each option with its total, in creation order. Options absent from
/// `by_option` total zero, and totals for foreign options are ignored.
fn option_totals(election: &Election, by_option: &HashMap<Id, u64>) -> Vec<OptionTotal> {
    election
        .options
        .iter()
        .map(|option| OptionTotal {
            option: option.clone(),
            total: by_option.get(&option.id).copied().unwrap_or(0),
        })
        .collect()
}
