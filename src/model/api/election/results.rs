use serde::{Deserialize, Serialize};

use crate::engine::ElectionTally;
use crate::model::api::{election::ElectionSummary, id::ApiId};

/// Weighted results of one election.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElectionResults {
    pub election: ElectionSummary,
    /// One entry per option, in option creation order.
    pub options: Vec<OptionResult>,
    /// Sum of every option's total.
    pub total_weight: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionResult {
    pub id: ApiId,
    pub label: String,
    pub total: u64,
}

impl From<ElectionTally> for ElectionResults {
    fn from(tally: ElectionTally) -> Self {
        let total_weight = tally.total_weight();
        Self {
            election: tally.election.into(),
            options: tally
                .totals
                .into_iter()
                .map(|t| OptionResult {
                    id: t.option.id.into(),
                    label: t.option.label,
                    total: t.total,
                })
                .collect(),
            total_weight,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::OptionTotal;
    use crate::model::db::election::Election;

    #[test]
    fn results_keep_option_order_and_sum() {
        let election = Election::example();
        let tally = ElectionTally {
            totals: election
                .options
                .iter()
                .cloned()
                .zip([4, 0, 1])
                .map(|(option, total)| OptionTotal { option, total })
                .collect(),
            election: election.clone(),
        };

        let results = ElectionResults::from(tally);
        assert_eq!(*results.election.id, election.id);
        assert_eq!(results.total_weight, 5);
        let labels = results
            .options
            .iter()
            .map(|o| (o.label.as_str(), o.total))
            .collect::<Vec<_>>();
        assert_eq!(labels, vec![("Ana", 4), ("Bruno", 0), ("Blank", 1)]);
    }
}
