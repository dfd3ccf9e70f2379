use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{api::id::ApiId, db::delegation::Delegation};

/// A request for `from` to delegate their vote to `to`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DelegationSpec {
    pub from: ApiId,
    pub to: ApiId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelegationDescription {
    pub id: ApiId,
    pub from: ApiId,
    pub to: ApiId,
    pub created_at: DateTime<Utc>,
}

impl From<Delegation> for DelegationDescription {
    fn from(delegation: Delegation) -> Self {
        Self {
            id: delegation.id.into(),
            from: delegation.from_voter_id.into(),
            to: delegation.to_voter_id.into(),
            created_at: delegation.created_at,
        }
    }
}
