use log::info;
use mongodb::{
    bson::{doc, to_bson},
    options::FindOptions,
    ClientSession,
};
use rocket::{futures::TryStreamExt, http::Status};

use crate::error::{Error, Result};
use crate::model::{
    db::election::{Election, ElectionOption},
    mongodb::Id,
};

use super::{transaction, Engine};

/// Elections and the options within them.
pub struct ElectionCatalog<'a> {
    engine: &'a Engine,
}

impl<'a> ElectionCatalog<'a> {
    pub(super) fn new(engine: &'a Engine) -> Self {
        Self { engine }
    }

    /// Create an election with the given options, in the given order.
    pub async fn create(
        &self,
        title: String,
        description: String,
        option_labels: Vec<String>,
    ) -> Result<Election> {
        let title = title.trim().to_string();
        if title.is_empty() {
            return Err(Error::Status(
                Status::BadRequest,
                "Election title must not be empty".to_string(),
            ));
        }
        let options = option_labels
            .into_iter()
            .map(|label| Ok(ElectionOption::new(checked_label(label)?)))
            .collect::<Result<Vec<_>>>()?;

        let election = Election::new(title, description.trim().to_string(), options);
        self.engine.elections.insert_one(&election, None).await?;
        info!(
            "Created election {} '{}' with {} options",
            election.id,
            election.title,
            election.options.len()
        );
        Ok(election)
    }

    /// Append an option to an existing election.
    pub async fn add_option(&self, election_id: Id, label: String) -> Result<ElectionOption> {
        let option = ElectionOption::new(checked_label(label)?);
        let option_bson = to_bson(&option).map_err(|e| {
            Error::Status(
                Status::InternalServerError,
                format!("Failed to serialize option: {e}"),
            )
        })?;
        let result = self
            .engine
            .elections
            .update_one(
                election_id.as_doc(),
                doc! { "$push": { "options": option_bson } },
                None,
            )
            .await?;
        if result.matched_count == 0 {
            return Err(Error::not_found(format!("Election {election_id}")));
        }
        info!(
            "Added option {} '{}' to election {election_id}",
            option.id, option.label
        );
        Ok(option)
    }

    pub async fn get(&self, election_id: Id) -> Result<Election> {
        self.engine
            .elections
            .find_one(election_id.as_doc(), None)
            .await?
            .ok_or_else(|| Error::not_found(format!("Election {election_id}")))
    }

    /// All elections, newest first.
    pub async fn list_newest_first(&self) -> Result<Vec<Election>> {
        self.list(-1).await
    }

    /// All elections, oldest first.
    pub async fn list_oldest_first(&self) -> Result<Vec<Election>> {
        self.list(1).await
    }

    async fn list(&self, direction: i32) -> Result<Vec<Election>> {
        let options = FindOptions::builder()
            .sort(doc! { "created_at": direction, "_id": direction })
            .build();
        let elections = self
            .engine
            .elections
            .find(None, options)
            .await?
            .try_collect()
            .await?;
        Ok(elections)
    }

    /// Delete an election, its options, and every vote cast in it.
    ///
    /// Voters whose vote is removed have it taken off their cast count, so a
    /// voter left with no votes may delegate again.
    pub async fn delete(&self, election_id: Id) -> Result<u64> {
        let votes_removed = transaction::run(&self.engine.client, |mut session| async move {
            let result = self.delete_with_session(election_id, &mut session).await;
            (session, result)
        })
        .await?;
        info!("Deleted election {election_id} and {votes_removed} votes");
        Ok(votes_removed)
    }

    async fn delete_with_session(
        &self,
        election_id: Id,
        session: &mut ClientSession,
    ) -> Result<u64> {
        let deleted = self
            .engine
            .elections
            .delete_one_with_session(election_id.as_doc(), None, session)
            .await?;
        if deleted.deleted_count == 0 {
            return Err(Error::not_found(format!("Election {election_id}")));
        }

        let mut voters = Vec::new();
        let mut votes = self
            .engine
            .votes
            .find_with_session(doc! { "election_id": election_id }, None, session)
            .await?;
        while let Some(vote) = votes.next(session).await {
            voters.push(vote?.voter_id);
        }
        if voters.is_empty() {
            return Ok(0);
        }

        // One vote per voter per election, so each voter loses exactly one.
        self.engine
            .voters
            .update_many_with_session(
                doc! { "_id": { "$in": voters.clone() } },
                doc! { "$inc": { "votes_cast": -1 } },
                None,
                session,
            )
            .await?;
        let removed = self
            .engine
            .votes
            .delete_many_with_session(doc! { "election_id": election_id }, None, session)
            .await?
            .deleted_count;
        Ok(removed)
    }
}

fn checked_label(label: String) -> Result<String> {
    let label = label.trim().to_string();
    if label.is_empty() {
        return Err(Error::Status(
            Status::BadRequest,
            "Option label must not be empty".to_string(),
        ));
    }
    Ok(label)
}
