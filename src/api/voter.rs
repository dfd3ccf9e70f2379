use rocket::{serde::json::Json, Route};

use crate::engine::Engine;
use crate::error::{Error, Result};
use crate::model::{
    api::{
        election::ElectionSummary,
        vote::{VoteReceipt, VoteSpec},
        voter::{VoterDashboard, VoterDescription},
    },
    mongodb::Id,
};

pub fn routes() -> Vec<Route> {
    routes![lookup, dashboard, eligible_elections, cast_vote]
}

/// Resolve a voter from the identity they present, provided they may vote.
#[get("/lookup/<external_id>")]
async fn lookup(external_id: &str, engine: Engine) -> Result<Json<VoterDescription>> {
    let voter = engine.registry().lookup(external_id).await?;
    if !voter.active {
        return Err(Error::not_eligible(format!(
            "Voter {} has delegated their vote",
            voter.id
        )));
    }
    if voter.suspended {
        return Err(Error::not_eligible(format!("Voter {} is suspended", voter.id)));
    }
    Ok(Json(voter.into()))
}

#[get("/voters/<voter_id>/dashboard")]
async fn dashboard(voter_id: Id, engine: Engine) -> Result<Json<VoterDashboard>> {
    let voter = engine.registry().get(voter_id).await?;
    let weights = engine.weights();
    let delegations_received = weights.delegations_received(voter_id).await?;
    let weight = weights.effective_weight(voter_id).await?;
    let delegated_to = engine
        .ledger()
        .outgoing(voter_id)
        .await?
        .map(|d| d.to_voter_id.into());
    let pending_elections = engine
        .ballot_box()
        .eligible_elections(voter_id)
        .await?
        .into_iter()
        .map(ElectionSummary::from)
        .collect();

    Ok(Json(VoterDashboard {
        voter: voter.into(),
        weight,
        delegations_received,
        delegated_to,
        pending_elections,
    }))
}

#[get("/voters/<voter_id>/elections")]
async fn eligible_elections(voter_id: Id, engine: Engine) -> Result<Json<Vec<ElectionSummary>>> {
    let elections = engine.ballot_box().eligible_elections(voter_id).await?;
    Ok(Json(
        elections.into_iter().map(ElectionSummary::from).collect(),
    ))
}

#[post("/voters/<voter_id>/votes", data = "<vote>", format = "json")]
async fn cast_vote(
    voter_id: Id,
    vote: Json<VoteSpec>,
    engine: Engine,
) -> Result<Json<VoteReceipt>> {
    let vote = engine
        .ballot_box()
        .cast_vote(voter_id, vote.election.into(), vote.option.into())
        .await?;
    Ok(Json(vote.into()))
}

#[cfg(test)]
mod tests {
    use rocket::{
        http::{ContentType, Status},
        local::asynchronous::Client,
        serde::json::json,
    };

    use super::*;
    use crate::api::test_helpers::json;
    use crate::engine::examples::{self, register};
    use crate::model::{
        api::id::ApiId,
        db::{election::Election, vote::Vote, voter::VoterCore},
        mongodb::Coll,
    };

    async fn vote(client: &Client, voter: Id, election: &Election, option: usize) -> Status {
        client
            .post(uri!(cast_vote(voter)))
            .header(ContentType::JSON)
            .body(
                json!({
                    "election": ApiId::from(election.id),
                    "option": ApiId::from(election.options[option].id),
                })
                .to_string(),
            )
            .dispatch()
            .await
            .status()
    }

    #[backend_test]
    async fn lookup_checks_eligibility(client: Client, engine: Engine) {
        let example = VoterCore::example1();
        let ana = register(&engine, example.clone()).await;
        let bruno = register(&engine, VoterCore::example2()).await;

        let response = client
            .get(uri!(lookup(example.external_id.as_str())))
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());
        let found: VoterDescription = json(response).await;
        assert_eq!(*found.id, ana.id);

        engine.ledger().delegate(ana.id, bruno.id).await.unwrap();
        let response = client
            .get(uri!(lookup(example.external_id.as_str())))
            .dispatch()
            .await;
        assert_eq!(Status::UnprocessableEntity, response.status());

        let response = client.get(uri!(lookup("0-0000-0000"))).dispatch().await;
        assert_eq!(Status::NotFound, response.status());
    }

    #[backend_test]
    async fn dashboard_summarises_voter(client: Client, engine: Engine) {
        let ana = register(&engine, VoterCore::example1()).await;
        let bruno = register(&engine, VoterCore::example2()).await;
        let carla = register(&engine, VoterCore::example3()).await;
        let first = examples::election(&engine).await;
        let second = examples::election(&engine).await;

        engine.ledger().delegate(ana.id, bruno.id).await.unwrap();
        engine.ledger().delegate(carla.id, bruno.id).await.unwrap();
        engine
            .ballot_box()
            .cast_vote(bruno.id, first.id, first.options[0].id)
            .await
            .unwrap();

        let response = client.get(uri!(dashboard(bruno.id))).dispatch().await;
        assert_eq!(Status::Ok, response.status());
        let summary: VoterDashboard = json(response).await;
        assert_eq!(*summary.voter.id, bruno.id);
        assert_eq!(summary.weight, 3);
        assert_eq!(summary.delegations_received, 2);
        assert_eq!(summary.delegated_to, None);
        let pending = summary
            .pending_elections
            .iter()
            .map(|e| *e.id)
            .collect::<Vec<_>>();
        assert_eq!(pending, vec![second.id]);

        let response = client.get(uri!(dashboard(ana.id))).dispatch().await;
        let summary: VoterDashboard = json(response).await;
        assert_eq!(summary.weight, 1);
        assert_eq!(summary.delegated_to, Some(bruno.id.into()));
        assert!(!summary.voter.can_vote);

        let response = client.get(uri!(dashboard(Id::new()))).dispatch().await;
        assert_eq!(Status::NotFound, response.status());
    }

    #[backend_test]
    async fn voting_flow(client: Client, engine: Engine, votes: Coll<Vote>) {
        let ana = register(&engine, VoterCore::example1()).await;
        let bruno = register(&engine, VoterCore::example2()).await;
        let election = examples::election(&engine).await;
        engine.ledger().delegate(ana.id, bruno.id).await.unwrap();

        let response = client
            .get(uri!(eligible_elections(bruno.id)))
            .dispatch()
            .await;
        let eligible: Vec<ElectionSummary> = json(response).await;
        assert_eq!(eligible.len(), 1);

        let response = client
            .post(uri!(cast_vote(bruno.id)))
            .header(ContentType::JSON)
            .body(
                json!({
                    "election": ApiId::from(election.id),
                    "option": ApiId::from(election.options[2].id),
                })
                .to_string(),
            )
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());
        let receipt: VoteReceipt = json(response).await;
        assert_eq!(receipt.weight, 2);
        assert_eq!(*receipt.option, election.options[2].id);

        // A second vote in the same election conflicts.
        assert_eq!(Status::Conflict, vote(&client, bruno.id, &election, 0).await);
        // The delegator cannot vote personally.
        assert_eq!(
            Status::UnprocessableEntity,
            vote(&client, ana.id, &election, 0).await
        );
        assert_eq!(votes.count_documents(None, None).await.unwrap(), 1);

        let response = client
            .get(uri!(eligible_elections(bruno.id)))
            .dispatch()
            .await;
        let eligible: Vec<ElectionSummary> = json(response).await;
        assert!(eligible.is_empty());
    }

    #[backend_test]
    async fn foreign_options_are_rejected(client: Client, engine: Engine) {
        let ana = register(&engine, VoterCore::example1()).await;
        let election = examples::election(&engine).await;
        let other = examples::election(&engine).await;

        let response = client
            .post(uri!(cast_vote(ana.id)))
            .header(ContentType::JSON)
            .body(
                json!({
                    "election": ApiId::from(election.id),
                    "option": ApiId::from(other.options[0].id),
                })
                .to_string(),
            )
            .dispatch()
            .await;
        assert_eq!(Status::UnprocessableEntity, response.status());
        assert_eq!(Status::NotFound, vote(&client, Id::new(), &election, 0).await);
    }
}
