use rocket::{serde::json::Json, Route};

use crate::engine::{Engine, Stats};
use crate::error::Result;
use crate::model::{
    api::{
        admin::AdminCapability,
        delegation::{DelegationDescription, DelegationSpec},
        election::{
            ElectionDescription, ElectionResults, ElectionSpec, OptionDescription, OptionSpec,
        },
        voter::{VoterDeletionReport, VoterDescription, VoterSpec},
    },
    mongodb::Id,
};

pub fn routes() -> Vec<Route> {
    routes![
        register_voter,
        get_voters,
        delete_voter,
        suspend_voter,
        reinstate_voter,
        create_election,
        add_option,
        delete_election,
        get_delegations,
        create_delegation,
        revoke_delegation,
        election_tally,
        all_results,
        stats,
    ]
}

#[post("/voters", data = "<spec>", format = "json")]
async fn register_voter(
    _admin: AdminCapability,
    spec: Json<VoterSpec>,
    engine: Engine,
) -> Result<Json<VoterDescription>> {
    let spec = spec.into_inner();
    let voter = engine
        .registry()
        .register(spec.name, spec.external_id)
        .await?;
    Ok(Json(voter.into()))
}

#[get("/voters")]
async fn get_voters(_admin: AdminCapability, engine: Engine) -> Result<Json<Vec<VoterDescription>>> {
    let voters = engine.registry().list().await?;
    Ok(Json(voters.into_iter().map(VoterDescription::from).collect()))
}

#[delete("/voters/<voter_id>")]
async fn delete_voter(
    _admin: AdminCapability,
    voter_id: Id,
    engine: Engine,
) -> Result<Json<VoterDeletionReport>> {
    let deletion = engine.registry().delete(voter_id).await?;
    Ok(Json(deletion.into()))
}

#[post("/voters/<voter_id>/suspend")]
async fn suspend_voter(
    _admin: AdminCapability,
    voter_id: Id,
    engine: Engine,
) -> Result<Json<VoterDescription>> {
    let voter = engine.registry().suspend(voter_id).await?;
    Ok(Json(voter.into()))
}

#[post("/voters/<voter_id>/reinstate")]
async fn reinstate_voter(
    _admin: AdminCapability,
    voter_id: Id,
    engine: Engine,
) -> Result<Json<VoterDescription>> {
    let voter = engine.registry().reinstate(voter_id).await?;
    Ok(Json(voter.into()))
}

#[post("/elections", data = "<spec>", format = "json")]
async fn create_election(
    _admin: AdminCapability,
    spec: Json<ElectionSpec>,
    engine: Engine,
) -> Result<Json<ElectionDescription>> {
    let spec = spec.into_inner();
    let election = engine
        .elections()
        .create(spec.title, spec.description, spec.options)
        .await?;
    Ok(Json(election.into()))
}

#[post("/elections/<election_id>/options", data = "<spec>", format = "json")]
async fn add_option(
    _admin: AdminCapability,
    election_id: Id,
    spec: Json<OptionSpec>,
    engine: Engine,
) -> Result<Json<OptionDescription>> {
    let option = engine
        .elections()
        .add_option(election_id, spec.into_inner().label)
        .await?;
    Ok(Json(option.into()))
}

#[delete("/elections/<election_id>")]
async fn delete_election(_admin: AdminCapability, election_id: Id, engine: Engine) -> Result<()> {
    engine.elections().delete(election_id).await?;
    Ok(())
}

#[get("/delegations")]
async fn get_delegations(
    _admin: AdminCapability,
    engine: Engine,
) -> Result<Json<Vec<DelegationDescription>>> {
    let delegations = engine.ledger().list().await?;
    Ok(Json(
        delegations
            .into_iter()
            .map(DelegationDescription::from)
            .collect(),
    ))
}

#[post("/delegations", data = "<spec>", format = "json")]
async fn create_delegation(
    _admin: AdminCapability,
    spec: Json<DelegationSpec>,
    engine: Engine,
) -> Result<Json<DelegationDescription>> {
    let delegation = engine
        .ledger()
        .delegate(spec.from.into(), spec.to.into())
        .await?;
    Ok(Json(delegation.into()))
}

#[delete("/delegations/<delegation_id>")]
async fn revoke_delegation(
    _admin: AdminCapability,
    delegation_id: Id,
    engine: Engine,
) -> Result<Json<DelegationDescription>> {
    let delegation = engine.ledger().revoke(delegation_id).await?;
    Ok(Json(delegation.into()))
}

#[get("/elections/<election_id>/tally")]
async fn election_tally(
    _admin: AdminCapability,
    election_id: Id,
    engine: Engine,
) -> Result<Json<ElectionResults>> {
    let tally = engine.tallies().tally(election_id).await?;
    Ok(Json(tally.into()))
}

#[get("/results")]
async fn all_results(
    _admin: AdminCapability,
    engine: Engine,
) -> Result<Json<Vec<ElectionResults>>> {
    let results = engine.tallies().results().await?;
    Ok(Json(results.into_iter().map(ElectionResults::from).collect()))
}

#[get("/stats")]
async fn stats(_admin: AdminCapability, engine: Engine) -> Result<Json<Stats>> {
    Ok(Json(engine.stats().await?))
}
