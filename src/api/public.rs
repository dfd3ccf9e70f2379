use rocket::{serde::json::Json, Route};

use crate::engine::Engine;
use crate::error::Result;
use crate::model::{
    api::election::{ElectionDescription, ElectionSummary},
    mongodb::Id,
};

pub fn routes() -> Vec<Route> {
    routes![elections, election]
}

/// Every election, newest first.
#[get("/elections")]
async fn elections(engine: Engine) -> Result<Json<Vec<ElectionSummary>>> {
    let elections = engine.elections().list_newest_first().await?;
    Ok(Json(
        elections.into_iter().map(ElectionSummary::from).collect(),
    ))
}

#[get("/elections/<election_id>")]
async fn election(election_id: Id, engine: Engine) -> Result<Json<ElectionDescription>> {
    let election = engine.elections().get(election_id).await?;
    Ok(Json(election.into()))
}
