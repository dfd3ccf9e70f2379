use std::ops::Deref;

use log::debug;
use mongodb::{
    bson::doc, error::Error as DbError, options::IndexOptions, Collection, Database, IndexModel,
};

use crate::model::db::{delegation::Delegation, election::Election, vote::Vote, voter::Voter};

/// A type that can be directly inserted/read to/from the database.
pub trait MongoCollection {
    /// The name of the collection.
    const NAME: &'static str;
}

/// A database collection of the given type.
pub struct Coll<T>(Collection<T>);

impl<T> Coll<T>
where
    T: MongoCollection,
{
    /// Get a handle on this collection in the given database.
    pub fn from_db(db: &Database) -> Self {
        Self(db.collection(T::NAME))
    }
}

// `Derive(Clone)` would only derive if `T: Clone`, but we don't need that bound.
impl<T> Clone for Coll<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<T> Deref for Coll<T> {
    type Target = Collection<T>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl MongoCollection for Voter {
    const NAME: &'static str = "voters";
}

impl MongoCollection for Election {
    const NAME: &'static str = "elections";
}

impl MongoCollection for Delegation {
    const NAME: &'static str = "delegations";
}

impl MongoCollection for Vote {
    const NAME: &'static str = "votes";
}

/// Ensure that all the required indexes exist on the given database.
///
/// The unique indexes are what make registration, delegation and vote casting
/// race-free: a concurrent duplicate insert fails at the storage layer.
///
/// This operation is idempotent.
pub async fn ensure_indexes_exist(db: &Database) -> Result<(), DbError> {
    debug!("Ensuring collection indexes exist");

    let unique = IndexOptions::builder().unique(true).build();

    // Voter collection: one voter per external ID.
    let voter_index = IndexModel::builder()
        .keys(doc! {"external_id": 1})
        .options(unique.clone())
        .build();
    Coll::<Voter>::from_db(db)
        .create_index(voter_index, None)
        .await?;

    // Delegation collection: at most one outgoing delegation per voter,
    // plus a lookup index for weight calculation.
    let from_index = IndexModel::builder()
        .keys(doc! {"from_voter_id": 1})
        .options(unique.clone())
        .build();
    let to_index = IndexModel::builder()
        .keys(doc! {"to_voter_id": 1})
        .build();
    Coll::<Delegation>::from_db(db)
        .create_indexes([from_index, to_index], None)
        .await?;

    // Vote collection: one vote per voter per election, plus a lookup index for tallying.
    let vote_index = IndexModel::builder()
        .keys(doc! {"voter_id": 1, "election_id": 1})
        .options(unique)
        .build();
    let tally_index = IndexModel::builder()
        .keys(doc! {"election_id": 1, "option_id": 1})
        .build();
    Coll::<Vote>::from_db(db)
        .create_indexes([vote_index, tally_index], None)
        .await?;

    Ok(())
}
