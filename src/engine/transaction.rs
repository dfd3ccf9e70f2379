//! Bounded-retry MongoDB transactions.
//!
//! Every multi-document mutation in the engine runs through [`run`]. A write
//! conflict between two transactions surfaces as a `TransientTransactionError`
//! on the loser, which is then retried from scratch against the new state.

use std::{future::Future, time::Duration};

use log::{debug, warn};
use mongodb::{Client, ClientSession};
use rand::Rng;
use rocket::tokio::time::sleep;

use crate::error::{Error, Result};

/// Maximum number of times a transaction body (or its commit) is attempted.
pub const MAX_TRANSACTION_ATTEMPTS: u32 = 5;

/// Delay before the first retry. Doubles with every further attempt.
const BACKOFF_BASE_MS: u64 = 10;

/// Run `body` inside a fresh transaction, committing if it succeeds and aborting
/// if it fails. Transient failures are retried up to [`MAX_TRANSACTION_ATTEMPTS`]
/// with a jittered exponential backoff, after which [`Error::Contention`] is
/// returned.
///
/// A commit whose outcome stays unknown is returned as the driver error, since
/// the transaction may in fact have committed.
///
/// The body takes ownership of the session and must hand it back alongside its
/// result, so that the borrow of the session does not escape the future.
pub async fn run<T, F, Fut>(client: &Client, mut body: F) -> Result<T>
where
    F: FnMut(ClientSession) -> Fut,
    Fut: Future<Output = (ClientSession, Result<T>)>,
{
    let mut attempt = 1;
    loop {
        let mut session = client.start_session(None).await?;
        session.start_transaction(None).await?;
        let (mut session, result) = body(session).await;
        match finish(&mut session, result).await {
            Err(e) if e.is_transient() && attempt < MAX_TRANSACTION_ATTEMPTS => {
                let delay = backoff(attempt);
                warn!(
                    "Transaction attempt {attempt} failed transiently, retrying in {}ms: {e}",
                    delay.as_millis()
                );
                sleep(delay).await;
                attempt += 1;
            }
            Err(e) if e.is_transient() => {
                warn!("Giving up on transaction after {attempt} attempts: {e}");
                return Err(Error::Contention);
            }
            other => return other,
        }
    }
}

/// How long to wait after the given failed attempt.
fn backoff(attempt: u32) -> Duration {
    let base = BACKOFF_BASE_MS << (attempt - 1);
    let jitter = rand::thread_rng().gen_range(0..=base);
    Duration::from_millis(base + jitter)
}

/// Commit if the body succeeded, otherwise abort and pass the error through.
async fn finish<T>(session: &mut ClientSession, result: Result<T>) -> Result<T> {
    match result {
        Ok(value) => {
            commit(session).await?;
            Ok(value)
        }
        Err(e) => {
            // The server may already have aborted the transaction, e.g. after a
            // duplicate key error, so failing to abort here is not interesting.
            if let Err(abort_err) = session.abort_transaction().await {
                debug!("Ignoring failed abort: {abort_err}");
            }
            Err(e)
        }
    }
}

/// Commit, retrying the commit alone if its outcome is unknown.
async fn commit(session: &mut ClientSession) -> Result<()> {
    let mut attempt = 1;
    loop {
        match session.commit_transaction().await.map_err(Error::from) {
            Err(e) if e.is_unknown_commit_result() && attempt < MAX_TRANSACTION_ATTEMPTS => {
                warn!("Commit outcome unknown on attempt {attempt}, retrying: {e}");
                attempt += 1;
            }
            other => return other,
        }
    }
}
