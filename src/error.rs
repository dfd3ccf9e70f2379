use log::{error, warn};
use mongodb::error::{
    Error as DbError, TRANSIENT_TRANSACTION_ERROR, UNKNOWN_TRANSACTION_COMMIT_RESULT,
};
use rocket::{
    http::{Status, StatusClass},
    response::Responder,
};
use thiserror::Error;

use crate::logging::RequestId;

pub type Result<T> = std::result::Result<T, Error>;

/// Everything that can go wrong in a core operation or a request handler.
///
/// All variants other than `Db` are caller-facing and recoverable.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("A voter with external ID '{0}' is already registered")]
    DuplicateVoter(String),
    #[error("The voter has already voted in this election")]
    DuplicateVote,
    #[error("The voter has already delegated their vote")]
    AlreadyDelegated,
    #[error("A voter cannot delegate to themselves")]
    SelfDelegation,
    #[error("Not eligible: {0}")]
    NotEligible(String),
    #[error("The option does not belong to the given election")]
    OptionMismatch,
    /// Concurrent changes kept conflicting with this operation until it gave up.
    #[error("The operation conflicted with concurrent changes, try again")]
    Contention,
    #[error("{1}")]
    Status(Status, String),
    #[error(transparent)]
    Db(#[from] DbError),
}

impl Error {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn not_eligible(why: impl Into<String>) -> Self {
        Self::NotEligible(why.into())
    }

    /// The HTTP status this error maps to.
    pub fn status(&self) -> Status {
        match self {
            Self::NotFound(_) => Status::NotFound,
            Self::DuplicateVoter(_) | Self::DuplicateVote | Self::AlreadyDelegated => {
                Status::Conflict
            }
            Self::SelfDelegation | Self::NotEligible(_) | Self::OptionMismatch => {
                Status::UnprocessableEntity
            }
            Self::Contention => Status::ServiceUnavailable,
            Self::Status(status, _) => *status,
            Self::Db(_) => Status::InternalServerError,
        }
    }

    /// Is this a transaction failure that can be retried from the start?
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Db(e) if e.contains_label(TRANSIENT_TRANSACTION_ERROR))
    }

    /// Did a commit fail in a way where it may be retried on its own?
    pub fn is_unknown_commit_result(&self) -> bool {
        matches!(self, Self::Db(e) if e.contains_label(UNKNOWN_TRANSACTION_COMMIT_RESULT))
    }
}

impl<'r, 'o: 'r> Responder<'r, 'o> for Error {
    fn respond_to(self, req: &'r rocket::Request<'_>) -> rocket::response::Result<'o> {
        let id = req.local_cache(RequestId::next);
        let status = self.status();
        match status.class() {
            StatusClass::ServerError => error!("req{id} failed: {self}"),
            _ => warn!("req{id} rejected: {self}"),
        }
        Err(status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_errors_map_to_client_statuses() {
        assert_eq!(Error::not_found("Voter").status(), Status::NotFound);
        assert_eq!(
            Error::DuplicateVoter("V-1".to_string()).status(),
            Status::Conflict
        );
        assert_eq!(Error::DuplicateVote.status(), Status::Conflict);
        assert_eq!(Error::AlreadyDelegated.status(), Status::Conflict);
        assert_eq!(Error::SelfDelegation.status(), Status::UnprocessableEntity);
        assert_eq!(
            Error::not_eligible("delegated").status(),
            Status::UnprocessableEntity
        );
        assert_eq!(Error::OptionMismatch.status(), Status::UnprocessableEntity);
        assert_eq!(Error::Contention.status(), Status::ServiceUnavailable);
        assert_eq!(
            Error::Status(Status::BadRequest, "empty".to_string()).status(),
            Status::BadRequest
        );
    }

    #[test]
    fn domain_errors_are_not_transient() {
        assert!(!Error::DuplicateVote.is_transient());
        assert!(!Error::Contention.is_transient());
        assert!(!Error::AlreadyDelegated.is_unknown_commit_result());
    }

    #[test]
    fn messages_name_the_problem() {
        assert_eq!(
            Error::DuplicateVoter("V-1".to_string()).to_string(),
            "A voter with external ID 'V-1' is already registered"
        );
        assert_eq!(
            Error::not_found("Election 42").to_string(),
            "Not found: Election 42"
        );
    }
}
