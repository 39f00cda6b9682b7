use log::{debug, error};
use std::fmt::Display;

use mongodb::error::Error as DbError;
use rocket::{
    http::Status,
    response::{self, status::Custom, Responder},
    serde::json::{Error as JsonError, Json},
    Request,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::common::{CandidateId, Identity, VoterId};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Db(#[from] DbError),
    #[error(transparent)]
    BsonDe(#[from] mongodb::bson::de::Error),
    #[error("Bad request: {0}")]
    BadRequest(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error(transparent)]
    Conflict(#[from] Conflict),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<JsonError<'_>> for Error {
    fn from(err: JsonError<'_>) -> Self {
        match err {
            JsonError::Io(e) => Self::BadRequest(format!("Failed to read body: {e}")),
            JsonError::Parse(_, e) => Self::BadRequest(format!("Invalid JSON: {e}")),
        }
    }
}

impl Error {
    /// Convenience constructor for [`Error::NotFound`].
    pub fn not_found(what: impl Display) -> Self {
        Self::NotFound(what.to_string())
    }

    /// The HTTP status category of this error.
    pub fn status(&self) -> Status {
        match self {
            Self::BadRequest(_) => Status::BadRequest,
            Self::NotFound(_) => Status::NotFound,
            Self::Conflict(_) => Status::Conflict,
            Self::Db(_) | Self::BsonDe(_) | Self::Internal(_) => Status::InternalServerError,
        }
    }
}

/// A request that is well-formed but clashes with the current state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Conflict {
    #[error("Identity '{0}' is already registered")]
    DuplicateIdentity(Identity),
    #[error("Voter {voter_id} shares identity '{identity}' with candidate {candidate_id}")]
    IdentityConflict {
        voter_id: VoterId,
        candidate_id: CandidateId,
        identity: Identity,
    },
    #[error("Voter {0} has already voted")]
    AlreadyVoted(VoterId),
    #[error("Voter {0} has already voted and cannot be deleted")]
    HasVoted(VoterId),
    #[error("Candidate {0} has received votes and cannot be deleted")]
    CandidateHasVotes(CandidateId),
}

/// JSON body attached to every error response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

impl ErrorBody {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}

impl<'r, 'o: 'r> Responder<'r, 'o> for Error {
    fn respond_to(self, req: &'r Request<'_>) -> response::Result<'o> {
        let status = self.status();
        // Storage details stay in the log.
        let message = if status == Status::InternalServerError {
            error!("{self}");
            "Internal server error".to_string()
        } else {
            debug!("Rejected request: {self}");
            self.to_string()
        };
        Custom(status, Json(ErrorBody::new(message))).respond_to(req)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_categories() {
        assert_eq!(
            Error::BadRequest("x".to_string()).status(),
            Status::BadRequest
        );
        assert_eq!(Error::not_found("Voter 1").status(), Status::NotFound);
        assert_eq!(
            Error::from(Conflict::AlreadyVoted(1)).status(),
            Status::Conflict
        );
        assert_eq!(
            Error::Internal("boom".to_string()).status(),
            Status::InternalServerError
        );
    }

    #[test]
    fn conflict_messages() {
        let identity = Identity::parse("alice@x.com").unwrap();
        assert_eq!(
            Error::from(Conflict::DuplicateIdentity(identity)).to_string(),
            "Identity 'alice@x.com' is already registered"
        );
        assert_eq!(
            Error::not_found("Voter 9").to_string(),
            "Not found: Voter 9"
        );
    }
}
