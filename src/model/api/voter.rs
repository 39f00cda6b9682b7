use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::model::{
    common::{Identity, VoterId},
    db::{NewVoter, Voter},
};

/// A voter registration request.
///
/// Fields are optional so that missing ones are reported as a bad request
/// rather than a parse failure.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoterSpec {
    pub name: Option<String>,
    pub email: Option<String>,
}

impl TryFrom<VoterSpec> for NewVoter {
    type Error = Error;

    fn try_from(spec: VoterSpec) -> Result<Self, Self::Error> {
        let name = spec
            .name
            .as_deref()
            .filter(|name| !name.trim().is_empty());
        let email = spec.email.as_deref().and_then(Identity::parse);
        match (name, email) {
            (Some(name), Some(email)) => Ok(NewVoter::new(name.to_string(), email)),
            _ => Err(Error::BadRequest("Name and email are required".to_string())),
        }
    }
}

/// An API-friendly voter description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoterDescription {
    pub id: VoterId,
    pub name: String,
    pub email: String,
    pub has_voted: bool,
    pub created_at: DateTime<Utc>,
}

impl From<Voter> for VoterDescription {
    fn from(voter: Voter) -> Self {
        Self {
            id: voter.id,
            name: voter.voter.name,
            email: voter.voter.email.as_str().to_string(),
            has_voted: voter.voter.has_voted,
            created_at: voter.voter.created_at,
        }
    }
}
