use std::fmt::{Display, Formatter};

use mongodb::bson::Bson;
use serde::{Deserialize, Serialize};

use crate::model::common::{CandidateId, VoterId};

/// A value in the identity namespace shared by voter emails and candidate names.
///
/// Registering a voter claims its email; registering a candidate claims its
/// name. A value can only be claimed once across both kinds, so nobody can be
/// on the ballot and in the electorate at the same time.
#[derive(Debug, Clone, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identity(String);

impl Identity {
    /// Parse an identity from user input, keeping it exactly as given.
    ///
    /// Returns `None` if the input is empty or only whitespace.
    pub fn parse(raw: &str) -> Option<Self> {
        if raw.trim().is_empty() {
            None
        } else {
            Some(Self(raw.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for Identity {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&Identity> for Bson {
    fn from(identity: &Identity) -> Self {
        Bson::String(identity.0.clone())
    }
}

/// The entity holding a claim on an [`Identity`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum IdentityOwner {
    Voter(VoterId),
    Candidate(CandidateId),
}

impl Display for IdentityOwner {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Voter(id) => write!(f, "voter {id}"),
            Self::Candidate(id) => write!(f, "candidate {id}"),
        }
    }
}
