use std::ops::{Deref, DerefMut};

use chrono::{DateTime, Utc};
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use serde::{Deserialize, Serialize};

use crate::model::common::{Identity, VoterId};

/// Core voter data, as stored in the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoterCore {
    pub name: String,
    /// Unique across both voter emails and candidate names.
    pub email: Identity,
    /// Flips to true exactly once, in the same transaction that records the vote.
    pub has_voted: bool,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
}

impl VoterCore {
    /// Create a new voter who has not voted yet.
    pub fn new(name: String, email: Identity) -> Self {
        Self {
            name,
            email,
            has_voted: false,
            created_at: Utc::now(),
        }
    }
}

/// A voter without an ID.
pub type NewVoter = VoterCore;

/// A voter from the database, with its unique ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Voter {
    #[serde(rename = "_id")]
    pub id: VoterId,
    #[serde(flatten)]
    pub voter: VoterCore,
}

impl Voter {
    pub fn new(id: VoterId, voter: NewVoter) -> Self {
        Self { id, voter }
    }
}

impl Deref for Voter {
    type Target = VoterCore;

    fn deref(&self) -> &Self::Target {
        &self.voter
    }
}

impl DerefMut for Voter {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.voter
    }
}

/// Example data for tests.
#[cfg(test)]
mod examples {
    use super::*;

    impl VoterCore {
        pub fn example() -> Self {
            Self::new(
                "Alice".to_string(),
                Identity::parse("alice@x.com").unwrap(),
            )
        }

        pub fn example2() -> Self {
            Self::new(
                "Carol".to_string(),
                Identity::parse("carol@x.com").unwrap(),
            )
        }
    }
}
