use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::model::{
    common::{CandidateId, Identity},
    db::{NewCandidate, TalliedCandidate},
};

/// A candidate registration request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateSpec {
    pub name: Option<String>,
    pub party: Option<String>,
}

impl TryFrom<CandidateSpec> for NewCandidate {
    type Error = Error;

    fn try_from(spec: CandidateSpec) -> Result<Self, Self::Error> {
        let name = spec
            .name
            .as_deref()
            .and_then(Identity::parse)
            .ok_or_else(|| Error::BadRequest("Name is required".to_string()))?;
        let party = spec
            .party
            .filter(|party| !party.trim().is_empty());
        Ok(NewCandidate::new(name, party))
    }
}

/// An API-friendly candidate description, including the current tally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateDescription {
    pub id: CandidateId,
    pub name: String,
    pub party: Option<String>,
    pub votes: u32,
    pub created_at: DateTime<Utc>,
}

impl From<TalliedCandidate> for CandidateDescription {
    fn from(tallied: TalliedCandidate) -> Self {
        let candidate = tallied.candidate.candidate;
        Self {
            id: tallied.candidate.id,
            name: candidate.name.as_str().to_string(),
            party: candidate.party,
            votes: tallied.votes,
            created_at: candidate.created_at,
        }
    }
}

/// Example data for tests.
#[cfg(test)]
mod examples {
    use super::*;

    impl CandidateSpec {
        pub fn example() -> Self {
            Self {
                name: Some("Bob".to_string()),
                party: Some("PartyX".to_string()),
            }
        }

        pub fn example2() -> Self {
            Self {
                name: Some("Dave".to_string()),
                party: None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spec_requires_name() {
        assert!(matches!(
            NewCandidate::try_from(CandidateSpec::default()),
            Err(Error::BadRequest(_))
        ));
    }

    #[test]
    fn blank_party_is_none() {
        let spec = CandidateSpec {
            party: Some(" ".to_string()),
            ..CandidateSpec::example()
        };
        let candidate = NewCandidate::try_from(spec).unwrap();
        assert_eq!(candidate.name.as_str(), "Bob");
        assert_eq!(candidate.party, None);
    }
}
