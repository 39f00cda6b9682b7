use serde::{Deserialize, Serialize};

use crate::model::common::{Identity, IdentityOwner};

/// A claim on an identity value. The value itself is the document ID, so the
/// database refuses a second claim on it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityClaim {
    #[serde(rename = "_id")]
    pub identity: Identity,
    pub owner: IdentityOwner,
}

impl IdentityClaim {
    pub fn new(identity: Identity, owner: IdentityOwner) -> Self {
        Self { identity, owner }
    }
}
