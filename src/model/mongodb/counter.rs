use mongodb::{
    bson::doc,
    options::{FindOneAndUpdateOptions, ReturnDocument, UpdateOptions},
};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::mongodb::Coll;

pub const VOTER_ID_COUNTER: &str = "voter_id";
pub const CANDIDATE_ID_COUNTER: &str = "candidate_id";
pub const VOTE_ID_COUNTER: &str = "vote_id";

/// A counter object used to implement auto-increment fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Counter {
    #[serde(rename = "_id")]
    pub id: String,
    pub next: u32,
}

impl Counter {
    /// Create a new `Counter` starting at the given value.
    pub fn new(id: impl Into<String>, start: u32) -> Self {
        Self {
            id: id.into(),
            next: start,
        }
    }

    /// Atomically retrieve the next value of the counter with the given ID.
    ///
    /// This runs outside of any transaction: an ID taken by a transaction
    /// that later aborts is simply never used.
    pub async fn next(counters: &Coll<Counter>, id: &str) -> Result<u32> {
        let update = doc! {
            "$inc": { "next": 1 }
        };
        let options: FindOneAndUpdateOptions = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::Before)
            .build();
        let counter = counters
            .find_one_and_update(doc! { "_id": id }, update, options)
            .await?
            .ok_or_else(|| Error::Internal(format!("Failed to find counter with ID {id}")))?;
        Ok(counter.next)
    }
}

/// Ensure the ID counters exist, starting them at 1 if not.
///
/// This operation is idempotent.
pub async fn ensure_counters_exist(counters: &Coll<Counter>) -> Result<()> {
    let options = UpdateOptions::builder().upsert(true).build();
    for id in [VOTER_ID_COUNTER, CANDIDATE_ID_COUNTER, VOTE_ID_COUNTER] {
        let update = doc! {
            "$setOnInsert": { "next": 1 }
        };
        counters
            .update_one(doc! { "_id": id }, update, options.clone())
            .await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use mongodb::Database;

    #[backend_test(mongodb)]
    async fn counter_increment(db: Database) {
        const START: u32 = 5;

        // Create a counter and insert it.
        let counters = Coll::<Counter>::from_db(&db);
        counters
            .insert_one(Counter::new("test", START), None)
            .await
            .unwrap();

        // Get the next value.
        let next = Counter::next(&counters, "test").await.unwrap();
        assert_eq!(next, START);

        // Check the counter was incremented.
        let counter = counters
            .find_one(doc! { "_id": "test" }, None)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(counter.next, START + 1);
    }

    #[backend_test(mongodb)]
    async fn ensure_counters_is_idempotent(db: Database) {
        let counters = Coll::<Counter>::from_db(&db);
        ensure_counters_exist(&counters).await.unwrap();
        assert_eq!(Counter::next(&counters, VOTER_ID_COUNTER).await.unwrap(), 1);

        // Must not reset an existing counter.
        ensure_counters_exist(&counters).await.unwrap();
        assert_eq!(Counter::next(&counters, VOTER_ID_COUNTER).await.unwrap(), 2);
    }
}
