mod bson;
mod collection;
mod counter;
mod errors;
mod store;

pub use bson::u32_id_filter;
pub use collection::{ensure_indexes_exist, Coll, MongoCollection};
pub use counter::{
    ensure_counters_exist, Counter, CANDIDATE_ID_COUNTER, VOTER_ID_COUNTER, VOTE_ID_COUNTER,
};
pub use errors::{is_duplicate_key_error, is_write_conflict, DUPLICATE_KEY, WRITE_CONFLICT};
pub use store::MongoStore;
