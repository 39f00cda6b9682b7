use mongodb::bson::{doc, Document};

/// Filter matching the document with the given integer `_id`.
pub fn u32_id_filter(id: u32) -> Document {
    doc! {
        "_id": id,
    }
}
