use std::collections::HashMap;

use crate::filter::IndexValue;

/// A domain type that can be persisted in a [`crate::Store`] collection.
///
/// `collection_name` is a free function (not tied to `&self`) so the store
/// can address a collection before any instance exists, e.g. on `list`.
pub trait Record: serde::Serialize + serde::de::DeserializeOwned + Clone {
    fn id(&self) -> &str;
    fn updated_at(&self) -> i64;
    fn collection_name() -> &'static str;

    /// Fields surfaced for `Store::list` filtering. Recomputed on every
    /// write rather than maintained incrementally.
    fn indexed_fields(&self) -> HashMap<String, IndexValue>;
}
