//! Document-store seam. The analytics core only needs read-all, merge-upsert, delete and
//! batched writes; [`InMemoryStore`] implements them for embedding and tests.

use crate::config::DEFAULT_IMPORT_BATCH_SIZE;
use crate::error::{AnalyticsError, Result};
use log::warn;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

pub const RECORDS_COLLECTION: &str = "records";
pub const USERS_COLLECTION: &str = "users";
pub const TARGETS_COLLECTION: &str = "targets";
pub const FINANCE_SNAPSHOTS_COLLECTION: &str = "financeSnapshots";
pub const FINANCE_INPUTS_COLLECTION: &str = "financeInputs";

pub type Document = serde_json::Map<String, Value>;

#[derive(Debug, Clone, PartialEq)]
pub enum WriteOp {
    /// Shallow merge: top-level fields of `doc` replace the stored ones, others survive.
    Upsert {
        collection: String,
        id: String,
        doc: Document,
    },
    Delete {
        collection: String,
        id: String,
    },
}

impl WriteOp {
    pub fn upsert(collection: &str, id: impl Into<String>, doc: Document) -> Self {
        WriteOp::Upsert {
            collection: collection.to_string(),
            id: id.into(),
            doc,
        }
    }

    pub fn delete(collection: &str, id: impl Into<String>) -> Self {
        WriteOp::Delete {
            collection: collection.to_string(),
            id: id.into(),
        }
    }
}

pub trait DocumentStore {
    fn get(&self, collection: &str, id: &str) -> Result<Option<Document>>;

    /// Every document of the collection as `(id, document)` pairs.
    fn list(&self, collection: &str) -> Result<Vec<(String, Document)>>;

    fn upsert_merge(&mut self, collection: &str, id: &str, doc: Document) -> Result<()>;

    fn delete(&mut self, collection: &str, id: &str) -> Result<()>;

    /// Applies all operations or none of them. Batches above [`Self::max_batch_size`] are
    /// rejected before anything is written.
    fn commit_batch(&mut self, ops: Vec<WriteOp>) -> Result<()>;

    fn max_batch_size(&self) -> usize {
        DEFAULT_IMPORT_BATCH_SIZE
    }

    fn find_by_field(
        &self,
        collection: &str,
        field: &str,
        value: &Value,
    ) -> Result<Vec<(String, Document)>> {
        Ok(self
            .list(collection)?
            .into_iter()
            .filter(|(_, doc)| doc.get(field) == Some(value))
            .collect())
    }
}

#[derive(Debug, Clone)]
pub struct InMemoryStore {
    collections: BTreeMap<String, BTreeMap<String, Document>>,
    max_batch_size: usize,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::with_max_batch_size(DEFAULT_IMPORT_BATCH_SIZE)
    }

    pub fn with_max_batch_size(max_batch_size: usize) -> Self {
        Self {
            collections: BTreeMap::new(),
            max_batch_size,
        }
    }

    pub fn count(&self, collection: &str) -> usize {
        self.collections.get(collection).map_or(0, |c| c.len())
    }

    fn apply(&mut self, op: WriteOp) {
        match op {
            WriteOp::Upsert {
                collection,
                id,
                doc,
            } => {
                let stored = self
                    .collections
                    .entry(collection)
                    .or_default()
                    .entry(id)
                    .or_default();
                for (key, value) in doc {
                    stored.insert(key, value);
                }
            }
            WriteOp::Delete { collection, id } => {
                if let Some(docs) = self.collections.get_mut(&collection) {
                    docs.remove(&id);
                }
            }
        }
    }
}

impl DocumentStore for InMemoryStore {
    fn get(&self, collection: &str, id: &str) -> Result<Option<Document>> {
        Ok(self
            .collections
            .get(collection)
            .and_then(|docs| docs.get(id))
            .cloned())
    }

    fn list(&self, collection: &str) -> Result<Vec<(String, Document)>> {
        Ok(self
            .collections
            .get(collection)
            .map(|docs| {
                docs.iter()
                    .map(|(id, doc)| (id.clone(), doc.clone()))
                    .collect()
            })
            .unwrap_or_default())
    }

    fn upsert_merge(&mut self, collection: &str, id: &str, doc: Document) -> Result<()> {
        self.apply(WriteOp::upsert(collection, id, doc));
        Ok(())
    }

    fn delete(&mut self, collection: &str, id: &str) -> Result<()> {
        self.apply(WriteOp::delete(collection, id));
        Ok(())
    }

    fn commit_batch(&mut self, ops: Vec<WriteOp>) -> Result<()> {
        if ops.len() > self.max_batch_size {
            return Err(AnalyticsError::BatchTooLarge {
                size: ops.len(),
                limit: self.max_batch_size,
            });
        }
        for op in ops {
            self.apply(op);
        }
        Ok(())
    }

    fn max_batch_size(&self) -> usize {
        self.max_batch_size
    }
}

/// Serializes `value` into a top-level JSON object.
pub fn to_document<T: Serialize>(value: &T) -> Result<Document> {
    match serde_json::to_value(value)? {
        Value::Object(map) => Ok(map),
        other => Err(AnalyticsError::Store(format!(
            "expected a JSON object, got {}",
            other
        ))),
    }
}

pub fn from_document<T: DeserializeOwned>(collection: &str, id: &str, doc: Document) -> Result<T> {
    serde_json::from_value(Value::Object(doc)).map_err(|e| AnalyticsError::MalformedDocument {
        collection: collection.to_string(),
        id: id.to_string(),
        details: e.to_string(),
    })
}

pub fn put_typed<S, T>(store: &mut S, collection: &str, id: &str, value: &T) -> Result<()>
where
    S: DocumentStore + ?Sized,
    T: Serialize,
{
    store.upsert_merge(collection, id, to_document(value)?)
}

pub fn get_typed<S, T>(store: &S, collection: &str, id: &str) -> Result<Option<T>>
where
    S: DocumentStore + ?Sized,
    T: DeserializeOwned,
{
    store
        .get(collection, id)?
        .map(|doc| from_document(collection, id, doc))
        .transpose()
}

/// Typed listing; documents that do not deserialize are skipped with a warning.
pub fn list_typed<S, T>(store: &S, collection: &str) -> Result<Vec<(String, T)>>
where
    S: DocumentStore + ?Sized,
    T: DeserializeOwned,
{
    let mut out = Vec::new();
    for (id, doc) in store.list(collection)? {
        match from_document(collection, &id, doc) {
            Ok(value) => out.push((id, value)),
            Err(e) => warn!("Skipping document: {}", e),
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        match value {
            Value::Object(map) => map,
            _ => panic!("not an object"),
        }
    }

    #[test]
    fn test_upsert_is_shallow_merge() {
        let mut store = InMemoryStore::new();
        store
            .upsert_merge("targets", "2026", doc(json!({"year": 2026, "yearly": {"a": 1}})))
            .unwrap();
        store
            .upsert_merge("targets", "2026", doc(json!({"yearly": {"b": 2}, "updatedAt": "x"})))
            .unwrap();

        let stored = store.get("targets", "2026").unwrap().unwrap();
        assert_eq!(stored["year"], json!(2026));
        assert_eq!(stored["yearly"], json!({"b": 2}));
        assert_eq!(stored["updatedAt"], json!("x"));
        assert_eq!(store.count("targets"), 1);
    }

    #[test]
    fn test_batch_limit_rejects_without_writing() {
        let mut store = InMemoryStore::with_max_batch_size(2);
        let ops = (0..3)
            .map(|i| WriteOp::upsert("records", i.to_string(), doc(json!({"i": i}))))
            .collect();
        let err = store.commit_batch(ops).unwrap_err();
        assert!(matches!(err, AnalyticsError::BatchTooLarge { size: 3, limit: 2 }));
        assert_eq!(store.count("records"), 0);
    }

    #[test]
    fn test_delete_and_find() {
        let mut store = InMemoryStore::new();
        store
            .commit_batch(vec![
                WriteOp::upsert("s", "a", doc(json!({"year": 2025}))),
                WriteOp::upsert("s", "b", doc(json!({"year": 2026}))),
                WriteOp::upsert("s", "c", doc(json!({"year": 2026}))),
                WriteOp::delete("s", "c"),
            ])
            .unwrap();
        let found = store.find_by_field("s", "year", &json!(2026)).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].0, "b");
        store.delete("s", "missing").unwrap();
    }

    #[test]
    fn test_typed_helpers() {
        #[derive(Debug, PartialEq, Serialize, serde::Deserialize)]
        struct Item {
            name: String,
        }

        let mut store = InMemoryStore::new();
        put_typed(&mut store, "items", "1", &Item { name: "a".into() }).unwrap();
        store
            .upsert_merge("items", "2", doc(json!({"other": true})))
            .unwrap();

        let item: Option<Item> = get_typed(&store, "items", "1").unwrap();
        assert_eq!(item.unwrap().name, "a");
        assert!(get_typed::<_, Item>(&store, "items", "2").is_err());
        assert!(get_typed::<_, Item>(&store, "items", "3").unwrap().is_none());

        let listed: Vec<(String, Item)> = list_typed(&store, "items").unwrap();
        assert_eq!(listed.len(), 1);
    }
}
