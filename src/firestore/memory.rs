use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use tokio::sync::RwLock;

use super::models::FieldOperator;
use super::query::{Predicate, Query, ScalarValue};
use super::store::{DocumentStore, Fields, RawRecord, StoreError};

type Collection = BTreeMap<String, Fields>;

/// In-process [`DocumentStore`] with Firestore-like filter semantics.
///
/// Useful for tests and local runs. A commit failure can be injected with
/// [`MemoryStore::fail_next_commit`] to observe batch atomicity.
#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: RwLock<BTreeMap<String, Collection>>,
    fail_next_commit: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `delete_batch` fail without applying any of its writes.
    pub fn fail_next_commit(&self) {
        self.fail_next_commit.store(true, AtomicOrdering::SeqCst);
    }

    fn raw(id: &str, fields: &Fields) -> RawRecord {
        RawRecord {
            id: id.to_string(),
            fields: fields.clone(),
            update_time: None,
        }
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn set(&self, collection: &str, id: &str, fields: Fields) -> Result<(), StoreError> {
        let mut collections = self.collections.write().await;
        collections
            .entry(collection.to_string())
            .or_default()
            .insert(id.to_string(), fields);
        Ok(())
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<RawRecord>, StoreError> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(collection)
            .and_then(|docs| docs.get(id))
            .map(|fields| Self::raw(id, fields)))
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError> {
        let mut collections = self.collections.write().await;
        if let Some(docs) = collections.get_mut(collection) {
            docs.remove(id);
        }
        Ok(())
    }

    async fn delete_batch(&self, collection: &str, ids: &[String]) -> Result<(), StoreError> {
        let mut collections = self.collections.write().await;
        if self.fail_next_commit.swap(false, AtomicOrdering::SeqCst) {
            return Err(StoreError::Rejected {
                status: 409,
                message: "Commit failed: simulated commit failure".to_string(),
            });
        }
        if let Some(docs) = collections.get_mut(collection) {
            for id in ids {
                docs.remove(id);
            }
        }
        Ok(())
    }

    async fn list(&self, collection: &str) -> Result<Vec<RawRecord>, StoreError> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(collection)
            .map(|docs| docs.iter().map(|(id, f)| Self::raw(id, f)).collect())
            .unwrap_or_default())
    }

    async fn run_query(&self, query: &Query) -> Result<Vec<RawRecord>, StoreError> {
        let collections = self.collections.read().await;
        let Some(docs) = collections.get(query.collection_id()) else {
            return Ok(Vec::new());
        };

        Ok(docs
            .iter()
            .filter(|(_, fields)| query.predicates().iter().all(|p| matches(fields, p)))
            .map(|(id, fields)| Self::raw(id, fields))
            .collect())
    }
}

fn lookup<'a>(fields: &'a Fields, path: &str) -> Option<&'a JsonValue> {
    let mut segments = path.split('.');
    let mut current = fields.get(segments.next()?)?;
    for segment in segments {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

fn matches(fields: &Fields, predicate: &Predicate) -> bool {
    let Some(field) = lookup(fields, &predicate.field) else {
        return false;
    };

    let ordering = compare(field, &predicate.value);
    match predicate.op {
        FieldOperator::Equal => ordering == Some(Ordering::Equal),
        FieldOperator::LessThan => ordering == Some(Ordering::Less),
        FieldOperator::GreaterThan => ordering == Some(Ordering::Greater),
        FieldOperator::LessThanOrEqual => {
            matches!(ordering, Some(Ordering::Less | Ordering::Equal))
        }
        FieldOperator::GreaterThanOrEqual => {
            matches!(ordering, Some(Ordering::Greater | Ordering::Equal))
        }
        FieldOperator::NotEqual => !field.is_null() && ordering != Some(Ordering::Equal),
        FieldOperator::ArrayContains => field.as_array().is_some_and(|items| {
            items
                .iter()
                .any(|item| compare(item, &predicate.value) == Some(Ordering::Equal))
        }),
    }
}

/// Orders a stored value against a query value of the same type. Values of
/// different types are incomparable.
fn compare(field: &JsonValue, value: &ScalarValue) -> Option<Ordering> {
    match (field, value) {
        (JsonValue::String(a), ScalarValue::String(b)) => Some(a.as_str().cmp(b.as_str())),
        (JsonValue::Bool(a), ScalarValue::Boolean(b)) => Some(a.cmp(b)),
        (JsonValue::Number(a), ScalarValue::Integer(b)) => match a.as_i64() {
            Some(a) => Some(a.cmp(b)),
            None => a.as_f64()?.partial_cmp(&(*b as f64)),
        },
        (JsonValue::Number(a), ScalarValue::Double(b)) => a.as_f64()?.partial_cmp(b),
        (JsonValue::String(a), ScalarValue::Timestamp(b)) => {
            let stored = DateTime::parse_from_rfc3339(a).ok()?.with_timezone(&Utc);
            Some(stored.cmp(b))
        }
        (JsonValue::Array(items), ScalarValue::List(values)) => {
            for (item, value) in items.iter().zip(values) {
                match compare(item, value)? {
                    Ordering::Equal => continue,
                    other => return Some(other),
                }
            }
            Some(items.len().cmp(&values.len()))
        }
        _ => None,
    }
}
