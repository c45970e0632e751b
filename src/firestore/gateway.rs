use std::marker::PhantomData;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, instrument};

use super::query::{self, Query, QueryCondition};
use super::store::{DocumentStore, Fields, RawRecord, StoreError};
use super::value::object_or_error;

/// A value that can be persisted as a document.
pub trait Record: Serialize + Send + Sync {
    /// Document id; unique within the collection.
    fn id(&self) -> String;

    fn to_fields(&self) -> Result<Fields, StoreError> {
        Ok(object_or_error(serde_json::to_value(self)?)?)
    }
}

/// Typed access to one collection of a [`DocumentStore`].
pub struct DocumentGateway<T> {
    store: Arc<dyn DocumentStore>,
    collection: String,
    _record: PhantomData<fn() -> T>,
}

impl<T> Clone for DocumentGateway<T> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            collection: self.collection.clone(),
            _record: PhantomData,
        }
    }
}

impl<T: Record> DocumentGateway<T> {
    pub fn new(store: Arc<dyn DocumentStore>, collection: impl Into<String>) -> Self {
        Self {
            store,
            collection: collection.into(),
            _record: PhantomData,
        }
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// An unfiltered query over this collection.
    pub fn base_query(&self) -> Query {
        Query::new(self.collection.clone())
    }

    /// Upserts the record under its id. The last write wins.
    #[instrument(skip_all, fields(collection = %self.collection))]
    pub async fn write(&self, record: &T) -> Result<(), StoreError> {
        let id = record.id();
        debug!(%id, "writing record");
        self.store.set(&self.collection, &id, record.to_fields()?).await
    }

    /// Removes the record. Removing an absent record succeeds.
    pub async fn delete(&self, record: &T) -> Result<(), StoreError> {
        self.store.delete(&self.collection, &record.id()).await
    }

    /// Removes all records in one atomic commit: either every record is gone
    /// afterwards or none is.
    #[instrument(skip_all, fields(collection = %self.collection, count = records.len()))]
    pub async fn delete_many(&self, records: &[T]) -> Result<(), StoreError> {
        if records.is_empty() {
            return Ok(());
        }
        let ids: Vec<String> = records.iter().map(Record::id).collect();
        self.store.delete_batch(&self.collection, &ids).await
    }

    pub async fn fetch_one(&self, id: &str) -> Result<Option<T>, StoreError>
    where
        T: DeserializeOwned,
    {
        match self.store.get(&self.collection, id).await? {
            Some(raw) => Ok(Some(raw.decode()?)),
            None => Ok(None),
        }
    }

    pub async fn fetch_all(&self) -> Result<Vec<RawRecord>, StoreError> {
        self.store.list(&self.collection).await
    }

    /// Returns the records matching every non-`None` condition.
    #[instrument(skip_all, fields(collection = %self.collection))]
    pub async fn fetch_where(
        &self,
        conditions: &[QueryCondition],
    ) -> Result<Vec<RawRecord>, StoreError> {
        let query = query::build(self.base_query(), conditions);
        debug!(predicates = query.predicates().len(), "running query");
        self.store.run_query(&query).await
    }
}
