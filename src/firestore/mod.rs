//! Document persistence.
//!
//! [`DocumentGateway`] gives typed access to one collection and runs
//! condition-based queries built by [`query::build`]. It works against any
//! [`DocumentStore`]: [`FirebaseFirestore`] talks to the Firestore v1 REST API,
//! [`MemoryStore`] keeps everything in process.
//!
//! # Examples
//!
//! ```rust,no_run
//! # use firebase_gateway::firestore::{ConditionOperator, FirebaseFirestore, QueryCondition, Record};
//! # use serde::{Deserialize, Serialize};
//! #[derive(Serialize, Deserialize)]
//! struct Product { sku: String, name: String }
//!
//! impl Record for Product {
//!     fn id(&self) -> String { self.sku.clone() }
//! }
//!
//! # async fn run(firestore: FirebaseFirestore) -> Result<(), Box<dyn std::error::Error>> {
//! let products = firestore.collection::<Product>("products");
//! products.write(&Product { sku: "p-1".into(), name: "Lamp".into() }).await?;
//! let lamps = products
//!     .fetch_where(&[QueryCondition::new("name", ConditionOperator::Equal, "Lamp")])
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod gateway;
pub mod memory;
pub mod models;
pub mod query;
pub mod store;
mod value;


use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{header, Client, StatusCode};
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use tracing::{debug, instrument};
use url::Url;

use self::models::{
    CommitRequest, CommitResponse, Document, ListDocumentsResponse, RunQueryRequest,
    RunQueryResponse, Write,
};
use self::store::error_from_response;
use self::value::{fields_to_json, json_to_fields};
use crate::core::middleware::AuthMiddleware;

pub use self::gateway::{DocumentGateway, Record};
pub use self::memory::MemoryStore;
pub use self::query::{ConditionOperator, Predicate, Query, QueryCondition, ScalarValue};
pub use self::store::{DocumentStore, Fields, RawRecord, StoreError};

const LIST_PAGE_SIZE: u32 = 300;

/// Client for the Cloud Firestore REST API, scoped to one project's default
/// database.
#[derive(Clone)]
pub struct FirebaseFirestore {
    client: ClientWithMiddleware,
    /// `<api root>/projects/<id>/databases/(default)/documents`
    base_url: String,
    /// Resource prefix of document names, `projects/<id>/databases/(default)/documents`.
    documents_path: String,
}

impl FirebaseFirestore {
    /// Creates a client authorized by `middleware`.
    ///
    /// This is typically called via `FirebaseApp::firestore()`.
    pub fn new(middleware: AuthMiddleware, api_root: &str, project_id: &str) -> Self {
        let client = ClientBuilder::new(Client::new()).with(middleware).build();
        let documents_path = format!("projects/{}/databases/(default)/documents", project_id);
        let base_url = format!("{}/{}", api_root.trim_end_matches('/'), documents_path);

        Self {
            client,
            base_url,
            documents_path,
        }
    }

    /// Uses a prepared client against `base_url`, which must end in
    /// `/projects/<id>/databases/(default)/documents`. Useful for emulators.
    pub fn new_with_client(
        client: ClientWithMiddleware,
        base_url: impl Into<String>,
    ) -> Result<Self, StoreError> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        let documents_path = base_url
            .find("projects/")
            .map(|start| base_url[start..].to_string())
            .ok_or_else(|| {
                StoreError::InvalidRequest(format!(
                    "base url has no projects/ segment: {}",
                    base_url
                ))
            })?;

        Ok(Self {
            client,
            base_url,
            documents_path,
        })
    }

    /// Typed gateway over `collection`.
    pub fn collection<T: Record>(&self, collection: &str) -> DocumentGateway<T> {
        DocumentGateway::new(Arc::new(self.clone()), collection)
    }

    fn document_url(&self, collection: &str, id: &str) -> Result<Url, StoreError> {
        let mut url = self.collection_url(collection)?;
        url.path_segments_mut()
            .map_err(|_| StoreError::InvalidRequest(format!("invalid base url {}", self.base_url)))?
            .push(id);
        Ok(url)
    }

    fn collection_url(&self, collection: &str) -> Result<Url, StoreError> {
        if collection.is_empty() {
            return Err(StoreError::InvalidRequest("empty collection name".into()));
        }
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| StoreError::InvalidRequest(format!("invalid base url: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| StoreError::InvalidRequest(format!("invalid base url {}", self.base_url)))?
            .push(collection);
        Ok(url)
    }

    fn document_name(&self, collection: &str, id: &str) -> String {
        format!("{}/{}/{}", self.documents_path, collection, id)
    }
}

fn into_raw(document: Document) -> Result<RawRecord, StoreError> {
    let id = document
        .name
        .rsplit('/')
        .next()
        .unwrap_or_default()
        .to_string();

    Ok(RawRecord {
        id,
        fields: fields_to_json(document.fields)?,
        update_time: document.update_time,
    })
}

#[async_trait]
impl DocumentStore for FirebaseFirestore {
    #[instrument(skip(self, fields))]
    async fn set(&self, collection: &str, id: &str, fields: Fields) -> Result<(), StoreError> {
        let url = self.document_url(collection, id)?;
        let document = Document {
            name: String::new(),
            fields: json_to_fields(fields)?,
            create_time: None,
            update_time: None,
        };

        let response = self
            .client
            .patch(url)
            .header(header::CONTENT_TYPE, "application/json")
            .body(serde_json::to_vec(&document)?)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(error_from_response(response, "Set document").await);
        }
        Ok(())
    }

    #[instrument(skip(self))]
    async fn get(&self, collection: &str, id: &str) -> Result<Option<RawRecord>, StoreError> {
        let url = self.document_url(collection, id)?;
        let response = self.client.get(url).send().await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(error_from_response(response, "Get document").await);
        }

        let document: Document = response.json().await?;
        Ok(Some(into_raw(document)?))
    }

    #[instrument(skip(self))]
    async fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError> {
        let url = self.document_url(collection, id)?;
        let response = self.client.delete(url).send().await?;

        // Firestore answers 200 for absent documents; a 404 here means the same.
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(());
        }
        if !response.status().is_success() {
            return Err(error_from_response(response, "Delete document").await);
        }
        Ok(())
    }

    #[instrument(skip(self, ids), fields(count = ids.len()))]
    async fn delete_batch(&self, collection: &str, ids: &[String]) -> Result<(), StoreError> {
        if collection.is_empty() {
            return Err(StoreError::InvalidRequest("empty collection name".into()));
        }
        let request = CommitRequest {
            writes: ids
                .iter()
                .map(|id| Write::Delete(self.document_name(collection, id)))
                .collect(),
        };

        let response = self
            .client
            .post(format!("{}:commit", self.base_url))
            .header(header::CONTENT_TYPE, "application/json")
            .body(serde_json::to_vec(&request)?)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(error_from_response(response, "Commit").await);
        }

        let result: CommitResponse = response.json().await?;
        debug!(commit_time = ?result.commit_time, "batch committed");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn list(&self, collection: &str) -> Result<Vec<RawRecord>, StoreError> {
        let mut records = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut url = self.collection_url(collection)?;
            {
                let mut pairs = url.query_pairs_mut();
                pairs.append_pair("pageSize", &LIST_PAGE_SIZE.to_string());
                if let Some(token) = &page_token {
                    pairs.append_pair("pageToken", token);
                }
            }

            let response = self.client.get(url).send().await?;
            if !response.status().is_success() {
                return Err(error_from_response(response, "List documents").await);
            }

            let page: ListDocumentsResponse = response.json().await?;
            for document in page.documents {
                records.push(into_raw(document)?);
            }

            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        Ok(records)
    }

    #[instrument(skip(self, query), fields(collection = %query.collection_id()))]
    async fn run_query(&self, query: &Query) -> Result<Vec<RawRecord>, StoreError> {
        let request = RunQueryRequest {
            structured_query: query.to_structured_query(),
        };

        let response = self
            .client
            .post(format!("{}:runQuery", self.base_url))
            .header(header::CONTENT_TYPE, "application/json")
            .body(serde_json::to_vec(&request)?)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(error_from_response(response, "Run query").await);
        }

        let results: Vec<RunQueryResponse> = response.json().await?;
        results
            .into_iter()
            .filter_map(|r| r.document)
            .map(into_raw)
            .collect()
    }
}
