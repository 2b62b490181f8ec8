//! MongoDB client and collection wrapper
//!
//! Typed collections apply their schema indexes on open, and every read
//! skips soft-deleted documents.

use bson::{doc, DateTime, Document};
use futures_util::TryStreamExt;
use mongodb::{
    error::{ErrorKind, WriteFailure},
    options::{IndexOptions, ReturnDocument, UpdateModifications},
    results::UpdateResult,
    Client, Collection, IndexModel,
};
use serde::{de::DeserializeOwned, Serialize};
use tracing::info;

use crate::db::schemas::Metadata;
use crate::types::PipelineError;

/// Server error code for unique index violations
const DUPLICATE_KEY_CODE: i32 = 11000;

/// Trait for schemas that provide index definitions
pub trait IntoIndexes {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)>;
}

/// Trait for schemas with mutable metadata
pub trait MutMetadata {
    fn mut_metadata(&mut self) -> &mut Metadata;
}

/// True if the error is a unique index violation
pub fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    match err.kind.as_ref() {
        ErrorKind::Write(WriteFailure::WriteError(e)) => e.code == DUPLICATE_KEY_CODE,
        ErrorKind::Command(e) => e.code == DUPLICATE_KEY_CODE,
        _ => false,
    }
}

/// Map a driver error, turning unique index violations into `Conflict`.
/// The conflict message carries the server text, which names the index.
fn write_error(op: &str, err: mongodb::error::Error) -> PipelineError {
    if is_duplicate_key(&err) {
        PipelineError::Conflict(err.to_string())
    } else {
        PipelineError::Database(format!("{} failed: {}", op, err))
    }
}

/// Filter excluding soft-deleted documents
fn live(mut filter: Document) -> Document {
    filter.insert("metadata.is_deleted", doc! { "$ne": true });
    filter
}

/// MongoDB client wrapper
#[derive(Clone)]
pub struct MongoClient {
    client: Client,
    db_name: String,
}

impl MongoClient {
    /// Connect and verify the server answers a ping
    pub async fn new(uri: &str, db_name: &str) -> Result<Self, PipelineError> {
        info!("Connecting to MongoDB at {}", uri);

        // Fail fast instead of hanging on an unreachable server
        let timeout_uri = if uri.contains('?') {
            format!("{}&serverSelectionTimeoutMS=3000&connectTimeoutMS=3000", uri)
        } else {
            format!("{}?serverSelectionTimeoutMS=3000&connectTimeoutMS=3000", uri)
        };

        let client = Client::with_uri_str(&timeout_uri)
            .await
            .map_err(|e| PipelineError::Database(format!("Failed to connect to MongoDB: {}", e)))?;

        client
            .database(db_name)
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|e| PipelineError::Database(format!("MongoDB ping failed: {}", e)))?;

        info!("Connected to MongoDB database '{}'", db_name);

        Ok(Self {
            client,
            db_name: db_name.to_string(),
        })
    }

    /// Get a typed collection, creating its indexes
    pub async fn collection<T>(&self, name: &str) -> Result<MongoCollection<T>, PipelineError>
    where
        T: Serialize + DeserializeOwned + Unpin + Send + Sync + IntoIndexes + MutMetadata,
    {
        MongoCollection::new(&self.client, &self.db_name, name).await
    }

    pub fn db_name(&self) -> &str {
        &self.db_name
    }
}

/// Typed MongoDB collection with automatic indexing
#[derive(Debug, Clone)]
pub struct MongoCollection<T>
where
    T: Serialize + DeserializeOwned + Unpin + Send + Sync,
{
    inner: Collection<T>,
}

impl<T> MongoCollection<T>
where
    T: Serialize + DeserializeOwned + Unpin + Send + Sync + IntoIndexes + MutMetadata,
{
    /// Open a collection and apply indexes
    pub async fn new(
        client: &Client,
        db_name: &str,
        collection_name: &str,
    ) -> Result<Self, PipelineError> {
        let collection = client.database(db_name).collection::<T>(collection_name);
        let mongo_collection = MongoCollection { inner: collection };

        mongo_collection.apply_indexes().await?;

        Ok(mongo_collection)
    }

    async fn apply_indexes(&self) -> Result<(), PipelineError> {
        let schema_indices = T::into_indices();

        if schema_indices.is_empty() {
            return Ok(());
        }

        let indices: Vec<IndexModel> = schema_indices
            .into_iter()
            .map(|(keys, opts)| IndexModel::builder().keys(keys).options(opts).build())
            .collect();

        self.inner
            .create_indexes(indices)
            .await
            .map_err(|e| PipelineError::Database(format!("Failed to create indexes: {}", e)))?;

        Ok(())
    }

    /// Insert a document, stamping metadata if the caller left it blank
    pub async fn insert_one(&self, mut item: T) -> Result<(), PipelineError> {
        let now = DateTime::now();
        let metadata = item.mut_metadata();
        metadata.is_deleted = false;
        metadata.created_at.get_or_insert(now);
        metadata.updated_at.get_or_insert(now);

        self.inner
            .insert_one(item)
            .await
            .map_err(|e| write_error("Insert", e))?;

        Ok(())
    }

    pub async fn find_one(&self, filter: Document) -> Result<Option<T>, PipelineError> {
        self.inner
            .find_one(live(filter))
            .await
            .map_err(|e| PipelineError::Database(format!("Find failed: {}", e)))
    }

    /// One page of matching documents in `sort` order
    pub async fn find_page(
        &self,
        filter: Document,
        sort: Document,
        skip: u64,
        limit: i64,
    ) -> Result<Vec<T>, PipelineError> {
        let cursor = self
            .inner
            .find(live(filter))
            .sort(sort)
            .skip(skip)
            .limit(limit)
            .await
            .map_err(|e| PipelineError::Database(format!("Find failed: {}", e)))?;

        cursor
            .try_collect()
            .await
            .map_err(|e| PipelineError::Database(format!("Cursor read failed: {}", e)))
    }

    pub async fn count(&self, filter: Document) -> Result<u64, PipelineError> {
        self.inner
            .count_documents(live(filter))
            .await
            .map_err(|e| PipelineError::Database(format!("Count failed: {}", e)))
    }

    pub async fn update_one(
        &self,
        filter: Document,
        update: impl Into<UpdateModifications>,
    ) -> Result<UpdateResult, PipelineError> {
        self.inner
            .update_one(live(filter), update)
            .await
            .map_err(|e| write_error("Update", e))
    }

    /// Atomically update one document, returning it as it was before or
    /// after the write
    pub async fn find_one_and_update(
        &self,
        filter: Document,
        update: impl Into<UpdateModifications>,
        return_document: ReturnDocument,
    ) -> Result<Option<T>, PipelineError> {
        self.inner
            .find_one_and_update(live(filter), update)
            .return_document(return_document)
            .await
            .map_err(|e| write_error("Find-and-update", e))
    }

    /// Atomically remove one document, returning it
    pub async fn find_one_and_delete(&self, filter: Document) -> Result<Option<T>, PipelineError> {
        self.inner
            .find_one_and_delete(live(filter))
            .await
            .map_err(|e| PipelineError::Database(format!("Find-and-delete failed: {}", e)))
    }

    /// Replace the matching document, inserting it if absent
    pub async fn upsert(&self, filter: Document, item: &T) -> Result<UpdateResult, PipelineError> {
        self.inner
            .replace_one(filter, item)
            .upsert(true)
            .await
            .map_err(|e| write_error("Upsert", e))
    }
}
