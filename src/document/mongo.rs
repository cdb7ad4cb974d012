//! MongoDB-backed document store. The rendered documents are passed through as BSON.

use crate::document::{Document, DocumentStore, FindQuery, COUNTERS_COLLECTION};
use crate::error::DocumentError;
use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::bson::{self, doc, Bson};
use mongodb::error::{ErrorKind, WriteFailure};
use mongodb::options::{IndexOptions, ReturnDocument};
use mongodb::{Client, Collection, Database, IndexModel};
use serde_json::Value;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

/// Server error code for a unique index violation.
const DUPLICATE_KEY: i32 = 11000;

#[derive(Debug, Clone)]
pub struct MongoDocumentStore {
    database: Database,
    /// Collections whose key already has a unique index.
    indexed: Arc<Mutex<HashSet<String>>>,
}

fn is_duplicate_key(e: &mongodb::error::Error) -> bool {
    matches!(&*e.kind, ErrorKind::Write(WriteFailure::WriteError(w)) if w.code == DUPLICATE_KEY)
}

fn to_bson(d: &Document) -> Result<bson::Document, DocumentError> {
    Ok(bson::to_document(d)?)
}

fn to_json(d: bson::Document) -> Result<Document, DocumentError> {
    match Bson::Document(d).into_relaxed_extjson() {
        Value::Object(mut map) => {
            map.remove("_id");
            Ok(map)
        }
        other => Err(DocumentError::Malformed(format!("expected document, got {}", other))),
    }
}

impl MongoDocumentStore {
    pub async fn connect(uri: &str, database: &str) -> Result<Self, DocumentError> {
        let client = Client::with_uri_str(uri).await?;
        tracing::info!(database = %database, "mongodb connected");
        Ok(Self::new(client.database(database)))
    }

    pub fn new(database: Database) -> Self {
        MongoDocumentStore {
            database,
            indexed: Arc::default(),
        }
    }

    /// Unique index on the key field, created once per collection.
    async fn ensure_key_index(&self, collection: &str, key: &str) -> Result<(), DocumentError> {
        let marker = format!("{}.{}", collection, key);
        if self.indexed.lock().unwrap_or_else(PoisonError::into_inner).contains(&marker) {
            return Ok(());
        }
        let index = IndexModel::builder()
            .keys(doc! { key: 1 })
            .options(IndexOptions::builder().unique(true).build())
            .build();
        self.collection(collection).create_index(index).await?;
        tracing::debug!(collection = %collection, key = %key, "unique key index ensured");
        self.indexed.lock().unwrap_or_else(PoisonError::into_inner).insert(marker);
        Ok(())
    }

    fn collection(&self, name: &str) -> Collection<bson::Document> {
        self.database.collection(name)
    }
}

#[async_trait]
impl DocumentStore for MongoDocumentStore {
    async fn insert_one(&self, collection: &str, key: &str, document: Document) -> Result<(), DocumentError> {
        tracing::debug!(collection = %collection, document = ?document, "insert");
        self.ensure_key_index(collection, key).await?;
        match self.collection(collection).insert_one(to_bson(&document)?).await {
            Ok(_) => Ok(()),
            Err(e) if is_duplicate_key(&e) => Err(DocumentError::DuplicateKey {
                collection: collection.to_string(),
                key: document.get(key).map(Value::to_string).unwrap_or_default(),
            }),
            Err(e) => Err(e.into()),
        }
    }

    async fn find(&self, collection: &str, query: &FindQuery) -> Result<Vec<Document>, DocumentError> {
        tracing::debug!(collection = %collection, filter = ?query.filter, "find");
        let mut projection = bson::Document::new();
        if !query.projection.is_empty() {
            for key in &query.projection {
                projection.insert(key.clone(), 1);
            }
            projection.insert("_id", 0);
        }
        let mut sort = bson::Document::new();
        for (key, dir) in &query.sort {
            sort.insert(key.clone(), *dir);
        }
        let mut find = self.collection(collection).find(to_bson(&query.filter)?);
        if !projection.is_empty() {
            find = find.projection(projection);
        }
        if !sort.is_empty() {
            find = find.sort(sort);
        }
        if let Some(skip) = query.skip {
            find = find.skip(skip);
        }
        if let Some(limit) = query.limit {
            find = find.limit(i64::try_from(limit).unwrap_or(i64::MAX));
        }
        let docs: Vec<bson::Document> = find.await?.try_collect().await?;
        docs.into_iter().map(to_json).collect()
    }

    async fn count(&self, collection: &str, filter: &Document) -> Result<u64, DocumentError> {
        Ok(self.collection(collection).count_documents(to_bson(filter)?).await?)
    }

    async fn update_many(&self, collection: &str, filter: &Document, update: &Document) -> Result<u64, DocumentError> {
        tracing::debug!(collection = %collection, filter = ?filter, update = ?update, "update");
        let result = self
            .collection(collection)
            .update_many(to_bson(filter)?, to_bson(update)?)
            .await?;
        Ok(result.matched_count)
    }

    async fn delete_many(&self, collection: &str, filter: &Document) -> Result<u64, DocumentError> {
        tracing::debug!(collection = %collection, filter = ?filter, "delete");
        Ok(self.collection(collection).delete_many(to_bson(filter)?).await?.deleted_count)
    }

    async fn next_sequence(&self, name: &str) -> Result<i64, DocumentError> {
        let counter = self
            .collection(COUNTERS_COLLECTION)
            .find_one_and_update(doc! { "_id": name }, doc! { "$inc": { "seq": 1_i64 } })
            .upsert(true)
            .return_document(ReturnDocument::After)
            .await?;
        match counter.as_ref().and_then(|d| d.get("seq")) {
            Some(Bson::Int64(n)) => Ok(*n),
            Some(Bson::Int32(n)) => Ok(i64::from(*n)),
            other => Err(DocumentError::Malformed(format!("counter '{}': {:?}", name, other))),
        }
    }

    async fn raise_sequence(&self, name: &str, value: i64) -> Result<(), DocumentError> {
        self.collection(COUNTERS_COLLECTION)
            .update_one(doc! { "_id": name }, doc! { "$max": { "seq": value } })
            .upsert(true)
            .await?;
        Ok(())
    }

    async fn drop_collection(&self, collection: &str) -> Result<(), DocumentError> {
        self.collection(collection).drop().await?;
        let prefix = format!("{}.", collection);
        self.indexed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|m| !m.starts_with(&prefix));
        Ok(())
    }
}
