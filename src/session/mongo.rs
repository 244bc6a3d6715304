use std::time::Duration;

use async_trait::async_trait;
use chrono::DateTime;
use mongodb::bson::{self, doc};
use mongodb::options::IndexOptions;
use mongodb::{Collection, Database, IndexModel};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{SessionRecord, SessionStore, StoreKind};
use crate::error::AppError;

pub const SESSION_COLLECTION: &str = "mySessions";

#[derive(Debug, Serialize, Deserialize)]
struct SessionDocument {
    #[serde(rename = "_id")]
    id: String,
    session: Map<String, Value>,
    expires: bson::DateTime,
}

impl From<&SessionRecord> for SessionDocument {
    fn from(r: &SessionRecord) -> Self {
        Self {
            id: r.id.clone(),
            session: r.data.clone(),
            expires: bson::DateTime::from_millis(r.expires_at.timestamp_millis()),
        }
    }
}

/// Sessions persisted in `mySessions`, expired by a TTL index on `expires`.
#[derive(Debug, Clone)]
pub struct MongoSessionStore {
    collection: Collection<SessionDocument>,
}

impl MongoSessionStore {
    pub async fn new(db: &Database) -> Result<Self, AppError> {
        let collection = db.collection::<SessionDocument>(SESSION_COLLECTION);
        let ttl_index = IndexModel::builder()
            .keys(doc! { "expires": 1 })
            .options(
                IndexOptions::builder()
                    .expire_after(Duration::from_secs(0))
                    .build(),
            )
            .build();
        collection
            .create_index(ttl_index)
            .await
            .map_err(|e| AppError::SessionStoreCreationFailed(e.to_string()))?;
        Ok(Self { collection })
    }
}

#[async_trait]
impl SessionStore for MongoSessionStore {
    async fn load(&self, id: &str) -> Result<Option<SessionRecord>, AppError> {
        // The TTL monitor runs about once a minute, so expiry is checked here too.
        let found = self
            .collection
            .find_one(doc! { "_id": id, "expires": { "$gt": bson::DateTime::now() } })
            .await?;
        Ok(found.and_then(|d| {
            let expires_at = DateTime::from_timestamp_millis(d.expires.timestamp_millis())?;
            Some(SessionRecord {
                id: d.id,
                data: d.session,
                expires_at,
            })
        }))
    }

    async fn save(&self, record: &SessionRecord) -> Result<(), AppError> {
        self.collection
            .replace_one(doc! { "_id": record.id.as_str() }, SessionDocument::from(record))
            .upsert(true)
            .await?;
        Ok(())
    }

    async fn destroy(&self, id: &str) -> Result<(), AppError> {
        self.collection.delete_one(doc! { "_id": id }).await?;
        Ok(())
    }

    fn kind(&self) -> StoreKind {
        StoreKind::Persistent
    }
}
