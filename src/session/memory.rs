use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use super::{SessionRecord, SessionStore, StoreKind};
use crate::error::AppError;

/// Sessions held in process memory; lost on restart.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    records: Arc<RwLock<HashMap<String, SessionRecord>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn load(&self, id: &str) -> Result<Option<SessionRecord>, AppError> {
        let now = Utc::now();
        {
            let records = self.records.read().await;
            match records.get(id) {
                Some(record) if !record.is_expired(now) => return Ok(Some(record.clone())),
                Some(_) => {}
                None => return Ok(None),
            }
        }
        self.records.write().await.remove(id);
        Ok(None)
    }

    async fn save(&self, record: &SessionRecord) -> Result<(), AppError> {
        self.records
            .write()
            .await
            .insert(record.id.clone(), record.clone());
        Ok(())
    }

    async fn destroy(&self, id: &str) -> Result<(), AppError> {
        self.records.write().await.remove(id);
        Ok(())
    }

    fn kind(&self) -> StoreKind {
        StoreKind::Transient
    }
}
