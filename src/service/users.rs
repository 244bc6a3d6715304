use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use mongodb::bson::oid::ObjectId;
use tokio::sync::RwLock;

use crate::db::models::{User, normalize_email};
use crate::error::AppError;

#[async_trait]
pub trait UserStore: Send + Sync + 'static {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError>;

    /// Fails with `AppError::UserExists` when the email is taken.
    async fn create(&self, user: User) -> Result<User, AppError>;
}

/// Accounts kept in process memory, used when no database is connected.
#[derive(Debug, Clone, Default)]
pub struct MemoryUserStore {
    users: Arc<RwLock<HashMap<String, User>>>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        Ok(self.users.read().await.get(&normalize_email(email)).cloned())
    }

    async fn create(&self, mut user: User) -> Result<User, AppError> {
        let mut users = self.users.write().await;
        let email = normalize_email(&user.email);
        if users.contains_key(&email) {
            return Err(AppError::UserExists);
        }
        user.email = email.clone();
        user.id = Some(ObjectId::new());
        users.insert(email, user.clone());
        Ok(user)
    }
}
