use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use mongodb::bson::doc;
use mongodb::error::{Error as MongoError, ErrorKind, WriteFailure};
use mongodb::options::ClientOptions;
use mongodb::{Client, Collection, Database};
use tracing::warn;

use crate::bootstrap::Driver;
use crate::config::Descriptor;
use crate::config::resolver::APP_NAME;
use crate::db::models::{User, normalize_email};
use crate::db::schema::{USERS_COLLECTION, users_email_index};
use crate::error::{AppError, RejectionKind};
use crate::service::users::UserStore;
use crate::session::{MongoSessionStore, SessionStore};

/// Used when the connection string names no database.
pub const DEFAULT_DATABASE: &str = "test";
const DUPLICATE_KEY: i32 = 11000;

/// A verified connection and the database this service works in.
#[derive(Debug, Clone)]
pub struct MongoHandle {
    pub client: Client,
    pub database: Database,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MongoDriver;

#[async_trait]
impl Driver for MongoDriver {
    type Handle = MongoHandle;

    async fn connect(
        &self,
        descriptor: &Descriptor,
        timeout: Duration,
    ) -> Result<MongoHandle, AppError> {
        // SRV resolution in `parse` happens before the driver timeouts apply.
        within(timeout, connect_once(descriptor, timeout)).await
    }

    async fn session_store(
        &self,
        handle: &MongoHandle,
    ) -> Result<Arc<dyn SessionStore>, AppError> {
        let store = MongoSessionStore::new(&handle.database).await?;
        Ok(Arc::new(store))
    }

    async fn user_store(&self, handle: &MongoHandle) -> Arc<dyn UserStore> {
        let store = MongoUserStore::new(&handle.database);
        if let Err(e) = store.ensure_indexes().await {
            warn!(
                error = %e,
                "failed to create users index; duplicate emails are only checked by lookup"
            );
        }
        Arc::new(store)
    }
}

/// Bound the whole attempt, not just the driver's own phases.
async fn within<T>(
    timeout: Duration,
    attempt: impl Future<Output = Result<T, AppError>>,
) -> Result<T, AppError> {
    tokio::time::timeout(timeout, attempt)
        .await
        .map_err(|_| AppError::ConnectionRejected {
            kind: RejectionKind::Connectivity,
            detail: format!("no connection within {}ms", timeout.as_millis()),
        })?
}

async fn connect_once(descriptor: &Descriptor, timeout: Duration) -> Result<MongoHandle, AppError> {
    let mut options = ClientOptions::parse(descriptor.as_str())
        .await
        .map_err(rejected)?;
    options.connect_timeout = Some(timeout);
    options.server_selection_timeout = Some(timeout);
    if options.app_name.is_none() {
        options.app_name = Some(APP_NAME.to_string());
    }

    let client = Client::with_options(options).map_err(rejected)?;
    // The driver connects lazily; ping to surface auth and network failures now.
    client
        .database("admin")
        .run_command(doc! { "ping": 1 })
        .await
        .map_err(rejected)?;

    let database = client
        .default_database()
        .unwrap_or_else(|| client.database(DEFAULT_DATABASE));
    Ok(MongoHandle { client, database })
}

fn rejected(e: MongoError) -> AppError {
    let detail = e.to_string();
    let kind = match &*e.kind {
        ErrorKind::Authentication { .. } => RejectionKind::Authentication,
        _ => RejectionKind::classify(&detail),
    };
    AppError::ConnectionRejected { kind, detail }
}

fn is_duplicate_key(e: &MongoError) -> bool {
    matches!(
        &*e.kind,
        ErrorKind::Write(WriteFailure::WriteError(we)) if we.code == DUPLICATE_KEY
    )
}

#[derive(Debug, Clone)]
pub struct MongoUserStore {
    collection: Collection<User>,
}

impl MongoUserStore {
    pub fn new(db: &Database) -> Self {
        Self {
            collection: db.collection::<User>(USERS_COLLECTION),
        }
    }

    pub async fn ensure_indexes(&self) -> Result<(), AppError> {
        self.collection.create_index(users_email_index()).await?;
        Ok(())
    }
}

#[async_trait]
impl UserStore for MongoUserStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let found = self
            .collection
            .find_one(doc! { "email": normalize_email(email) })
            .await?;
        Ok(found)
    }

    async fn create(&self, mut user: User) -> Result<User, AppError> {
        user.email = normalize_email(&user.email);
        if self.find_by_email(&user.email).await?.is_some() {
            return Err(AppError::UserExists);
        }
        let result = match self.collection.insert_one(&user).await {
            Ok(r) => r,
            Err(e) if is_duplicate_key(&e) => return Err(AppError::UserExists),
            Err(e) => return Err(e.into()),
        };
        user.id = result.inserted_id.as_object_id();
        Ok(user)
    }
}
