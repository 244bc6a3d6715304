//! Database module: document models, index definitions and the MongoDB driver.
//!
//! Layout:
//! - `models.rs`: Rust structs mirroring stored documents
//! - `schema.rs`: index definitions applied at connect time
//! - `mongo.rs`: connection, driver and the user collection

pub mod models;
pub mod mongo;
pub mod schema;

pub use models::User;
pub use mongo::{MongoDriver, MongoHandle, MongoUserStore};
