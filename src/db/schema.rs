//! Index definitions for the collections this service owns.

use mongodb::IndexModel;
use mongodb::bson::doc;
use mongodb::options::IndexOptions;

pub const USERS_COLLECTION: &str = "users";

/// Unique index on `users.email`; concurrent registrations of one address
/// are rejected by the server.
pub fn users_email_index() -> IndexModel {
    IndexModel::builder()
        .keys(doc! { "email": 1 })
        .options(
            IndexOptions::builder()
                .unique(true)
                .name("users_email_unique".to_string())
                .build(),
        )
        .build()
}
