use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

/// A registered account. `password` holds an argon2 PHC string, never plaintext.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct User {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub username: String,
    pub email: String,
    pub password: String,
}

impl User {
    pub fn new(username: impl Into<String>, email: &str, password_hash: String) -> Self {
        Self {
            id: None,
            username: username.into(),
            email: normalize_email(email),
            password: password_hash,
        }
    }
}

/// Emails are matched case-insensitively.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}
