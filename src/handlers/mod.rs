pub mod auth;
pub mod pages;

pub use auth::{login_get, login_post, logout_post, register_get, register_post};
pub use pages::{dashboard_get, landing_page, test_session};
