pub mod auth;
pub mod fault;

pub use auth::RequireAuth;
pub use fault::fault_boundary;
