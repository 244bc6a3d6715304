use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::response::{IntoResponse, Redirect, Response};

use crate::session::Session;

pub const LOGIN_PATH: &str = "/login";

/// Ensure the session carries the authentication flag.
/// Unauthenticated visitors are sent to the login page.
pub fn ensure_authenticated(session: &Session) -> Result<(), Response> {
    if session.is_authenticated() {
        Ok(())
    } else {
        Err(Redirect::to(LOGIN_PATH).into_response())
    }
}

/// Extractor guarding routes that need a logged-in session.
#[derive(Debug, Clone)]
pub struct RequireAuth(pub Session);

impl<S> FromRequestParts<S> for RequireAuth
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let session = Session::from_request_parts(parts, state)
            .await
            .map_err(IntoResponse::into_response)?;
        ensure_authenticated(&session)?;
        Ok(Self(session))
    }
}
