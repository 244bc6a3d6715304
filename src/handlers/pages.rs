use axum::response::Html;
use tracing::info;

use crate::error::AppError;
use crate::handlers::auth::USERNAME_KEY;
use crate::middleware::RequireAuth;
use crate::session::{AUTH_KEY, Session};
use crate::views;

/// GET /
pub async fn landing_page() -> Html<String> {
    Html(views::landing())
}

/// GET /dashboard, behind `RequireAuth`.
pub async fn dashboard_get(RequireAuth(session): RequireAuth) -> Html<String> {
    let username = session.get::<String>(USERNAME_KEY);
    Html(views::dashboard(username.as_deref()))
}

/// GET /test-session: marks the session authenticated. Diagnostic only.
pub async fn test_session(session: Session) -> Result<&'static str, AppError> {
    session.insert(AUTH_KEY, true)?;
    let id = session.id();
    info!(
        session_id = id.as_deref().unwrap_or("<new>"),
        "session initialized"
    );
    Ok("Session initialized")
}
