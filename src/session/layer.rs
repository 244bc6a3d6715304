use std::sync::Arc;

use axum::{
    Router,
    extract::{Request, State},
    middleware::{self, Next},
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::{Cookie, Key, PrivateCookieJar, SameSite};
use chrono::{Duration, Utc};
use serde_json::Map;
use sha2::{Digest, Sha512};
use tracing::{debug, error};

use super::{Session, SessionRecord, SessionStore, StoreKind, generate_id};
use crate::error::AppError;

pub const COOKIE_NAME: &str = "atrium.sid";
pub const SESSION_TTL_DAYS: i64 = 14;

/// Session middleware bound to one store.
#[derive(Clone)]
pub struct SessionLayer {
    store: Arc<dyn SessionStore>,
    key: Key,
}

impl SessionLayer {
    pub fn new(store: Arc<dyn SessionStore>, secret: &str) -> Self {
        Self {
            store,
            key: derive_key(secret),
        }
    }

    pub fn store_kind(&self) -> StoreKind {
        self.store.kind()
    }

    pub fn key(&self) -> &Key {
        &self.key
    }

    /// Wrap every route already on `router`.
    pub fn apply<S>(&self, router: Router<S>) -> Router<S>
    where
        S: Clone + Send + Sync + 'static,
    {
        router.layer(middleware::from_fn_with_state(
            self.clone(),
            session_middleware,
        ))
    }

    async fn load(&self, id: &str) -> Result<Option<SessionRecord>, AppError> {
        self.store.load(id).await.map_err(|e| {
            error!(error = %e, "failed to load session");
            AppError::SessionPersistFailed(e.to_string())
        })
    }

    async fn commit(&self, jar: PrivateCookieJar, session: Session, response: Response) -> Response {
        let snap = session.snapshot();

        if snap.destroyed {
            if let Some(id) = snap.id.as_deref()
                && let Err(e) = self.store.destroy(id).await
            {
                error!(error = %e, "failed to destroy session");
                return AppError::SessionPersistFailed(e.to_string()).into_response();
            }
            return (jar.remove(clear_cookie()), response).into_response();
        }

        if !snap.modified {
            return response;
        }

        let is_new = snap.id.is_none();
        let id = snap.id.unwrap_or_else(generate_id);
        let record = SessionRecord {
            id: id.clone(),
            data: snap.data,
            expires_at: Utc::now() + Duration::days(SESSION_TTL_DAYS),
        };
        if let Err(e) = self.store.save(&record).await {
            // The handler's response would claim success for state that was never stored.
            error!(error = %e, "failed to save session");
            return AppError::SessionPersistFailed(e.to_string()).into_response();
        }
        debug!(new = is_new, "session saved");

        if is_new {
            (jar.add(build_cookie(id)), response).into_response()
        } else {
            response
        }
    }
}

/// Cookie keys need 64 bytes; any secret length is accepted.
pub fn derive_key(secret: &str) -> Key {
    let digest = Sha512::digest(secret.as_bytes());
    Key::from(digest.as_slice())
}

async fn session_middleware(
    State(layer): State<SessionLayer>,
    mut req: Request,
    next: Next,
) -> Response {
    let jar = PrivateCookieJar::from_headers(req.headers(), layer.key.clone());

    let record = match jar.get(COOKIE_NAME) {
        Some(cookie) => match layer.load(cookie.value()).await {
            Ok(record) => record,
            Err(e) => return e.into_response(),
        },
        None => None,
    };
    let session = match record {
        Some(r) => Session::new(Some(r.id), r.data),
        None => Session::new(None, Map::new()),
    };

    req.extensions_mut().insert(session.clone());
    let response = next.run(req).await;
    layer.commit(jar, session, response).await
}

fn build_cookie(value: String) -> Cookie<'static> {
    Cookie::build(Cookie::new(COOKIE_NAME, value))
        .path("/")
        .http_only(true)
        .secure(false)
        .same_site(SameSite::Lax)
        .max_age(time::Duration::days(SESSION_TTL_DAYS))
        .build()
}

fn clear_cookie() -> Cookie<'static> {
    Cookie::build(Cookie::new(COOKIE_NAME, ""))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .build()
}
