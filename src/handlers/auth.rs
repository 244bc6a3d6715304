use axum::{
    Form, Json,
    extract::{FromRequest, Request, State},
    http::header::CONTENT_TYPE,
    response::{Html, IntoResponse, Redirect, Response},
};
use serde::{Deserialize, de::DeserializeOwned};
use tracing::{info, warn};

use crate::db::models::User;
use crate::error::AppError;
use crate::router::AppState;
use crate::service::password::{hash_password, verify_password};
use crate::session::{AUTH_KEY, Session};
use crate::views;

pub const USERNAME_KEY: &str = "username";
/// One-shot message shown on the next form render.
pub const FLASH_KEY: &str = "error";

/// Body accepted as JSON when declared so, as an urlencoded form otherwise.
#[derive(Debug)]
pub struct FormOrJson<T>(pub T);

impl<S, T> FromRequest<S> for FormOrJson<T>
where
    S: Send + Sync,
    T: DeserializeOwned,
{
    type Rejection = Response;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_json = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.trim_start().starts_with("application/json"));
        if is_json {
            let Json(value) = Json::<T>::from_request(req, state)
                .await
                .map_err(IntoResponse::into_response)?;
            Ok(Self(value))
        } else {
            let Form(value) = Form::<T>::from_request(req, state)
                .await
                .map_err(IntoResponse::into_response)?;
            Ok(Self(value))
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct RegisterForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

/// GET /login
pub async fn login_get(session: Session) -> Html<String> {
    let flash = session.remove::<String>(FLASH_KEY);
    Html(views::login(flash.as_deref()))
}

/// POST /login
pub async fn login_post(
    State(state): State<AppState>,
    session: Session,
    FormOrJson(form): FormOrJson<LoginForm>,
) -> Result<Redirect, AppError> {
    let user = state.users.find_by_email(&form.email).await?;
    let authenticated = match &user {
        Some(u) => verify_password(&u.password, &form.password)?,
        None => false,
    };

    let Some(user) = user.filter(|_| authenticated) else {
        warn!("login rejected");
        session.insert(FLASH_KEY, "Invalid credentials")?;
        return Ok(Redirect::to("/login"));
    };

    session.insert(AUTH_KEY, true)?;
    session.insert(USERNAME_KEY, &user.username)?;
    info!(username = %user.username, "user logged in");
    Ok(Redirect::to("/dashboard"))
}

/// GET /register
pub async fn register_get(session: Session) -> Html<String> {
    let flash = session.remove::<String>(FLASH_KEY);
    Html(views::register(flash.as_deref()))
}

/// POST /register
pub async fn register_post(
    State(state): State<AppState>,
    session: Session,
    FormOrJson(form): FormOrJson<RegisterForm>,
) -> Result<Redirect, AppError> {
    let username = form.username.trim();
    let email = form.email.trim();
    if username.is_empty() || email.is_empty() || form.password.is_empty() {
        session.insert(FLASH_KEY, "All fields are required")?;
        return Ok(Redirect::to("/register"));
    }

    let hash = hash_password(&form.password)?;
    match state.users.create(User::new(username, email, hash)).await {
        Ok(user) => {
            info!(username = %user.username, "user registered");
            Ok(Redirect::to("/login"))
        }
        Err(AppError::UserExists) => {
            session.insert(FLASH_KEY, "User already exists")?;
            Ok(Redirect::to("/register"))
        }
        Err(e) => Err(e),
    }
}

/// POST /logout
pub async fn logout_post(session: Session) -> Redirect {
    session.destroy();
    Redirect::to("/")
}
