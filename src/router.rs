use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use axum::{
    Router,
    http::{HeaderValue, header::CONTENT_SECURITY_POLICY},
    middleware,
    routing::{get, post},
};
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::bootstrap::{RuntimeMode, Startup};
use crate::config::{AppConfig, Environment};
use crate::error::AppError;
use crate::handlers;
use crate::middleware::fault::{fault_boundary, panic_fault};
use crate::service::users::UserStore;
use crate::session::{SessionLayer, StoreKind};

#[derive(Clone)]
pub struct AppState {
    pub users: Arc<dyn UserStore>,
    pub mode: RuntimeMode,
    pub environment: Environment,
}

/// Binds the fixed route table exactly once, underneath the session middleware.
pub struct RouteRegistrar {
    state: AppState,
    sessions: SessionLayer,
    registered: AtomicBool,
}

impl RouteRegistrar {
    /// Requires the session layer up front so no route can exist without it.
    pub fn new(state: AppState, sessions: SessionLayer) -> Self {
        Self {
            state,
            sessions,
            registered: AtomicBool::new(false),
        }
    }

    /// A second call is a programming error and is reported, not ignored.
    pub fn register(&self) -> Result<Router, AppError> {
        if self.registered.swap(true, Ordering::SeqCst) {
            error!("route registration attempted twice");
            return Err(AppError::RoutesAlreadyRegistered);
        }

        let routes = Router::new()
            .route("/test-session", get(handlers::test_session))
            .route("/", get(handlers::landing_page))
            .route("/login", get(handlers::login_get).post(handlers::login_post))
            .route(
                "/register",
                get(handlers::register_get).post(handlers::register_post),
            )
            .route("/dashboard", get(handlers::dashboard_get))
            .route("/logout", post(handlers::logout_post))
            .with_state(self.state.clone());

        Ok(self.sessions.apply(routes))
    }
}

/// A fully wired application. Only obtainable from a finished bootstrap.
pub struct App {
    router: Router,
    port: u16,
    mode: RuntimeMode,
}

impl App {
    pub fn mode(&self) -> RuntimeMode {
        self.mode
    }

    pub fn into_router(self) -> Router {
        self.router
    }
}

pub fn content_security_policy(port: u16) -> Result<HeaderValue, AppError> {
    let policy = format!(
        "default-src 'none'; connect-src 'self' http://localhost:{port}; \
         style-src 'self' 'unsafe-inline'; img-src 'self' https://image.shutterstock.com data:;"
    );
    Ok(HeaderValue::from_str(&policy)?)
}

/// Install session middleware for the chosen store, register routes, then the outer layers.
pub fn build_app(config: &AppConfig, startup: Startup) -> Result<App, AppError> {
    let sessions = SessionLayer::new(startup.sessions, &config.session_secret);
    if startup.mode == RuntimeMode::Connected && sessions.store_kind() == StoreKind::Transient {
        info!("database connected but sessions are transient");
    }

    let state = AppState {
        users: startup.users,
        mode: startup.mode,
        environment: config.environment,
    };
    let registrar = RouteRegistrar::new(state, sessions);

    let mut router = registrar
        .register()?
        .layer(CatchPanicLayer::custom(panic_fault))
        .layer(middleware::from_fn_with_state(
            config.environment,
            fault_boundary,
        ))
        .layer(TraceLayer::new_for_http());

    if !config.environment.is_production() {
        router = router.layer(SetResponseHeaderLayer::if_not_present(
            CONTENT_SECURITY_POLICY,
            content_security_policy(config.port)?,
        ));
    }

    Ok(App {
        router,
        port: config.port,
        mode: startup.mode,
    })
}

pub async fn serve(app: App) -> Result<(), AppError> {
    let addr = format!("0.0.0.0:{}", app.port);
    let listener = TcpListener::bind(&addr).await?;
    match app.mode {
        RuntimeMode::Connected => info!("HTTP server listening on {}", addr),
        RuntimeMode::Degraded => info!("HTTP server listening on {} (no DB)", addr),
    }
    axum::serve(listener, app.router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
        info!("received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
                info!("received terminate signal, shutting down");
            }
            Err(e) => {
                error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
