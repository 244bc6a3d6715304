//! Startup mode decision.
//!
//! Runs once, before any listener exists:
//!
//! ```text
//! NotStarted --(descriptor)--> Connecting --(ok)--> Connected
//!     |                            |
//!     |                            +--(rejected, dev)--> DegradedNoDb
//!     |                            +--(rejected, prod)--> FailedFatal
//!     +--(no descriptor, dev)--> DegradedNoDb
//!     +--(no descriptor, prod)--> FailedFatal
//! ```

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, error, info, warn};

use crate::config::{AppConfig, Descriptor};
use crate::error::{AppError, RejectionKind};
use crate::service::users::{MemoryUserStore, UserStore};
use crate::session::{MemoryStore, SessionStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootState {
    NotStarted,
    Connecting,
    Connected,
    DegradedNoDb,
    FailedFatal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeMode {
    Connected,
    Degraded,
}

/// Database access used by the bootstrapper.
#[async_trait]
pub trait Driver: Send + Sync {
    type Handle: Send + Sync;

    /// Must resolve within `timeout`. Rejections are `AppError::ConnectionRejected`.
    async fn connect(
        &self,
        descriptor: &Descriptor,
        timeout: Duration,
    ) -> Result<Self::Handle, AppError>;

    async fn session_store(
        &self,
        handle: &Self::Handle,
    ) -> Result<Arc<dyn SessionStore>, AppError>;

    async fn user_store(&self, handle: &Self::Handle) -> Arc<dyn UserStore>;
}

/// Outcome of a successful bootstrap; the only input the router accepts.
pub struct Startup {
    pub mode: RuntimeMode,
    pub sessions: Arc<dyn SessionStore>,
    pub users: Arc<dyn UserStore>,
    pub trail: Vec<BootState>,
}

impl std::fmt::Debug for Startup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Startup")
            .field("mode", &self.mode)
            .field("sessions", &self.sessions.kind())
            .field("trail", &self.trail)
            .finish()
    }
}

pub struct Bootstrapper<'a, D: Driver> {
    config: &'a AppConfig,
    driver: D,
    state: BootState,
    trail: Vec<BootState>,
}

impl<'a, D: Driver> Bootstrapper<'a, D> {
    pub fn new(config: &'a AppConfig, driver: D) -> Self {
        Self {
            config,
            driver,
            state: BootState::NotStarted,
            trail: vec![BootState::NotStarted],
        }
    }

    pub fn state(&self) -> BootState {
        self.state
    }

    fn advance(&mut self, next: BootState) {
        debug!(from = ?self.state, to = ?next, "bootstrap transition");
        self.state = next;
        self.trail.push(next);
    }

    pub async fn run(mut self) -> Result<Startup, AppError> {
        let config = self.config;
        let production = config.environment.is_production();

        let Some(descriptor) = config.descriptor.as_ref() else {
            warn!("no database connection string configured (MONGO_URI, config file or DB_USER/DB_PASSWORD)");
            if production {
                self.advance(BootState::FailedFatal);
                error!("no database configured in production; refusing to start");
                return Err(AppError::FatalStartup("no database configured in production"));
            }
            self.advance(BootState::DegradedNoDb);
            warn!("starting without database; sessions are held in memory");
            return Ok(self.degraded());
        };

        self.advance(BootState::Connecting);
        info!(uri = %descriptor, timeout = ?config.connect_timeout, "connecting to database");

        match self.driver.connect(descriptor, config.connect_timeout).await {
            Ok(handle) => {
                self.advance(BootState::Connected);
                info!("database connected");
                let sessions = match self.driver.session_store(&handle).await {
                    Ok(store) => store,
                    Err(e) => {
                        error!(error = %e, "failed to create persistent session store; sessions are held in memory");
                        Arc::new(MemoryStore::new())
                    }
                };
                let users = self.driver.user_store(&handle).await;
                Ok(Startup {
                    mode: RuntimeMode::Connected,
                    sessions,
                    users,
                    trail: self.trail,
                })
            }
            Err(e) => {
                log_rejection(&e);
                if production {
                    self.advance(BootState::FailedFatal);
                    error!("database unavailable in production; refusing to start");
                    return Err(AppError::FatalStartup("database unavailable in production"));
                }
                self.advance(BootState::DegradedNoDb);
                warn!("starting without database; sessions are held in memory");
                Ok(self.degraded())
            }
        }
    }

    fn degraded(self) -> Startup {
        Startup {
            mode: RuntimeMode::Degraded,
            sessions: Arc::new(MemoryStore::new()),
            users: Arc::new(MemoryUserStore::new()),
            trail: self.trail,
        }
    }
}

/// Returns whether the failure was treated as an authentication rejection.
pub fn log_rejection(err: &AppError) -> bool {
    match err {
        AppError::ConnectionRejected {
            kind: RejectionKind::Authentication,
            ..
        } => {
            error!(
                "database authentication failed; check DB_USER/DB_PASSWORD or MONGO_URI, and that this host is allowed in Atlas Network Access"
            );
            true
        }
        other => {
            error!(error = %other, "database connection error");
            false
        }
    }
}
