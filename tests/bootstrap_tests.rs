use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use atrium::AppError;
use atrium::bootstrap::{BootState, Bootstrapper, Driver, RuntimeMode, log_rejection};
use atrium::config::{AppConfig, Descriptor, FileConfig};
use atrium::error::RejectionKind;
use atrium::service::users::{MemoryUserStore, UserStore};
use atrium::session::{MemoryStore, SessionRecord, SessionStore, StoreKind};

/// Persistent-looking store backed by memory.
struct FakePersistentStore(MemoryStore);

#[async_trait]
impl SessionStore for FakePersistentStore {
    async fn load(&self, id: &str) -> Result<Option<SessionRecord>, AppError> {
        self.0.load(id).await
    }
    async fn save(&self, record: &SessionRecord) -> Result<(), AppError> {
        self.0.save(record).await
    }
    async fn destroy(&self, id: &str) -> Result<(), AppError> {
        self.0.destroy(id).await
    }
    fn kind(&self) -> StoreKind {
        StoreKind::Persistent
    }
}

#[derive(Clone, Copy)]
enum Outcome {
    Accept,
    AcceptWithoutSessionStore,
    Reject(RejectionKind, &'static str),
}

#[derive(Clone)]
struct FakeDriver {
    outcome: Outcome,
    connects: Arc<AtomicUsize>,
}

impl FakeDriver {
    fn new(outcome: Outcome) -> Self {
        Self {
            outcome,
            connects: Arc::new(AtomicUsize::new(0)),
        }
    }
}

#[async_trait]
impl Driver for FakeDriver {
    type Handle = ();

    async fn connect(&self, _descriptor: &Descriptor, timeout: Duration) -> Result<(), AppError> {
        assert_eq!(timeout, Duration::from_secs(10));
        self.connects.fetch_add(1, Ordering::SeqCst);
        match self.outcome {
            Outcome::Accept | Outcome::AcceptWithoutSessionStore => Ok(()),
            Outcome::Reject(kind, detail) => Err(AppError::ConnectionRejected {
                kind,
                detail: detail.to_string(),
            }),
        }
    }

    async fn session_store(&self, _handle: &()) -> Result<Arc<dyn SessionStore>, AppError> {
        match self.outcome {
            Outcome::AcceptWithoutSessionStore => Err(AppError::SessionStoreCreationFailed(
                "not authorized to create index".to_string(),
            )),
            _ => Ok(Arc::new(FakePersistentStore(MemoryStore::new()))),
        }
    }

    async fn user_store(&self, _handle: &()) -> Arc<dyn UserStore> {
        Arc::new(MemoryUserStore::new())
    }
}

fn config(pairs: &[(&'static str, &'static str)]) -> AppConfig {
    let env: HashMap<&str, &str> = pairs.iter().copied().collect();
    AppConfig::from_sources(&env, &FileConfig::default())
}

const URI: (&str, &str) = ("MONGO_URI", "mongodb://db.example.net/app");
const PROD: (&str, &str) = ("APP_ENV", "production");

#[tokio::test]
async fn no_descriptor_outside_production_degrades_without_connecting() {
    let cfg = config(&[]);
    let driver = FakeDriver::new(Outcome::Accept);
    let startup = Bootstrapper::new(&cfg, driver.clone()).run().await.unwrap();

    assert_eq!(startup.mode, RuntimeMode::Degraded);
    assert_eq!(startup.sessions.kind(), StoreKind::Transient);
    assert_eq!(
        startup.trail,
        vec![BootState::NotStarted, BootState::DegradedNoDb]
    );
    assert_eq!(driver.connects.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn no_descriptor_in_production_is_fatal() {
    let cfg = config(&[PROD]);
    let driver = FakeDriver::new(Outcome::Accept);
    let err = Bootstrapper::new(&cfg, driver.clone()).run().await.unwrap_err();

    assert!(matches!(err, AppError::FatalStartup(_)));
    assert_eq!(driver.connects.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn accepted_connection_uses_persistent_sessions() {
    let cfg = config(&[URI, PROD]);
    let driver = FakeDriver::new(Outcome::Accept);
    let startup = Bootstrapper::new(&cfg, driver.clone()).run().await.unwrap();

    assert_eq!(startup.mode, RuntimeMode::Connected);
    assert_eq!(startup.sessions.kind(), StoreKind::Persistent);
    assert_eq!(
        startup.trail,
        vec![
            BootState::NotStarted,
            BootState::Connecting,
            BootState::Connected
        ]
    );
    assert_eq!(driver.connects.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn session_store_failure_keeps_connected_mode_with_transient_sessions() {
    let cfg = config(&[URI, PROD]);
    let startup = Bootstrapper::new(&cfg, FakeDriver::new(Outcome::AcceptWithoutSessionStore))
        .run()
        .await
        .unwrap();

    assert_eq!(startup.mode, RuntimeMode::Connected);
    assert_eq!(startup.sessions.kind(), StoreKind::Transient);
}

#[tokio::test]
async fn auth_rejection_outside_production_degrades() {
    let cfg = config(&[URI]);
    let driver = FakeDriver::new(Outcome::Reject(
        RejectionKind::Authentication,
        "bad auth : authentication failed",
    ));
    let startup = Bootstrapper::new(&cfg, driver.clone()).run().await.unwrap();

    assert_eq!(startup.mode, RuntimeMode::Degraded);
    assert_eq!(startup.sessions.kind(), StoreKind::Transient);
    assert_eq!(
        startup.trail,
        vec![
            BootState::NotStarted,
            BootState::Connecting,
            BootState::DegradedNoDb
        ]
    );
    assert_eq!(driver.connects.load(Ordering::SeqCst), 1, "no retry");
}

#[tokio::test]
async fn rejection_in_production_is_fatal() {
    let cfg = config(&[URI, PROD]);
    let driver = FakeDriver::new(Outcome::Reject(
        RejectionKind::Connectivity,
        "server selection timeout",
    ));
    let err = Bootstrapper::new(&cfg, driver).run().await.unwrap_err();
    assert!(matches!(err, AppError::FatalStartup(_)));
}

#[test]
fn authentication_rejections_get_the_distinguished_message() {
    let auth = AppError::ConnectionRejected {
        kind: RejectionKind::classify("SCRAM failure: Authentication failed."),
        detail: "SCRAM failure: Authentication failed.".to_string(),
    };
    let network = AppError::ConnectionRejected {
        kind: RejectionKind::classify("connection refused"),
        detail: "connection refused".to_string(),
    };
    assert!(log_rejection(&auth));
    assert!(!log_rejection(&network));
}
