use atrium::bootstrap::Bootstrapper;
use atrium::config::{self, AppConfig, ProcessEnv};
use atrium::db::MongoDriver;
use atrium::router;
use mimalloc::MiMalloc;
use tracing::error;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    let env = ProcessEnv;
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config::loglevel(&env)));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_level(true)
                .with_target(false),
        )
        .init();

    let cfg = AppConfig::load(&env);

    // Nothing binds until the mode is final; a fatal result exits non-zero here.
    let startup = match Bootstrapper::new(&cfg, MongoDriver).run().await {
        Ok(startup) => startup,
        Err(e) => {
            error!(error = %e, "startup aborted");
            std::process::exit(1);
        }
    };

    let app = router::build_app(&cfg, startup)?;
    router::serve(app).await?;
    Ok(())
}
