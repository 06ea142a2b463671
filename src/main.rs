use nextbike_tracker::config::Config;
use nextbike_tracker::store;
use nextbike_tracker::sync::{SyncError, Tracker};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "nextbike_tracker=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config_path = std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config.yaml".to_string());
    let config = Config::load_or_default(&config_path).map_err(|e| {
        error!(path = %config_path, error = %e, "Failed to load config");
        SyncError::SetupError(e.to_string())
    })?;
    info!(
        path = %config_path,
        country = %config.country,
        city = %config.city,
        tracked_bikes = config.tracked_bikes.len(),
        "Loaded config"
    );

    // The store must be usable before the first poll
    let pool = store::connect(&config.database_path).await.map_err(|e| {
        error!(path = %config.database_path, error = %e, "Failed to open database");
        SyncError::SetupError(e.to_string())
    })?;
    store::ensure_schema(&pool).await.map_err(|e| {
        error!(error = %e, "Failed to create schema");
        SyncError::SetupError(e.to_string())
    })?;
    info!(path = %config.database_path, "Database ready");

    let tracker = match Tracker::new(pool.clone(), &config) {
        Ok(tracker) => tracker,
        Err(e) => {
            error!(error = %e, "Failed to build tracker");
            pool.close().await;
            return Err(e.into());
        }
    };

    let result = if config.oneshot {
        tracker.run_cycle().await.map(|_| ())
    } else {
        tokio::select! {
            result = tracker.start() => result,
            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl-C, shutting down");
                Ok(())
            }
        }
    };

    pool.close().await;
    result?;

    Ok(())
}
