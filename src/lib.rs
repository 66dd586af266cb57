pub mod calculator;
pub mod commands;
pub mod config;
pub mod db;
pub mod error;
pub mod export;
pub mod ocr;
pub mod parser;
pub mod review;
pub mod types;

use commands::AppState;
use config::AppConfig;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Install the global `tracing` subscriber. `RUST_LOG` overrides the default `info` level.
pub fn init_tracing() {
    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}

/// Build application state from config: open the database and pick the extraction backend.
///
/// A database that cannot be opened is logged and left out, so parsing, calculation and
/// export keep working while save and history report a server fault.
pub fn setup(config: &AppConfig) -> Result<AppState, error::ExtractionError> {
    let db = match db::Db::new(config.db_path.clone()) {
        Ok(db) => Some(db),
        Err(e) => {
            tracing::error!(path = %config.db_path.display(), error = %e, "could not open database");
            None
        }
    };
    let extractor = ocr::build_extractor(config)?;
    Ok(AppState::new(db, extractor))
}
