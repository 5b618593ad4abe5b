use std::sync::{Arc, Mutex};

use config::{Config, Environment, File};
use serde::Deserialize;
use tracing::info;
use tracing_subscriber::EnvFilter;

use soft7::server::router;
use soft7::store::{EntityStore, PersistenceMode};

#[derive(Debug, Deserialize)]
struct Settings {
    #[serde(default = "default_listen")]
    listen: String,
    #[serde(default)]
    database: Option<String>,
    #[serde(default = "default_log")]
    log: String,
}

fn default_listen() -> String {
    "127.0.0.1:8080".to_owned()
}

fn default_log() -> String {
    "info".to_owned()
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Settings come from an optional soft7.{toml,json,yaml} file, overridden
    // by SOFT7_* environment variables.
    let settings: Settings = Config::builder()
        .add_source(File::with_name("soft7").required(false))
        .add_source(Environment::with_prefix("SOFT7"))
        .build()?
        .try_deserialize()?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&settings.log))
        .init();

    let mode = match &settings.database {
        Some(path) => PersistenceMode::File(path.into()),
        None => PersistenceMode::InMemory,
    };
    let store = Arc::new(Mutex::new(EntityStore::new(mode)?));

    let listener = tokio::net::TcpListener::bind(&settings.listen).await?;
    info!(listen = %settings.listen, "soft7 dataspace server started");
    axum::serve(listener, router(store)).await?;
    Ok(())
}
