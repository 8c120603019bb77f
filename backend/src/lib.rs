pub mod axum_http;
pub mod config;
pub mod wiring;

use std::sync::Arc;

use anyhow::Result;
use infra::postgres::postgres_connection;
use tracing::info;

pub async fn run() -> Result<()> {
    let dotenvy_env = Arc::new(config::config_loader::load()?);
    info!(stage = %dotenvy_env.stage, "ENV has been loaded");

    let postgres_pool = postgres_connection::establish_connection(
        &dotenvy_env.database.url,
        dotenvy_env.database.max_connections,
    )?;
    info!("Postgres connection has been established");

    let use_cases = wiring::build(&dotenvy_env, Arc::new(postgres_pool))?;
    axum_http::http_serve::start(dotenvy_env, use_cases).await?;

    Ok(())
}
