use anyhow::Result;
use tracing::error;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    observability::init_observability("backend")?;

    if let Err(error) = backend::run().await {
        error!("Backend exited with error: {:#}", error);
        std::process::exit(1);
    }
    Ok(())
}
