use order_service::{Config, app, logger};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file
    let _ = dotenvy::dotenv();

    let config = Config::from_env()?;

    // Held until exit so buffered file output is flushed
    let _log_guard = logger::init_logger(
        &config.log_level,
        config.log_json,
        config.log_dir.as_deref(),
    );

    if let Err(e) = app::run(config).await {
        tracing::error!(error = ?e, "order-service failed");
        return Err(e);
    }
    Ok(())
}
