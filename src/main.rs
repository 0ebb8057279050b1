/// ripplefeed daemon: wires the content distribution core and drives the
/// publish intake until shutdown.
use ripplefeed::config::ServerConfig;
use ripplefeed::context::AppContext;
use ripplefeed::error::{CoreError, CoreResult};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> CoreResult<()> {
    dotenv::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ripplefeed=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServerConfig::from_env()?;
    let (ctx, intake, writer_handle) = AppContext::new(config).await?;

    let intake_task = tokio::spawn(intake.run());
    info!("ripplefeed v{} up", env!("CARGO_PKG_VERSION"));

    tokio::signal::ctrl_c()
        .await
        .map_err(|e| CoreError::Internal(format!("signal handler failed: {e}")))?;
    info!("shutting down");

    // Dropping the context drops the publish producer and the cache writer's
    // senders; the intake drains first, then the writer workers finish their
    // queued jobs and exit.
    drop(ctx);
    let _ = intake_task.await;
    writer_handle.join().await;

    Ok(())
}
