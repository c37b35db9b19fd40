use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};

use reskill_api::app::{build_app, build_services};
use reskill_api::config::AppConfig;
use reskill_infra::jobs::JobExecutorConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env().context("invalid configuration")?;
    reskill_observability::init(&config.log);

    let services = Arc::new(build_services(config).context("failed to wire services")?);
    let jobs = services
        .executor
        .clone()
        .spawn(JobExecutorConfig::default().with_name("reskill-jobs"))
        .context("failed to start job executor")?;

    let listener = tokio::net::TcpListener::bind(&services.config.bind)
        .await
        .with_context(|| format!("failed to bind {}", services.config.bind))?;
    info!(addr = %listener.local_addr()?, env = ?services.config.env, "listening");

    axum::serve(listener, build_app(services.clone()))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tokio::task::spawn_blocking(move || jobs.shutdown()).await?;
    info!("stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "could not listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    info!("shutting down");
}
