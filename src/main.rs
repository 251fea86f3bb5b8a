use crate::state::ControllerContext;
use anyhow::Context;
use std::env;
use tokio_cron_scheduler::{Job, JobScheduler};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

mod config;
mod controller;
mod image_stream_tag;
mod openshift;
mod state;
mod store;
mod trigger;
mod watch;
mod webserver;

#[cfg(target_env = "musl")]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

static DEFAULT_CONFIG_PATH: &str = "/etc/imagechange-controller/config.yaml";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();
    info!("Starting imagechange-controller {}", env!("CARGO_PKG_VERSION"));

    let config_path = env::var("CONFIG_PATH").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    let config = config::load_config(&config_path)?;

    info!("Initializing K8s controller");
    let client = controller::create_client().await?;
    let ctx = ControllerContext::new(client, config);
    let cancel = CancellationToken::new();

    let mut scheduler = JobScheduler::new().await?;
    if ctx.config.resync.enabled {
        info!(
            "Resyncing image streams at cron schedule {}",
            ctx.config.resync.schedule
        );
        let resync_ctx = ctx.clone();
        let job = Job::new_async(ctx.config.resync.schedule.as_str(), move |_uuid, _l| {
            let ctx = resync_ctx.clone();
            Box::pin(async move {
                if let Err(e) = watch::resync_image_streams(&ctx).await {
                    error!("Error resyncing image streams: {:?}", e);
                }
            })
        })
        .context("Invalid resync schedule")?;
        scheduler.add(job).await?;
        scheduler.start().await?;
    }

    tokio::spawn(shutdown_on_signal(cancel.clone()));

    let app = webserver::create_app(ctx.ready.clone());
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], ctx.config.webserver.port));
    info!("Starting webserver on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    let server =
        axum::serve(listener, app).with_graceful_shutdown(cancel.clone().cancelled_owned());

    let result = tokio::try_join!(
        watch::watch_image_streams(ctx.clone(), cancel.clone()),
        async { server.await.context("Webserver failed") },
    );
    cancel.cancel();
    scheduler.shutdown().await?;
    result?;

    info!("Stopped imagechange-controller");
    Ok(())
}

async fn shutdown_on_signal(cancel: CancellationToken) {
    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to register SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = tokio::signal::ctrl_c() => info!("Received Ctrl-C, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }
    cancel.cancel();
}
