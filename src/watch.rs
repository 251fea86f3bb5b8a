use crate::config::Retry;
use crate::controller::{ImageChangeController, ReconcileError};
use crate::openshift::ImageStream;
use crate::state::ControllerContext;
use crate::store::DeploymentConfigStore;
use anyhow::Context;
use futures::TryStreamExt;
use kube::Api;
use kube::api::ListParams;
use kube::runtime::{WatchStreamExt, watcher};
use std::pin::pin;
use std::sync::atomic::Ordering;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

fn image_stream_api(ctx: &ControllerContext) -> Api<ImageStream> {
    match &ctx.config.namespace {
        Some(namespace) => Api::namespaced(ctx.kube_client.clone(), namespace),
        None => Api::all(ctx.kube_client.clone()),
    }
}

/// Reconciles every image stream change until `cancel` fires.
pub async fn watch_image_streams(
    ctx: ControllerContext,
    cancel: CancellationToken,
) -> anyhow::Result<()> {
    info!("Watching image streams");
    let api = image_stream_api(&ctx);
    let mut events = pin!(watcher(api, watcher::Config::default()).default_backoff());

    loop {
        let event = tokio::select! {
            _ = cancel.cancelled() => {
                info!("Stopping image stream watcher");
                return Ok(());
            }
            event = events.try_next() => event,
        };

        match event {
            Ok(Some(watcher::Event::Apply(stream) | watcher::Event::InitApply(stream))) => {
                reconcile_logged(&ctx, &stream).await;
            }
            Ok(Some(watcher::Event::InitDone)) => {
                if !ctx.ready.swap(true, Ordering::Relaxed) {
                    info!("Initial image stream listing done");
                }
            }
            Ok(Some(watcher::Event::Init | watcher::Event::Delete(_))) => {}
            Ok(None) => anyhow::bail!("Image stream watch ended unexpectedly"),
            Err(e) => warn!("Image stream watch failed, backing off: {}", e),
        }
    }
}

/// Re-evaluates every image stream, picking up changes the watch may have missed.
pub async fn resync_image_streams(ctx: &ControllerContext) -> anyhow::Result<()> {
    let streams = image_stream_api(ctx)
        .list(&ListParams::default())
        .await
        .context("Failed to list image streams")?;

    info!("Resyncing {} image streams", streams.items.len());
    for stream in &streams.items {
        reconcile_logged(ctx, stream).await;
    }
    Ok(())
}

async fn reconcile_logged(ctx: &ControllerContext, stream: &ImageStream) {
    match reconcile_with_retry(ctx.controller.as_ref(), stream, &ctx.config.retry).await {
        Ok(0) => debug!("No deployment configs to update for image stream {}", stream.label()),
        Ok(updated) => info!(
            "Updated {} deployment configs for image stream {}",
            updated,
            stream.label()
        ),
        Err(e) => error!("Error handling image stream {}: {}", stream.label(), e),
    }
}

/// Calls [`ImageChangeController::handle`], retrying retryable failures with exponential backoff.
pub async fn reconcile_with_retry<S: DeploymentConfigStore>(
    controller: &ImageChangeController<S>,
    stream: &ImageStream,
    retry: &Retry,
) -> Result<usize, ReconcileError> {
    let mut attempt = 0;
    loop {
        match controller.handle(stream).await {
            Ok(updated) => return Ok(updated),
            Err(e) if e.is_retryable() && attempt < retry.max_retries => {
                let backoff = retry
                    .initial_backoff()
                    .saturating_mul(2u32.saturating_pow(attempt));
                warn!(
                    "Retrying image stream {} in {:?} after error: {}",
                    stream.label(),
                    backoff,
                    e
                );
                tokio::time::sleep(backoff).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
