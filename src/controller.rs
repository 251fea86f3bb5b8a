use crate::image_stream_tag::ImageStreamTag;
use crate::openshift::{DeploymentConfig, ImageStream};
use crate::store::DeploymentConfigStore;
use crate::trigger::trigger_matches_image;
use kube::Client;
use std::borrow::Cow;
use std::collections::HashSet;
use std::fmt;
use tracing::{debug, info, warn};

pub async fn create_client() -> anyhow::Result<Client> {
    let client = Client::try_default().await?;
    let api_server_info = client.apiserver_version().await?;
    info!(
        "Connected to Kubernetes API server with version {}.{}, default namespace {}",
        api_server_info.major,
        api_server_info.minor,
        client.default_namespace()
    );
    Ok(client)
}

#[derive(Debug)]
pub enum ReconcileError {
    InvalidStream,
    List {
        stream: String,
        source: anyhow::Error,
    },
    PartialUpdate {
        stream: String,
        attempted: usize,
        failed: Vec<String>,
    },
}

impl ReconcileError {
    /// Re-running the reconcile is safe: configs that were already updated are no-ops the
    /// second time around.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, ReconcileError::InvalidStream)
    }
}

impl std::error::Error for ReconcileError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ReconcileError::List { source, .. } => Some(&**source),
            _ => None,
        }
    }
}

impl fmt::Display for ReconcileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReconcileError::InvalidStream => {
                write!(f, "image stream is missing a namespace or name")
            }
            ReconcileError::List { stream, source } => write!(
                f,
                "couldn't get list of deployment configs while handling image stream {}: {:#}",
                stream, source
            ),
            ReconcileError::PartialUpdate {
                stream,
                attempted,
                failed,
            } => write!(
                f,
                "couldn't update {} of {} deployment configs for trigger on image stream {}: {}",
                failed.len(),
                attempted,
                stream,
                failed.join(", ")
            ),
        }
    }
}

/// Updates the container images of deployment configs whose image change triggers point at a
/// tag that moved.
pub struct ImageChangeController<S> {
    store: S,
}

impl<S: DeploymentConfigStore> ImageChangeController<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Reconciles every deployment config against the current state of `stream`, returning how
    /// many configs were submitted for update.
    pub async fn handle(&self, stream: &ImageStream) -> Result<usize, ReconcileError> {
        if stream.namespace().is_empty() || stream.name().is_empty() {
            return Err(ReconcileError::InvalidStream);
        }

        let configs = self
            .store
            .list()
            .await
            .map_err(|source| ReconcileError::List {
                stream: stream.label(),
                source,
            })?;

        let configs_to_update = detect_image_changes(&configs, stream);

        let mut failed = Vec::new();
        for config in &configs_to_update {
            match self.store.update(config).await {
                Ok(_) => info!(
                    "Updated deployment config {} for image stream {}",
                    config.label(),
                    stream.label()
                ),
                Err(e) => {
                    warn!(
                        "Couldn't update deployment config {}: {:#}",
                        config.label(),
                        e
                    );
                    failed.push(config.label());
                }
            }
        }

        if !failed.is_empty() {
            return Err(ReconcileError::PartialUpdate {
                stream: stream.label(),
                attempted: configs_to_update.len(),
                failed,
            });
        }

        debug!(
            "Updated {} deployment configs for trigger on image stream {}",
            configs_to_update.len(),
            stream.label()
        );
        Ok(configs_to_update.len())
    }
}

/// Returns updated copies of the configs that have at least one image change trigger fired by
/// `stream`, in list order. `configs` is left untouched.
pub fn detect_image_changes(
    configs: &[DeploymentConfig],
    stream: &ImageStream,
) -> Vec<DeploymentConfig> {
    configs
        .iter()
        .filter_map(|config| apply_image_change(config, stream))
        .collect()
}

fn apply_image_change(
    original: &DeploymentConfig,
    stream: &ImageStream,
) -> Option<DeploymentConfig> {
    debug!(
        "Detecting image changes for deployment config {}",
        original.label()
    );
    // Cloned on the first write, so at most once per config.
    let mut config = Cow::Borrowed(original);

    for (trigger_index, trigger) in original.spec.triggers.iter().enumerate() {
        let Some(params) = trigger.image_change_params() else {
            continue;
        };

        // Every initial deployment gets its images resolved, even without automatic updates.
        // After that, only automatic triggers of unpaused configs fire.
        if (!params.automatic || original.spec.paused) && !params.last_triggered_image.is_empty() {
            continue;
        }

        let from_name = params.from.name.as_deref().unwrap_or_default();
        let reference = match ImageStreamTag::parse(from_name) {
            Ok(reference) => reference,
            Err(e) => {
                warn!(
                    "Invalid image stream tag {:?} in {}: {}",
                    from_name,
                    original.label(),
                    e
                );
                continue;
            }
        };

        if !trigger_matches_image(original, params, stream) {
            continue;
        }

        let Some(latest) = stream.latest_tagged_image(&reference.tag) else {
            debug!(
                "Couldn't find latest tag event for tag {} in image stream {}",
                reference.tag,
                stream.label()
            );
            continue;
        };

        let image = &latest.docker_image_reference;
        if image.is_empty() || *image == params.last_triggered_image {
            debug!(
                "No image changes for deployment config {} were detected",
                original.label()
            );
            continue;
        }

        let names: HashSet<&str> = params.container_names.iter().map(String::as_str).collect();
        for (container_index, container) in original.containers().iter().enumerate() {
            if !names.contains(container.name.as_str()) {
                continue;
            }

            let copy = config.to_mut();
            if let Some(container) = copy.containers_mut().get_mut(container_index) {
                container.image = Some(image.clone());
            }
            if let Some(params) = copy.spec.triggers[trigger_index]
                .image_change_params
                .as_mut()
            {
                params.last_triggered_image = image.clone();
            }
            debug!(
                "Container {} of deployment config {} now uses {} from {}",
                container.name,
                original.label(),
                image,
                reference
            );
        }
    }

    match config {
        Cow::Owned(updated) => Some(updated),
        Cow::Borrowed(_) => None,
    }
}
