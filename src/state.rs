use crate::config::Config;
use crate::controller::ImageChangeController;
use crate::store::KubeDeploymentConfigStore;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

#[derive(Clone)]
pub struct ControllerContext {
    pub(crate) kube_client: kube::Client,
    pub(crate) config: Config,
    pub(crate) controller: Arc<ImageChangeController<KubeDeploymentConfigStore>>,
    /// Set once the image stream watcher has completed its initial listing.
    pub(crate) ready: Arc<AtomicBool>,
}

impl ControllerContext {
    pub fn new(kube_client: kube::Client, config: Config) -> Self {
        let store = KubeDeploymentConfigStore::new(kube_client.clone(), config.namespace.clone());
        Self {
            kube_client,
            config,
            controller: Arc::new(ImageChangeController::new(store)),
            ready: Arc::new(AtomicBool::new(false)),
        }
    }
}
