//! Minimal typed views of the OpenShift `DeploymentConfig` and `ImageStream` resources.
//!
//! Only the fields the image change controller reads or writes are typed. Everything else in a
//! deployment config spec is kept in `extra` so a full replacement update does not drop it.
use chrono::{DateTime, Utc};
use k8s_openapi::api::core::v1::{Container, ObjectReference, PodTemplateSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use k8s_openapi::{Metadata, NamespaceResourceScope, Resource};
use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;
use std::collections::BTreeMap;

pub static DEFAULT_IMAGE_TAG: &str = "latest";

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct DeploymentConfig {
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: DeploymentConfigSpec,
    #[serde(default)]
    pub status: Option<Value>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentConfigSpec {
    #[serde(default)]
    pub triggers: Vec<DeploymentTriggerPolicy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<PodTemplateSpec>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub paused: bool,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeploymentTriggerType {
    ImageChange,
    ConfigChange,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentTriggerPolicy {
    #[serde(rename = "type")]
    pub trigger_type: DeploymentTriggerType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_change_params: Option<DeploymentTriggerImageChangeParams>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentTriggerImageChangeParams {
    #[serde(default)]
    pub automatic: bool,
    #[serde(default)]
    pub container_names: Vec<String>,
    pub from: ObjectReference,
    #[serde(default)]
    pub last_triggered_image: String,
}

impl DeploymentConfig {
    pub fn namespace(&self) -> &str {
        self.metadata.namespace.as_deref().unwrap_or_default()
    }

    pub fn name(&self) -> &str {
        self.metadata.name.as_deref().unwrap_or_default()
    }

    /// `namespace/name`, used in log lines and error messages.
    pub fn label(&self) -> String {
        format!("{}/{}", self.namespace(), self.name())
    }

    pub fn containers(&self) -> &[Container] {
        self.spec
            .template
            .as_ref()
            .and_then(|t| t.spec.as_ref())
            .map(|s| s.containers.as_slice())
            .unwrap_or_default()
    }

    pub fn containers_mut(&mut self) -> &mut [Container] {
        self.spec
            .template
            .as_mut()
            .and_then(|t| t.spec.as_mut())
            .map(|s| s.containers.as_mut_slice())
            .unwrap_or_default()
    }
}

impl DeploymentTriggerPolicy {
    /// Image change parameters, if this is an image change trigger.
    pub fn image_change_params(&self) -> Option<&DeploymentTriggerImageChangeParams> {
        match self.trigger_type {
            DeploymentTriggerType::ImageChange => self.image_change_params.as_ref(),
            DeploymentTriggerType::ConfigChange => None,
        }
    }
}

impl Resource for DeploymentConfig {
    const API_VERSION: &'static str = "apps.openshift.io/v1";
    const GROUP: &'static str = "apps.openshift.io";
    const KIND: &'static str = "DeploymentConfig";
    const VERSION: &'static str = "v1";
    const URL_PATH_SEGMENT: &'static str = "deploymentconfigs";
    type Scope = NamespaceResourceScope;
}

// The API server rejects replacements without apiVersion and kind.
impl Serialize for DeploymentConfig {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct(Self::KIND, 5)?;
        state.serialize_field("apiVersion", Self::API_VERSION)?;
        state.serialize_field("kind", Self::KIND)?;
        state.serialize_field("metadata", &self.metadata)?;
        state.serialize_field("spec", &self.spec)?;
        if let Some(status) = &self.status {
            state.serialize_field("status", status)?;
        }
        state.end()
    }
}

impl Metadata for DeploymentConfig {
    type Ty = ObjectMeta;

    fn metadata(&self) -> &ObjectMeta {
        &self.metadata
    }

    fn metadata_mut(&mut self) -> &mut ObjectMeta {
        &mut self.metadata
    }
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct ImageStream {
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: Option<Value>,
    #[serde(default)]
    pub status: ImageStreamStatus,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageStreamStatus {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub docker_image_repository: String,
    #[serde(default)]
    pub tags: Vec<NamedTagEventList>,
}

/// History of a single tag, newest event first.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct NamedTagEventList {
    pub tag: String,
    #[serde(default)]
    pub items: Vec<TagEvent>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TagEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<DateTime<Utc>>,
    pub docker_image_reference: String,
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub generation: i64,
}

impl ImageStream {
    pub fn namespace(&self) -> &str {
        self.metadata.namespace.as_deref().unwrap_or_default()
    }

    pub fn name(&self) -> &str {
        self.metadata.name.as_deref().unwrap_or_default()
    }

    pub fn label(&self) -> String {
        format!("{}/{}", self.namespace(), self.name())
    }

    /// Most recent event recorded for `tag`, an empty tag meaning `latest`.
    pub fn latest_tagged_image(&self, tag: &str) -> Option<&TagEvent> {
        let tag = if tag.is_empty() { DEFAULT_IMAGE_TAG } else { tag };
        self.status
            .tags
            .iter()
            .find(|history| history.tag == tag)
            .and_then(|history| history.items.first())
    }

    /// Records `event` as the newest entry in the history of `tag`.
    #[allow(dead_code)]
    pub fn record_tag_event(&mut self, tag: &str, event: TagEvent) {
        match self.status.tags.iter_mut().find(|h| h.tag == tag) {
            Some(history) => history.items.insert(0, event),
            None => self.status.tags.push(NamedTagEventList {
                tag: tag.to_string(),
                items: vec![event],
            }),
        }
    }
}

impl Resource for ImageStream {
    const API_VERSION: &'static str = "image.openshift.io/v1";
    const GROUP: &'static str = "image.openshift.io";
    const KIND: &'static str = "ImageStream";
    const VERSION: &'static str = "v1";
    const URL_PATH_SEGMENT: &'static str = "imagestreams";
    type Scope = NamespaceResourceScope;
}

impl Metadata for ImageStream {
    type Ty = ObjectMeta;

    fn metadata(&self) -> &ObjectMeta {
        &self.metadata
    }

    fn metadata_mut(&mut self) -> &mut ObjectMeta {
        &mut self.metadata
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn stream_with_history(events: &[&str]) -> ImageStream {
        let mut stream = ImageStream::default();
        for reference in events {
            stream.record_tag_event(
                "latest",
                TagEvent {
                    docker_image_reference: reference.to_string(),
                    ..Default::default()
                },
            );
        }
        stream
    }

    #[test]
    fn test_latest_tagged_image_is_most_recently_recorded() {
        let stream = stream_with_history(&["registry/app@sha256:one", "registry/app@sha256:two"]);
        let latest = stream.latest_tagged_image("latest").unwrap();
        assert_eq!(latest.docker_image_reference, "registry/app@sha256:two");
    }

    #[test]
    fn test_latest_tagged_image_defaults_to_latest_tag() {
        let stream = stream_with_history(&["registry/app@sha256:one"]);
        assert!(stream.latest_tagged_image("").is_some());
    }

    #[test]
    fn test_latest_tagged_image_missing_tag_or_history() {
        let mut stream = stream_with_history(&["registry/app@sha256:one"]);
        assert!(stream.latest_tagged_image("stable").is_none());

        stream.status.tags.push(NamedTagEventList {
            tag: "empty".to_string(),
            items: vec![],
        });
        assert!(stream.latest_tagged_image("empty").is_none());
    }

    #[test]
    fn test_deployment_config_keeps_unknown_spec_fields() {
        let raw = json!({
            "apiVersion": "apps.openshift.io/v1",
            "kind": "DeploymentConfig",
            "metadata": {"name": "dep1", "namespace": "ns", "resourceVersion": "42"},
            "spec": {
                "replicas": 2,
                "selector": {"app": "dep1"},
                "triggers": [
                    {"type": "ConfigChange"},
                    {
                        "type": "ImageChange",
                        "imageChangeParams": {
                            "automatic": true,
                            "containerNames": ["web"],
                            "from": {"kind": "ImageStreamTag", "name": "app:latest"}
                        }
                    }
                ],
                "template": {"spec": {"containers": [{"name": "web", "image": "app"}]}}
            },
            "status": {"latestVersion": 3}
        });

        let config: DeploymentConfig = serde_json::from_value(raw).unwrap();
        assert_eq!(config.label(), "ns/dep1");
        assert_eq!(config.containers().len(), 1);
        assert!(config.spec.triggers[0].image_change_params().is_none());
        let params = config.spec.triggers[1].image_change_params().unwrap();
        assert_eq!(params.from.name.as_deref(), Some("app:latest"));
        assert!(params.last_triggered_image.is_empty());

        let round_trip = serde_json::to_value(&config).unwrap();
        assert_eq!(round_trip["spec"]["replicas"], json!(2));
        assert_eq!(round_trip["spec"]["selector"], json!({"app": "dep1"}));
        assert_eq!(round_trip["status"], json!({"latestVersion": 3}));
        assert_eq!(round_trip["metadata"]["resourceVersion"], json!("42"));
        assert_eq!(round_trip["apiVersion"], json!("apps.openshift.io/v1"));
        assert_eq!(round_trip["kind"], json!("DeploymentConfig"));
    }

    #[test]
    fn test_image_stream_status_from_api_json() {
        let raw = json!({
            "metadata": {"name": "app", "namespace": "ns"},
            "status": {
                "dockerImageRepository": "registry/ns/app",
                "tags": [{
                    "tag": "latest",
                    "items": [
                        {"created": "2024-05-01T10:00:00Z", "dockerImageReference": "registry/ns/app@sha256:new", "image": "sha256:new", "generation": 2},
                        {"created": "2024-04-01T10:00:00Z", "dockerImageReference": "registry/ns/app@sha256:old", "image": "sha256:old", "generation": 1}
                    ]
                }]
            }
        });

        let stream: ImageStream = serde_json::from_value(raw).unwrap();
        assert_eq!(stream.label(), "ns/app");
        let latest = stream.latest_tagged_image("latest").unwrap();
        assert_eq!(latest.docker_image_reference, "registry/ns/app@sha256:new");
        assert_eq!(latest.generation, 2);
    }
}
