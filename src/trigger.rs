use crate::image_stream_tag::ImageStreamTag;
use crate::openshift::{DeploymentConfig, DeploymentTriggerImageChangeParams, ImageStream};

/// Namespace the trigger's source lives in. An empty `from.namespace` means the config's own.
pub fn trigger_namespace<'a>(
    config: &'a DeploymentConfig,
    params: &'a DeploymentTriggerImageChangeParams,
) -> &'a str {
    match params.from.namespace.as_deref() {
        Some(namespace) if !namespace.is_empty() => namespace,
        _ => config.namespace(),
    }
}

/// Decides whether the image change trigger `params` of `config` points at `stream`.
pub fn trigger_matches_image(
    config: &DeploymentConfig,
    params: &DeploymentTriggerImageChangeParams,
    stream: &ImageStream,
) -> bool {
    let Ok(reference) = ImageStreamTag::parse(params.from.name.as_deref().unwrap_or_default())
    else {
        return false;
    };

    stream.namespace() == trigger_namespace(config, params) && stream.name() == reference.name
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::core::v1::ObjectReference;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

    fn config(namespace: &str) -> DeploymentConfig {
        DeploymentConfig {
            metadata: ObjectMeta {
                name: Some("dep1".to_string()),
                namespace: Some(namespace.to_string()),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn params(namespace: Option<&str>, name: &str) -> DeploymentTriggerImageChangeParams {
        DeploymentTriggerImageChangeParams {
            automatic: true,
            container_names: vec!["web".to_string()],
            from: ObjectReference {
                kind: Some("ImageStreamTag".to_string()),
                namespace: namespace.map(str::to_string),
                name: Some(name.to_string()),
                ..Default::default()
            },
            last_triggered_image: String::new(),
        }
    }

    fn stream(namespace: &str, name: &str) -> ImageStream {
        ImageStream {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some(namespace.to_string()),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_trigger_matches_image() {
        struct Case {
            description: &'static str,
            config_namespace: &'static str,
            from_namespace: Option<&'static str>,
            from_name: &'static str,
            stream: (&'static str, &'static str),
            expected: bool,
        }

        let cases = [
            Case {
                description: "implicit namespace, same name",
                config_namespace: "ns",
                from_namespace: None,
                from_name: "app:latest",
                stream: ("ns", "app"),
                expected: true,
            },
            Case {
                description: "empty explicit namespace falls back to the config's",
                config_namespace: "ns",
                from_namespace: Some(""),
                from_name: "app:latest",
                stream: ("ns", "app"),
                expected: true,
            },
            Case {
                description: "implicit namespace, stream elsewhere",
                config_namespace: "ns",
                from_namespace: None,
                from_name: "app:latest",
                stream: ("other", "app"),
                expected: false,
            },
            Case {
                description: "explicit namespace, stream there",
                config_namespace: "ns",
                from_namespace: Some("shared"),
                from_name: "app:latest",
                stream: ("shared", "app"),
                expected: true,
            },
            Case {
                description: "explicit namespace, stream in the config's namespace",
                config_namespace: "ns",
                from_namespace: Some("shared"),
                from_name: "app:latest",
                stream: ("ns", "app"),
                expected: false,
            },
            Case {
                description: "different stream name",
                config_namespace: "ns",
                from_namespace: None,
                from_name: "other:latest",
                stream: ("ns", "app"),
                expected: false,
            },
            Case {
                description: "tag does not matter for the match",
                config_namespace: "ns",
                from_namespace: None,
                from_name: "app:v2",
                stream: ("ns", "app"),
                expected: true,
            },
            Case {
                description: "reference without a tag separator",
                config_namespace: "ns",
                from_namespace: None,
                from_name: "app",
                stream: ("ns", "app"),
                expected: false,
            },
            Case {
                description: "reference without a name",
                config_namespace: "ns",
                from_namespace: None,
                from_name: ":latest",
                stream: ("ns", ""),
                expected: false,
            },
        ];

        for case in cases {
            let actual = trigger_matches_image(
                &config(case.config_namespace),
                &params(case.from_namespace, case.from_name),
                &stream(case.stream.0, case.stream.1),
            );
            assert_eq!(actual, case.expected, "{}", case.description);
        }
    }

    #[test]
    fn test_trigger_namespace() {
        let config = config("ns");
        assert_eq!(trigger_namespace(&config, &params(None, "app:latest")), "ns");
        assert_eq!(
            trigger_namespace(&config, &params(Some("shared"), "app:latest")),
            "shared"
        );
    }
}
