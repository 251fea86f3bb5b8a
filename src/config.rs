use anyhow::{Context, Result};
use regex::Regex;
use serde::Deserialize;
use std::time::Duration;
use std::{env, fs, path::Path};
use tracing::info;

#[derive(Clone, Debug, Deserialize)]
pub struct Config {
    pub webserver: Webserver,
    /// Restricts watching and reconciling to one namespace. All namespaces when unset.
    #[serde(default)]
    pub namespace: Option<String>,
    #[serde(default)]
    pub resync: Resync,
    #[serde(default)]
    pub retry: Retry,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Webserver {
    pub port: u16,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Resync {
    #[serde(default = "default_resync_enabled")]
    pub enabled: bool,
    #[serde(default = "default_resync_schedule")]
    pub schedule: String,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Retry {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_initial_backoff_millis")]
    pub initial_backoff_millis: u64,
}

impl Retry {
    pub fn initial_backoff(&self) -> Duration {
        Duration::from_millis(self.initial_backoff_millis)
    }
}

impl Default for Resync {
    fn default() -> Self {
        Self {
            enabled: default_resync_enabled(),
            schedule: default_resync_schedule(),
        }
    }
}

impl Default for Retry {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_backoff_millis: default_initial_backoff_millis(),
        }
    }
}

fn default_resync_enabled() -> bool {
    true
}

fn default_resync_schedule() -> String {
    "0 */10 * * * *".to_string()
}

fn default_max_retries() -> u32 {
    3
}

fn default_initial_backoff_millis() -> u64 {
    500
}

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    info!("Loading config from file {}", path.as_ref().display());
    let yaml_str = fs::read_to_string(&path)
        .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

    let expanded = expand_env_vars(&yaml_str)?;

    let config = serde_yaml_ng::from_str(&expanded)
        .context("Failed to parse YAML config after environment variable expansion")?;

    Ok(config)
}

/// Replaces `${VAR}` placeholders with environment variables values.
/// Returns an error naming the first variable that is not set.
fn expand_env_vars(input: &str) -> Result<String> {
    let re =
        Regex::new(r"\$\{([^}]+)}").context("Invalid regex pattern for env var substitution")?;

    let mut result = String::with_capacity(input.len());
    let mut last_end = 0;
    for caps in re.captures_iter(input) {
        let (Some(placeholder), Some(var_name)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let value = env::var(var_name.as_str()).with_context(|| {
            format!("Missing environment variable: {}", var_name.as_str())
        })?;
        result.push_str(&input[last_end..placeholder.start()]);
        result.push_str(&value);
        last_end = placeholder.end();
    }
    result.push_str(&input[last_end..]);

    Ok(result)
}
