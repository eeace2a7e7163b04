use std::{io::ErrorKind, path::PathBuf};

use anyhow::Context;
use tracing::{info, warn};

use thermostat_common::RuntimeConfig;

/// JSON file holding [`RuntimeConfig`]. Read once at startup.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn from_env() -> Self {
        let path = std::env::var("THERMOSTAT_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./.thermostat/runtime.json"));
        Self::new(path)
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    /// Loads the config file, writing the defaults out when it does not
    /// exist yet so operators have something to edit.
    pub async fn load(&self) -> anyhow::Result<RuntimeConfig> {
        match tokio::fs::read(&self.path).await {
            Ok(raw) => serde_json::from_slice::<RuntimeConfig>(&raw)
                .with_context(|| format!("invalid config file {}", self.path.display())),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                let runtime = RuntimeConfig::default();
                match self.save(&runtime).await {
                    Ok(()) => info!("wrote default config to {}", self.path.display()),
                    Err(err) => warn!("failed to write default config: {err:#}"),
                }
                Ok(runtime)
            }
            Err(err) => Err(err)
                .with_context(|| format!("failed to read config file {}", self.path.display())),
        }
    }

    pub async fn save(&self, runtime: &RuntimeConfig) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let payload = serde_json::to_vec_pretty(runtime)?;
        tokio::fs::write(&self.path, payload).await?;
        Ok(())
    }
}

/// Environment overrides for deployment-specific network settings.
pub fn apply_env_overrides(
    runtime: &mut RuntimeConfig,
    lookup: impl Fn(&str) -> Option<String>,
) {
    let network = &mut runtime.network;

    if let Some(bind) = lookup("THERMOSTAT_HTTP_BIND") {
        network.http_bind = bind;
    }
    if let Some(host) = lookup("MQTT_HOST") {
        network.mqtt_host = host;
    }
    if let Some(port) = lookup("MQTT_PORT").and_then(|value| value.parse::<u16>().ok()) {
        network.mqtt_port = port;
    }
    if let Some(user) = lookup("MQTT_USER") {
        network.mqtt_user = user;
    }
    if let Some(pass) = lookup("MQTT_PASS") {
        network.mqtt_pass = pass;
    }
}
