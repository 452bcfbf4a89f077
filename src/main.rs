//! # Capsule Argo CD Addon
//!
//! Kubernetes controller registering Capsule tenants as Argo CD clusters.
//!
//! ## Overview
//!
//! 1. **Loads settings** - the `ArgoAddon` object named by `--setting-name`
//! 2. **Watches tenants** - every Capsule `Tenant`, on change and periodically
//! 3. **Provisions access** - a service account and token per tenant, listed
//!    as a tenant owner so capsule-proxy grants it the tenant's scope
//! 4. **Registers clusters** - a proxy service and an Argo CD cluster secret
//!    pointing at capsule-proxy with the tenant token
//!
//! Configuration comes from environment variables (see `ControllerConfig`);
//! the flags below override them.

use anyhow::Result;
use capsule_argo_addon::config::ControllerConfig;
use capsule_argo_addon::runtime;
use clap::Parser;

/// Command line overrides of the environment configuration
#[derive(Debug, Parser)]
#[command(name = "capsule-argo-addon", version, about)]
struct Args {
    /// Name of the ArgoAddon object holding the settings
    #[arg(long, env = "SETTING_NAME")]
    setting_name: Option<String>,

    /// Port of the metrics and health server
    #[arg(long, env = "METRICS_PORT")]
    metrics_port: Option<u16>,

    /// Log format (json or text)
    #[arg(long, env = "LOG_FORMAT")]
    log_format: Option<String>,
}

impl Args {
    fn apply(self, mut config: ControllerConfig) -> ControllerConfig {
        if let Some(setting_name) = self.setting_name {
            config.setting_name = setting_name;
        }
        if let Some(metrics_port) = self.metrics_port {
            config.metrics_port = metrics_port;
        }
        if let Some(log_format) = self.log_format {
            config.log_format = log_format;
        }
        config
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = Args::parse().apply(ControllerConfig::from_env());
    runtime::run(config).await
}
