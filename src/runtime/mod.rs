//! # Runtime
//!
//! - `initialization`: tracing, metrics, health server, client, settings bootstrap
//! - `watch_loop`: settings and tenant controllers
//! - `error_policy`: requeue after failures, watch stream error handling

pub mod error_policy;
pub mod initialization;
pub mod watch_loop;

pub use initialization::{initialize, InitializationResult};
pub use watch_loop::run_watch_loop;

use crate::config::ControllerConfig;

/// Initialize the controller and run it until shutdown
pub async fn run(config: ControllerConfig) -> anyhow::Result<()> {
    let init = initialize(config).await?;
    run_watch_loop(init).await
}
