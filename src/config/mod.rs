//! # Configuration
//!
//! - `controller`: process configuration from the environment
//! - `settings`: the shared cell holding the published `ArgoAddon` spec

mod controller;
mod settings;

pub use controller::ControllerConfig;
pub use settings::SettingsStore;
