pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

pub use config::cli::LocalStorage;
pub use config::paths::AppPaths;
pub use config::settings::Settings;

#[cfg(feature = "cli")]
pub use config::Cli;

pub use core::{
    download::Downloader,
    process::{ProcessSupervisor, ServerSession},
    properties::PropertiesFile,
    provision::{CreateRequest, Provisioner},
    registry::InstanceManager,
};
pub use domain::model::{ServerInstance, ServerType};
pub use utils::error::{Result, ServerSmithError};
