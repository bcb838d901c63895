pub mod backup;
pub mod catalog;
pub mod download;
pub mod files;
pub mod icon;
pub mod process;
pub mod properties;
pub mod provision;
pub mod registry;

pub use crate::domain::model::{ProvisionEvent, Registry, ServerInstance, ServerType};
pub use crate::domain::ports::{Distribution, Storage};
pub use crate::utils::error::Result;
