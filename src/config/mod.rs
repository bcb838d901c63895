pub mod cli;
pub mod paths;
pub mod settings;

#[cfg(feature = "cli")]
use crate::domain::model::ServerType;
#[cfg(feature = "cli")]
use clap::{Parser, Subcommand};
#[cfg(feature = "cli")]
use std::path::PathBuf;

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Parser)]
#[command(name = "serversmith")]
#[command(about = "Create, run and manage local Minecraft servers", version)]
pub struct Cli {
    #[arg(short, long, global = true, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, global = true, help = "Emit logs as JSON")]
    pub log_json: bool,

    /// Settings file (defaults to <data dir>/settings.toml)
    #[arg(long, global = true)]
    pub settings: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// List registered server instances
    List {
        /// Only show instances whose name contains this text
        #[arg(long)]
        filter: Option<String>,
    },

    /// List the versions a distribution offers
    Versions {
        #[arg(value_parser = clap::value_parser!(ServerType))]
        server_type: ServerType,
    },

    /// Download and set up a new server instance
    Create {
        name: String,

        #[arg(long = "type", value_parser = clap::value_parser!(ServerType))]
        server_type: ServerType,

        /// Version to install (not needed with --jar)
        #[arg(long)]
        version: Option<String>,

        /// Base directory; the instance is created in <dir>/<name>
        #[arg(long)]
        dir: Option<PathBuf>,

        #[arg(long, help = "Accept the Minecraft EULA")]
        accept_eula: bool,

        /// Local server jar for custom instances
        #[arg(long)]
        jar: Option<PathBuf>,

        #[arg(long)]
        min_memory: Option<u32>,

        #[arg(long)]
        max_memory: Option<u32>,
    },

    /// Register an existing instance directory
    Import { dir: PathBuf },

    /// Forget an instance but keep its files
    Remove { instance: String },

    /// Forget an instance and delete its directory
    Delete {
        instance: String,

        #[arg(long, help = "Confirm deletion")]
        yes: bool,
    },

    /// Run a server attached to this terminal
    Start {
        instance: String,

        #[arg(long, help = "Log CPU and memory usage periodically")]
        monitor: bool,
    },

    /// Read or edit server.properties
    Props {
        instance: String,

        #[command(subcommand)]
        action: PropsAction,
    },

    /// Change the memory limits used when starting the server
    Memory {
        instance: String,

        #[arg(long)]
        min: u32,

        #[arg(long)]
        max: u32,
    },

    /// List files in the instance directory
    Files { instance: String },

    /// Write a zip backup of an instance
    Backup { instance: String },

    /// Set the server-list icon from an image (scaled to 64x64 PNG)
    Icon { instance: String, image: PathBuf },

    /// Show or set the default base directory for new instances
    DefaultDir { path: Option<PathBuf> },
}

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Subcommand)]
pub enum PropsAction {
    List,
    /// Summary of the common settings
    Show,
    Get { key: String },
    Set { key: String, value: String },
}
