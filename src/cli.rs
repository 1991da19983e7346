use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    path::PathBuf,
};

use clap::{Args, Parser, Subcommand};
use log::LevelFilter;

use provisioner_api::constants::{AGENT_CONFIG_PATH, STORAGE_CONFIG_PATH_DEFAULT};

use crate::PROVISIONER_VERSION;

#[derive(Parser, Debug)]
#[clap(version = PROVISIONER_VERSION)]
pub struct Cli {
    /// Logging verbosity [OFF, ERROR, WARN, INFO, DEBUG, TRACE]
    #[arg(global = true, short, long, default_value_t = LevelFilter::Info)]
    pub verbosity: LevelFilter,

    /// Path to the agent configuration
    #[arg(global = true, long, default_value = AGENT_CONFIG_PATH)]
    pub agent_config: PathBuf,

    /// Write span events as JSON lines to this file
    #[arg(global = true, long)]
    pub trace_file: Option<PathBuf>,

    #[clap(subcommand)]
    pub command: Commands,
}

/// Identity of the machine to work on. Overrides the agent configuration.
#[derive(Args, Debug, Clone, Default)]
pub struct MachineArgs {
    /// MAAS CLI profile to issue calls with
    #[clap(long)]
    pub maas_user: Option<String>,

    /// MAAS system id of the machine
    #[clap(long)]
    pub node_id: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Validate a storage configuration without contacting MAAS
    Validate {
        /// Path to a storage configuration file
        #[clap(index = 1, default_value = STORAGE_CONFIG_PATH_DEFAULT)]
        config: PathBuf,
    },

    /// Clear the machine's storage and build the configured topology
    Provision {
        /// The storage configuration to apply
        #[clap(index = 1, default_value = STORAGE_CONFIG_PATH_DEFAULT)]
        config: PathBuf,

        #[clap(flatten)]
        machine: MachineArgs,

        /// Path to save an eventual fatal error
        #[clap(short, long)]
        error: Option<PathBuf>,
    },

    /// Remove partitions and filesystems left on the machine's disks
    Clear {
        #[clap(flatten)]
        machine: MachineArgs,

        /// Path to save an eventual fatal error
        #[clap(short, long)]
        error: Option<PathBuf>,
    },
}

impl Commands {
    pub fn name(&self) -> &'static str {
        match self {
            Commands::Validate { .. } => "validate",
            Commands::Provision { .. } => "provision",
            Commands::Clear { .. } => "clear",
        }
    }
}

impl Display for Commands {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.name())
    }
}
