use std::{fs, path::Path};

use log::{debug, info};

use osutils::maas::MaasCli;
use provisioner_api::{
    config::{AgentConfig, StorageConfig},
    error::{InitializationError, InvalidInputError, ProvisioningError, ReportError},
};

pub mod cli;
mod engine;
pub mod validation;

use engine::{context::ProvisioningContext, storage};

pub use engine::storage::disks::DiskMatcher;

/// Provisioner version as provided by environment variables at build time
pub const PROVISIONER_VERSION: &str = match option_env!("PROVISIONER_VERSION") {
    Some(v) => v,
    None => env!("CARGO_PKG_VERSION"),
};

/// Applies storage configurations to a single MAAS machine.
pub struct Provisioner {
    maas: MaasCli,
    disk_matcher: Box<dyn DiskMatcher>,
}

impl Provisioner {
    /// Creates a provisioner for the machine named in `agent_config`, talking
    /// to MAAS through the configured CLI.
    pub fn new(agent_config: &AgentConfig) -> Result<Self, ProvisioningError> {
        let maas_user = agent_config.maas_user.as_deref().structured(
            InvalidInputError::MissingMachineIdentity {
                field: "maas_user".into(),
            },
        )?;
        let node_id = agent_config.node_id.as_deref().structured(
            InvalidInputError::MissingMachineIdentity {
                field: "node_id".into(),
            },
        )?;

        info!("Running provisioner version: {PROVISIONER_VERSION}");
        debug!(
            "Using MAAS CLI '{}' with profile '{maas_user}'",
            agent_config.maas_cli
        );

        Ok(Self::with_maas(
            MaasCli::new(&agent_config.maas_cli, maas_user, node_id),
            Box::new(agent_config.disk_match),
        ))
    }

    pub fn with_maas(maas: MaasCli, disk_matcher: Box<dyn DiskMatcher>) -> Self {
        Self { maas, disk_matcher }
    }

    /// Validates `storage`, clears the machine and builds the topology.
    ///
    /// Nothing is rolled back on failure. Provisioning again starts by
    /// clearing whatever the failed run left behind.
    pub fn provision(&self, storage: &StorageConfig) -> Result<(), ProvisioningError> {
        validation::validate_storage_config(storage)?;

        info!("Provisioning storage of node '{}'", self.maas.node_id());
        let mut ctx = ProvisioningContext::default();
        storage::create_storage_topology(&mut ctx, storage, &self.maas, self.disk_matcher.as_ref())?;

        info!("Provisioned storage of node '{}'", self.maas.node_id());
        Ok(())
    }

    /// Removes partitions and filesystems from the machine's disks.
    pub fn clear(&self) -> Result<(), ProvisioningError> {
        storage::clear_storage(&self.maas)
    }
}

/// Loads the agent configuration. A missing file means the defaults.
pub fn load_agent_config(path: impl AsRef<Path>) -> Result<AgentConfig, ProvisioningError> {
    let path = path.as_ref();
    if !path.exists() {
        debug!(
            "No agent configuration at '{}', using defaults",
            path.display()
        );
        return Ok(AgentConfig::default());
    }

    let contents = fs::read_to_string(path).structured(InitializationError::LoadAgentConfig {
        path: path.display().to_string(),
    })?;
    serde_yaml::from_str(&contents).structured(InitializationError::ParseAgentConfig)
}

pub fn load_storage_config(path: impl AsRef<Path>) -> Result<StorageConfig, ProvisioningError> {
    let path = path.as_ref();
    info!(
        "Loading storage configuration from file at path '{}'",
        path.display()
    );

    let contents =
        fs::read_to_string(path).structured(InvalidInputError::LoadStorageConfiguration {
            path: path.display().to_string(),
        })?;
    validation::parse_storage_config(&contents)
}
