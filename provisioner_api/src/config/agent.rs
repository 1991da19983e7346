use serde::{Deserialize, Serialize};

use crate::constants::DEFAULT_MAAS_CLI;

/// Settings of the agent that drives provisioning for one machine.
///
/// The machine identity can also be supplied on the command line, so both
/// `maas_user` and `node_id` may be absent from the file.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct AgentConfig {
    /// MAAS CLI profile to issue calls with.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maas_user: Option<String>,

    /// MAAS system id of the machine to provision.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_id: Option<String>,

    /// Command used to reach the MAAS CLI.
    #[serde(default = "default_maas_cli")]
    pub maas_cli: String,

    /// How disk entries are matched against the machine's block devices.
    #[serde(default)]
    pub disk_match: DiskMatch,
}

fn default_maas_cli() -> String {
    DEFAULT_MAAS_CLI.into()
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            maas_user: None,
            node_id: None,
            maas_cli: default_maas_cli(),
            disk_match: DiskMatch::default(),
        }
    }
}

/// Rule used to pair a `disk` entry with one of the machine's existing
/// block devices.
#[derive(Serialize, Deserialize, Debug, Default, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum DiskMatch {
    /// # Auto
    ///
    /// Match by serial number when the entry has one, by device path
    /// otherwise.
    #[default]
    Auto,

    /// # Serial
    ///
    /// Match by serial number only.
    Serial,

    /// # Path
    ///
    /// Match by device path only. Both the kernel path and the stable
    /// `/dev/disk/by-id` path of the block device are considered.
    Path,
}
