use serde::{Deserialize, Serialize};

use crate::BlockDeviceId;

/// Where a formatted volume is mounted on the deployed machine.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Mount {
    pub id: BlockDeviceId,

    /// Id of the format entry whose volume gets mounted.
    pub device: BlockDeviceId,

    /// Absolute mount path.
    pub path: String,

    /// Mount options, comma-separated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<String>,
}
