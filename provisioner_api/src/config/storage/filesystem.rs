use serde::{Deserialize, Serialize};

use crate::BlockDeviceId;

/// A filesystem to create on a partition or block device.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Format {
    /// Id of the format entry. Mount entries refer to it, and by convention
    /// it is the id of the volume with a `_format` suffix.
    pub id: BlockDeviceId,

    /// Partition or block device to format.
    pub volume: BlockDeviceId,

    /// Filesystem type, as understood by the backend (`ext4`, `xfs`, `fat32`,
    /// `swap`, ...).
    pub fstype: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}
