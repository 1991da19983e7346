use serde::{Deserialize, Serialize};

use crate::{is_default, BlockDeviceId};

/// A physical disk already known to the backend.
///
/// Disks are never created; they are matched against the machine's existing
/// block devices by serial number or device path.
#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq, Eq)]
pub struct Disk {
    /// A unique identifier for the disk. Partitions and composite devices
    /// refer to the disk through this id.
    pub id: BlockDeviceId,

    /// Serial number of the disk.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub serial: Option<String>,

    /// Device path of the disk, e.g. `/dev/sda` or a `/dev/disk/by-id` path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// New name to give the block device in the backend.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Whether the disk should be the boot disk. Only honored by machines
    /// booting in legacy BIOS mode.
    #[serde(default, skip_serializing_if = "is_default")]
    pub boot: bool,

    /// Partition table type, e.g. `gpt` or `msdos`. The backend picks the
    /// table type itself; this is kept for completeness of the document.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ptable: Option<String>,
}
