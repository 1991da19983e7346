use serde::{Deserialize, Serialize};

use crate::{
    primitives::bytes::{self, ByteCount},
    BlockDeviceId,
};

/// An LVM volume group spanning one or more partitions or block devices.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct VolumeGroup {
    pub id: BlockDeviceId,

    /// Name of the volume group in the backend.
    pub name: String,

    /// Partitions or block devices that become physical volumes.
    pub devices: Vec<BlockDeviceId>,
}

/// A logical volume carved out of a volume group.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct LogicalVolume {
    pub id: BlockDeviceId,

    /// Name of the logical volume in the backend.
    pub name: String,

    /// Id of the `lvm_volgroup` entry to create the volume in.
    pub volgroup: BlockDeviceId,

    /// Size of the volume. When absent, the backend decides, which usually
    /// means all free space of the group.
    #[serde(
        default,
        deserialize_with = "bytes::deserialize_optional",
        skip_serializing_if = "Option::is_none"
    )]
    pub size: Option<ByteCount>,
}
