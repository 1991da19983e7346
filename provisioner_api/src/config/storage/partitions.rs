use serde::{Deserialize, Serialize};

use crate::{
    primitives::bytes::{self, ByteCount},
    BlockDeviceId,
};

/// A partition to create on a disk.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Partition {
    /// A unique identifier for the partition.
    pub id: BlockDeviceId,

    /// Id of the disk the partition is created on.
    pub device: BlockDeviceId,

    /// Position of the partition on the disk. Partitions are created in
    /// ascending order of this number.
    pub number: u32,

    /// Size of the partition. When absent, the partition takes all the space
    /// left on the disk.
    #[serde(
        default,
        deserialize_with = "bytes::deserialize_optional",
        skip_serializing_if = "Option::is_none"
    )]
    pub size: Option<ByteCount>,
}
