use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

use crate::BlockDeviceId;

/// A bcache device: a backing device fronted by a fast cache device.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Bcache {
    pub id: BlockDeviceId,

    /// Name of the bcache device in the backend.
    pub name: String,

    /// Partition or block device holding the cache.
    pub cache_device: BlockDeviceId,

    /// Partition or block device holding the data.
    pub backing_device: BlockDeviceId,

    pub cache_mode: CacheMode,
}

/// Write policy of a bcache device.
#[derive(
    Serialize, Deserialize, Debug, Default, Clone, Copy, PartialEq, Eq, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum CacheMode {
    #[default]
    Writeback,
    Writethrough,
    Writearound,
}
