mod agent;
mod error;
pub mod storage;

pub use agent::{AgentConfig, DiskMatch};
pub use error::InvalidStorageConfigurationError;
pub use storage::{
    bcache::{Bcache, CacheMode},
    disks::Disk,
    filesystem::Format,
    lvm::{LogicalVolume, VolumeGroup},
    mountpoint::Mount,
    partitions::Partition,
    raid::{Raid, RaidLevel},
    EntryKind, StorageConfig, StorageEntry,
};
