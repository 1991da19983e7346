use std::collections::HashMap;

use osutils::maas::{BlockDevice, StorageTarget};
use provisioner_api::{
    error::{ConfigurationError, ProvisioningError},
    BlockDeviceId,
};

#[cfg(test)]
pub(crate) mod test_utils;

/// Where a partition from the storage configuration ended up in the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartitionRef {
    pub partition_id: u64,
    pub block_device_id: u64,
}

/// Outcome of looking up a configuration-local id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution<'a> {
    Partition(PartitionRef),
    Device(&'a BlockDevice),
    Unresolved { reference: &'a str },
}

impl Resolution<'_> {
    /// Turns the resolution into the backend target it names. `entry` and
    /// `field` locate the reference in the storage configuration and are
    /// reported when the reference did not resolve.
    #[track_caller]
    pub fn require(self, entry: &str, field: &str) -> Result<StorageTarget, ProvisioningError> {
        match self {
            Resolution::Partition(partition) => Ok(StorageTarget::Partition {
                block_device: partition.block_device_id,
                partition: partition.partition_id,
            }),
            Resolution::Device(device) => Ok(StorageTarget::BlockDevice(device.id)),
            Resolution::Unresolved { reference } => Err(ProvisioningError::new(
                ConfigurationError::UnresolvedReference {
                    entry: entry.into(),
                    field: field.into(),
                    reference: reference.into(),
                },
            )),
        }
    }
}

/// State of a single provisioning run: what every configuration-local id
/// turned into in the backend so far.
///
/// Stages run in order and only ever add to the maps, so a later stage sees
/// everything the earlier ones built.
#[derive(Debug, Default)]
pub struct ProvisioningContext {
    /// Disks, RAID arrays, bcaches and logical volumes.
    block_devices: HashMap<BlockDeviceId, BlockDevice>,

    partitions: HashMap<BlockDeviceId, PartitionRef>,

    /// Backend ids of the volume groups.
    volume_groups: HashMap<BlockDeviceId, u64>,
}

impl ProvisioningContext {
    /// Looks `id` up as a partition first, then as a block device.
    pub fn resolve<'a>(&'a self, id: &'a str) -> Resolution<'a> {
        if let Some(partition) = self.partitions.get(id) {
            Resolution::Partition(*partition)
        } else if let Some(device) = self.block_devices.get(id) {
            Resolution::Device(device)
        } else {
            Resolution::Unresolved { reference: id }
        }
    }

    pub fn resolve_device(&self, id: &str) -> Option<&BlockDevice> {
        self.block_devices.get(id)
    }

    /// Like `resolve_device`, but a missing device is a configuration error
    /// naming the entry and field that referred to it.
    #[track_caller]
    pub fn require_device(
        &self,
        entry: &str,
        field: &str,
        reference: &str,
    ) -> Result<&BlockDevice, ProvisioningError> {
        self.resolve_device(reference).ok_or_else(|| {
            ProvisioningError::new(ConfigurationError::UnresolvedReference {
                entry: entry.into(),
                field: field.into(),
                reference: reference.into(),
            })
        })
    }

    pub fn volume_group(&self, id: &str) -> Option<u64> {
        self.volume_groups.get(id).copied()
    }

    pub fn register_block_device(&mut self, id: impl Into<BlockDeviceId>, device: BlockDevice) {
        self.block_devices.insert(id.into(), device);
    }

    pub fn register_partition(&mut self, id: impl Into<BlockDeviceId>, partition: PartitionRef) {
        self.partitions.insert(id.into(), partition);
    }

    pub fn register_volume_group(&mut self, id: impl Into<BlockDeviceId>, volume_group: u64) {
        self.volume_groups.insert(id.into(), volume_group);
    }
}
