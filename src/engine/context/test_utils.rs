#![allow(dead_code)]
//! Builders for `ProvisioningContext` and backend records, to set up test
//! instances in a single expression.

use osutils::maas::{BlockDevice, BlockDeviceType, Filesystem, Partition};
use provisioner_api::BlockDeviceId;

use super::{PartitionRef, ProvisioningContext};

impl ProvisioningContext {
    pub(crate) fn with_block_device(
        mut self,
        id: impl Into<BlockDeviceId>,
        device: BlockDevice,
    ) -> Self {
        self.register_block_device(id, device);
        self
    }

    pub(crate) fn with_partition(
        mut self,
        id: impl Into<BlockDeviceId>,
        block_device_id: u64,
        partition_id: u64,
    ) -> Self {
        self.register_partition(
            id,
            PartitionRef {
                partition_id,
                block_device_id,
            },
        );
        self
    }

    pub(crate) fn with_volume_group(mut self, id: impl Into<BlockDeviceId>, backend_id: u64) -> Self {
        self.register_volume_group(id, backend_id);
        self
    }
}

/// A bare physical block device as MAAS reports it, named after the kernel
/// path `kernel_path`. MAAS itself reports the `/dev/disk/by-dname` link as
/// the device path.
pub(crate) fn physical_device(id: u64, serial: &str, kernel_path: &str) -> BlockDevice {
    let name = kernel_path.trim_start_matches("/dev/");
    BlockDevice {
        id,
        name: name.into(),
        device_type: BlockDeviceType::Physical,
        path: Some(format!("/dev/disk/by-dname/{name}")),
        id_path: Some(format!("/dev/disk/by-id/wwn-{serial}")),
        serial: Some(serial.into()),
        model: None,
        size: 1_000_000_000_000,
        filesystem: None,
        partitions: Vec::new(),
    }
}

/// A virtual block device, as exposed by a RAID array, a bcache or a logical
/// volume.
pub(crate) fn virtual_device(id: u64, name: &str) -> BlockDevice {
    BlockDevice {
        id,
        name: name.into(),
        device_type: BlockDeviceType::Virtual,
        path: Some(format!("/dev/disk/by-dname/{name}")),
        id_path: None,
        serial: None,
        model: None,
        size: 0,
        filesystem: None,
        partitions: Vec::new(),
    }
}

/// A filesystem mounted at `mount_point`, or just formatted when it is `None`.
pub(crate) fn filesystem(mount_point: Option<&str>) -> Filesystem {
    Filesystem {
        fstype: Some("ext4".into()),
        label: None,
        mount_point: mount_point.map(Into::into),
    }
}

pub(crate) fn partition(id: u64, device_id: u64) -> Partition {
    Partition {
        id,
        size: 1_000_000_000,
        device_id,
        filesystem: None,
    }
}
