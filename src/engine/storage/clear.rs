use log::{debug, info};

use osutils::maas::{BlockDeviceType, MaasCli};
use provisioner_api::error::{BackendError, ProvisioningError, ReportError};

/// Removes what earlier deployments left on the machine's physical disks:
/// every partition, and any filesystem placed directly on a disk.
///
/// Virtual devices are skipped; they disappear with the partitions and disks
/// they are built on. Running this on a clean machine makes no change.
#[tracing::instrument(skip_all)]
pub(super) fn clear_storage(maas: &MaasCli) -> Result<(), ProvisioningError> {
    info!("Clearing storage configuration of node '{}'", maas.node_id());

    let block_devices = maas
        .read_block_devices()
        .structured(BackendError::ReadBlockDevices)?;

    for block_device in block_devices
        .iter()
        .filter(|device| device.device_type == BlockDeviceType::Physical)
    {
        let id = block_device.id;
        debug!("Clearing block device '{}' ({id})", block_device.name);

        for partition in &block_device.partitions {
            maas.delete_partition(id, partition.id)
                .structured(BackendError::ClearBlockDevice { block_device: id })?;
        }

        let Some(filesystem) = &block_device.filesystem else {
            continue;
        };

        if filesystem.mount_point.is_some() {
            maas.unmount_block_device(id)
                .structured(BackendError::ClearBlockDevice { block_device: id })?;
        }
        maas.unformat_block_device(id)
            .structured(BackendError::ClearBlockDevice { block_device: id })?;
    }

    Ok(())
}
