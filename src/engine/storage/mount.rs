use log::info;

use osutils::maas::{MaasCli, StorageTarget};
use provisioner_api::{
    config::StorageConfig,
    error::{BackendError, ConfigurationError, ProvisioningError, ReportError},
};

use crate::engine::context::ProvisioningContext;

/// Mounts the formatted volumes. A mount names a format entry, which in turn
/// names the volume to mount.
#[tracing::instrument(skip_all)]
pub(super) fn apply_mounts(
    ctx: &ProvisioningContext,
    storage: &StorageConfig,
    maas: &MaasCli,
) -> Result<(), ProvisioningError> {
    for mount in storage.mounts() {
        let volume = storage.mount_volume(mount).structured(
            ConfigurationError::UnresolvableMountDevice {
                mount: mount.id.clone(),
                device: mount.device.clone(),
            },
        )?;
        let target = ctx.resolve(volume).require(&mount.id, "device")?;

        info!("Mounting '{volume}' at '{}'", mount.path);
        let options = mount.options.as_deref();
        match target {
            StorageTarget::BlockDevice(block_device) => {
                maas.mount_block_device(block_device, &mount.path, options)
            }
            StorageTarget::Partition {
                block_device,
                partition,
            } => maas.mount_partition(block_device, partition, &mount.path, options),
        }
        .structured(BackendError::Mount {
            mount: mount.id.clone(),
        })?;
    }

    Ok(())
}
