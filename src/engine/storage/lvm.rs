use log::info;

use osutils::maas::{MaasCli, StorageTarget};
use provisioner_api::{
    config::StorageConfig,
    error::{BackendError, ConfigurationError, ProvisioningError, ReportError},
};

use crate::engine::context::ProvisioningContext;

#[tracing::instrument(skip_all)]
pub(super) fn create_volume_groups(
    ctx: &mut ProvisioningContext,
    storage: &StorageConfig,
    maas: &MaasCli,
) -> Result<(), ProvisioningError> {
    for volume_group in storage.volume_groups() {
        let members = volume_group
            .devices
            .iter()
            .map(|device| ctx.resolve(device).require(&volume_group.id, "devices"))
            .collect::<Result<Vec<StorageTarget>, _>>()?;

        info!("Creating volume group '{}'", volume_group.id);
        let created = maas
            .create_volume_group(&volume_group.name, &members)
            .structured(BackendError::CreateVolumeGroup {
                volume_group: volume_group.id.clone(),
            })?;

        ctx.register_volume_group(volume_group.id.clone(), created.id);
    }

    Ok(())
}

/// Creates the logical volumes inside the volume groups created before and
/// registers the block device backing each one.
#[tracing::instrument(skip_all)]
pub(super) fn create_logical_volumes(
    ctx: &mut ProvisioningContext,
    storage: &StorageConfig,
    maas: &MaasCli,
) -> Result<(), ProvisioningError> {
    for logical_volume in storage.logical_volumes() {
        let volume_group = ctx.volume_group(&logical_volume.volgroup).structured(
            ConfigurationError::UnknownVolumeGroup {
                logical_volume: logical_volume.id.clone(),
                volume_group: logical_volume.volgroup.clone(),
            },
        )?;

        info!(
            "Creating logical volume '{}' in volume group '{}'",
            logical_volume.id, logical_volume.volgroup
        );
        let device = maas
            .create_logical_volume(volume_group, &logical_volume.name, logical_volume.size)
            .structured(BackendError::CreateLogicalVolume {
                logical_volume: logical_volume.id.clone(),
            })?;

        ctx.register_block_device(logical_volume.id.clone(), device);
    }

    Ok(())
}
