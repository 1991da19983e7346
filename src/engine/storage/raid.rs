use log::info;

use osutils::maas::{MaasCli, StorageTarget};
use provisioner_api::{
    config::StorageConfig,
    error::{BackendError, ProvisioningError, ReportError},
};

use crate::engine::context::ProvisioningContext;

/// Creates the software RAID arrays and registers the block device each one
/// exposes, so that later entries can build on it like on a disk.
#[tracing::instrument(skip_all)]
pub(super) fn create_raid_arrays(
    ctx: &mut ProvisioningContext,
    storage: &StorageConfig,
    maas: &MaasCli,
) -> Result<(), ProvisioningError> {
    for raid in storage.raids() {
        let members = raid
            .devices
            .iter()
            .map(|device| ctx.resolve(device).require(&raid.id, "devices"))
            .collect::<Result<Vec<StorageTarget>, _>>()?;
        let spares = raid
            .spare_devices
            .iter()
            .map(|device| ctx.resolve(device).require(&raid.id, "spare_devices"))
            .collect::<Result<Vec<StorageTarget>, _>>()?;

        info!(
            "Creating {} array '{}' from {} devices",
            raid.raidlevel,
            raid.id,
            members.len()
        );
        let array = maas
            .create_raid(&raid.name, raid.raidlevel, &members, &spares)
            .structured(BackendError::CreateRaid {
                raid: raid.id.clone(),
            })?;

        ctx.register_block_device(raid.id.clone(), array.virtual_device);
    }

    Ok(())
}
