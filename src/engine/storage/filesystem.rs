use log::info;

use osutils::maas::{MaasCli, StorageTarget};
use provisioner_api::{
    config::StorageConfig,
    error::{BackendError, ProvisioningError, ReportError},
};

use crate::engine::context::ProvisioningContext;

#[tracing::instrument(skip_all)]
pub(super) fn apply_formats(
    ctx: &ProvisioningContext,
    storage: &StorageConfig,
    maas: &MaasCli,
) -> Result<(), ProvisioningError> {
    for format in storage.formats() {
        let target = ctx.resolve(&format.volume).require(&format.id, "volume")?;

        info!(
            "Formatting '{}' as {} for '{}'",
            format.volume, format.fstype, format.id
        );
        let label = format.label.as_deref();
        match target {
            StorageTarget::BlockDevice(block_device) => {
                maas.format_block_device(block_device, &format.fstype, label)
            }
            StorageTarget::Partition {
                block_device,
                partition,
            } => maas.format_partition(block_device, partition, &format.fstype, label),
        }
        .structured(BackendError::Format {
            format: format.id.clone(),
        })?;
    }

    Ok(())
}
