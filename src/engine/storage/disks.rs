use std::collections::HashMap;

use log::{info, warn};

use osutils::maas::{BlockDevice, BlockDeviceType, MaasCli};
use provisioner_api::{
    config::{Disk, DiskMatch, StorageConfig},
    error::{BackendError, ConfigurationError, ProvisioningError, ReportError},
};

use crate::engine::context::ProvisioningContext;

/// Rule deciding whether a `disk` entry describes a given block device.
pub trait DiskMatcher {
    fn matches(&self, disk: &Disk, device: &BlockDevice) -> bool;
}

impl DiskMatcher for DiskMatch {
    fn matches(&self, disk: &Disk, device: &BlockDevice) -> bool {
        match self {
            DiskMatch::Auto if disk.serial.is_some() => DiskMatch::Serial.matches(disk, device),
            DiskMatch::Auto => DiskMatch::Path.matches(disk, device),
            DiskMatch::Serial => disk.serial.is_some() && disk.serial == device.serial,
            DiskMatch::Path => disk
                .path
                .as_deref()
                .is_some_and(|path| device_paths(device).any(|candidate| candidate == path)),
        }
    }
}

/// Paths a `disk` entry may use for a block device. MAAS reports `path` as
/// the `/dev/disk/by-dname` link, so the kernel path is derived from `name`.
fn device_paths(device: &BlockDevice) -> impl Iterator<Item = String> + '_ {
    let by_name = (!device.name.is_empty())
        .then(|| {
            [
                format!("/dev/{}", device.name),
                format!("/dev/disk/by-dname/{}", device.name),
            ]
        })
        .into_iter()
        .flatten();

    [device.path.clone(), device.id_path.clone()]
        .into_iter()
        .flatten()
        .chain(by_name)
}

/// Pairs every `disk` entry with one of the machine's physical block devices
/// and registers it under the entry's id.
#[tracing::instrument(skip_all)]
pub(super) fn resolve_disks(
    ctx: &mut ProvisioningContext,
    storage: &StorageConfig,
    maas: &MaasCli,
    matcher: &dyn DiskMatcher,
) -> Result<(), ProvisioningError> {
    if storage.disks().next().is_none() {
        return Ok(());
    }

    let block_devices = maas
        .read_block_devices()
        .structured(BackendError::ReadBlockDevices)?;

    let mut matched: HashMap<u64, &str> = HashMap::new();
    for disk in storage.disks() {
        let device = block_devices
            .iter()
            .filter(|device| device.device_type == BlockDeviceType::Physical)
            .find(|device| matcher.matches(disk, device))
            .structured(ConfigurationError::UnmatchedDisk {
                disk: disk.id.clone(),
            })?;

        if let Some(first) = matched.insert(device.id, disk.id.as_str()) {
            return Err(ProvisioningError::new(
                ConfigurationError::DiskAlreadyMatched {
                    first: first.into(),
                    second: disk.id.clone(),
                    block_device: device.id,
                },
            ));
        }

        info!(
            "Disk '{}' is block device '{}' ({})",
            disk.id, device.name, device.id
        );
        ctx.register_block_device(disk.id.clone(), device.clone());
    }

    Ok(())
}

/// Applies the per-disk settings: boot disk selection and renaming.
#[tracing::instrument(skip_all)]
pub(super) fn update_disks(
    ctx: &mut ProvisioningContext,
    storage: &StorageConfig,
    maas: &MaasCli,
) -> Result<(), ProvisioningError> {
    for disk in storage.disks() {
        let block_device = ctx.require_device(&disk.id, "id", &disk.id)?.id;

        if disk.boot {
            warn!("Setting the boot disk only applies to machines booting in legacy BIOS mode");
            maas.set_boot_disk(block_device)
                .structured(BackendError::UpdateDisk {
                    disk: disk.id.clone(),
                })?;
        }

        if let Some(name) = &disk.name {
            info!("Renaming disk '{}' to '{name}'", disk.id);
            let updated = maas
                .update_block_device(block_device, &[("name", name.clone())])
                .structured(BackendError::UpdateDisk {
                    disk: disk.id.clone(),
                })?;
            ctx.register_block_device(disk.id.clone(), updated);
        }
    }

    Ok(())
}
