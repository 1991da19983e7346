use log::info;

use osutils::maas::{CacheSet, MaasCli, StorageTarget};
use provisioner_api::{
    config::StorageConfig,
    error::{BackendError, ProvisioningError, ReportError, UnsupportedTopologyError},
};

use crate::engine::context::ProvisioningContext;

/// Finds the cache set whose cache device is `cache`.
///
/// MAAS supports a single cache device per cache set. That device is either
/// a whole block device (`physical`) or a partition. A cache set with any
/// other kind of cache device cannot be reasoned about and is an error.
pub(super) fn find_cache_set(
    cache_sets: &[CacheSet],
    cache: StorageTarget,
) -> Result<Option<&CacheSet>, ProvisioningError> {
    for cache_set in cache_sets {
        let device = &cache_set.cache_device;
        let matches = match device.device_type.as_str() {
            "physical" => cache == StorageTarget::BlockDevice(device.id),
            "partition" => {
                matches!(cache, StorageTarget::Partition { partition, .. } if partition == device.id)
            }
            other => {
                return Err(ProvisioningError::new(
                    UnsupportedTopologyError::UnknownCacheDeviceType {
                        device_type: other.into(),
                    },
                ))
            }
        };

        if matches {
            return Ok(Some(cache_set));
        }
    }

    Ok(None)
}

/// Creates the bcache devices, reusing the cache set of a cache device when
/// one already exists.
#[tracing::instrument(skip_all)]
pub(super) fn create_bcaches(
    ctx: &mut ProvisioningContext,
    storage: &StorageConfig,
    maas: &MaasCli,
) -> Result<(), ProvisioningError> {
    for bcache in storage.bcaches() {
        info!("Setting up bcache '{}'", bcache.id);

        let cache = ctx
            .resolve(&bcache.cache_device)
            .require(&bcache.id, "cache_device")?;
        let backing = ctx
            .resolve(&bcache.backing_device)
            .require(&bcache.id, "backing_device")?;

        // Cache sets created for earlier bcaches must be visible, so they are
        // read again every time.
        let cache_sets = maas
            .read_cache_sets()
            .structured(BackendError::ReadCacheSets)?;
        let cache_set = match find_cache_set(&cache_sets, cache)? {
            Some(cache_set) => {
                info!(
                    "Reusing cache set '{}' for bcache '{}'",
                    cache_set.name, bcache.id
                );
                cache_set.id
            }
            None => {
                maas.create_cache_set(cache)
                    .structured(BackendError::CreateCacheSet {
                        bcache: bcache.id.clone(),
                    })?
                    .id
            }
        };

        let created = maas
            .create_bcache(&bcache.name, cache_set, bcache.cache_mode, backing)
            .structured(BackendError::CreateBcache {
                bcache: bcache.id.clone(),
            })?;

        ctx.register_block_device(bcache.id.clone(), created.virtual_device);
    }

    Ok(())
}
