use log::{debug, info};

use osutils::maas::MaasCli;
use provisioner_api::{
    config::StorageConfig,
    error::{ProvisioningError, ProvisioningResultExt},
};

mod bcache;
mod clear;
pub mod disks;
mod filesystem;
mod lvm;
mod mount;
mod partitioning;
mod raid;

use super::context::ProvisioningContext;
use disks::DiskMatcher;

/// Builds the storage topology described by `storage` on the machine behind
/// `maas`, starting from a cleared machine.
///
/// Stages run in a fixed order and each one completes before the next
/// starts. The first failure aborts the run and leaves whatever was built so
/// far in place; the Clear stage of the next run removes it.
#[tracing::instrument(skip_all)]
pub(crate) fn create_storage_topology(
    ctx: &mut ProvisioningContext,
    storage: &StorageConfig,
    maas: &MaasCli,
    matcher: &dyn DiskMatcher,
) -> Result<(), ProvisioningError> {
    clear::clear_storage(maas).message("Clearing existing storage failed")?;

    disks::resolve_disks(ctx, storage, maas, matcher).message("Resolving disks failed")?;
    disks::update_disks(ctx, storage, maas).message("Updating disks failed")?;

    debug!("Creating block devices");
    partitioning::create_partitions(ctx, storage, maas)
        .message("Creating partitions failed")?;
    raid::create_raid_arrays(ctx, storage, maas).message("Creating RAID arrays failed")?;
    bcache::create_bcaches(ctx, storage, maas).message("Creating bcaches failed")?;
    lvm::create_volume_groups(ctx, storage, maas).message("Creating volume groups failed")?;
    lvm::create_logical_volumes(ctx, storage, maas)
        .message("Creating logical volumes failed")?;

    debug!("Creating filesystems");
    filesystem::apply_formats(ctx, storage, maas).message("Formatting volumes failed")?;
    mount::apply_mounts(ctx, storage, maas).message("Mounting volumes failed")?;

    info!("Storage topology of node '{}' is in place", maas.node_id());
    Ok(())
}

/// Runs the Clear stage alone.
pub(crate) fn clear_storage(maas: &MaasCli) -> Result<(), ProvisioningError> {
    clear::clear_storage(maas).message("Clearing existing storage failed")
}

#[cfg(test)]
mod tests {
    use super::*;

    use osutils::testutils::maas::RecordingRunner;
    use provisioner_api::{
        config::DiskMatch,
        error::{ConfigurationError, ErrorKind},
    };

    use crate::engine::context::{
        test_utils::{partition, physical_device},
        Resolution,
    };

    fn machine(runner: &RecordingRunner) -> MaasCli {
        MaasCli::with_runner(Box::new(runner.clone()), "admin", "node1")
    }

    fn storage(yaml: &str) -> StorageConfig {
        serde_yaml::from_str(yaml).unwrap()
    }

    #[test]
    fn test_single_disk_topology() {
        let runner = RecordingRunner::default();
        runner.always_reply(
            "block-devices read",
            &serde_json::to_string(&[physical_device(1, "S1", "/dev/sda")]).unwrap(),
        );
        runner.reply("partitions create", r#"{"id": 11, "device_id": 1}"#);

        let storage = storage(indoc::indoc! {r#"
            disks:
              - {id: disk0, type: disk, serial: S1}
              - {id: part0, type: partition, device: disk0, number: 1, size: 2G}
              - {id: part0_format, type: format, volume: part0, fstype: ext4, label: data}
              - {id: part0_mount, type: mount, device: part0_format, path: /data}
        "#});
        let mut ctx = ProvisioningContext::default();

        create_storage_topology(&mut ctx, &storage, &machine(&runner), &DiskMatch::Auto)
            .unwrap();

        assert_eq!(
            runner.calls(),
            vec![
                "admin block-devices read node1",
                "admin block-devices read node1",
                "admin partitions create node1 1 size=2000000000",
                "admin partition format node1 1 11 fstype=ext4 label=data",
                "admin partition mount node1 1 11 mount_point=/data",
            ]
        );
        assert!(matches!(ctx.resolve("part0"), Resolution::Partition(p) if p.partition_id == 11));
    }

    #[test]
    fn test_topology_replaces_earlier_layout() {
        let runner = RecordingRunner::default();
        let mut used = physical_device(1, "S1", "/dev/sda");
        used.partitions = vec![partition(5, 1)];
        runner.reply(
            "block-devices read",
            &serde_json::to_string(&[used]).unwrap(),
        );
        runner.reply(
            "block-devices read",
            &serde_json::to_string(&[physical_device(1, "S1", "/dev/sda")]).unwrap(),
        );
        runner.reply("volume-groups create", r#"{"id": 3, "name": "vg0"}"#);
        runner.reply(
            "volume-group create-logical-volume",
            r#"{"id": 70, "name": "vg0-root", "type": "virtual"}"#,
        );

        let storage = storage(indoc::indoc! {r#"
            disks:
              - {id: sda, type: disk, serial: S1, name: root-disk}
              - {id: vg0, type: lvm_volgroup, name: vg0, devices: [sda]}
              - {id: root, type: lvm_partition, name: root, volgroup: vg0, size: 100G}
              - {id: root_format, type: format, volume: root, fstype: xfs}
              - {id: root_mount, type: mount, device: root_format, path: /}
        "#});
        runner.reply(
            "block-device update",
            &serde_json::to_string(&physical_device(1, "S1", "/dev/root-disk")).unwrap(),
        );

        create_storage_topology(
            &mut ProvisioningContext::default(),
            &storage,
            &machine(&runner),
            &DiskMatch::Serial,
        )
        .unwrap();

        assert_eq!(
            runner.calls(),
            vec![
                "admin block-devices read node1",
                "admin partition delete node1 1 5",
                "admin block-devices read node1",
                "admin block-device update node1 1 name=root-disk",
                "admin volume-groups create node1 name=vg0 block_devices=1",
                "admin volume-group create-logical-volume node1 3 name=root size=100000000000",
                "admin block-device format node1 70 fstype=xfs",
                "admin block-device mount node1 70 mount_point=/",
            ]
        );
    }

    #[test]
    fn test_unresolved_format_volume_aborts_before_mounting() {
        let runner = RecordingRunner::default();
        runner.always_reply(
            "block-devices read",
            &serde_json::to_string(&[physical_device(1, "S1", "/dev/sda")]).unwrap(),
        );
        runner.reply("partitions create", r#"{"id": 11, "device_id": 1}"#);

        let storage = storage(indoc::indoc! {r#"
            disks:
              - {id: disk0, type: disk, serial: S1}
              - {id: part0, type: partition, device: disk0, number: 1}
              - {id: part0_format, type: format, volume: part9, fstype: ext4}
              - {id: part0_mount, type: mount, device: part0_format, path: /data}
        "#});

        let error = create_storage_topology(
            &mut ProvisioningContext::default(),
            &storage,
            &machine(&runner),
            &DiskMatch::Auto,
        )
        .unwrap_err();

        assert_eq!(
            error.kind(),
            &ErrorKind::Configuration(ConfigurationError::UnresolvedReference {
                entry: "part0_format".into(),
                field: "volume".into(),
                reference: "part9".into(),
            })
        );
        assert!(runner.calls_of("partition mount").is_empty());
        assert!(runner.calls_of("block-device mount").is_empty());
    }

    #[test]
    fn test_clear_only() {
        let runner = RecordingRunner::default();
        clear_storage(&machine(&runner)).unwrap();
        assert_eq!(runner.calls(), vec!["admin block-devices read node1"]);
    }
}
