use log::info;

use osutils::maas::MaasCli;
use provisioner_api::{
    config::StorageConfig,
    error::{BackendError, ProvisioningError, ReportError},
};

use crate::engine::context::{PartitionRef, ProvisioningContext};

/// Creates the partitions of the storage configuration in ascending order of
/// their number, so that each one lands in the position it was given.
#[tracing::instrument(skip_all)]
pub(super) fn create_partitions(
    ctx: &mut ProvisioningContext,
    storage: &StorageConfig,
    maas: &MaasCli,
) -> Result<(), ProvisioningError> {
    for partition in storage.partitions_by_number() {
        let block_device = ctx
            .require_device(&partition.id, "device", &partition.device)?
            .id;

        info!(
            "Creating partition '{}' (number {}) on '{}'",
            partition.id, partition.number, partition.device
        );
        let created = maas
            .create_partition(block_device, partition.size)
            .structured(BackendError::CreatePartition {
                partition: partition.id.clone(),
            })?;

        ctx.register_partition(
            partition.id.clone(),
            PartitionRef {
                partition_id: created.id,
                block_device_id: block_device,
            },
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use osutils::testutils::maas::RecordingRunner;
    use provisioner_api::error::{ConfigurationError, ErrorKind};

    use crate::engine::context::{test_utils::physical_device, Resolution};

    #[test]
    fn test_create_partitions_in_number_order() {
        let runner = RecordingRunner::default();
        for id in [31, 32, 33, 34] {
            runner.reply(
                "partitions create",
                &format!(r#"{{"id": {id}, "size": 0, "device_id": 0}}"#),
            );
        }
        let maas = MaasCli::with_runner(Box::new(runner.clone()), "admin", "node1");

        let mut ctx = ProvisioningContext::default()
            .with_block_device("sda", physical_device(1, "S1", "/dev/sda"))
            .with_block_device("sdb", physical_device(2, "S2", "/dev/sdb"));
        let storage: StorageConfig = serde_yaml::from_str(indoc::indoc! {r#"
            disks:
              - {id: sda, type: disk, serial: S1}
              - {id: sdb, type: disk, serial: S2}
              - {id: sda3, type: partition, device: sda, number: 3}
              - {id: sda1, type: partition, device: sda, number: 1, size: 512M}
              - {id: sdb1, type: partition, device: sdb, number: 1, size: 1.5G}
              - {id: sda2, type: partition, device: sda, number: 2, size: "10000"}
        "#})
        .unwrap();

        create_partitions(&mut ctx, &storage, &maas).unwrap();

        assert_eq!(
            runner.calls(),
            vec![
                "admin partitions create node1 1 size=512000000",
                "admin partitions create node1 2 size=1500000000",
                "admin partitions create node1 1 size=10000",
                "admin partitions create node1 1",
            ]
        );

        for (id, partition_id, block_device_id) in [
            ("sda1", 31, 1),
            ("sdb1", 32, 2),
            ("sda2", 33, 1),
            ("sda3", 34, 1),
        ] {
            assert_eq!(
                ctx.resolve(id),
                Resolution::Partition(PartitionRef {
                    partition_id,
                    block_device_id
                }),
                "{id}"
            );
        }
    }

    #[test]
    fn test_create_partition_on_unknown_disk() {
        let runner = RecordingRunner::default();
        let maas = MaasCli::with_runner(Box::new(runner.clone()), "admin", "node1");
        let storage: StorageConfig = serde_yaml::from_str(
            "disks: [{id: sdz1, type: partition, device: sdz, number: 1}]",
        )
        .unwrap();

        let error =
            create_partitions(&mut ProvisioningContext::default(), &storage, &maas).unwrap_err();
        assert_eq!(
            error.kind(),
            &ErrorKind::Configuration(ConfigurationError::UnresolvedReference {
                entry: "sdz1".into(),
                field: "device".into(),
                reference: "sdz".into(),
            })
        );
        assert!(runner.calls().is_empty());
    }
}
