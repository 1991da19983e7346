use std::collections::{hash_map::Entry, HashMap};

use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString};

use crate::{constants::FORMAT_ID_SUFFIX, BlockDeviceId};

use super::error::InvalidStorageConfigurationError;

pub mod bcache;
pub mod disks;
pub mod filesystem;
pub mod lvm;
pub mod mountpoint;
pub mod partitions;
pub mod raid;

use self::{
    bcache::Bcache, disks::Disk, filesystem::Format, lvm::LogicalVolume, lvm::VolumeGroup,
    mountpoint::Mount, partitions::Partition, raid::Raid,
};

/// Storage configuration of a machine: a flat list of typed entries that
/// refer to each other through their ids.
///
/// The list is unordered as far as construction goes; the order in which
/// entries are applied is decided by their kind.
#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq, Eq)]
pub struct StorageConfig {
    #[serde(default)]
    pub disks: Vec<StorageEntry>,
}

/// One entry of the storage configuration, tagged by its `type` field.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StorageEntry {
    Disk(Disk),
    Partition(Partition),
    Raid(Raid),
    Bcache(Bcache),
    LvmVolgroup(VolumeGroup),
    LvmPartition(LogicalVolume),
    Format(Format),
    Mount(Mount),

    /// Any entry type this provisioner does not handle. Such entries are
    /// skipped.
    #[serde(other)]
    Unsupported,
}

/// Kinds of storage entries, named after their `type` tag.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Display, EnumString, EnumIter)]
#[strum(serialize_all = "snake_case")]
pub enum EntryKind {
    Disk,
    Partition,
    Raid,
    Bcache,
    LvmVolgroup,
    LvmPartition,
    Format,
    Mount,
}

impl EntryKind {
    /// Position of the stage that builds entries of this kind. Entries can
    /// only build on top of entries from earlier stages.
    fn stage(self) -> u8 {
        match self {
            EntryKind::Disk => 0,
            EntryKind::Partition => 1,
            EntryKind::Raid => 2,
            EntryKind::Bcache => 3,
            EntryKind::LvmVolgroup => 4,
            EntryKind::LvmPartition => 5,
            EntryKind::Format => 6,
            EntryKind::Mount => 7,
        }
    }

    /// Kinds whose entries may stack on an earlier entry of the same kind,
    /// as entries within a stage are applied in document order.
    fn stacks_on_itself(self) -> bool {
        matches!(self, EntryKind::Raid | EntryKind::Bcache)
    }

    /// Whether entries of this kind are block devices or partitions that
    /// can hold data.
    fn is_volume(self) -> bool {
        !matches!(
            self,
            EntryKind::LvmVolgroup | EntryKind::Format | EntryKind::Mount
        )
    }
}

impl StorageEntry {
    /// Returns the kind of the entry, or `None` for unsupported entries.
    pub fn kind(&self) -> Option<EntryKind> {
        Some(match self {
            Self::Disk(_) => EntryKind::Disk,
            Self::Partition(_) => EntryKind::Partition,
            Self::Raid(_) => EntryKind::Raid,
            Self::Bcache(_) => EntryKind::Bcache,
            Self::LvmVolgroup(_) => EntryKind::LvmVolgroup,
            Self::LvmPartition(_) => EntryKind::LvmPartition,
            Self::Format(_) => EntryKind::Format,
            Self::Mount(_) => EntryKind::Mount,
            Self::Unsupported => return None,
        })
    }

    /// Returns the configuration-local id of the entry.
    pub fn id(&self) -> Option<&BlockDeviceId> {
        Some(match self {
            Self::Disk(disk) => &disk.id,
            Self::Partition(partition) => &partition.id,
            Self::Raid(raid) => &raid.id,
            Self::Bcache(bcache) => &bcache.id,
            Self::LvmVolgroup(volume_group) => &volume_group.id,
            Self::LvmPartition(logical_volume) => &logical_volume.id,
            Self::Format(format) => &format.id,
            Self::Mount(mount) => &mount.id,
            Self::Unsupported => return None,
        })
    }
}

impl StorageConfig {
    /// Returns the entries of the given kind, in document order.
    pub fn entries_of_kind(&self, kind: EntryKind) -> impl Iterator<Item = &StorageEntry> {
        self.disks
            .iter()
            .filter(move |entry| entry.kind() == Some(kind))
    }

    pub fn disks(&self) -> impl Iterator<Item = &Disk> {
        self.entries_of_kind(EntryKind::Disk)
            .filter_map(|entry| match entry {
                StorageEntry::Disk(disk) => Some(disk),
                _ => None,
            })
    }

    pub fn partitions(&self) -> impl Iterator<Item = &Partition> {
        self.entries_of_kind(EntryKind::Partition)
            .filter_map(|entry| match entry {
                StorageEntry::Partition(partition) => Some(partition),
                _ => None,
            })
    }

    /// Returns the partitions sorted by their number. Partitions sharing a
    /// number keep their document order.
    pub fn partitions_by_number(&self) -> Vec<&Partition> {
        let mut partitions = self.partitions().collect::<Vec<_>>();
        partitions.sort_by_key(|partition| partition.number);
        partitions
    }

    pub fn raids(&self) -> impl Iterator<Item = &Raid> {
        self.entries_of_kind(EntryKind::Raid)
            .filter_map(|entry| match entry {
                StorageEntry::Raid(raid) => Some(raid),
                _ => None,
            })
    }

    pub fn bcaches(&self) -> impl Iterator<Item = &Bcache> {
        self.entries_of_kind(EntryKind::Bcache)
            .filter_map(|entry| match entry {
                StorageEntry::Bcache(bcache) => Some(bcache),
                _ => None,
            })
    }

    pub fn volume_groups(&self) -> impl Iterator<Item = &VolumeGroup> {
        self.entries_of_kind(EntryKind::LvmVolgroup)
            .filter_map(|entry| match entry {
                StorageEntry::LvmVolgroup(volume_group) => Some(volume_group),
                _ => None,
            })
    }

    pub fn logical_volumes(&self) -> impl Iterator<Item = &LogicalVolume> {
        self.entries_of_kind(EntryKind::LvmPartition)
            .filter_map(|entry| match entry {
                StorageEntry::LvmPartition(logical_volume) => Some(logical_volume),
                _ => None,
            })
    }

    pub fn formats(&self) -> impl Iterator<Item = &Format> {
        self.entries_of_kind(EntryKind::Format)
            .filter_map(|entry| match entry {
                StorageEntry::Format(format) => Some(format),
                _ => None,
            })
    }

    pub fn mounts(&self) -> impl Iterator<Item = &Mount> {
        self.entries_of_kind(EntryKind::Mount)
            .filter_map(|entry| match entry {
                StorageEntry::Mount(mount) => Some(mount),
                _ => None,
            })
    }

    /// Returns the id of the volume a mount entry refers to.
    ///
    /// The mount's `device` names a format entry. When a format entry with
    /// that id exists its `volume` is used, even if the format id carries a
    /// `_format` suffix naming some other entry: `{id: root_format, volume:
    /// lv0}` mounts `lv0`, not `root`. This deliberately departs from the
    /// suffix convention, which only applies when no format entry matches.
    pub fn mount_volume<'a>(&'a self, mount: &'a Mount) -> Option<&'a str> {
        self.formats()
            .find(|format| format.id == mount.device)
            .map(|format| format.volume.as_str())
            .or_else(|| mount.device.strip_suffix(FORMAT_ID_SUFFIX))
    }

    /// Validates the storage configuration.
    ///
    /// Checks that ids are unique, that every reference names an entry that
    /// exists and is built at an earlier stage than the entry referring to
    /// it, and that partition numbers do not collide on a disk.
    pub fn validate(&self) -> Result<(), InvalidStorageConfigurationError> {
        let mut index: HashMap<&str, (EntryKind, usize)> = HashMap::new();
        for (position, entry) in self.disks.iter().enumerate() {
            let (Some(id), Some(kind)) = (entry.id(), entry.kind()) else {
                continue;
            };

            if index.insert(id.as_str(), (kind, position)).is_some() {
                return Err(InvalidStorageConfigurationError::DuplicateId { id: id.clone() });
            }
        }

        let validator = ReferenceValidator { index: &index };

        let mut numbers: HashMap<(&str, u32), &str> = HashMap::new();
        for partition in self.partitions() {
            match index.get(partition.device.as_str()) {
                None => {
                    return Err(InvalidStorageConfigurationError::UnknownReference {
                        entry: partition.id.clone(),
                        field: "device".into(),
                        reference: partition.device.clone(),
                    })
                }
                Some((EntryKind::Disk, _)) => (),
                Some((kind, _)) => {
                    return Err(InvalidStorageConfigurationError::PartitionParentNotDisk {
                        partition: partition.id.clone(),
                        device: partition.device.clone(),
                        kind: kind.to_string(),
                    })
                }
            }

            match numbers.entry((partition.device.as_str(), partition.number)) {
                Entry::Occupied(existing) => {
                    return Err(InvalidStorageConfigurationError::DuplicatePartitionNumber {
                        device: partition.device.clone(),
                        number: partition.number,
                        first: existing.get().to_string(),
                        second: partition.id.clone(),
                    })
                }
                Entry::Vacant(slot) => {
                    slot.insert(partition.id.as_str());
                }
            }
        }

        for raid in self.raids() {
            for device in &raid.devices {
                validator.check_volume(&raid.id, "devices", device)?;
            }
            for device in &raid.spare_devices {
                validator.check_volume(&raid.id, "spare_devices", device)?;
            }
        }

        for bcache in self.bcaches() {
            validator.check_volume(&bcache.id, "cache_device", &bcache.cache_device)?;
            validator.check_volume(&bcache.id, "backing_device", &bcache.backing_device)?;
        }

        for volume_group in self.volume_groups() {
            for device in &volume_group.devices {
                validator.check_volume(&volume_group.id, "devices", device)?;
            }
        }

        for logical_volume in self.logical_volumes() {
            if !matches!(
                index.get(logical_volume.volgroup.as_str()),
                Some((EntryKind::LvmVolgroup, _))
            ) {
                return Err(InvalidStorageConfigurationError::UnknownVolumeGroup {
                    logical_volume: logical_volume.id.clone(),
                    volume_group: logical_volume.volgroup.clone(),
                });
            }
        }

        for format in self.formats() {
            validator.check_volume(&format.id, "volume", &format.volume)?;
        }

        for mount in self.mounts() {
            let volume = self.mount_volume(mount).ok_or_else(|| {
                InvalidStorageConfigurationError::UnknownMountDevice {
                    mount: mount.id.clone(),
                    device: mount.device.clone(),
                }
            })?;
            if !index.contains_key(volume) {
                return Err(InvalidStorageConfigurationError::UnknownMountDevice {
                    mount: mount.id.clone(),
                    device: mount.device.clone(),
                });
            }
            validator.check_volume(&mount.id, "device", volume)?;
        }

        Ok(())
    }
}

struct ReferenceValidator<'a> {
    index: &'a HashMap<&'a str, (EntryKind, usize)>,
}

impl ReferenceValidator<'_> {
    /// Checks that `reference`, found in `field` of entry `entry`, names a
    /// volume that exists by the time `entry` is built.
    fn check_volume(
        &self,
        entry: &str,
        field: &str,
        reference: &str,
    ) -> Result<(), InvalidStorageConfigurationError> {
        let Some(&(kind, position)) = self.index.get(reference) else {
            return Err(InvalidStorageConfigurationError::UnknownReference {
                entry: entry.into(),
                field: field.into(),
                reference: reference.into(),
            });
        };

        if !kind.is_volume() {
            return Err(InvalidStorageConfigurationError::ReferenceNotAVolume {
                entry: entry.into(),
                field: field.into(),
                reference: reference.into(),
                kind: kind.to_string(),
            });
        }

        let Some(&(entry_kind, entry_position)) = self.index.get(entry) else {
            return Ok(());
        };

        let built_before = kind.stage() < entry_kind.stage()
            || (kind == entry_kind && kind.stacks_on_itself() && position < entry_position);
        if !built_before {
            return Err(InvalidStorageConfigurationError::ReferenceOutOfOrder {
                entry: entry.into(),
                field: field.into(),
                reference: reference.into(),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::str::FromStr;

    use strum::IntoEnumIterator;

    use crate::{
        config::{CacheMode, RaidLevel},
        primitives::bytes::ByteCount,
    };

    fn parse(yaml: &str) -> StorageConfig {
        serde_yaml::from_str(yaml).unwrap()
    }

    fn sample() -> StorageConfig {
        parse(indoc::indoc! {r#"
            disks:
              - id: disk0
                type: disk
                serial: S3Z9NB0K
                boot: true
                name: root-disk
              - id: disk1
                type: disk
                path: /dev/sdb
              - id: part2
                type: partition
                device: disk0
                number: 2
              - id: part1
                type: partition
                device: disk0
                number: 1
                size: 2G
              - id: part3
                type: partition
                device: disk1
                number: 1
                size: ""
              - id: cache0
                type: bcache
                name: bcache0
                cache_device: part3
                backing_device: part2
                cache_mode: writethrough
              - id: vg0
                type: lvm_volgroup
                name: vg0
                devices: [cache0]
              - id: lv0
                type: lvm_partition
                name: lv0
                volgroup: vg0
                size: 500M
              - id: crypt0
                type: dm_crypt
                volume: lv0
              - id: part1_format
                type: format
                volume: part1
                fstype: ext4
                label: root
              - id: lv0_format
                type: format
                volume: lv0
                fstype: xfs
              - id: part1_mount
                type: mount
                device: part1_format
                path: /
              - id: lv0_mount
                type: mount
                device: lv0_format
                path: /srv
                options: noatime
        "#})
    }

    #[test]
    fn test_parse_entries() {
        let config = sample();
        assert_eq!(config.disks.len(), 13);
        assert_eq!(config.disks[8], StorageEntry::Unsupported);

        let disk = config.disks().next().unwrap();
        assert_eq!(disk.serial.as_deref(), Some("S3Z9NB0K"));
        assert!(disk.boot);
        assert_eq!(disk.name.as_deref(), Some("root-disk"));

        let bcache = config.bcaches().next().unwrap();
        assert_eq!(bcache.cache_mode, CacheMode::Writethrough);
        assert_eq!(bcache.cache_mode.to_string(), "writethrough");

        let lv = config.logical_volumes().next().unwrap();
        assert_eq!(lv.size, Some(ByteCount(500_000_000)));

        let mount = config.mounts().nth(1).unwrap();
        assert_eq!(mount.options.as_deref(), Some("noatime"));
        assert_eq!(config.formats().nth(1).unwrap().label, None);
    }

    #[test]
    fn test_missing_required_field() {
        let result = serde_yaml::from_str::<StorageConfig>(indoc::indoc! {r#"
            disks:
              - id: cache0
                type: bcache
                name: bcache0
                cache_device: part3
                cache_mode: writeback
        "#});
        assert!(result.unwrap_err().to_string().contains("backing_device"));
    }

    #[test]
    fn test_entries_of_kind() {
        let config = sample();

        let ids = |kind| {
            config
                .entries_of_kind(kind)
                .map(|entry| entry.id().unwrap().as_str())
                .collect::<Vec<_>>()
        };

        assert_eq!(ids(EntryKind::Disk), vec!["disk0", "disk1"]);
        assert_eq!(ids(EntryKind::Partition), vec!["part2", "part1", "part3"]);
        assert_eq!(ids(EntryKind::Raid), Vec::<&str>::new());
        assert_eq!(ids(EntryKind::Format), vec!["part1_format", "lv0_format"]);
        assert_eq!(ids(EntryKind::Mount), vec!["part1_mount", "lv0_mount"]);

        // Unsupported entries never show up
        let total: usize = EntryKind::iter()
            .map(|kind| config.entries_of_kind(kind).count())
            .sum();
        assert_eq!(total, 12);

        assert_eq!(EntryKind::from_str("lvm_volgroup").unwrap(), EntryKind::LvmVolgroup);
        assert_eq!(EntryKind::LvmPartition.to_string(), "lvm_partition");
    }

    #[test]
    fn test_partitions_by_number() {
        let config = sample();
        let ordered = config
            .partitions_by_number()
            .into_iter()
            .map(|p| (p.id.as_str(), p.number))
            .collect::<Vec<_>>();

        // Stable: part1 and part3 both have number 1 and keep document order
        assert_eq!(ordered, vec![("part1", 1), ("part3", 1), ("part2", 2)]);

        let part2 = config.partitions().next().unwrap();
        assert_eq!(part2.size, None);
        let part3 = config.partitions().nth(2).unwrap();
        assert_eq!(part3.size, None);
    }

    #[test]
    fn test_mount_volume() {
        let config = sample();
        let mounts = config.mounts().collect::<Vec<_>>();
        assert_eq!(config.mount_volume(mounts[0]), Some("part1"));
        assert_eq!(config.mount_volume(mounts[1]), Some("lv0"));

        // Falls back to stripping the suffix when no format entry matches
        let orphan = Mount {
            id: "m".into(),
            device: "data_format".into(),
            path: "/data".into(),
            options: None,
        };
        assert_eq!(config.mount_volume(&orphan), Some("data"));

        let bare = Mount {
            device: "data".into(),
            ..orphan
        };
        assert_eq!(config.mount_volume(&bare), None);

        // The format entry wins over what its suffix suggests
        let config = parse(indoc::indoc! {r#"
            disks:
              - {id: sda, type: disk, serial: S1}
              - {id: root, type: partition, device: sda, number: 1}
              - {id: sdb, type: disk, serial: S2}
              - {id: data, type: partition, device: sdb, number: 1}
              - {id: root_format, type: format, volume: data, fstype: ext4}
              - {id: root_mount, type: mount, device: root_format, path: /}
        "#});
        let mount = config.mounts().next().unwrap();
        assert_eq!(config.mount_volume(mount), Some("data"));
    }

    #[test]
    fn test_validate_sample() {
        sample().validate().unwrap();
        StorageConfig::default().validate().unwrap();
    }

    #[test]
    fn test_validate_raid() {
        let config = parse(indoc::indoc! {r#"
            disks:
              - {id: sda, type: disk, path: /dev/sda}
              - {id: sdb, type: disk, path: /dev/sdb}
              - {id: sda1, type: partition, device: sda, number: 1}
              - {id: sdb1, type: partition, device: sdb, number: 1}
              - {id: md0, type: raid, name: md0, raidlevel: 1, devices: [sda1, sdb1]}
              - {id: md1, type: raid, name: md1, raidlevel: raid0, devices: [md0]}
              - {id: md1_format, type: format, volume: md1, fstype: ext4}
        "#});
        config.validate().unwrap();
        assert_eq!(config.raids().nth(1).unwrap().raidlevel, RaidLevel::Raid0);
    }

    #[test]
    fn test_validate_errors() {
        let check = |yaml: &str, expected: InvalidStorageConfigurationError| {
            assert_eq!(parse(yaml).validate().unwrap_err(), expected, "{yaml}");
        };

        check(
            indoc::indoc! {r#"
                disks:
                  - {id: sda, type: disk}
                  - {id: sda, type: partition, device: sda, number: 1}
            "#},
            InvalidStorageConfigurationError::DuplicateId { id: "sda".into() },
        );

        check(
            indoc::indoc! {r#"
                disks:
                  - {id: sda, type: disk}
                  - {id: p1, type: partition, device: sda, number: 1}
                  - {id: p2, type: partition, device: sda, number: 1}
            "#},
            InvalidStorageConfigurationError::DuplicatePartitionNumber {
                device: "sda".into(),
                number: 1,
                first: "p1".into(),
                second: "p2".into(),
            },
        );

        check(
            indoc::indoc! {r#"
                disks:
                  - {id: p1, type: partition, device: sdz, number: 1}
            "#},
            InvalidStorageConfigurationError::UnknownReference {
                entry: "p1".into(),
                field: "device".into(),
                reference: "sdz".into(),
            },
        );

        check(
            indoc::indoc! {r#"
                disks:
                  - {id: sda, type: disk}
                  - {id: p1, type: partition, device: sda, number: 1}
                  - {id: p2, type: partition, device: p1, number: 2}
            "#},
            InvalidStorageConfigurationError::PartitionParentNotDisk {
                partition: "p2".into(),
                device: "p1".into(),
                kind: "partition".into(),
            },
        );

        check(
            indoc::indoc! {r#"
                disks:
                  - {id: sda, type: disk}
                  - {id: p1, type: partition, device: sda, number: 1}
                  - {id: p1_format, type: format, volume: p9, fstype: ext4}
            "#},
            InvalidStorageConfigurationError::UnknownReference {
                entry: "p1_format".into(),
                field: "volume".into(),
                reference: "p9".into(),
            },
        );

        // A RAID array cannot sit on a bcache, which is built later
        check(
            indoc::indoc! {r#"
                disks:
                  - {id: sda, type: disk}
                  - {id: sdb, type: disk}
                  - {id: bc0, type: bcache, name: bc0, cache_device: sda, backing_device: sdb, cache_mode: writeback}
                  - {id: md0, type: raid, name: md0, raidlevel: 1, devices: [bc0, sdb]}
            "#},
            InvalidStorageConfigurationError::ReferenceOutOfOrder {
                entry: "md0".into(),
                field: "devices".into(),
                reference: "bc0".into(),
            },
        );

        // Stacked arrays must be declared in build order
        check(
            indoc::indoc! {r#"
                disks:
                  - {id: sda, type: disk}
                  - {id: md1, type: raid, name: md1, raidlevel: 0, devices: [md0]}
                  - {id: md0, type: raid, name: md0, raidlevel: 0, devices: [sda]}
            "#},
            InvalidStorageConfigurationError::ReferenceOutOfOrder {
                entry: "md1".into(),
                field: "devices".into(),
                reference: "md0".into(),
            },
        );

        check(
            indoc::indoc! {r#"
                disks:
                  - {id: sda, type: disk}
                  - {id: vg0, type: lvm_volgroup, name: vg0, devices: [sda]}
                  - {id: vg0_format, type: format, volume: vg0, fstype: ext4}
            "#},
            InvalidStorageConfigurationError::ReferenceNotAVolume {
                entry: "vg0_format".into(),
                field: "volume".into(),
                reference: "vg0".into(),
                kind: "lvm_volgroup".into(),
            },
        );

        check(
            indoc::indoc! {r#"
                disks:
                  - {id: sda, type: disk}
                  - {id: lv0, type: lvm_partition, name: lv0, volgroup: sda}
            "#},
            InvalidStorageConfigurationError::UnknownVolumeGroup {
                logical_volume: "lv0".into(),
                volume_group: "sda".into(),
            },
        );

        check(
            indoc::indoc! {r#"
                disks:
                  - {id: sda, type: disk}
                  - {id: sda_mount, type: mount, device: sda, path: /data}
            "#},
            InvalidStorageConfigurationError::UnknownMountDevice {
                mount: "sda_mount".into(),
                device: "sda".into(),
            },
        );

        check(
            indoc::indoc! {r#"
                disks:
                  - {id: sda, type: disk}
                  - {id: m, type: mount, device: sdb_format, path: /data}
            "#},
            InvalidStorageConfigurationError::UnknownMountDevice {
                mount: "m".into(),
                device: "sdb_format".into(),
            },
        );
    }
}
