//! Calls into the MAAS command line client.
//!
//! Every call has the shape
//! `maas <profile> <resource> <action> <node-id> [<object-id> ...] [<key>=<value> ...]`
//! and, on success, prints the affected object as JSON.

use anyhow::{Context, Error};
use log::debug;
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use provisioner_api::{
    config::{CacheMode, RaidLevel},
    primitives::bytes::ByteCount,
};

mod process;

pub use process::{CliFailure, ProcessRunner};

#[cfg(any(test, feature = "test-utilities"))]
pub(crate) use process::explain;

/// Runs the MAAS CLI. The arguments exclude the program itself.
pub trait CliRunner {
    /// Runs the CLI and returns what it printed on stdout. A non-zero exit
    /// status is an error carrying the command line and all captured output.
    fn run(&self, args: &[String]) -> Result<String, Error>;
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BlockDeviceType {
    Physical,
    Virtual,
    #[serde(other)]
    Other,
}

#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq, Eq)]
pub struct Filesystem {
    #[serde(default)]
    pub fstype: Option<String>,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub mount_point: Option<String>,
}

/// A block device of the machine, as reported by MAAS.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct BlockDevice {
    pub id: u64,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type")]
    pub device_type: BlockDeviceType,
    #[serde(default)]
    pub path: Option<String>,

    /// Stable path of the device, usually under `/dev/disk/by-id`.
    #[serde(default)]
    pub id_path: Option<String>,
    #[serde(default)]
    pub serial: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub filesystem: Option<Filesystem>,
    #[serde(default)]
    pub partitions: Vec<Partition>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Partition {
    pub id: u64,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub device_id: u64,
    #[serde(default)]
    pub filesystem: Option<Filesystem>,
}

/// Device holding the cache of a cache set. `device_type` is `physical` for
/// a whole block device and `partition` for a partition.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct CacheDevice {
    pub id: u64,
    #[serde(rename = "type")]
    pub device_type: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct CacheSet {
    pub id: u64,
    #[serde(default)]
    pub name: String,
    pub cache_device: CacheDevice,
}

/// A device MAAS builds out of other devices, such as a bcache or a RAID
/// array. The block device it exposes is `virtual_device`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct CompositeDevice {
    pub id: u64,
    #[serde(default)]
    pub name: String,
    pub virtual_device: BlockDevice,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct VolumeGroup {
    pub id: u64,
    #[serde(default)]
    pub name: String,
}

/// Something that can be formatted, mounted or built upon: a whole block
/// device or a partition of one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageTarget {
    BlockDevice(u64),
    Partition { block_device: u64, partition: u64 },
}

/// Gateway to the MAAS storage API of a single machine.
pub struct MaasCli {
    runner: Box<dyn CliRunner>,
    profile: String,
    node_id: String,
}

impl MaasCli {
    /// Creates a gateway that spawns `program` for every call.
    pub fn new(
        program: impl Into<String>,
        profile: impl Into<String>,
        node_id: impl Into<String>,
    ) -> Self {
        Self::with_runner(Box::new(ProcessRunner::new(program)), profile, node_id)
    }

    pub fn with_runner(
        runner: Box<dyn CliRunner>,
        profile: impl Into<String>,
        node_id: impl Into<String>,
    ) -> Self {
        Self {
            runner,
            profile: profile.into(),
            node_id: node_id.into(),
        }
    }

    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    fn call(
        &self,
        resource: &str,
        action: &str,
        ids: &[u64],
        params: &[(&str, String)],
    ) -> Result<String, Error> {
        let args = [self.profile.as_str(), resource, action, self.node_id.as_str()]
            .into_iter()
            .map(String::from)
            .chain(ids.iter().map(u64::to_string))
            .chain(params.iter().map(|(key, value)| format!("{key}={value}")))
            .collect::<Vec<_>>();

        debug!("Calling MAAS: {}", args.join(" "));
        self.runner.run(&args)
    }

    fn call_json<T: DeserializeOwned>(
        &self,
        resource: &str,
        action: &str,
        ids: &[u64],
        params: &[(&str, String)],
    ) -> Result<T, Error> {
        let output = self.call(resource, action, ids, params)?;
        serde_json::from_str(&output)
            .with_context(|| format!("Failed to parse reply of '{resource} {action}'"))
    }

    pub fn read_block_devices(&self) -> Result<Vec<BlockDevice>, Error> {
        self.call_json("block-devices", "read", &[], &[])
            .context("Failed to read block devices")
    }

    pub fn delete_partition(&self, block_device: u64, partition: u64) -> Result<(), Error> {
        self.call("partition", "delete", &[block_device, partition], &[])
            .with_context(|| {
                format!("Failed to delete partition {partition} of block device {block_device}")
            })?;
        Ok(())
    }

    pub fn unmount_block_device(&self, block_device: u64) -> Result<(), Error> {
        self.call("block-device", "unmount", &[block_device], &[])
            .with_context(|| format!("Failed to unmount block device {block_device}"))?;
        Ok(())
    }

    pub fn unformat_block_device(&self, block_device: u64) -> Result<(), Error> {
        self.call("block-device", "unformat", &[block_device], &[])
            .with_context(|| format!("Failed to unformat block device {block_device}"))?;
        Ok(())
    }

    pub fn set_boot_disk(&self, block_device: u64) -> Result<(), Error> {
        self.call("block-device", "set-boot-disk", &[block_device], &[])
            .with_context(|| format!("Failed to set block device {block_device} as boot disk"))?;
        Ok(())
    }

    /// Updates settings of a block device, e.g. its name.
    pub fn update_block_device(
        &self,
        block_device: u64,
        settings: &[(&str, String)],
    ) -> Result<BlockDevice, Error> {
        self.call_json("block-device", "update", &[block_device], settings)
            .with_context(|| format!("Failed to update block device {block_device}"))
    }

    /// Creates a partition at the end of a block device. Without a size the
    /// partition takes all remaining space.
    pub fn create_partition(
        &self,
        block_device: u64,
        size: Option<ByteCount>,
    ) -> Result<Partition, Error> {
        let params = size
            .map(|size| vec![("size", size.to_string())])
            .unwrap_or_default();
        self.call_json("partitions", "create", &[block_device], &params)
            .with_context(|| format!("Failed to create partition on block device {block_device}"))
    }

    pub fn format_block_device(
        &self,
        block_device: u64,
        fstype: &str,
        label: Option<&str>,
    ) -> Result<(), Error> {
        self.call(
            "block-device",
            "format",
            &[block_device],
            &format_params(fstype, label),
        )
        .with_context(|| format!("Failed to format block device {block_device}"))?;
        Ok(())
    }

    pub fn format_partition(
        &self,
        block_device: u64,
        partition: u64,
        fstype: &str,
        label: Option<&str>,
    ) -> Result<(), Error> {
        self.call(
            "partition",
            "format",
            &[block_device, partition],
            &format_params(fstype, label),
        )
        .with_context(|| {
            format!("Failed to format partition {partition} of block device {block_device}")
        })?;
        Ok(())
    }

    pub fn mount_block_device(
        &self,
        block_device: u64,
        mount_point: &str,
        options: Option<&str>,
    ) -> Result<(), Error> {
        self.call(
            "block-device",
            "mount",
            &[block_device],
            &mount_params(mount_point, options),
        )
        .with_context(|| format!("Failed to mount block device {block_device}"))?;
        Ok(())
    }

    pub fn mount_partition(
        &self,
        block_device: u64,
        partition: u64,
        mount_point: &str,
        options: Option<&str>,
    ) -> Result<(), Error> {
        self.call(
            "partition",
            "mount",
            &[block_device, partition],
            &mount_params(mount_point, options),
        )
        .with_context(|| {
            format!("Failed to mount partition {partition} of block device {block_device}")
        })?;
        Ok(())
    }

    pub fn read_cache_sets(&self) -> Result<Vec<CacheSet>, Error> {
        self.call_json("bcache-cache-sets", "read", &[], &[])
            .context("Failed to read cache sets")
    }

    pub fn create_cache_set(&self, cache: StorageTarget) -> Result<CacheSet, Error> {
        let param = match cache {
            StorageTarget::BlockDevice(id) => ("cache_device", id.to_string()),
            StorageTarget::Partition { partition, .. } => ("cache_partition", partition.to_string()),
        };
        self.call_json("bcache-cache-sets", "create", &[], &[param])
            .context("Failed to create cache set")
    }

    pub fn create_bcache(
        &self,
        name: &str,
        cache_set: u64,
        cache_mode: CacheMode,
        backing: StorageTarget,
    ) -> Result<CompositeDevice, Error> {
        let backing = match backing {
            StorageTarget::BlockDevice(id) => ("backing_device", id.to_string()),
            StorageTarget::Partition { partition, .. } => {
                ("backing_partition", partition.to_string())
            }
        };
        self.call_json(
            "bcaches",
            "create",
            &[],
            &[
                ("name", name.to_owned()),
                ("cache_set", cache_set.to_string()),
                ("cache_mode", cache_mode.to_string()),
                backing,
            ],
        )
        .with_context(|| format!("Failed to create bcache '{name}'"))
    }

    pub fn create_raid(
        &self,
        name: &str,
        level: RaidLevel,
        members: &[StorageTarget],
        spares: &[StorageTarget],
    ) -> Result<CompositeDevice, Error> {
        let mut params = vec![("name", name.to_owned()), ("level", level.to_string())];
        params.extend(member_params(members, "block_devices", "partitions"));
        params.extend(member_params(spares, "spare_devices", "spare_partitions"));

        self.call_json("raids", "create", &[], &params)
            .with_context(|| format!("Failed to create RAID array '{name}'"))
    }

    pub fn create_volume_group(
        &self,
        name: &str,
        members: &[StorageTarget],
    ) -> Result<VolumeGroup, Error> {
        let mut params = vec![("name", name.to_owned())];
        params.extend(member_params(members, "block_devices", "partitions"));

        self.call_json("volume-groups", "create", &[], &params)
            .with_context(|| format!("Failed to create volume group '{name}'"))
    }

    /// Creates a logical volume in a volume group. The reply is the block
    /// device backing the new volume.
    pub fn create_logical_volume(
        &self,
        volume_group: u64,
        name: &str,
        size: Option<ByteCount>,
    ) -> Result<BlockDevice, Error> {
        let mut params = vec![("name", name.to_owned())];
        if let Some(size) = size {
            params.push(("size", size.to_string()));
        }

        self.call_json(
            "volume-group",
            "create-logical-volume",
            &[volume_group],
            &params,
        )
        .with_context(|| format!("Failed to create logical volume '{name}'"))
    }
}

fn format_params(fstype: &str, label: Option<&str>) -> Vec<(&'static str, String)> {
    let mut params = vec![("fstype", fstype.to_owned())];
    if let Some(label) = label {
        params.push(("label", label.to_owned()));
    }
    params
}

fn mount_params(mount_point: &str, options: Option<&str>) -> Vec<(&'static str, String)> {
    let mut params = vec![("mount_point", mount_point.to_owned())];
    if let Some(options) = options {
        params.push(("mount_options", options.to_owned()));
    }
    params
}

/// Splits members into repeated `<device_key>=<id>` and `<partition_key>=<id>`
/// parameters, block devices first.
fn member_params(
    members: &[StorageTarget],
    device_key: &'static str,
    partition_key: &'static str,
) -> Vec<(&'static str, String)> {
    let devices = members.iter().filter_map(|member| match member {
        StorageTarget::BlockDevice(id) => Some((device_key, id.to_string())),
        StorageTarget::Partition { .. } => None,
    });
    let partitions = members.iter().filter_map(|member| match member {
        StorageTarget::Partition { partition, .. } => Some((partition_key, partition.to_string())),
        StorageTarget::BlockDevice(_) => None,
    });
    devices.chain(partitions).collect()
}
