//! Static validation errors for the storage configuration.

use serde::{Deserialize, Serialize};

/// Problems detected in the storage configuration before any backend call is
/// made.
#[derive(thiserror::Error, Serialize, Deserialize, Debug, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum InvalidStorageConfigurationError {
    #[error("Storage entry id '{id}' is used more than once")]
    DuplicateId { id: String },

    #[error("Partitions '{first}' and '{second}' both use number {number} on device '{device}'")]
    DuplicatePartitionNumber {
        device: String,
        number: u32,
        first: String,
        second: String,
    },

    #[error("Partition '{partition}' must be placed on a disk, but '{device}' is a '{kind}' entry")]
    PartitionParentNotDisk {
        partition: String,
        device: String,
        kind: String,
    },

    #[error("Entry '{entry}' refers to '{reference}' in '{field}', which is built at a later stage")]
    ReferenceOutOfOrder {
        entry: String,
        field: String,
        reference: String,
    },

    #[error("Entry '{entry}' refers to '{reference}' in '{field}', which is a '{kind}' entry and cannot hold data")]
    ReferenceNotAVolume {
        entry: String,
        field: String,
        reference: String,
        kind: String,
    },

    #[error("Entry '{entry}' refers to '{reference}' in '{field}', which is not defined")]
    UnknownReference {
        entry: String,
        field: String,
        reference: String,
    },

    #[error("Logical volume '{logical_volume}' refers to '{volume_group}', which is not a volume group")]
    UnknownVolumeGroup {
        logical_volume: String,
        volume_group: String,
    },

    #[error("Mount '{mount}' refers to '{device}', which is neither a format entry nor a formatted volume")]
    UnknownMountDevice { mount: String, device: String },
}
