use std::fmt::{Debug, Write};
use std::{borrow::Cow, panic::Location};

use serde::{ser::SerializeStruct, Deserialize, Serialize};
use strum_macros::IntoStaticStr;

use crate::config::InvalidStorageConfigurationError;

/// The provisioner failed to initialize.
#[derive(Debug, Eq, thiserror::Error, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub enum InitializationError {
    #[error("Failed to load agent configuration from '{path}'")]
    LoadAgentConfig { path: String },
    #[error("Failed to parse agent configuration")]
    ParseAgentConfig,
    #[error("Failed to set up tracing")]
    SetupTracing,
}

/// User provided input was invalid.
#[derive(Debug, Eq, thiserror::Error, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub enum InvalidInputError {
    #[error("Failed to load storage configuration from '{path}'")]
    LoadStorageConfiguration { path: String },
    #[error("Failed to parse storage configuration")]
    ParseStorageConfiguration,
    #[error("Invalid storage configuration: {0}")]
    InvalidStorageConfiguration(#[from] InvalidStorageConfigurationError),
    #[error("No {field} given, set it in the agent configuration or on the command line")]
    MissingMachineIdentity { field: String },
}

/// The storage configuration does not fit the machine it is applied to.
#[derive(Debug, Eq, thiserror::Error, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub enum ConfigurationError {
    #[error("Entry '{entry}' refers to '{reference}' in '{field}', which was not provisioned")]
    UnresolvedReference {
        entry: String,
        field: String,
        reference: String,
    },
    #[error("No block device of the machine matches disk '{disk}'")]
    UnmatchedDisk { disk: String },
    #[error("Disks '{first}' and '{second}' both match block device {block_device}")]
    DiskAlreadyMatched {
        first: String,
        second: String,
        block_device: u64,
    },
    #[error("Logical volume '{logical_volume}' refers to unknown volume group '{volume_group}'")]
    UnknownVolumeGroup {
        logical_volume: String,
        volume_group: String,
    },
    #[error("Cannot tell which volume mount '{mount}' refers to through '{device}'")]
    UnresolvableMountDevice { mount: String, device: String },
}

/// The machine's existing storage uses a layout that cannot be handled.
#[derive(Debug, Eq, thiserror::Error, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub enum UnsupportedTopologyError {
    #[error("Unknown cache device type '{device_type}'")]
    UnknownCacheDeviceType { device_type: String },
}

/// A backend operation failed. The backend's own diagnostics are carried in
/// the error source.
#[derive(Debug, Eq, thiserror::Error, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub enum BackendError {
    #[error("Failed to read block devices")]
    ReadBlockDevices,
    #[error("Failed to clear block device {block_device}")]
    ClearBlockDevice { block_device: u64 },
    #[error("Failed to update disk '{disk}'")]
    UpdateDisk { disk: String },
    #[error("Failed to create partition '{partition}'")]
    CreatePartition { partition: String },
    #[error("Failed to create RAID array '{raid}'")]
    CreateRaid { raid: String },
    #[error("Failed to read cache sets")]
    ReadCacheSets,
    #[error("Failed to create cache set for bcache '{bcache}'")]
    CreateCacheSet { bcache: String },
    #[error("Failed to create bcache '{bcache}'")]
    CreateBcache { bcache: String },
    #[error("Failed to create volume group '{volume_group}'")]
    CreateVolumeGroup { volume_group: String },
    #[error("Failed to create logical volume '{logical_volume}'")]
    CreateLogicalVolume { logical_volume: String },
    #[error("Failed to apply format '{format}'")]
    Format { format: String },
    #[error("Failed to apply mount '{mount}'")]
    Mount { mount: String },
}

#[derive(Debug, Eq, thiserror::Error, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub enum InternalError {
    #[error("Internal error: {0}")]
    Internal(&'static str),
}

/// Each variant of `ErrorKind` corresponds to a different category of error. The categories are
/// intended to tell apart problems in the input, on the machine, in the backend, and in the
/// provisioner itself.
#[derive(Debug, Eq, thiserror::Error, IntoStaticStr, PartialEq)]
#[strum(serialize_all = "kebab-case")]
pub enum ErrorKind {
    /// The provisioner failed to initialize.
    #[error(transparent)]
    Initialization(#[from] InitializationError),

    /// The provisioner was given invalid input.
    #[error(transparent)]
    InvalidInput(#[from] InvalidInputError),

    /// A storage entry could not be related to what exists on the machine.
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    /// The machine's current storage cannot be handled.
    #[error(transparent)]
    UnsupportedTopology(#[from] UnsupportedTopologyError),

    /// A backend call failed. The captured backend output explains why.
    #[error(transparent)]
    Backend(#[from] BackendError),

    /// A bug was encountered. This indicates a problem with the provisioner.
    #[error(transparent)]
    Internal(#[from] InternalError),
}

#[derive(Debug)]
struct ProvisioningErrorInner {
    kind: ErrorKind,
    location: &'static Location<'static>,
    source: Option<anyhow::Error>,
    context: Vec<(Cow<'static, str>, &'static Location<'static>)>,
}

pub struct ProvisioningError(Box<ProvisioningErrorInner>);
impl ProvisioningError {
    #[track_caller]
    pub fn new(kind: impl Into<ErrorKind>) -> Self {
        ProvisioningError(Box::new(ProvisioningErrorInner {
            kind: kind.into(),
            location: Location::caller(),
            source: None,
            context: Vec::new(),
        }))
    }

    pub fn unstructured(self, context: impl Into<Cow<'static, str>>) -> anyhow::Error {
        match self.0.source {
            Some(source) => source.context(self.0.kind).context(context.into()),
            None => anyhow::Error::from(self.0.kind).context(context.into()),
        }
    }

    /// Returns a reference to the inner ErrorKind.
    pub fn kind(&self) -> &ErrorKind {
        &self.0.kind
    }
}

pub trait ReportError<T, K> {
    /// Convert this error into a structured ProvisioningError.
    fn structured(self, kind: K) -> Result<T, ProvisioningError>;
}

impl<T, K> ReportError<T, K> for Option<T>
where
    K: Into<ErrorKind>,
{
    #[track_caller]
    fn structured(self, kind: K) -> Result<T, ProvisioningError> {
        match self {
            Some(t) => Ok(t),
            None => Err(ProvisioningError(Box::new(ProvisioningErrorInner {
                kind: kind.into(),
                location: Location::caller(),
                source: None,
                context: Vec::new(),
            }))),
        }
    }
}

impl<T, E, K> ReportError<T, K> for Result<T, E>
where
    E: Into<anyhow::Error>,
    K: Into<ErrorKind>,
{
    #[track_caller]
    fn structured(self, kind: K) -> Result<T, ProvisioningError> {
        match self {
            Ok(o) => Ok(o),
            Err(e) => Err(ProvisioningError(Box::new(ProvisioningErrorInner {
                kind: kind.into(),
                location: Location::caller(),
                source: Some(e.into()),
                context: Vec::new(),
            }))),
        }
    }
}

pub trait ProvisioningResultExt<T> {
    /// Attach a context message to the error.
    fn message(self, context: impl Into<Cow<'static, str>>) -> Result<T, ProvisioningError>;

    /// Convert the error into an unstructured error.
    fn unstructured(self, context: impl Into<Cow<'static, str>>) -> Result<T, anyhow::Error>;
}
impl<T> ProvisioningResultExt<T> for Result<T, ProvisioningError> {
    #[track_caller]
    fn message(mut self, context: impl Into<Cow<'static, str>>) -> Result<T, ProvisioningError> {
        if let Err(ref mut e) = self {
            e.0.context.push((context.into(), Location::caller()));
        }
        self
    }

    fn unstructured(self, context: impl Into<Cow<'static, str>>) -> Result<T, anyhow::Error> {
        self.map_err(|e| e.unstructured(context))
    }
}

impl Serialize for ProvisioningError {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("provisioning-error", 5)?;
        state.serialize_field("message", &self.0.kind.to_string())?;
        match self.0.kind {
            ErrorKind::Initialization(ref e) => state.serialize_field("error", e)?,
            ErrorKind::InvalidInput(ref e) => state.serialize_field("error", e)?,
            ErrorKind::Configuration(ref e) => state.serialize_field("error", e)?,
            ErrorKind::UnsupportedTopology(ref e) => state.serialize_field("error", e)?,
            ErrorKind::Backend(ref e) => state.serialize_field("error", e)?,
            ErrorKind::Internal(ref e) => state.serialize_field("error", e)?,
        }
        state.serialize_field("category", <&str>::from(&self.0.kind))?;
        state.serialize_field(
            "location",
            &format!("{}:{}", self.0.location.file(), self.0.location.line()),
        )?;
        match self.0.source {
            Some(ref e) => state.serialize_field("cause", &Some(format!("{:?}", e)))?,
            None => state.serialize_field("cause", &None::<String>)?,
        }
        state.end()
    }
}

impl Debug for ProvisioningError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} at {}:{}",
            self.0.kind,
            self.0.location.file(),
            self.0.location.line()
        )?;

        if !self.0.context.is_empty() {
            writeln!(f, "\n\nContext:")?;
            for (i, (context, location)) in self.0.context.iter().enumerate() {
                for (j, line) in context.split('\n').enumerate() {
                    if j == 0 {
                        write!(f, "{: >5}: ", i)?;
                    } else {
                        f.write_str("\n       ")?;
                    }
                    f.write_str(line)?;
                }
                writeln!(f, " at {}:{}", location.file(), location.line())?;
            }
        }

        if let Some(ref source) = self.0.source {
            writeln!(f, "\n\nCaused by:")?;
            let mut index = 0;
            let mut source: Option<&dyn std::error::Error> = Some(source.as_ref());
            while let Some(e) = source {
                for (i, line) in e.to_string().split('\n').enumerate() {
                    if i == 0 {
                        write!(f, "{: >5}: ", index)?;
                    } else {
                        f.write_str("\n       ")?;
                    }
                    f.write_str(line)?;
                }
                f.write_char('\n')?;
                source = e.source();
                index += 1;
            }
        }
        Ok(())
    }
}
