use std::path::Path;

use log::{debug, info};

use provisioner_api::{
    config::StorageConfig,
    error::{
        InternalError, InvalidInputError, ProvisioningError, ProvisioningResultExt, ReportError,
    },
};

pub(crate) fn parse_storage_config(contents: &str) -> Result<StorageConfig, ProvisioningError> {
    let parsed = serde_yaml::from_str::<StorageConfig>(contents)
        .structured(InvalidInputError::ParseStorageConfiguration);

    if parsed.is_err() {
        match serde_yaml::from_str::<serde_yaml::Value>(contents) {
            // A bare entry list is a common mistake
            Ok(serde_yaml::Value::Sequence(_)) => {
                return parsed
                    .message("Storage entries must be listed under a top-level 'disks' key");
            }
            Ok(_) => {}
            Err(_) => return parsed.message("Storage configuration is not valid YAML"),
        }
    }
    parsed
}

pub fn validate_storage_config_file(path: impl AsRef<Path>) -> Result<(), ProvisioningError> {
    info!(
        "Validating storage configuration file: {}",
        path.as_ref().display()
    );

    let contents = std::fs::read_to_string(path.as_ref()).structured(
        InvalidInputError::LoadStorageConfiguration {
            path: path.as_ref().display().to_string(),
        },
    )?;

    let parsed =
        parse_storage_config(&contents).message("Failed to parse storage configuration")?;

    validate_storage_config(&parsed)
}

pub(crate) fn validate_storage_config(storage: &StorageConfig) -> Result<(), ProvisioningError> {
    storage
        .validate()
        .map_err(|e| ProvisioningError::new(InvalidInputError::from(e)))
        .message("Storage configuration is invalid")?;

    info!("Storage configuration is valid");
    debug!(
        "Parsed contents:\n{}",
        serde_yaml::to_string(storage).structured(InternalError::Internal(
            "Failed to serialize storage configuration"
        ))?
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::io::Write;

    use provisioner_api::{config::InvalidStorageConfigurationError, error::ErrorKind};

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_validate_storage_config_file() {
        let file = write_config(indoc::indoc! {r#"
            disks:
              - {id: sda, type: disk, serial: S1}
              - {id: sda1, type: partition, device: sda, number: 1, size: 512M}
              - {id: sda1_format, type: format, volume: sda1, fstype: fat32}
              - {id: sda1_mount, type: mount, device: sda1_format, path: /boot/efi}
        "#});
        validate_storage_config_file(file.path()).unwrap();
    }

    #[test]
    fn test_validate_invalid_storage_config_file() {
        let file = write_config(indoc::indoc! {r#"
            disks:
              - {id: sda, type: disk, serial: S1}
              - {id: sda, type: disk, serial: S2}
        "#});
        let error = validate_storage_config_file(file.path()).unwrap_err();
        assert_eq!(
            error.kind(),
            &ErrorKind::InvalidInput(InvalidInputError::InvalidStorageConfiguration(
                InvalidStorageConfigurationError::DuplicateId { id: "sda".into() }
            ))
        );

        let error = validate_storage_config_file("/nonexistent/storage.yaml").unwrap_err();
        assert_eq!(
            error.kind(),
            &ErrorKind::InvalidInput(InvalidInputError::LoadStorageConfiguration {
                path: "/nonexistent/storage.yaml".into()
            })
        );
    }

    #[test]
    fn test_parse_bare_entry_list() {
        let error = parse_storage_config("- {id: sda, type: disk}").unwrap_err();
        assert_eq!(
            error.kind(),
            &ErrorKind::InvalidInput(InvalidInputError::ParseStorageConfiguration)
        );
        assert!(format!("{error:?}").contains("top-level 'disks' key"));

        parse_storage_config("disks: [{id: sda, type: disk").unwrap_err();
    }
}
