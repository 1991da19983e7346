pub mod config;
pub mod constants;
pub mod error;
pub mod primitives;

/// Configuration-local identifier of a storage entry. Only meaningful inside
/// the storage configuration document; backend ids are plain integers.
pub type BlockDeviceId = String;

/// Returns true if the given value is equal to its default value.
/// Useful for #[serde(skip_serializing_if = "is_default")]
pub fn is_default<T: Default + PartialEq>(t: &T) -> bool {
    *t == Default::default()
}
