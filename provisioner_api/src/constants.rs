/// Default location of the agent configuration file.
pub const AGENT_CONFIG_PATH: &str = "/etc/provisioner/agent.yaml";

/// Name of the MAAS command line client used when the agent configuration
/// does not override it.
pub const DEFAULT_MAAS_CLI: &str = "maas";

/// Suffix that format entry ids conventionally carry on top of the id of the
/// volume they format. Mount entries refer to the format entry id.
pub const FORMAT_ID_SUFFIX: &str = "_format";

/// Default path of the storage configuration used by the CLI.
pub const STORAGE_CONFIG_PATH_DEFAULT: &str = "/etc/provisioner/storage.yaml";
