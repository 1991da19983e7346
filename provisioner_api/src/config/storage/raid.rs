use std::{fmt::Display, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::BlockDeviceId;

/// A software RAID array assembled from partitions or block devices.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Raid {
    pub id: BlockDeviceId,

    /// Name of the array in the backend, e.g. `md0`.
    pub name: String,

    pub raidlevel: RaidLevel,

    /// Active members of the array.
    pub devices: Vec<BlockDeviceId>,

    /// Hot spares of the array.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub spare_devices: Vec<BlockDeviceId>,
}

#[derive(Copy, Clone, Debug, Hash, Eq, PartialEq)]
pub enum RaidLevel {
    /// # Striping
    Raid0,

    /// # Mirroring
    Raid1,

    /// # Striping with parity
    Raid5,

    /// # Striping with double parity
    Raid6,

    /// # Stripe of mirrors
    Raid10,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unsupported RAID level '{0}'")]
pub struct UnsupportedRaidLevel(String);

impl FromStr for RaidLevel {
    type Err = UnsupportedRaidLevel;

    /// Accepts `1`, `raid1` and `raid-1` spellings, in any case.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_ascii_lowercase();
        let number = lowered
            .strip_prefix("raid")
            .map(|rest| rest.trim_start_matches('-'))
            .unwrap_or(&lowered);

        match number {
            "0" => Ok(RaidLevel::Raid0),
            "1" => Ok(RaidLevel::Raid1),
            "5" => Ok(RaidLevel::Raid5),
            "6" => Ok(RaidLevel::Raid6),
            "10" => Ok(RaidLevel::Raid10),
            _ => Err(UnsupportedRaidLevel(s.to_owned())),
        }
    }
}

/// Renders the level the way the backend expects it, e.g. `raid-1`.
impl Display for RaidLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let number = match self {
            RaidLevel::Raid0 => 0,
            RaidLevel::Raid1 => 1,
            RaidLevel::Raid5 => 5,
            RaidLevel::Raid6 => 6,
            RaidLevel::Raid10 => 10,
        };
        write!(f, "raid-{number}")
    }
}

impl<'de> Deserialize<'de> for RaidLevel {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        // Levels are commonly written as bare numbers, which YAML reads as
        // integers.
        match serde_yaml::Value::deserialize(deserializer)? {
            serde_yaml::Value::String(s) => RaidLevel::from_str(&s).map_err(serde::de::Error::custom),
            serde_yaml::Value::Number(n) => {
                RaidLevel::from_str(&n.to_string()).map_err(serde::de::Error::custom)
            }
            _ => Err(serde::de::Error::custom("invalid RAID level")),
        }
    }
}

impl Serialize for RaidLevel {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}
