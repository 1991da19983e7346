use std::{fmt::Display, num::ParseIntError, str::FromStr};

use serde::Deserialize;

/// Unit suffixes accepted in provisioning sizes, with the power of ten they
/// stand for. These are decimal units: `1G` is 10^9 bytes, not 2^30.
const UNIT_SUFFIXES: [(char, u32); 3] = [('M', 6), ('G', 9), ('T', 12)];

/// An exact number of bytes, as handed to the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ByteCount(pub u64);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SizeParseError {
    /// Neither a bare integer nor a known unit suffix; carries the error of
    /// the bare integer parse.
    #[error(transparent)]
    Integer(#[from] ParseIntError),

    #[error("invalid number '{value}' in size with unit suffix")]
    InvalidNumber { value: String },

    #[error("size '{value}' does not fit in 64 bits")]
    Overflow { value: String },
}

impl From<u64> for ByteCount {
    fn from(x: u64) -> Self {
        ByteCount(x)
    }
}

impl ByteCount {
    pub fn bytes(self) -> u64 {
        self.0
    }

    /// Parses a size such as `1024`, `500M`, `2g` or `1.5T`.
    ///
    /// A bare integer is taken as bytes. Otherwise the last character must be
    /// one of `M`, `G` or `T` (any case) and the rest an integer or decimal
    /// number, scaled by the matching power of ten and truncated to whole
    /// bytes.
    pub fn from_human_readable(s: &str) -> Result<Self, SizeParseError> {
        let s = s.trim();
        let original = match s.parse::<u64>() {
            Ok(n) => return Ok(Self(n)),
            Err(e) => e,
        };

        let Some(last) = s.chars().last() else {
            return Err(original.into());
        };
        let Some(exponent) = UNIT_SUFFIXES
            .iter()
            .find(|(suffix, _)| last.eq_ignore_ascii_case(suffix))
            .map(|(_, exponent)| *exponent)
        else {
            return Err(original.into());
        };

        let number = s[..s.len() - last.len_utf8()].trim();
        scale_decimal(number, exponent).map(Self)
    }
}

/// Multiplies the decimal number in `value` by 10^`exponent` without going
/// through floating point. Digits beyond the unit's precision are dropped.
fn scale_decimal(value: &str, exponent: u32) -> Result<u64, SizeParseError> {
    let invalid = || SizeParseError::InvalidNumber {
        value: value.to_owned(),
    };

    let (whole, fraction) = value.split_once('.').unwrap_or((value, ""));
    if (whole.is_empty() && fraction.is_empty())
        || !whole
            .chars()
            .chain(fraction.chars())
            .all(|c| c.is_ascii_digit())
    {
        return Err(invalid());
    }

    let overflow = || SizeParseError::Overflow {
        value: value.to_owned(),
    };

    let scale = 10u64.pow(exponent);
    let whole = if whole.is_empty() {
        0
    } else {
        whole.parse::<u64>().map_err(|_| overflow())?
    };

    let mut fraction_bytes = 0;
    let mut place = scale;
    for digit in fraction.chars().take(exponent as usize) {
        place /= 10;
        fraction_bytes += u64::from(digit.to_digit(10).ok_or_else(invalid)?) * place;
    }

    whole
        .checked_mul(scale)
        .and_then(|bytes| bytes.checked_add(fraction_bytes))
        .ok_or_else(overflow)
}

impl Display for ByteCount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ByteCount {
    type Err = SizeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_human_readable(s)
    }
}

impl<'de> serde::Deserialize<'de> for ByteCount {
    fn deserialize<D>(deserializer: D) -> Result<ByteCount, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        match deserialize_optional(deserializer)? {
            Some(size) => Ok(size),
            None => Err(serde::de::Error::custom("missing size")),
        }
    }
}

impl serde::Serialize for ByteCount {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_u64(self.0)
    }
}

/// Deserializes a size that may be left out, for use with
/// `#[serde(default, deserialize_with = "...")]` on `Option<ByteCount>` fields.
///
/// Sizes come either as strings (e.g. "2G") or as pure numbers. YAML turns
/// digit-only values into numbers, so the raw value is inspected first. A
/// null, empty or zero size means "use all remaining space" and maps to
/// `None`; MAAS never sees `size=0`.
pub fn deserialize_optional<'de, D>(deserializer: D) -> Result<Option<ByteCount>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = serde_yaml::Value::deserialize(deserializer)?;

    let size = match value {
        serde_yaml::Value::Null => Ok(None),
        serde_yaml::Value::String(s) if s.trim().is_empty() => Ok(None),
        serde_yaml::Value::String(s) => ByteCount::from_str(s.as_str())
            .map(Some)
            .map_err(|e| serde::de::Error::custom(format!("invalid size '{s}': {e}"))),
        serde_yaml::Value::Number(n) => {
            let n = n.as_u64().ok_or_else(|| {
                serde::de::Error::custom("invalid size, expected unsigned integer")
            })?;
            Ok(Some(ByteCount(n)))
        }
        _ => Err(serde::de::Error::custom("invalid size")),
    }?;

    Ok(size.filter(|size| size.0 != 0))
}
