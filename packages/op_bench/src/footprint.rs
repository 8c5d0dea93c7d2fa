use std::fmt;
use std::str::FromStr;

use crate::ConfigError;

const KIB: u64 = 1024;
const MIB: u64 = 1024 * KIB;
const GIB: u64 = 1024 * MIB;

/// The size of the memory or storage region a payload operates over.
///
/// Parsed from text as a number with an optional unit suffix (`B`, `KB`/`K`, `MB`/`M`, `GB`/`G`,
/// case-insensitive, binary multiples). A bare number is interpreted as megabytes.
///
/// # Examples
///
/// ```
/// use op_bench::Footprint;
///
/// let footprint: Footprint = "64MB".parse().unwrap();
/// assert_eq!(footprint.bytes(), 64 * 1024 * 1024);
///
/// let footprint: Footprint = "16".parse().unwrap();
/// assert_eq!(footprint.mib(), 16);
///
/// let footprint: Footprint = "512b".parse().unwrap();
/// assert_eq!(footprint.bytes(), 512);
/// ```
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Footprint {
    bytes: u64,
}

impl Footprint {
    /// Creates a footprint of the given number of bytes.
    #[must_use]
    pub const fn from_bytes(bytes: u64) -> Self {
        Self { bytes }
    }

    /// Creates a footprint of the given number of kibibytes.
    #[must_use]
    pub const fn from_kib(kib: u64) -> Self {
        Self::from_bytes(kib.saturating_mul(KIB))
    }

    /// Creates a footprint of the given number of mebibytes.
    #[must_use]
    pub const fn from_mib(mib: u64) -> Self {
        Self::from_bytes(mib.saturating_mul(MIB))
    }

    /// The footprint in bytes.
    #[must_use]
    pub const fn bytes(self) -> u64 {
        self.bytes
    }

    /// The footprint in whole kibibytes, rounded down.
    #[must_use]
    pub const fn kib(self) -> u64 {
        self.bytes / KIB
    }

    /// The footprint in whole mebibytes, rounded down.
    #[must_use]
    pub const fn mib(self) -> u64 {
        self.bytes / MIB
    }
}

impl Default for Footprint {
    fn default() -> Self {
        Self::from_mib(1)
    }
}

impl fmt::Display for Footprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bytes = self.bytes;

        if bytes != 0 && bytes % GIB == 0 {
            write!(f, "{} GiB", bytes / GIB)
        } else if bytes != 0 && bytes % MIB == 0 {
            write!(f, "{} MiB", bytes / MIB)
        } else if bytes != 0 && bytes % KIB == 0 {
            write!(f, "{} KiB", bytes / KIB)
        } else {
            write!(f, "{bytes} B")
        }
    }
}

impl FromStr for Footprint {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |problem: &str| ConfigError::InvalidFootprint {
            value: s.to_string(),
            problem: problem.to_string(),
        };

        let trimmed = s.trim();
        let split_at = trimmed
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(trimmed.len());
        let (digits, unit) = trimmed.split_at(split_at);

        if digits.is_empty() {
            return Err(invalid("expected a number"));
        }

        let value = digits
            .parse::<u64>()
            .map_err(|e| invalid(&e.to_string()))?;

        let multiplier = match unit.trim().to_ascii_lowercase().as_str() {
            // A bare number is megabytes, matching the historical `-foot` option.
            "" | "m" | "mb" | "mib" => MIB,
            "b" => 1,
            "k" | "kb" | "kib" => KIB,
            "g" | "gb" | "gib" => GIB,
            _ => return Err(invalid("unknown unit, expected one of B, KB, MB, GB")),
        };

        value
            .checked_mul(multiplier)
            .map(Self::from_bytes)
            .ok_or_else(|| invalid("value does not fit in 64 bits"))
    }
}
