//! Dotted-integer OS versions, used for the minimum/maximum filter bounds

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// An OS version such as `9.3.5`.
///
/// Ordering is component-wise; when one version is a prefix of the other,
/// the shorter one orders first, so `9.2 < 9.2.0 < 9.2.1`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Version(Vec<u32>);

impl Version {
    /// The numeric components
    pub fn components(&self) -> &[u32] {
        &self.0
    }

    /// The major version
    pub fn major(&self) -> u32 {
        self.0.first().copied().unwrap_or(0)
    }
}

impl FromStr for Version {
    type Err = Error;

    /// Parse a version. A bare integer such as `10` becomes `10.0`, the way
    /// command-line bounds are usually typed.
    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        let parts: std::result::Result<Vec<u32>, _> =
            trimmed.split('.').map(str::parse::<u32>).collect();

        match parts {
            Ok(mut parts) if !parts.is_empty() && parts.len() <= 4 => {
                if parts.len() == 1 {
                    parts.push(0);
                }
                Ok(Version(parts))
            }
            _ => Err(Error::InvalidVersion(s.to_string())),
        }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(u32::to_string).collect();
        write!(f, "{}", parts.join("."))
    }
}
