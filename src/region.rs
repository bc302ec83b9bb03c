// src/region.rs

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::RegionalError;

/// Deployment partition hosting one regional service instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Region {
    Us,
    Eu,
    Asia,
}

impl Region {
    /// Every known region, in declaration order
    pub const ALL: [Region; 3] = [Region::Us, Region::Eu, Region::Asia];

    /// Region used when the caller's region cannot be determined
    pub const DEFAULT: Region = Region::Us;

    /// Short code used in cache keys and headers
    pub fn code(&self) -> &'static str {
        match self {
            Region::Us => "us",
            Region::Eu => "eu",
            Region::Asia => "asia",
        }
    }

    /// Resolve a region from an optional `X-Region-Code` style value.
    ///
    /// Missing or unknown codes resolve to [`Region::DEFAULT`].
    pub fn from_header(value: Option<&str>) -> Region {
        value
            .and_then(|raw| raw.parse().ok())
            .unwrap_or(Region::DEFAULT)
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Region {
    type Err = RegionalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "us" => Ok(Region::Us),
            "eu" => Ok(Region::Eu),
            "asia" => Ok(Region::Asia),
            other => Err(RegionalError::Config(format!("Unknown region code: {}", other))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_parse_case_insensitively() {
        assert_eq!("EU".parse::<Region>().unwrap(), Region::Eu);
        assert_eq!(" asia ".parse::<Region>().unwrap(), Region::Asia);
        assert!("mars".parse::<Region>().is_err());
    }

    #[test]
    fn test_header_resolution_defaults_to_us() {
        assert_eq!(Region::from_header(Some("eu")), Region::Eu);
        assert_eq!(Region::from_header(Some("unknown")), Region::Us);
        assert_eq!(Region::from_header(None), Region::Us);
    }

    #[test]
    fn test_serde_uses_codes() {
        let json = serde_json::to_string(&Region::Asia).unwrap();
        assert_eq!(json, "\"asia\"");
        let back: Region = serde_json::from_str("\"us\"").unwrap();
        assert_eq!(back, Region::Us);
    }
}
