//! Report verbosity tiers.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Requested verbosity, shared by prompt sizing and rendering.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Length {
    Light,
    #[default]
    Short,
    Detailed,
}

impl Length {
    pub fn as_str(&self) -> &'static str {
        match self {
            Length::Light => "light",
            Length::Short => "short",
            Length::Detailed => "detailed",
        }
    }

    /// Whether this tier includes everything `other` includes.
    pub fn includes(&self, other: Length) -> bool {
        *self >= other
    }
}

impl fmt::Display for Length {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Length {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "light" => Ok(Length::Light),
            "short" => Ok(Length::Short),
            "detailed" | "long" => Ok(Length::Detailed),
            _ => Err(format!("Unknown length: {} (expected light, short, or detailed)", s)),
        }
    }
}
