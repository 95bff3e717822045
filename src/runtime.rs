use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Runtimes accepted by the build helper's runtime validator.
pub const SUPPORTED_RUNTIMES: &[&str] = &[
    "nodejs16.x",
    "nodejs18.x",
    "nodejs20.x",
    "nodejs22.x",
    "python3.8",
    "python3.9",
    "python3.10",
    "python3.11",
    "python3.12",
    "python3.13",
    "ruby3.2",
    "ruby3.3",
    "java8",
    "java8.al2",
    "java11",
    "java17",
    "java21",
    "go1.x",
    "dotnet6",
    "dotnet8",
    "provided",
    "provided.al2",
    "provided.al2023",
];

/// Runtimes whose identifier starts with `prefix`, minus the excluded ones.
pub fn runtimes_for(prefix: &str, excluded: &[&str]) -> Vec<&'static str> {
    SUPPORTED_RUNTIMES
        .iter()
        .copied()
        .filter(|r| r.starts_with(prefix) && !excluded.contains(r))
        .collect()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Architecture {
    #[default]
    #[serde(rename = "x86_64")]
    X86_64,
    #[serde(rename = "arm64")]
    Arm64,
}

impl Architecture {
    pub fn as_str(self) -> &'static str {
        match self {
            Architecture::X86_64 => "x86_64",
            Architecture::Arm64 => "arm64",
        }
    }

    /// Resolves an optional user value, defaulting to x86_64 when absent or empty.
    pub fn resolve(value: Option<&str>) -> Result<Architecture, String> {
        match value {
            None | Some("") => Ok(Architecture::default()),
            Some(value) => value.parse(),
        }
    }
}

impl FromStr for Architecture {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "x86_64" => Ok(Architecture::X86_64),
            "arm64" => Ok(Architecture::Arm64),
            _ => Err(format!(
                "Architecture must be one of {}, {}",
                Architecture::Arm64.as_str(),
                Architecture::X86_64.as_str()
            )),
        }
    }
}

impl fmt::Display for Architecture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
