use serde::Serialize;
use std::fmt;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// A single rejected input, addressed by the path of the property that caused it
/// (e.g. `runtime` or `functions.test-handler.role`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InputPropertyError {
    pub property_path: String,
    pub reason: String,
}

impl InputPropertyError {
    pub fn new(property_path: impl Into<String>, reason: impl Into<String>) -> Self {
        InputPropertyError {
            property_path: property_path.into(),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for InputPropertyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Invalid argument for {}: {}", self.property_path, self.reason)
    }
}

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("Invalid arguments")]
    InvalidArguments(Vec<InputPropertyError>),
    #[error("{0}")]
    InvalidProperty(InputPropertyError),
    #[error("Unsupported architecture: {0}")]
    UnsupportedArchitecture(String),
    #[error("Failed to build {language} code: {message}")]
    Failed { language: String, message: String },
    #[error("Failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },
    #[error("Unreadable response from {program}: {message}")]
    Protocol { program: String, message: String },
    #[error("Can't prepare {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Can't parse {}: {source}", .path.display())]
    Manifest {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl BuildError {
    /// The property errors carried by this error, if it is a validation failure.
    pub fn property_errors(&self) -> &[InputPropertyError] {
        match self {
            BuildError::InvalidArguments(errors) => errors,
            BuildError::InvalidProperty(error) => std::slice::from_ref(error),
            _ => &[],
        }
    }
}

/// Accumulates property errors so every invalid input is reported at once.
#[derive(Debug, Default)]
pub(crate) struct Validation {
    errors: Vec<InputPropertyError>,
}

impl Validation {
    pub(crate) fn push(&mut self, property_path: impl Into<String>, reason: impl Into<String>) {
        self.errors.push(InputPropertyError::new(property_path, reason));
    }

    pub(crate) fn finish(self) -> Result<(), BuildError> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(BuildError::InvalidArguments(self.errors))
        }
    }
}
