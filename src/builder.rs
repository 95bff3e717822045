//! Driver for the external `lambda-builders` executable.
//!
//! A build step is described by a [`BuildRequest`] and handed to a [`LambdaBuilder`].
//! [`CliLambdaBuilder`] sends it to aws-lambda-builders as a JSON-RPC 2.0
//! `LambdaBuilder.build` call passed in the first command line argument; the
//! response is read back from stdout.

use crate::error::BuildError;
use crate::runtime::Architecture;
use crate::util::CommandExt;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::io;
use std::path::PathBuf;
use std::process::Command;

pub const DEFAULT_PROGRAM: &str = "lambda-builders";
const PROTOCOL_VERSION: &str = "0.3";
const METHOD: &str = "LambdaBuilder.build";

/// Selects the workflow inside the build helper.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Capability {
    pub language: String,
    pub dependency_manager: Option<String>,
    pub application_framework: Option<String>,
}

impl Capability {
    pub fn new(language: &str, dependency_manager: Option<&str>) -> Self {
        Capability {
            language: language.to_owned(),
            dependency_manager: dependency_manager.map(str::to_owned),
            application_framework: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BuildRequest {
    pub capability: Capability,
    pub source_dir: PathBuf,
    pub artifacts_dir: PathBuf,
    pub scratch_dir: PathBuf,
    pub manifest_path: Option<PathBuf>,
    pub runtime: String,
    pub architecture: Architecture,
    pub options: Option<Map<String, Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub build_in_source: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub download_dependencies: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dependencies_dir: Option<PathBuf>,
    pub experimental_flags: Vec<String>,
}

impl BuildRequest {
    pub fn new(
        capability: Capability,
        source_dir: PathBuf,
        artifacts_dir: PathBuf,
        scratch_dir: PathBuf,
        runtime: &str,
        architecture: Architecture,
    ) -> Self {
        BuildRequest {
            capability,
            source_dir,
            artifacts_dir,
            scratch_dir,
            manifest_path: None,
            runtime: runtime.to_owned(),
            architecture,
            options: None,
            build_in_source: None,
            download_dependencies: None,
            dependencies_dir: None,
            experimental_flags: Vec::new(),
        }
    }

    /// The JSON-RPC envelope understood by `lambda-builders`.
    pub fn to_rpc(&self, id: u64) -> Value {
        let mut params = match serde_json::to_value(self) {
            Ok(Value::Object(params)) => params,
            _ => Map::new(),
        };
        params.insert("__protocol_version".into(), PROTOCOL_VERSION.into());
        params.insert("optimizations".into(), json!({}));
        if self.options.is_none() {
            params.insert("options".into(), json!({}));
        }
        json!({
            "jsonschema": "2.0",
            "id": id,
            "method": METHOD,
            "params": params,
        })
    }
}

/// Why the build helper refused or failed a build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuilderFailure {
    UnsupportedArchitecture(String),
    Failed(String),
    /// The helper could not be reached or answered with something unreadable.
    Unavailable { program: String, message: String },
}

pub trait LambdaBuilder {
    fn build(&self, request: &BuildRequest) -> Result<(), BuilderFailure>;
}

#[derive(Deserialize, Debug)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcError>,
}

#[derive(Deserialize, Debug)]
struct RpcError {
    code: i64,
    message: String,
}

/// Runs `lambda-builders` once per request.
#[derive(Debug, Clone)]
pub struct CliLambdaBuilder {
    program: String,
}

impl CliLambdaBuilder {
    pub fn new(program: impl Into<String>) -> Self {
        CliLambdaBuilder {
            program: program.into(),
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Fails when the build helper executable can't be started.
    pub fn check(&self) -> Result<(), BuildError> {
        Command::new(&self.program)
            .arg("--help")
            .spawns()
            .map_err(|source| {
                if source.kind() == io::ErrorKind::NotFound {
                    log::error!("Install the build helper with `pip install aws-lambda-builders`");
                }
                BuildError::Spawn {
                    program: self.program.clone(),
                    source,
                }
            })
    }

    fn unavailable(&self, message: String) -> BuilderFailure {
        BuilderFailure::Unavailable {
            program: self.program.clone(),
            message,
        }
    }
}

impl Default for CliLambdaBuilder {
    fn default() -> Self {
        CliLambdaBuilder::new(DEFAULT_PROGRAM)
    }
}

impl LambdaBuilder for CliLambdaBuilder {
    fn build(&self, request: &BuildRequest) -> Result<(), BuilderFailure> {
        let rpc = request.to_rpc(1).to_string();
        log::debug!("Running {} with request {}", self.program, rpc);

        let output = Command::new(&self.program)
            .arg(&rpc)
            .output()
            .map_err(|e| self.unavailable(format!("failed to run: {}", e)))?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        if !stderr.is_empty() {
            log::debug!("{} stderr:\n{}", self.program, stderr);
        }
        parse_response(&stdout).map_err(|failure| match failure {
            Response::Unreadable(message) if !output.status.success() => {
                self.unavailable(format!("{} ({}): {}", message, output.status, stderr.trim()))
            }
            Response::Unreadable(message) => self.unavailable(message),
            Response::Refused(failure) => failure,
        })
    }
}

/// Why a response line didn't report success.
#[derive(Debug, PartialEq)]
enum Response {
    Unreadable(String),
    Refused(BuilderFailure),
}

fn parse_response(stdout: &str) -> Result<(), Response> {
    let line = stdout
        .lines()
        .rev()
        .find(|line| !line.trim().is_empty())
        .ok_or_else(|| Response::Unreadable("empty response".to_owned()))?;
    let response: RpcResponse = serde_json::from_str(line)
        .map_err(|e| Response::Unreadable(format!("malformed response: {}", e)))?;

    match (response.result, response.error) {
        (_, Some(error)) => Err(Response::Refused(classify(error))),
        (Some(_), None) => Ok(()),
        (None, None) => Err(Response::Unreadable(
            "response has neither result nor error".to_owned(),
        )),
    }
}

// 400 covers every workflow-level failure, including architecture validation.
fn classify(error: RpcError) -> BuilderFailure {
    if error.code == 400 && error.message.to_lowercase().contains("architecture") {
        BuilderFailure::UnsupportedArchitecture(error.message)
    } else if error.code == 400 {
        BuilderFailure::Failed(error.message)
    } else {
        BuilderFailure::Failed(format!("{} (code {})", error.message, error.code))
    }
}

/// Maps a helper failure onto the error reported for `language` builds.
pub(crate) fn into_build_error(language: &str, failure: BuilderFailure) -> BuildError {
    match failure {
        BuilderFailure::UnsupportedArchitecture(message) => {
            log::error!("{}", message);
            BuildError::UnsupportedArchitecture(message)
        }
        BuilderFailure::Failed(message) => BuildError::Failed {
            language: language.to_owned(),
            message,
        },
        BuilderFailure::Unavailable { program, message } => {
            BuildError::Protocol { program, message }
        }
    }
}
