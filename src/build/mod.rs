//! Build steps, one per Lambda language workflow.
//!
//! Every step validates its own arguments, reporting all invalid properties at
//! once, then hands exactly one [`BuildRequest`] to a [`LambdaBuilder`]. The
//! result is a [`BuildArtifact`]: the directory the helper wrote the function
//! code into.

use crate::builder::{into_build_error, BuildRequest, LambdaBuilder};
use crate::error::{BuildError, InputPropertyError, Validation};
use crate::runtime::{runtimes_for, Architecture};
use crate::util;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

mod custom;
mod dotnet;
mod go;
mod java;
mod nodejs;
mod python;
mod ruby;
mod rust;

pub use custom::{build_custom_make, BuildCustomMakeArgs};
pub use dotnet::{build_dotnet, BuildDotnetArgs};
pub use go::{build_go, BuildGoArgs};
pub use java::{build_java, BuildJavaArgs};
pub use nodejs::{build_nodejs, BuildNodejsArgs, EsbuildOptions};
pub use python::{build_python, BuildPythonArgs};
pub use ruby::{build_ruby, BuildRubyArgs};
pub use rust::{build_rust, BuildRustArgs};

/// Reference to a directory of built function code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildArtifact {
    pub path: PathBuf,
}

/// Where a build resolves relative paths and puts its output.
#[derive(Debug, Clone)]
pub struct BuildContext {
    pub cwd: PathBuf,
    pub out_dir: PathBuf,
    pub scratch_dir: PathBuf,
}

impl BuildContext {
    pub fn new(cwd: impl Into<PathBuf>, out_dir: impl Into<PathBuf>) -> Self {
        let cwd = cwd.into();
        let out_dir = util::absolutize(&cwd, &out_dir.into());
        BuildContext {
            cwd,
            out_dir,
            scratch_dir: std::env::temp_dir(),
        }
    }

    pub fn resolve(&self, path: &Path) -> PathBuf {
        util::absolutize(&self.cwd, path)
    }

    /// A fresh, empty artifacts directory for the step called `name`.
    ///
    /// Fails without touching the filesystem when the directory is, or holds,
    /// the stack directory or one of the step's `inputs`.
    pub(crate) fn artifacts_dir(
        &self,
        name: &str,
        inputs: &[&Path],
    ) -> Result<PathBuf, BuildError> {
        let dir = util::normalize(&self.out_dir.join(name));
        let overlap = std::iter::once(self.cwd.as_path())
            .chain(inputs.iter().copied())
            .find(|input| input.starts_with(&dir));
        if let Some(input) = overlap {
            return Err(BuildError::InvalidProperty(InputPropertyError::new(
                "out_dir",
                format!(
                    "Artifacts directory {} would overwrite {}",
                    dir.display(),
                    input.display()
                ),
            )));
        }

        let io_err = |source| BuildError::Io {
            path: dir.clone(),
            source,
        };
        if dir.exists() {
            fs::remove_dir_all(&dir).map_err(io_err)?;
        }
        fs::create_dir_all(&dir).map_err(io_err)?;
        Ok(dir)
    }
}

/// A declared build step, tagged by `kind` in the manifest.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum BuildStep {
    Nodejs(BuildNodejsArgs),
    Python(BuildPythonArgs),
    Go(BuildGoArgs),
    Java(BuildJavaArgs),
    Dotnet(BuildDotnetArgs),
    Ruby(BuildRubyArgs),
    Rust(BuildRustArgs),
    CustomMake(BuildCustomMakeArgs),
}

impl BuildStep {
    pub fn build(
        &self,
        builder: &dyn LambdaBuilder,
        ctx: &BuildContext,
        name: &str,
    ) -> Result<BuildArtifact, BuildError> {
        match self {
            BuildStep::Nodejs(args) => build_nodejs(builder, ctx, name, args),
            BuildStep::Python(args) => build_python(builder, ctx, name, args),
            BuildStep::Go(args) => build_go(builder, ctx, name, args),
            BuildStep::Java(args) => build_java(builder, ctx, name, args),
            BuildStep::Dotnet(args) => build_dotnet(builder, ctx, name, args),
            BuildStep::Ruby(args) => build_ruby(builder, ctx, name, args),
            BuildStep::Rust(args) => build_rust(builder, ctx, name, args),
            BuildStep::CustomMake(args) => build_custom_make(builder, ctx, name, args),
        }
    }

    /// The runtime the step builds for, when it names one.
    pub fn runtime(&self) -> Option<&str> {
        match self {
            BuildStep::Nodejs(args) => Some(&args.runtime),
            BuildStep::Python(args) => Some(&args.runtime),
            BuildStep::Java(args) => Some(&args.runtime),
            BuildStep::Dotnet(args) => Some(&args.runtime),
            BuildStep::Ruby(args) => Some(&args.runtime),
            BuildStep::Go(_) | BuildStep::Rust(_) | BuildStep::CustomMake(_) => None,
        }
    }
}

pub(crate) fn validate_runtime(
    validation: &mut Validation,
    family: &str,
    excluded: &[&str],
    runtime: &str,
) {
    let runtimes = runtimes_for(family, excluded);
    if !runtimes.contains(&runtime) {
        validation.push(
            "runtime",
            format!("Runtime must be one of {}", runtimes.join(", ")),
        );
    }
}

pub(crate) fn validate_architecture(
    validation: &mut Validation,
    architecture: Option<&str>,
) -> Architecture {
    Architecture::resolve(architecture).unwrap_or_else(|reason| {
        validation.push("architecture", reason);
        Architecture::default()
    })
}

/// Resolves `code` and records an error when it doesn't exist.
pub(crate) fn validate_code(
    validation: &mut Validation,
    ctx: &BuildContext,
    code: &Path,
) -> PathBuf {
    let resolved = ctx.resolve(code);
    if !resolved.exists() {
        validation.push("code", format!("Cannot find code at {}", code.display()));
    }
    resolved
}

pub(crate) fn run(
    builder: &dyn LambdaBuilder,
    language: &str,
    request: BuildRequest,
) -> Result<BuildArtifact, BuildError> {
    log::info!(
        "Building {} code in {} for {} ({})",
        language,
        request.source_dir.display(),
        request.runtime,
        request.architecture
    );
    builder
        .build(&request)
        .map_err(|failure| into_build_error(language, failure))?;
    log::info!("Built {} into {}", language, request.artifacts_dir.display());
    Ok(BuildArtifact {
        path: request.artifacts_dir,
    })
}

/// Treats empty strings like missing values.
pub(crate) fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}
