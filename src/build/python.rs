use super::{
    run, validate_architecture, validate_code, validate_runtime, BuildArtifact, BuildContext,
};
use crate::builder::{BuildRequest, Capability, LambdaBuilder};
use crate::error::{BuildError, Validation};
use crate::util;
use serde::Deserialize;
use std::path::{Path, PathBuf};

const REQUIREMENTS: &str = "requirements.txt";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BuildPythonArgs {
    /// Directory holding the function code. A file path falls back to its parent directory.
    pub code: PathBuf,
    /// Python runtime to build dependencies for, e.g. `python3.12`.
    pub runtime: String,
    pub architecture: Option<String>,
    /// requirements.txt listing the dependencies. Found by walking up from `code` when omitted.
    pub requirements_path: Option<PathBuf>,
}

impl BuildPythonArgs {
    pub fn new(code: impl Into<PathBuf>, runtime: &str) -> Self {
        BuildPythonArgs {
            code: code.into(),
            runtime: runtime.to_owned(),
            ..Default::default()
        }
    }
}

pub fn build_python(
    builder: &dyn LambdaBuilder,
    ctx: &BuildContext,
    name: &str,
    args: &BuildPythonArgs,
) -> Result<BuildArtifact, BuildError> {
    let mut validation = Validation::default();
    validate_runtime(&mut validation, "python", &[], &args.runtime);
    let architecture = validate_architecture(&mut validation, args.architecture.as_deref());
    let mut code = validate_code(&mut validation, ctx, &args.code);
    let requirements = args.requirements_path.as_ref().map(|given| {
        let path = ctx.resolve(given);
        if !path.is_file() {
            validation.push(
                "requirements_path",
                format!(
                    "requirements.txt not found at path provided: {}",
                    given.display()
                ),
            );
        }
        path
    });
    validation.finish()?;

    if !code.is_dir() {
        code = code.parent().map(Path::to_path_buf).unwrap_or(code);
        log::warn!(
            "code path is not a directory, using parent directory {} instead",
            code.display()
        );
    }

    let requirements = requirements.or_else(|| util::find_up(REQUIREMENTS, &code));
    if requirements.is_none() {
        log::warn!("requirements.txt file not found. Continuing the build without dependencies.");
    }

    let mut inputs = vec![code.as_path()];
    inputs.extend(requirements.as_deref());
    let artifacts_dir = ctx.artifacts_dir(name, &inputs)?;

    let mut request = BuildRequest::new(
        Capability::new("python", Some("pip")),
        code,
        artifacts_dir,
        ctx.scratch_dir.clone(),
        &args.runtime,
        architecture,
    );
    request.manifest_path = requirements;

    run(builder, "Python", request)
}
