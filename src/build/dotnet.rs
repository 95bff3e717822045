use super::{
    run, validate_architecture, validate_code, validate_runtime, BuildArtifact, BuildContext,
};
use crate::builder::{BuildRequest, Capability, LambdaBuilder};
use crate::error::{BuildError, Validation};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::PathBuf;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BuildDotnetArgs {
    pub code: PathBuf,
    /// .NET runtime to build for, e.g. `dotnet8`.
    pub runtime: String,
    /// Extra `dotnet` command line flags, keyed with their leading `-` or `--`.
    pub build_options: Option<BTreeMap<String, String>>,
    pub architecture: Option<String>,
}

pub fn build_dotnet(
    builder: &dyn LambdaBuilder,
    ctx: &BuildContext,
    name: &str,
    args: &BuildDotnetArgs,
) -> Result<BuildArtifact, BuildError> {
    let mut validation = Validation::default();
    let code = validate_code(&mut validation, ctx, &args.code);
    validate_runtime(&mut validation, "dotnet", &[], &args.runtime);
    let architecture = validate_architecture(&mut validation, args.architecture.as_deref());
    validation.finish()?;

    let artifacts_dir = ctx.artifacts_dir(name, &[code.as_path()])?;
    let mut request = BuildRequest::new(
        Capability::new("dotnet", Some("cli-package")),
        code,
        artifacts_dir,
        ctx.scratch_dir.clone(),
        &args.runtime,
        architecture,
    );
    request.options = args.build_options.as_ref().map(|flags| {
        flags
            .iter()
            .map(|(flag, value)| (flag.clone(), Value::from(value.as_str())))
            .collect::<Map<String, Value>>()
    });

    run(builder, ".NET", request)
}
