use super::{
    run, validate_architecture, validate_code, validate_runtime, BuildArtifact, BuildContext,
};
use crate::builder::{BuildRequest, Capability, LambdaBuilder};
use crate::error::{BuildError, Validation};
use serde::Deserialize;
use std::path::PathBuf;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BuildRubyArgs {
    pub code: PathBuf,
    /// Ruby runtime to build dependencies for, e.g. `ruby3.3`.
    pub runtime: String,
    pub architecture: Option<String>,
}

pub fn build_ruby(
    builder: &dyn LambdaBuilder,
    ctx: &BuildContext,
    name: &str,
    args: &BuildRubyArgs,
) -> Result<BuildArtifact, BuildError> {
    let mut validation = Validation::default();
    let code = validate_code(&mut validation, ctx, &args.code);
    validate_runtime(&mut validation, "ruby", &[], &args.runtime);
    let architecture = validate_architecture(&mut validation, args.architecture.as_deref());
    validation.finish()?;

    let artifacts_dir = ctx.artifacts_dir(name, &[code.as_path()])?;
    let request = BuildRequest::new(
        Capability::new("ruby", Some("bundler")),
        code,
        artifacts_dir,
        ctx.scratch_dir.clone(),
        &args.runtime,
        architecture,
    );

    run(builder, "Ruby", request)
}
