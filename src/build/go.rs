use super::{run, validate_architecture, validate_code, BuildArtifact, BuildContext};
use crate::builder::{BuildRequest, Capability, LambdaBuilder};
use crate::error::{BuildError, Validation};
use serde::Deserialize;
use std::path::PathBuf;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BuildGoArgs {
    /// Directory holding the Go module.
    pub code: PathBuf,
    pub architecture: Option<String>,
}

pub fn build_go(
    builder: &dyn LambdaBuilder,
    ctx: &BuildContext,
    name: &str,
    args: &BuildGoArgs,
) -> Result<BuildArtifact, BuildError> {
    let mut validation = Validation::default();
    let code = validate_code(&mut validation, ctx, &args.code);
    let architecture = validate_architecture(&mut validation, args.architecture.as_deref());
    validation.finish()?;

    let artifacts_dir = ctx.artifacts_dir(name, &[code.as_path()])?;
    let mut request = BuildRequest::new(
        Capability::new("go", Some("modules")),
        code,
        artifacts_dir,
        ctx.scratch_dir.clone(),
        "provided",
        architecture,
    );
    request.build_in_source = Some(true);

    run(builder, "Go", request)
}
