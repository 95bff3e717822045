use super::{run, validate_architecture, validate_code, BuildArtifact, BuildContext};
use crate::builder::{BuildRequest, Capability, LambdaBuilder};
use crate::error::{BuildError, Validation};
use serde::Deserialize;
use serde_json::{json, Map};
use std::collections::BTreeMap;
use std::path::PathBuf;

const CARGO_LAMBDA_FLAG: &str = "experimentalCargoLambda";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BuildRustArgs {
    /// Directory holding Cargo.toml.
    pub code: PathBuf,
    pub architecture: Option<String>,
    /// Binary to package. Only needed for cargo workspaces.
    pub binary_name: Option<String>,
    /// Extra cargo flags, keyed with their leading `--`.
    pub cargo_flags: Option<BTreeMap<String, String>>,
}

pub fn build_rust(
    builder: &dyn LambdaBuilder,
    ctx: &BuildContext,
    name: &str,
    args: &BuildRustArgs,
) -> Result<BuildArtifact, BuildError> {
    let mut validation = Validation::default();
    let code = validate_code(&mut validation, ctx, &args.code);
    let architecture = validate_architecture(&mut validation, args.architecture.as_deref());
    validation.finish()?;

    let mut options = Map::new();
    if let Some(binary) = args.binary_name.as_deref().filter(|b| !b.is_empty()) {
        options.insert("artifact_executable_name".into(), json!(binary));
    }
    if let Some(flags) = args.cargo_flags.as_ref().filter(|f| !f.is_empty()) {
        options.insert("cargo_lambda_flags".into(), json!(flags));
    }

    let artifacts_dir = ctx.artifacts_dir(name, &[code.as_path()])?;
    let mut request = BuildRequest::new(
        Capability::new("rust", Some("cargo")),
        code,
        artifacts_dir,
        ctx.scratch_dir.clone(),
        "provided",
        architecture,
    );
    request.build_in_source = Some(true);
    request.experimental_flags = vec![CARGO_LAMBDA_FLAG.to_owned()];
    request.options = Some(options);

    run(builder, "Rust", request)
}
