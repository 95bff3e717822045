use super::{
    run, validate_architecture, validate_code, validate_runtime, BuildArtifact, BuildContext,
};
use crate::builder::{BuildRequest, Capability, LambdaBuilder};
use crate::error::{BuildError, InputPropertyError, Validation};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Manifests in lookup order, with the dependency manager each implies.
const MANIFESTS: &[(&str, &str)] = &[
    ("build.gradle", "gradle"),
    ("build.gradle.kts", "gradle"),
    ("pom.xml", "maven"),
];

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BuildJavaArgs {
    pub code: PathBuf,
    /// Java runtime to build for, e.g. `java21`.
    pub runtime: String,
    pub architecture: Option<String>,
}

fn detect_manifest(code: &Path) -> Option<(PathBuf, &'static str)> {
    MANIFESTS
        .iter()
        .map(|(file, manager)| (code.join(file), *manager))
        .find(|(path, _)| path.is_file())
}

pub fn build_java(
    builder: &dyn LambdaBuilder,
    ctx: &BuildContext,
    name: &str,
    args: &BuildJavaArgs,
) -> Result<BuildArtifact, BuildError> {
    let mut validation = Validation::default();
    let code = validate_code(&mut validation, ctx, &args.code);
    validate_runtime(&mut validation, "java", &[], &args.runtime);
    let architecture = validate_architecture(&mut validation, args.architecture.as_deref());
    validation.finish()?;

    let (manifest, dependency_manager) = detect_manifest(&code).ok_or_else(|| {
        BuildError::InvalidProperty(InputPropertyError::new(
            "code",
            "No build.gradle, build.gradle.kts, or pom.xml found in code directory",
        ))
    })?;

    let artifacts_dir = ctx.artifacts_dir(name, &[code.as_path(), manifest.as_path()])?;
    let mut request = BuildRequest::new(
        Capability::new("java", Some(dependency_manager)),
        code,
        artifacts_dir,
        ctx.scratch_dir.clone(),
        &args.runtime,
        architecture,
    );
    request.manifest_path = Some(manifest);

    run(builder, "Java", request)
}
