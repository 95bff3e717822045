use super::{run, validate_architecture, validate_code, BuildArtifact, BuildContext};
use crate::builder::{BuildRequest, Capability, LambdaBuilder};
use crate::error::{BuildError, Validation};
use serde::Deserialize;
use serde_json::{json, Map};
use std::path::PathBuf;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BuildCustomMakeArgs {
    /// Source directory holding the Makefile.
    pub code: PathBuf,
    /// The Makefile is expected to have a `build-<make_target_id>` target.
    pub make_target_id: String,
    pub architecture: Option<String>,
}

pub fn build_custom_make(
    builder: &dyn LambdaBuilder,
    ctx: &BuildContext,
    name: &str,
    args: &BuildCustomMakeArgs,
) -> Result<BuildArtifact, BuildError> {
    let mut validation = Validation::default();
    let code = validate_code(&mut validation, ctx, &args.code);
    if args.make_target_id.trim().is_empty() {
        validation.push("make_target_id", "Make target id must not be empty");
    }
    let architecture = validate_architecture(&mut validation, args.architecture.as_deref());
    validation.finish()?;

    let mut options = Map::new();
    options.insert("build_logical_id".into(), json!(args.make_target_id));

    let artifacts_dir = ctx.artifacts_dir(name, &[code.as_path()])?;
    let mut request = BuildRequest::new(
        Capability::new("provided", None),
        code,
        artifacts_dir,
        ctx.scratch_dir.clone(),
        "provided",
        architecture,
    );
    request.build_in_source = Some(true);
    request.options = Some(options);

    run(builder, "custom", request)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build::testing::{assert_single_error, Project};
    use crate::builder::tests::RecordingBuilder;

    #[test]
    fn passes_make_target() {
        let project = Project::new();
        project.file("src/Makefile", "build-HelloWorld:\n\tcp *.sh $(ARTIFACTS_DIR)\n");
        let builder = RecordingBuilder::ok();
        let args = BuildCustomMakeArgs {
            code: "src".into(),
            make_target_id: "HelloWorld".into(),
            architecture: None,
        };

        build_custom_make(&builder, &project.ctx(""), "make", &args).unwrap();

        let request = builder.only_request();
        assert_eq!(request.capability, Capability::new("provided", None));
        assert_eq!(request.build_in_source, Some(true));
        assert_eq!(request.options.unwrap()["build_logical_id"], json!("HelloWorld"));
    }

    #[test]
    fn empty_make_target() {
        let project = Project::new();
        project.dir("src");
        let args = BuildCustomMakeArgs {
            code: "src".into(),
            make_target_id: " ".into(),
            architecture: None,
        };
        let err = build_custom_make(&RecordingBuilder::ok(), &project.ctx(""), "make", &args)
            .unwrap_err();
        assert_single_error(&err, "make_target_id", "must not be empty");
    }
}
