use super::{non_empty, run, validate_architecture, validate_runtime, BuildArtifact, BuildContext};
use crate::builder::{BuildRequest, Capability, LambdaBuilder};
use crate::error::{BuildError, InputPropertyError, Validation};
use crate::runtime::Architecture;
use crate::util;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::path::{Path, PathBuf};

const LOCK_FILE: &str = "package-lock.json";
const DEFAULT_EXTERNALS: &[&str] = &["@aws-sdk/*", "@smithy/*"];
const BUNDLERS: &[&str] = &["npm-esbuild", "npm"];

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EsbuildOptions {
    /// Packages to omit from the bundle.
    pub external: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BuildNodejsArgs {
    /// Path to the entry file (JavaScript or TypeScript).
    pub entry: PathBuf,
    /// Node.js runtime to build for, e.g. `nodejs20.x`.
    pub runtime: String,
    /// Defaults to the first package-lock.json found walking up from the working directory.
    pub lock_file_path: Option<PathBuf>,
    /// Defaults to `node_modules` next to the lock file.
    pub node_modules_path: Option<PathBuf>,
    pub external: Option<Vec<String>>,
    pub architecture: Option<String>,
    /// `npm-esbuild` (default) or `npm`.
    pub bundler: Option<String>,
    /// Bundle the AWS SDK instead of resolving the copy the Lambda runtime provides.
    pub bundle_aws_sdk: Option<bool>,
    pub esbuild_options: Option<EsbuildOptions>,
    /// Defaults to true. Ignored by the `npm` bundler.
    pub minify: Option<bool>,
    /// `iife`, `cjs` (default) or `esm`.
    pub format: Option<String>,
    /// Defaults to `node<N>` derived from the runtime.
    pub target: Option<String>,
}

impl BuildNodejsArgs {
    pub fn new(entry: impl Into<PathBuf>, runtime: &str) -> Self {
        BuildNodejsArgs {
            entry: entry.into(),
            runtime: runtime.to_owned(),
            ..Default::default()
        }
    }

    fn bundler(&self) -> &str {
        non_empty(&self.bundler).unwrap_or("npm-esbuild")
    }

    fn externals(&self) -> Vec<String> {
        let explicit = self
            .external
            .as_ref()
            .or_else(|| self.esbuild_options.as_ref().and_then(|o| o.external.as_ref()))
            .filter(|external| !external.is_empty());
        match explicit {
            Some(external) => external.clone(),
            None if self.bundle_aws_sdk.unwrap_or(false) => Vec::new(),
            None => DEFAULT_EXTERNALS.iter().map(|e| e.to_string()).collect(),
        }
    }
}

fn validate_args(
    ctx: &BuildContext,
    args: &BuildNodejsArgs,
) -> Result<(PathBuf, Architecture), BuildError> {
    let mut validation = Validation::default();
    validate_runtime(&mut validation, "nodejs", &["nodejs16.x"], &args.runtime);

    if !BUNDLERS.contains(&args.bundler()) {
        validation.push("bundler", "Bundler must be one of 'npm-esbuild' or 'npm'");
    }
    let architecture = validate_architecture(&mut validation, args.architecture.as_deref());

    let is_script = matches!(
        args.entry.extension().and_then(|e| e.to_str()),
        Some("js") | Some("ts")
    );
    if !is_script {
        validation.push("entry", "Entry file must be a JavaScript or TypeScript file");
    }
    let entry = ctx.resolve(&args.entry);
    if !entry.exists() {
        validation.push(
            "entry",
            format!("Cannot find entry file at {}", args.entry.display()),
        );
    }

    validation.finish()?;
    Ok((entry, architecture))
}

fn find_lock_file(
    ctx: &BuildContext,
    lock_file_path: Option<&Path>,
) -> Result<PathBuf, BuildError> {
    let invalid = |reason: String| {
        BuildError::InvalidProperty(InputPropertyError::new("lock_file_path", reason))
    };
    match lock_file_path {
        Some(given) => {
            let path = ctx.resolve(given);
            if !path.exists() {
                return Err(invalid(format!("Cannot find lock file at {}", given.display())));
            }
            if !path.is_file() {
                return Err(invalid(format!(
                    "Lock file path must be a file, got {}",
                    given.display()
                )));
            }
            Ok(path)
        }
        None => util::find_up(LOCK_FILE, &ctx.cwd).ok_or_else(|| {
            invalid(format!(
                "Cannot find {} file. Please provide the path to the file",
                LOCK_FILE
            ))
        }),
    }
}

/// `node<N>` for a `nodejs<N>.x` runtime.
fn target_for_runtime(runtime: &str) -> Option<String> {
    let version: String = runtime
        .strip_prefix("nodejs")?
        .chars()
        .take_while(char::is_ascii_digit)
        .collect();
    if version.is_empty() {
        None
    } else {
        Some(format!("node{}", version))
    }
}

fn esbuild_options(
    args: &BuildNodejsArgs,
    entry_point: &Path,
    target: String,
) -> Map<String, Value> {
    let format = non_empty(&args.format).unwrap_or("cjs");
    let mut options = Map::new();
    options.insert(
        "entry_points".into(),
        json!([entry_point.to_string_lossy().replace('\\', "/")]),
    );
    options.insert("external".into(), json!(args.externals()));
    options.insert("minify".into(), json!(args.minify.unwrap_or(true)));
    options.insert("format".into(), json!(format));
    options.insert("target".into(), json!(target));
    if format == "esm" {
        options.insert("out_extensions".into(), json!([".js=.mjs"]));
    }
    options
}

pub fn build_nodejs(
    builder: &dyn LambdaBuilder,
    ctx: &BuildContext,
    name: &str,
    args: &BuildNodejsArgs,
) -> Result<BuildArtifact, BuildError> {
    let (entry, architecture) = validate_args(ctx, args)?;

    let lock_file = find_lock_file(ctx, args.lock_file_path.as_deref())?;
    let project_dir = lock_file
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| ctx.cwd.clone());
    let entry_point = util::relative_to(&entry, &project_dir).ok_or_else(|| {
        BuildError::InvalidProperty(InputPropertyError::new(
            "entry",
            format!(
                "Entry file must be inside the project directory {}",
                project_dir.display()
            ),
        ))
    })?;

    let target = match non_empty(&args.target) {
        Some(target) => target.to_owned(),
        None => target_for_runtime(&args.runtime).ok_or_else(|| {
            BuildError::InvalidProperty(InputPropertyError::new(
                "target",
                "Could not determine the target from the runtime. Please provide the target",
            ))
        })?,
    };

    let node_modules = match &args.node_modules_path {
        Some(path) if !path.as_os_str().is_empty() => ctx.resolve(path),
        _ => project_dir.join("node_modules"),
    };
    let download_dependencies = !node_modules.exists();

    let inputs = [project_dir.as_path(), entry.as_path(), node_modules.as_path()];
    let artifacts_dir = ctx.artifacts_dir(name, &inputs)?;

    let bundler = args.bundler();
    let mut request = BuildRequest::new(
        Capability::new("nodejs", Some(bundler)),
        project_dir.clone(),
        artifacts_dir,
        ctx.scratch_dir.clone(),
        &args.runtime,
        architecture,
    );
    request.manifest_path = Some(project_dir.join("package.json"));
    request.download_dependencies = Some(download_dependencies);
    request.dependencies_dir = Some(node_modules);
    request.build_in_source = Some(true);
    if bundler == "npm-esbuild" {
        request.options = Some(esbuild_options(args, &entry_point, target));
    }

    run(builder, "Node.js", request)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build::testing::{assert_single_error, Project};
    use crate::builder::tests::RecordingBuilder;
    use crate::builder::BuilderFailure;

    fn project() -> Project {
        let project = Project::new();
        project
            .file("project/package-lock.json", "{}")
            .file("project/package.json", "{}")
            .file("project/app/index.ts", "export async function handler() {}");
        project
    }

    fn expected_options(entry_point: &str) -> Map<String, Value> {
        json!({
            "entry_points": [entry_point],
            "external": ["@aws-sdk/*", "@smithy/*"],
            "minify": true,
            "format": "cjs",
            "target": "node18",
        })
        .as_object()
        .cloned()
        .unwrap()
    }

    #[test]
    fn calls_builder_with_correct_args() {
        let project = project();
        let builder = RecordingBuilder::ok();
        let ctx = project.ctx("project");

        let artifact = build_nodejs(
            &builder,
            &ctx,
            "nodejs",
            &BuildNodejsArgs::new("app/index.ts", "nodejs18.x"),
        )
        .unwrap();

        let request = builder.only_request();
        assert_eq!(artifact.path, request.artifacts_dir);
        assert_eq!(request.capability, Capability::new("nodejs", Some("npm-esbuild")));
        assert_eq!(request.source_dir, project.path("project"));
        assert_eq!(request.runtime, "nodejs18.x");
        assert_eq!(request.manifest_path, Some(project.path("project/package.json")));
        assert_eq!(request.download_dependencies, Some(true));
        assert_eq!(request.dependencies_dir, Some(project.path("project/node_modules")));
        assert_eq!(request.build_in_source, Some(true));
        assert_eq!(request.architecture, Architecture::X86_64);
        assert_eq!(request.options, Some(expected_options("app/index.ts")));
    }

    #[test]
    fn finds_lock_file_in_parent_and_reuses_node_modules() {
        let project = project();
        project.dir("project/node_modules");
        let builder = RecordingBuilder::ok();

        build_nodejs(
            &builder,
            &project.ctx("project/app"),
            "nodejs",
            &BuildNodejsArgs::new("index.ts", "nodejs18.x"),
        )
        .unwrap();

        let request = builder.only_request();
        assert_eq!(request.manifest_path, Some(project.path("project/package.json")));
        assert_eq!(request.download_dependencies, Some(false));
        assert_eq!(request.options, Some(expected_options("app/index.ts")));
    }

    #[test]
    fn nearest_lock_file_wins() {
        let project = project();
        project
            .file("project/app/package-lock.json", "{}")
            .file("project/app/package.json", "{}");
        let builder = RecordingBuilder::ok();

        build_nodejs(
            &builder,
            &project.ctx("project/app"),
            "nodejs",
            &BuildNodejsArgs::new("index.ts", "nodejs18.x"),
        )
        .unwrap();

        let request = builder.only_request();
        assert_eq!(request.source_dir, project.path("project/app"));
        assert_eq!(request.manifest_path, Some(project.path("project/app/package.json")));
        assert_eq!(request.options, Some(expected_options("index.ts")));
    }

    #[test]
    fn empty_strings_fall_back_to_defaults() {
        let project = project();
        let builder = RecordingBuilder::ok();
        let args = BuildNodejsArgs {
            external: Some(vec![]),
            format: Some(String::new()),
            target: Some(String::new()),
            node_modules_path: Some(PathBuf::new()),
            architecture: Some(String::new()),
            ..BuildNodejsArgs::new("app/index.ts", "nodejs18.x")
        };

        build_nodejs(&builder, &project.ctx("project"), "nodejs", &args).unwrap();
        assert_eq!(
            builder.only_request().options,
            Some(expected_options("app/index.ts"))
        );
    }

    #[test]
    fn esm_format_and_bundled_sdk() {
        let project = project();
        let builder = RecordingBuilder::ok();
        let args = BuildNodejsArgs {
            format: Some("esm".into()),
            bundle_aws_sdk: Some(true),
            minify: Some(false),
            target: Some("es2022".into()),
            ..BuildNodejsArgs::new("app/index.ts", "nodejs20.x")
        };

        build_nodejs(&builder, &project.ctx("project"), "nodejs", &args).unwrap();
        let options = builder.only_request().options.unwrap();
        assert_eq!(options["external"], json!([]));
        assert_eq!(options["minify"], json!(false));
        assert_eq!(options["target"], json!("es2022"));
        assert_eq!(options["out_extensions"], json!([".js=.mjs"]));
    }

    #[test]
    fn esbuild_externals_apply_when_top_level_missing() {
        let project = project();
        let builder = RecordingBuilder::ok();
        let args = BuildNodejsArgs {
            esbuild_options: Some(EsbuildOptions {
                external: Some(vec!["pg-native".into()]),
            }),
            ..BuildNodejsArgs::new("app/index.ts", "nodejs20.x")
        };

        build_nodejs(&builder, &project.ctx("project"), "nodejs", &args).unwrap();
        assert_eq!(
            builder.only_request().options.unwrap()["external"],
            json!(["pg-native"])
        );
    }

    #[test]
    fn npm_bundler_sends_no_esbuild_options() {
        let project = project();
        let builder = RecordingBuilder::ok();
        let args = BuildNodejsArgs {
            bundler: Some("npm".into()),
            ..BuildNodejsArgs::new("app/index.ts", "nodejs20.x")
        };

        build_nodejs(&builder, &project.ctx("project"), "nodejs", &args).unwrap();
        let request = builder.only_request();
        assert_eq!(request.capability.dependency_manager.as_deref(), Some("npm"));
        assert_eq!(request.options, None);
    }

    #[test]
    fn invalid_runtime() {
        let project = project();
        let builder = RecordingBuilder::ok();
        let err = build_nodejs(
            &builder,
            &project.ctx("project"),
            "nodejs",
            &BuildNodejsArgs::new("app/index.ts", "nodejs14.x"),
        )
        .unwrap_err();
        assert_single_error(&err, "runtime", "Runtime must be one of");
        assert!(!err.property_errors()[0].reason.contains("nodejs16.x"));
        assert!(builder.requests.borrow().is_empty());
    }

    #[test]
    fn invalid_architecture() {
        let project = project();
        let args = BuildNodejsArgs {
            architecture: Some("invalid-arch".into()),
            ..BuildNodejsArgs::new("app/index.ts", "nodejs18.x")
        };
        let err = build_nodejs(&RecordingBuilder::ok(), &project.ctx("project"), "nodejs", &args)
            .unwrap_err();
        assert_single_error(&err, "architecture", "Architecture must be one of arm64, x86_64");
    }

    #[test]
    fn invalid_bundler() {
        let project = project();
        let args = BuildNodejsArgs {
            bundler: Some("webpack".into()),
            ..BuildNodejsArgs::new("app/index.ts", "nodejs18.x")
        };
        let err = build_nodejs(&RecordingBuilder::ok(), &project.ctx("project"), "nodejs", &args)
            .unwrap_err();
        assert_single_error(&err, "bundler", "Bundler must be one of 'npm-esbuild' or 'npm'");
    }

    #[test]
    fn nonexistent_entry_file() {
        let project = project();
        let err = build_nodejs(
            &RecordingBuilder::ok(),
            &project.ctx("project"),
            "nodejs",
            &BuildNodejsArgs::new("app/nonexistent.ts", "nodejs18.x"),
        )
        .unwrap_err();
        assert_single_error(&err, "entry", "Cannot find entry file at app/nonexistent.ts");
    }

    #[test]
    fn invalid_entry_file_type() {
        let project = project();
        project.file("project/app/index.txt", "test");
        let err = build_nodejs(
            &RecordingBuilder::ok(),
            &project.ctx("project"),
            "nodejs",
            &BuildNodejsArgs::new("app/index.txt", "nodejs18.x"),
        )
        .unwrap_err();
        assert_single_error(&err, "entry", "Entry file must be a JavaScript or TypeScript file");
    }

    #[test]
    fn every_invalid_property_is_reported() {
        let project = project();
        let args = BuildNodejsArgs {
            architecture: Some("mips".into()),
            ..BuildNodejsArgs::new("app/missing.txt", "nodejs14.x")
        };
        let err = build_nodejs(&RecordingBuilder::ok(), &project.ctx("project"), "nodejs", &args)
            .unwrap_err();
        let paths: Vec<_> = err
            .property_errors()
            .iter()
            .map(|e| e.property_path.as_str())
            .collect();
        assert_eq!(paths, vec!["runtime", "architecture", "entry", "entry"]);
    }

    #[test]
    fn cannot_find_lock_file() {
        let project = Project::new();
        project.file("project/app/index.ts", "test");
        let err = build_nodejs(
            &RecordingBuilder::ok(),
            &project.ctx(""),
            "nodejs",
            &BuildNodejsArgs::new("project/app/index.ts", "nodejs18.x"),
        )
        .unwrap_err();
        assert!(matches!(err, BuildError::InvalidProperty(_)));
        assert_single_error(
            &err,
            "lock_file_path",
            "Cannot find package-lock.json file. Please provide the path to the file",
        );
    }

    #[test]
    fn explicit_lock_file_must_be_a_file() {
        let project = project();
        let args = BuildNodejsArgs {
            lock_file_path: Some("app".into()),
            ..BuildNodejsArgs::new("app/index.ts", "nodejs18.x")
        };
        let err = build_nodejs(&RecordingBuilder::ok(), &project.ctx("project"), "nodejs", &args)
            .unwrap_err();
        assert_single_error(&err, "lock_file_path", "Lock file path must be a file, got app");

        let args = BuildNodejsArgs {
            lock_file_path: Some("missing/package-lock.json".into()),
            ..BuildNodejsArgs::new("app/index.ts", "nodejs18.x")
        };
        let err = build_nodejs(&RecordingBuilder::ok(), &project.ctx("project"), "nodejs", &args)
            .unwrap_err();
        assert_single_error(
            &err,
            "lock_file_path",
            "Cannot find lock file at missing/package-lock.json",
        );
    }

    #[test]
    fn entry_outside_project_is_rejected() {
        let project = project();
        project
            .file("project/app/package-lock.json", "{}")
            .file("project/other.ts", "test");
        let err = build_nodejs(
            &RecordingBuilder::ok(),
            &project.ctx("project/app"),
            "nodejs",
            &BuildNodejsArgs::new("../other.ts", "nodejs18.x"),
        )
        .unwrap_err();
        assert_single_error(&err, "entry", "must be inside the project directory");
    }

    #[test]
    fn target_is_derived_from_runtime() {
        assert_eq!(target_for_runtime("nodejs20.x").as_deref(), Some("node20"));
        assert_eq!(target_for_runtime("nodejs"), None);
        assert_eq!(target_for_runtime("python3.12"), None);
    }

    #[test]
    fn helper_failures_surface() {
        let project = project();
        let builder = RecordingBuilder::failing(BuilderFailure::UnsupportedArchitecture(
            "arm64 not supported".into(),
        ));
        let err = build_nodejs(
            &builder,
            &project.ctx("project"),
            "nodejs",
            &BuildNodejsArgs::new("app/index.ts", "nodejs18.x"),
        )
        .unwrap_err();
        assert!(matches!(err, BuildError::UnsupportedArchitecture(_)));

        let builder = RecordingBuilder::failing(BuilderFailure::Failed("esbuild exploded".into()));
        let err = build_nodejs(
            &builder,
            &project.ctx("project"),
            "nodejs",
            &BuildNodejsArgs::new("app/index.ts", "nodejs18.x"),
        )
        .unwrap_err();
        assert_eq!(err.to_string(), "Failed to build Node.js code: esbuild exploded");
    }
}
