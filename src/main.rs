use cargo_lambda_stack::{util, BuildContext, BuildError, CliLambdaBuilder, Stack};
use std::path::{Path, PathBuf};
use std::{env, process};
use structopt::StructOpt;

/// Builds the Lambda functions declared in Lambda.toml with aws-lambda-builders
#[derive(StructOpt, Debug)]
#[structopt(bin_name = "cargo lambda-stack")]
struct Opt {
    /// Stack declaration; relative paths inside it resolve against its directory
    #[structopt(long, default_value = "Lambda.toml", parse(from_os_str))]
    manifest_path: PathBuf,
    /// Directory the build artifacts are written to, one subdirectory per build
    #[structopt(long, default_value = "target/lambda-stack", parse(from_os_str))]
    out_dir: PathBuf,
    /// Build helper executable (from `pip install aws-lambda-builders`)
    #[structopt(long, default_value = "lambda-builders")]
    builder: String,
    /// Log build helper requests and output
    #[structopt(short, long)]
    verbose: bool,
    #[structopt(subcommand)]
    cmd: Cmd,
}

#[derive(StructOpt, Debug)]
enum Cmd {
    /// Check that the build helper can be run
    Check,
    /// Validate the stack declaration without building
    Validate,
    /// Build every declared build step and print the deployment plan as JSON
    Build,
}

fn main() {
    let mut args = env::args().collect::<Vec<_>>();
    if args.get(1).map(String::as_str) == Some("lambda-stack") {
        args.remove(1);
    }
    let opt = Opt::from_iter(args);

    let level = if opt.verbose {
        log::Level::Debug
    } else {
        log::Level::Info
    };
    if let Err(e) = simple_logger::init_with_level(level) {
        eprintln!("Failed to init logger: {}", e);
    }

    if let Err(e) = run(&opt) {
        eprintln!("\n===== Build FAILED =====");
        eprintln!("{}", e);
        if let BuildError::InvalidArguments(errors) = &e {
            for error in errors {
                eprintln!("  {}", error);
            }
        }
        process::exit(1);
    }
}

fn run(opt: &Opt) -> Result<(), BuildError> {
    let builder = CliLambdaBuilder::new(opt.builder.clone());

    match opt.cmd {
        Cmd::Check => {
            builder.check()?;
            println!("Found build helper {}", builder.program());
        }
        Cmd::Validate => {
            let (manifest_path, stack) = load_stack(opt)?;
            stack.validate()?;
            log::info!("{} is valid", manifest_path.display());
        }
        Cmd::Build => {
            let (manifest_path, stack) = load_stack(opt)?;
            builder.check()?;

            let stack_dir = manifest_path.parent().unwrap_or_else(|| Path::new("/"));
            let ctx = BuildContext::new(stack_dir, current_dir()?.join(&opt.out_dir));
            let plan = stack.plan(&builder, &ctx)?;

            println!("{}", serde_json::to_string_pretty(&plan)?);
        }
    }
    Ok(())
}

fn current_dir() -> Result<PathBuf, BuildError> {
    env::current_dir().map_err(|source| BuildError::Io {
        path: PathBuf::from("."),
        source,
    })
}

fn load_stack(opt: &Opt) -> Result<(PathBuf, Stack), BuildError> {
    let manifest_path = util::absolutize(&current_dir()?, &opt.manifest_path);
    let stack = Stack::load(&manifest_path)?;
    Ok((manifest_path, stack))
}
