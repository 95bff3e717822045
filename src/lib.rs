//! Declare Lambda roles, build steps and functions in `Lambda.toml`, build every
//! step's code with aws-lambda-builders and bind the results into a deployment plan.

pub mod build;
pub mod builder;
pub mod error;
pub mod runtime;
pub mod stack;
pub mod util;

pub use build::{BuildArtifact, BuildContext, BuildStep};
pub use builder::{BuildRequest, CliLambdaBuilder, LambdaBuilder};
pub use error::{BuildError, InputPropertyError};
pub use stack::{FunctionDeployment, Plan, Role, Stack};
