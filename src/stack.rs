//! The stack declaration read from `Lambda.toml`.
//!
//! ```toml
//! [roles.test-role]
//!
//! [builds.nodejs]
//! kind = "nodejs"
//! entry = "app/index.ts"
//! runtime = "nodejs20.x"
//!
//! [functions.test-handler]
//! role = "test-role"
//! code = "nodejs"
//! handler = "index.handler"
//! runtime = "nodejs20.x"
//! ```
//!
//! Building a stack runs every build step once and binds each function to its
//! role and to the artifact of the step named by `code`.

use crate::build::{BuildArtifact, BuildContext, BuildStep};
use crate::builder::LambdaBuilder;
use crate::error::{BuildError, Validation};
use crate::runtime::SUPPORTED_RUNTIMES;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

pub const LAMBDA_PRINCIPAL: &str = "lambda.amazonaws.com";
pub const BASIC_EXECUTION_ROLE: &str =
    "arn:aws:iam::aws:policy/service-role/AWSLambdaBasicExecutionRole";

fn default_principal() -> String {
    LAMBDA_PRINCIPAL.to_owned()
}

fn default_policies() -> Vec<String> {
    vec![BASIC_EXECUTION_ROLE.to_owned()]
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    /// Service allowed to assume the role.
    #[serde(default = "default_principal")]
    pub principal: String,
    #[serde(default = "default_policies")]
    pub managed_policy_arns: Vec<String>,
}

impl Default for Role {
    fn default() -> Self {
        Role {
            principal: default_principal(),
            managed_policy_arns: default_policies(),
        }
    }
}

impl Role {
    /// Trust policy letting the principal service assume this role.
    pub fn assume_role_policy(&self) -> Value {
        json!({
            "Version": "2012-10-17",
            "Statement": [{
                "Sid": "AllowAssumeRole",
                "Effect": "Allow",
                "Principal": { "Service": self.principal },
                "Action": "sts:AssumeRole",
            }],
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct FunctionDecl {
    /// Name of a role under `[roles]`.
    pub role: String,
    /// Name of a build step under `[builds]`.
    pub code: String,
    /// Entry symbol, e.g. `index.handler` or `bootstrap`.
    pub handler: String,
    pub runtime: String,
    #[serde(default)]
    pub environment: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Stack {
    #[serde(default)]
    pub roles: BTreeMap<String, Role>,
    #[serde(default)]
    pub builds: BTreeMap<String, BuildStep>,
    #[serde(default)]
    pub functions: BTreeMap<String, FunctionDecl>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RoleBinding {
    pub name: String,
    pub assume_role_policy: Value,
    pub managed_policy_arns: Vec<String>,
}

/// A function bound to its role and its built code.
#[derive(Debug, Clone, Serialize)]
pub struct FunctionDeployment {
    pub name: String,
    pub role: RoleBinding,
    pub code: BuildArtifact,
    pub runtime: String,
    pub handler: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub environment: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Plan {
    pub artifacts: BTreeMap<String, BuildArtifact>,
    pub functions: Vec<FunctionDeployment>,
}

impl Stack {
    pub fn load(path: &Path) -> Result<Stack, BuildError> {
        let contents = fs::read_to_string(path).map_err(|source| BuildError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&contents).map_err(|source| BuildError::Manifest {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Checks every reference between functions, roles and builds.
    pub fn validate(&self) -> Result<(), BuildError> {
        let mut validation = Validation::default();

        for name in self.builds.keys() {
            if !is_plain_name(name) {
                validation.push(
                    format!("builds.{}", name),
                    "Build name must be a plain directory name",
                );
            }
        }

        for (name, function) in &self.functions {
            let path = |field: &str| format!("functions.{}.{}", name, field);

            if !self.roles.contains_key(&function.role) {
                validation.push(path("role"), format!("Unknown role {}", function.role));
            }
            if function.handler.trim().is_empty() {
                validation.push(path("handler"), "Handler must not be empty");
            }
            if !SUPPORTED_RUNTIMES.contains(&function.runtime.as_str()) {
                validation.push(
                    path("runtime"),
                    format!("Runtime must be one of {}", SUPPORTED_RUNTIMES.join(", ")),
                );
            }
            match self.builds.get(&function.code) {
                None => validation.push(path("code"), format!("Unknown build {}", function.code)),
                Some(step) => match step.runtime() {
                    Some(built_for) if built_for != function.runtime => validation.push(
                        path("runtime"),
                        format!(
                            "Runtime {} does not match build {} ({})",
                            function.runtime, function.code, built_for
                        ),
                    ),
                    _ => {}
                },
            }
        }

        validation.finish()
    }

    /// Validates, runs every build step once, then binds the functions.
    pub fn plan(
        &self,
        builder: &dyn LambdaBuilder,
        ctx: &BuildContext,
    ) -> Result<Plan, BuildError> {
        self.validate()?;

        for name in self.builds.keys() {
            if !self.functions.values().any(|f| &f.code == name) {
                log::warn!("Build {} is not used by any function", name);
            }
        }

        let mut artifacts = BTreeMap::new();
        for (name, step) in &self.builds {
            let artifact = step.build(builder, ctx, name)?;
            artifacts.insert(name.clone(), artifact);
        }

        let functions = self
            .functions
            .iter()
            .map(|(name, function)| {
                let role = &self.roles[&function.role];
                FunctionDeployment {
                    name: name.clone(),
                    role: RoleBinding {
                        name: function.role.clone(),
                        assume_role_policy: role.assume_role_policy(),
                        managed_policy_arns: role.managed_policy_arns.clone(),
                    },
                    code: artifacts[&function.code].clone(),
                    runtime: function.runtime.clone(),
                    handler: function.handler.clone(),
                    environment: function.environment.clone(),
                }
            })
            .collect();

        Ok(Plan {
            artifacts,
            functions,
        })
    }
}

fn is_plain_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(|c: char| c == '/' || c == '\\')
}
