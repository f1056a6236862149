//! Type definitions used throughout the scripts

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{deployments::DeploymentRecord, errors::DeployError};

/// An argument to a constructor or initializer
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StepArg {
    /// The proxy address recorded under a logical name by an earlier step
    Deployment {
        /// The logical name of the referenced deployment
        deployment: String,
    },
    /// A literal, coerced against the ABI parameter type when encoded
    Text(String),
    /// A numeric literal
    Number(serde_json::Number),
    /// A boolean literal
    Bool(bool),
}

impl StepArg {
    /// A literal argument
    pub fn literal(value: impl ToString) -> Self {
        StepArg::Text(value.to_string())
    }

    /// A reference to the deployment recorded under `name`
    pub fn deployment(name: &str) -> Self {
        StepArg::Deployment { deployment: name.to_string() }
    }

    /// The logical name this argument references, if any
    pub fn dependency(&self) -> Option<&str> {
        match self {
            StepArg::Deployment { deployment } => Some(deployment),
            _ => None,
        }
    }

    /// Resolve the argument to its textual form, looking references up in `deployments`
    pub fn resolve(
        &self,
        step: &str,
        deployments: &BTreeMap<String, DeploymentRecord>,
    ) -> Result<String, DeployError> {
        match self {
            StepArg::Deployment { deployment } => deployments
                .get(deployment)
                .map(|record| record.address.to_string())
                .ok_or_else(|| DeployError::MissingDependency {
                    step: step.to_string(),
                    dependency: deployment.clone(),
                }),
            StepArg::Text(text) => Ok(text.clone()),
            StepArg::Number(number) => Ok(number.to_string()),
            StepArg::Bool(b) => Ok(b.to_string()),
        }
    }
}

/// A method invoked exactly once, through the proxy, when it is created
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Initializer {
    /// The method name
    #[serde(alias = "methodName")]
    pub method: String,
    /// The method arguments
    #[serde(default)]
    pub args: Vec<StepArg>,
}

/// A single upgradeable contract deployment in a pipeline
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineStep {
    /// The contract name, matching a compiled artifact. Also the logical name
    /// the resulting deployment is recorded under.
    pub contract: String,
    /// Arguments to the implementation contract's constructor
    #[serde(default)]
    pub constructor_args: Vec<StepArg>,
    /// The initializer invoked through the proxy
    #[serde(default)]
    pub initializer: Option<Initializer>,
    /// Tags used to select a subset of a plan
    #[serde(default)]
    pub tags: Vec<String>,
}

impl PipelineStep {
    /// A step deploying `contract` with no arguments and no initializer
    pub fn new(contract: &str) -> Self {
        Self {
            contract: contract.to_string(),
            constructor_args: Vec::new(),
            initializer: None,
            tags: Vec::new(),
        }
    }

    /// Set the implementation constructor arguments
    pub fn with_constructor_args(mut self, args: Vec<StepArg>) -> Self {
        self.constructor_args = args;
        self
    }

    /// Set the initializer invoked through the proxy
    pub fn with_initializer(mut self, method: &str, args: Vec<StepArg>) -> Self {
        self.initializer = Some(Initializer { method: method.to_string(), args });
        self
    }

    /// Add a tag
    pub fn with_tag(mut self, tag: &str) -> Self {
        self.tags.push(tag.to_string());
        self
    }

    /// The logical name the deployment is recorded under
    pub fn logical_name(&self) -> &str {
        &self.contract
    }

    /// Whether the step carries any of `tags`
    pub fn has_any_tag(&self, tags: &[String]) -> bool {
        self.tags.iter().any(|t| tags.contains(t))
    }

    /// The logical names of every deployment this step references
    pub fn dependencies(&self) -> impl Iterator<Item = &str> {
        let init_args = self.initializer.iter().flat_map(|init| init.args.iter());
        self.constructor_args.iter().chain(init_args).filter_map(StepArg::dependency)
    }
}
