//! Definitions of errors that can occur during deployment of the contracts

use thiserror::Error;

/// Errors that can occur while resolving configuration, accounts, or running the pipeline
#[derive(Debug, Error)]
pub enum DeployError {
    /// The selected network has no profile in the configuration
    #[error("unknown network `{0}`")]
    UnknownNetwork(String),
    /// A network requiring credentials was used without them
    #[error("missing credentials for network `{network}`: {missing}")]
    MissingCredentials {
        /// The network the transaction targeted
        network: String,
        /// A description of the missing credential
        missing: String,
    },
    /// A named account role could not be resolved to an address
    #[error("no account available for `{role}` on `{network}` at index {index}")]
    NoAccountAvailable {
        /// The role being resolved
        role: String,
        /// The active network
        network: String,
        /// The position in the account list that was requested
        index: usize,
    },
    /// A step referenced a deployment that no earlier step produced
    #[error("`{step}` depends on `{dependency}`, which has not been deployed")]
    MissingDependency {
        /// The step holding the reference
        step: String,
        /// The logical name that could not be found
        dependency: String,
    },
    /// The initializer reverted while being invoked through the proxy
    #[error("initializer of `{contract}` reverted: {reason}")]
    Initialization {
        /// The contract whose initializer reverted
        contract: String,
        /// The revert reason reported by the node
        reason: String,
    },
    /// An RPC call took longer than the network's configured timeout
    #[error("RPC call to `{network}` timed out after {timeout_ms}ms")]
    NetworkTimeout {
        /// The network being called
        network: String,
        /// The configured timeout
        timeout_ms: u64,
    },
    /// The plan violates an ordering or naming invariant
    #[error("invalid pipeline: {0}")]
    InvalidPipeline(String),
    /// No compiled artifact exists for a contract
    #[error("no artifact found for contract `{0}`")]
    ArtifactNotFound(String),
    /// A compiled artifact could not be read or parsed
    #[error("error parsing artifact: {0}")]
    ArtifactParsing(String),
    /// An ABI could not be written to the export directory
    #[error("error exporting ABI: {0}")]
    AbiExport(String),
    /// Calldata for a constructor or method could not be built
    #[error("error constructing calldata: {0}")]
    CalldataConstruction(String),
    /// The RPC client could not be set up
    #[error("error initializing client: {0}")]
    ClientInitialization(String),
    /// A contract creation transaction failed
    #[error("error deploying contract: {0}")]
    ContractDeployment(String),
    /// A call or transaction against a deployed contract failed
    #[error("error interacting with contract: {0}")]
    ContractInteraction(String),
    /// A transaction reverted on chain
    #[error("transaction reverted: {0}")]
    Reverted(String),
    /// The persisted deployment records could not be read
    #[error("error reading deployments: {0}")]
    ReadDeployments(String),
    /// A deployment record could not be persisted
    #[error("error writing deployments: {0}")]
    WriteDeployments(String),
    /// An operation required a deployment record that does not exist
    #[error("no deployment recorded for `{0}`")]
    DeploymentNotFound(String),
    /// A pipeline step failed, carrying the name of the contract being deployed
    #[error("step `{contract}` failed: {source}")]
    StepFailed {
        /// The contract the failing step deploys
        contract: String,
        /// The underlying failure
        #[source]
        source: Box<DeployError>,
    },
}

impl DeployError {
    /// Wrap this error with the name of the pipeline step it occurred in
    pub fn in_step(self, contract: &str) -> Self {
        DeployError::StepFailed { contract: contract.to_string(), source: Box::new(self) }
    }

    /// The innermost error, looking through any `StepFailed` wrappers
    pub fn root_cause(&self) -> &DeployError {
        match self {
            DeployError::StepFailed { source, .. } => source.root_cause(),
            other => other,
        }
    }

    /// Whether the error reports a node-side revert
    pub fn is_revert(&self) -> bool {
        matches!(self.root_cause(), DeployError::Reverted(_))
    }
}
