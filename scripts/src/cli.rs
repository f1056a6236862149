//! Definitions of CLI arguments and commands for deploy scripts

use std::path::PathBuf;

use alloy::primitives::Address;
use clap::{Args, Parser, Subcommand};

use crate::{
    commands::{accounts, deploy, export_abi, networks, status, upgrade},
    config::{Config, ConfigInputs, Paths},
    constants::{
        ALCHEMY_KEY_ENV_VAR, DEFAULT_ABI_DIR, DEFAULT_ARTIFACTS_DIR, DEFAULT_DEPLOYMENTS_DIR,
        DEFAULT_NETWORK, ETHERSCAN_API_KEY_ENV_VAR, GANACHE_DEPLOYER_ADDRESS_ENV_VAR,
        PRIVATE_KEY_ENV_VAR,
    },
    errors::DeployError,
};

/// Deploy and manage the upgradeable contract suite
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// The network to run against
    #[arg(short, long, default_value = DEFAULT_NETWORK, global = true)]
    pub network: String,

    /// Alchemy API key used to reach the public networks
    #[arg(long, env = ALCHEMY_KEY_ENV_VAR, hide_env_values = true)]
    pub alchemy_key: Option<String>,

    /// Private key of the deployer, in hex
    #[arg(long, env = PRIVATE_KEY_ENV_VAR, hide_env_values = true)]
    pub private_key: Option<String>,

    /// Deployer address to use on Ganache instead of the first node account
    #[arg(long, env = GANACHE_DEPLOYER_ADDRESS_ENV_VAR)]
    pub ganache_deployer_address: Option<Address>,

    /// Block explorer API key, used by external verification tooling
    #[arg(long, env = ETHERSCAN_API_KEY_ENV_VAR, hide_env_values = true)]
    pub etherscan_api_key: Option<String>,

    /// Directory containing compiled contract artifacts
    #[arg(long, default_value = DEFAULT_ARTIFACTS_DIR)]
    pub artifacts_dir: PathBuf,

    /// Directory deployment records are kept in
    #[arg(long, default_value = DEFAULT_DEPLOYMENTS_DIR)]
    pub deployments_dir: PathBuf,

    /// Directory ABIs are exported to
    #[arg(long, default_value = DEFAULT_ABI_DIR)]
    pub abi_dir: PathBuf,

    /// The command to run
    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// The raw configuration values collected from flags and the environment
    pub fn config_inputs(&self) -> ConfigInputs {
        ConfigInputs {
            alchemy_key: self.alchemy_key.clone(),
            private_key: self.private_key.clone(),
            ganache_deployer_address: self.ganache_deployer_address,
            etherscan_api_key: self.etherscan_api_key.clone(),
            paths: Paths {
                artifacts: self.artifacts_dir.clone(),
                deployments: self.deployments_dir.clone(),
                abi: self.abi_dir.clone(),
            },
        }
    }
}

/// The deploy script commands
#[derive(Subcommand)]
pub enum Command {
    /// Run the deployment pipeline, skipping contracts that are already deployed
    Deploy(DeployArgs),
    /// Point a deployed proxy at a new implementation
    Upgrade(UpgradeArgs),
    /// Compare recorded deployments against the chain
    Status,
    /// Export the ABIs of the deployed contracts
    ExportAbi(ExportAbiArgs),
    /// List the configured networks
    Networks,
    /// Show the accounts of the selected network and the resolved deployer
    Accounts,
}

impl Command {
    /// Run the command against `network`
    pub async fn run(self, config: &Config, network: &str) -> Result<(), DeployError> {
        match self {
            Command::Deploy(args) => deploy(args, config, network).await,
            Command::Upgrade(args) => upgrade(args, config, network).await,
            Command::Status => status(config, network).await,
            Command::ExportAbi(args) => export_abi(args, config),
            Command::Networks => {
                networks(config);
                Ok(())
            },
            Command::Accounts => accounts(config, network).await,
        }
    }
}

/// Run the deployment pipeline
#[derive(Args)]
pub struct DeployArgs {
    /// Only deploy steps carrying one of these tags
    #[arg(short, long, value_delimiter = ',')]
    pub tags: Vec<String>,

    /// A JSON file of steps to run instead of the default plan
    #[arg(short, long)]
    pub plan: Option<PathBuf>,

    /// Simulate the run without broadcasting or persisting anything
    #[arg(long)]
    pub dry_run: bool,
}

/// Upgrade the implementation behind a recorded proxy
#[derive(Args)]
pub struct UpgradeArgs {
    /// The logical name of the deployment to upgrade
    #[arg(short, long)]
    pub contract: String,

    /// A method to invoke through the proxy as part of the upgrade
    #[arg(long)]
    pub call: Option<String>,

    /// Arguments to the method given by `--call`
    #[arg(long, num_args = 1.., requires = "call")]
    pub args: Vec<String>,
}

/// Export contract ABIs
#[derive(Args)]
pub struct ExportAbiArgs {
    /// A JSON file of steps whose contracts to export, instead of the default plan
    #[arg(short, long)]
    pub plan: Option<PathBuf>,

    /// The directory to write to, overriding `--abi-dir`
    #[arg(short, long)]
    pub out: Option<PathBuf>,
}
