//! Network, account, and path configuration.
//!
//! A [`Config`] is constructed once at process start from [`ConfigInputs`] and
//! handed by reference to everything that needs it; nothing below this module
//! reads the process environment.

use std::{collections::BTreeMap, path::PathBuf, str::FromStr, time::Duration};

use alloy::{primitives::Address, signers::local::PrivateKeySigner};

use crate::{
    accounts::NamedAccount,
    constants::{
        ALCHEMY_KEY_ENV_VAR, DEFAULT_ABI_DIR, DEFAULT_ARTIFACTS_DIR, DEFAULT_DEPLOYER_INDEX,
        DEFAULT_DEPLOYMENTS_DIR, DEFAULT_NETWORK, DEFAULT_TIMEOUT_MS, DEPLOYER_ROLE,
        GANACHE_NETWORK, GANACHE_RPC_URL, LOCAL_NETWORK, LOCAL_RPC_URL, MAINNET_NETWORK,
        MUMBAI_CHAIN_ID, MUMBAI_NETWORK, POLYGON_MAINNET_SUBDOMAIN, POLYGON_MUMBAI_SUBDOMAIN,
        PRIVATE_KEY_ENV_VAR, PUBLIC_NETWORK_GAS_PRICE, PUBLIC_NETWORK_TIMEOUT_MS,
    },
    errors::DeployError,
};

/// Raw configuration values, as collected from the command line or environment
#[derive(Clone, Debug, Default)]
pub struct ConfigInputs {
    /// The Alchemy API key used to build public network RPC URLs
    pub alchemy_key: Option<String>,
    /// The deployer's private key, in hex
    pub private_key: Option<String>,
    /// An address overriding the positional deployer on Ganache
    pub ganache_deployer_address: Option<Address>,
    /// The block explorer API key
    pub etherscan_api_key: Option<String>,
    /// Filesystem locations used by the scripts
    pub paths: Paths,
}

/// Filesystem locations used by the scripts
#[derive(Clone, Debug)]
pub struct Paths {
    /// The directory containing compiled contract artifacts
    pub artifacts: PathBuf,
    /// The directory deployment records are persisted under
    pub deployments: PathBuf,
    /// The directory ABIs are exported to
    pub abi: PathBuf,
}

impl Default for Paths {
    fn default() -> Self {
        Self {
            artifacts: PathBuf::from(DEFAULT_ARTIFACTS_DIR),
            deployments: PathBuf::from(DEFAULT_DEPLOYMENTS_DIR),
            abi: PathBuf::from(DEFAULT_ABI_DIR),
        }
    }
}

/// Settings for the gas report printed after a pipeline run
#[derive(Clone, Copy, Debug)]
pub struct GasReporterConfig {
    /// Whether to include the wall-clock time each step took
    pub show_time_spent: bool,
}

impl Default for GasReporterConfig {
    fn default() -> Self {
        Self { show_time_spent: true }
    }
}

/// A static description of a target network
#[derive(Clone, Debug)]
pub struct NetworkProfile {
    /// The network's name
    pub name: String,
    /// The resolved RPC URL
    pub rpc_url: String,
    /// The chain ID the node is expected to report, if pinned
    pub chain_id: Option<u64>,
    /// A fixed gas price, in wei, applied to every transaction
    pub gas_price: Option<u128>,
    /// The RPC timeout, in milliseconds
    pub timeout_ms: Option<u64>,
    /// Locally held signing keys. Empty means the node's own accounts are used.
    pub signers: Vec<PrivateKeySigner>,
    /// Whether submitting transactions requires a provider key and a local signer
    pub requires_credentials: bool,
    /// The provider API key templated into `rpc_url`, if any
    provider_key: Option<String>,
}

impl NetworkProfile {
    /// A network reached at a literal URL, signing with the node's own accounts
    pub fn local(name: &str, rpc_url: &str) -> Self {
        Self {
            name: name.to_string(),
            rpc_url: rpc_url.to_string(),
            chain_id: None,
            gas_price: None,
            timeout_ms: None,
            signers: Vec::new(),
            requires_credentials: false,
            provider_key: None,
        }
    }

    /// A public network reached through Alchemy
    pub fn alchemy(name: &str, subdomain: &str, alchemy_key: Option<&str>) -> Self {
        Self {
            name: name.to_string(),
            rpc_url: alchemy_url(subdomain, alchemy_key.unwrap_or_default()),
            chain_id: None,
            gas_price: Some(PUBLIC_NETWORK_GAS_PRICE),
            timeout_ms: Some(PUBLIC_NETWORK_TIMEOUT_MS),
            signers: Vec::new(),
            requires_credentials: true,
            provider_key: alchemy_key.filter(|k| !k.is_empty()).map(str::to_string),
        }
    }

    /// Attach locally held signers
    pub fn with_signers(mut self, signers: Vec<PrivateKeySigner>) -> Self {
        self.signers = signers;
        self
    }

    /// Pin the expected chain ID
    pub fn with_chain_id(mut self, chain_id: u64) -> Self {
        self.chain_id = Some(chain_id);
        self
    }

    /// The RPC timeout as a duration
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms.unwrap_or(DEFAULT_TIMEOUT_MS))
    }

    /// The RPC timeout in milliseconds
    pub fn timeout_millis(&self) -> u64 {
        self.timeout_ms.unwrap_or(DEFAULT_TIMEOUT_MS)
    }

    /// The addresses of the locally held signers, in configuration order
    pub fn signer_addresses(&self) -> Vec<Address> {
        self.signers.iter().map(|s| s.address()).collect()
    }

    /// The local signer for `address`, if one is held
    pub fn signer_for(&self, address: Address) -> Option<&PrivateKeySigner> {
        self.signers.iter().find(|s| s.address() == address)
    }

    /// The RPC URL with any provider key masked, for display
    pub fn redacted_rpc_url(&self) -> String {
        match &self.provider_key {
            Some(key) => self.rpc_url.replace(key.as_str(), "***"),
            None => self.rpc_url.clone(),
        }
    }

    /// Check that the provider key needed to reach this network is configured
    pub fn ensure_reachable(&self) -> Result<(), DeployError> {
        if self.requires_credentials && self.provider_key.is_none() {
            return Err(self.missing_credentials(format!("{ALCHEMY_KEY_ENV_VAR} is not set")));
        }

        Ok(())
    }

    /// Check that the network's account list can come from local signers.
    ///
    /// Hosted providers manage no accounts, so a credential-requiring network
    /// without a signer has nobody to deploy from.
    pub fn ensure_signers(&self) -> Result<(), DeployError> {
        if self.requires_credentials && self.signers.is_empty() {
            return Err(self.missing_credentials(format!("{PRIVATE_KEY_ENV_VAR} is not set")));
        }

        Ok(())
    }

    /// Check that a transaction from `from` may be submitted on this network.
    ///
    /// Networks that do not require credentials always pass; the node is
    /// trusted to sign with its own accounts.
    pub fn ensure_can_submit(&self, from: Address) -> Result<(), DeployError> {
        if !self.requires_credentials {
            return Ok(());
        }

        self.ensure_reachable()?;
        if self.signer_for(from).is_none() {
            return Err(self.missing_credentials(format!(
                "{PRIVATE_KEY_ENV_VAR} holds no signer for {from}"
            )));
        }

        Ok(())
    }

    /// A `MissingCredentials` error for this network
    fn missing_credentials(&self, missing: String) -> DeployError {
        DeployError::MissingCredentials { network: self.name.clone(), missing }
    }
}

/// Build an Alchemy RPC URL for the given network subdomain
pub fn alchemy_url(subdomain: &str, key: &str) -> String {
    format!("https://{subdomain}.g.alchemy.com/v2/{key}")
}

/// The full configuration of the deploy scripts
#[derive(Clone, Debug)]
pub struct Config {
    /// The network used when none is selected
    pub default_network: String,
    /// Named account roles, keyed by role
    pub named_accounts: BTreeMap<String, NamedAccount>,
    /// The block explorer API key, consumed by external verification tooling
    pub etherscan_api_key: Option<String>,
    /// Gas report settings
    pub gas_reporter: GasReporterConfig,
    /// Filesystem locations
    pub paths: Paths,
    /// Network profiles, keyed by name
    networks: BTreeMap<String, NetworkProfile>,
}

impl Config {
    /// Build the configuration from raw inputs.
    ///
    /// Missing credentials are not an error here; they only fail a run once a
    /// network that needs them is actually used.
    pub fn from_inputs(inputs: ConfigInputs) -> Result<Self, DeployError> {
        let signers = match inputs.private_key.as_deref().filter(|k| !k.is_empty()) {
            Some(key) => vec![PrivateKeySigner::from_str(key).map_err(|e| {
                DeployError::ClientInitialization(format!("invalid {PRIVATE_KEY_ENV_VAR}: {e}"))
            })?],
            None => Vec::new(),
        };
        let alchemy_key = inputs.alchemy_key.as_deref();

        let networks = [
            NetworkProfile::local(LOCAL_NETWORK, LOCAL_RPC_URL),
            NetworkProfile::local(GANACHE_NETWORK, GANACHE_RPC_URL).with_signers(signers.clone()),
            NetworkProfile::alchemy(MAINNET_NETWORK, POLYGON_MAINNET_SUBDOMAIN, alchemy_key)
                .with_signers(signers.clone()),
            NetworkProfile::alchemy(MUMBAI_NETWORK, POLYGON_MUMBAI_SUBDOMAIN, alchemy_key)
                .with_signers(signers)
                .with_chain_id(MUMBAI_CHAIN_ID),
        ];

        let mut deployer = NamedAccount::positional(DEFAULT_DEPLOYER_INDEX);
        if let Some(address) = inputs.ganache_deployer_address {
            deployer = deployer.with_override(GANACHE_NETWORK, address);
        }

        Ok(Self {
            default_network: DEFAULT_NETWORK.to_string(),
            named_accounts: BTreeMap::from([(DEPLOYER_ROLE.to_string(), deployer)]),
            etherscan_api_key: inputs.etherscan_api_key.filter(|k| !k.is_empty()),
            gas_reporter: GasReporterConfig::default(),
            paths: inputs.paths,
            networks: networks.into_iter().map(|n| (n.name.clone(), n)).collect(),
        })
    }

    /// Look up a network profile by name
    pub fn network(&self, name: &str) -> Result<&NetworkProfile, DeployError> {
        self.networks.get(name).ok_or_else(|| DeployError::UnknownNetwork(name.to_string()))
    }

    /// All configured network profiles, ordered by name
    pub fn networks(&self) -> impl Iterator<Item = &NetworkProfile> {
        self.networks.values()
    }

    /// The named account entry for a role, if configured
    pub fn named_account(&self, role: &str) -> Option<&NamedAccount> {
        self.named_accounts.get(role)
    }
}
