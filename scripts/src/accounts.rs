//! Resolution of named account roles to concrete addresses

use std::collections::BTreeMap;

use alloy::primitives::Address;
use tracing::debug;

use crate::{
    chain::Chain, config::NetworkProfile, constants::DEPLOYER_ROLE, errors::DeployError,
};

/// A logical account role, resolved per network
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NamedAccount {
    /// The position in the network's account list used when no override applies
    pub default: usize,
    /// Explicit addresses, keyed by network name
    pub overrides: BTreeMap<String, Address>,
}

impl NamedAccount {
    /// A role resolved to the account at `index` on every network
    pub fn positional(index: usize) -> Self {
        Self { default: index, overrides: BTreeMap::new() }
    }

    /// Pin the role to `address` on `network`
    pub fn with_override(mut self, network: &str, address: Address) -> Self {
        self.overrides.insert(network.to_string(), address);
        self
    }

    /// Resolve the role on `network` given the network's account list.
    ///
    /// An override configured for the network wins; otherwise the account at
    /// the default position is used.
    pub fn resolve(
        &self,
        role: &str,
        network: &str,
        accounts: &[Address],
    ) -> Result<Address, DeployError> {
        if let Some(address) = self.overrides.get(network) {
            return Ok(*address);
        }

        accounts.get(self.default).copied().ok_or_else(|| DeployError::NoAccountAvailable {
            role: role.to_string(),
            network: network.to_string(),
            index: self.default,
        })
    }
}

/// The account list of a network: local signers when configured, otherwise
/// whatever the node reports as its own accounts.
///
/// Networks requiring credentials never fall back to the node.
pub async fn network_accounts<C: Chain>(
    profile: &NetworkProfile,
    chain: &C,
) -> Result<Vec<Address>, DeployError> {
    if !profile.signers.is_empty() {
        return Ok(profile.signer_addresses());
    }

    profile.ensure_signers()?;
    chain.accounts().await
}

/// Resolve the single deployer account for a run
pub async fn resolve_deployer<C: Chain>(
    named: &NamedAccount,
    profile: &NetworkProfile,
    chain: &C,
) -> Result<Address, DeployError> {
    // The account list is only needed when no override applies
    let accounts = if named.overrides.contains_key(&profile.name) {
        Vec::new()
    } else {
        network_accounts(profile, chain).await?
    };

    let deployer = named.resolve(DEPLOYER_ROLE, &profile.name, &accounts)?;
    debug!(network = %profile.name, %deployer, "resolved deployer");
    Ok(deployer)
}
