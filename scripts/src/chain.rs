//! The seam between the deployment logic and the blockchain node.
//!
//! [`RpcChain`] talks to a real node over HTTP; [`DryRunChain`] wraps another
//! chain and simulates transactions without broadcasting them.

use std::{cell::RefCell, collections::HashMap, future::IntoFuture};

use alloy::{
    network::{EthereumWallet, ReceiptResponse, TransactionBuilder},
    primitives::{Address, Bytes, B256, U256},
    providers::{DynProvider, Provider, ProviderBuilder},
    rpc::types::{TransactionReceipt, TransactionRequest},
    transports::{http::reqwest::Url, TransportError},
};
use tracing::{debug, trace};

use crate::{config::NetworkProfile, errors::DeployError};

/// The result of a successfully mined transaction
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TxOutcome {
    /// The transaction hash, absent for simulated transactions
    pub tx_hash: Option<B256>,
    /// The address of the created contract, for contract creations
    pub contract_address: Option<Address>,
    /// The gas consumed by the transaction
    pub gas_used: u64,
    /// The price paid per unit of gas, in wei
    pub effective_gas_price: u128,
}

/// The node operations the deploy scripts rely on.
///
/// Implementations report node-side reverts as [`DeployError::Reverted`].
#[allow(async_fn_in_trait)]
pub trait Chain {
    /// The name of the network this chain is connected to
    fn network(&self) -> &str;

    /// The accounts managed by the node itself
    async fn accounts(&self) -> Result<Vec<Address>, DeployError>;

    /// The next nonce of `address`
    async fn nonce(&self, address: Address) -> Result<u64, DeployError>;

    /// Submit a contract creation transaction and wait for it to be mined
    async fn deploy(&self, from: Address, creation_code: Bytes) -> Result<TxOutcome, DeployError>;

    /// Submit a call transaction and wait for it to be mined
    async fn send(
        &self,
        from: Address,
        to: Address,
        calldata: Bytes,
    ) -> Result<TxOutcome, DeployError>;

    /// The runtime code deployed at `address`
    async fn code_at(&self, address: Address) -> Result<Bytes, DeployError>;

    /// The value of a storage slot of `address`
    async fn storage_at(&self, address: Address, slot: U256) -> Result<U256, DeployError>;
}

// -------------
// | RPC Chain |
// -------------

/// A chain reached over JSON-RPC
pub struct RpcChain {
    /// The profile of the connected network
    profile: NetworkProfile,
    /// The provider, carrying a wallet when local signers are configured
    provider: DynProvider,
}

impl RpcChain {
    /// Connect to the network described by `profile`.
    ///
    /// A network whose provider key is absent fails with
    /// [`DeployError::MissingCredentials`] before any request is made. If the
    /// profile pins a chain ID, the node's chain ID is checked against it.
    pub async fn connect(profile: &NetworkProfile) -> Result<Self, DeployError> {
        profile.ensure_reachable()?;
        let url = Url::parse(&profile.rpc_url)
            .map_err(|e| DeployError::ClientInitialization(e.to_string()))?;

        let provider = match build_wallet(profile) {
            Some(wallet) => DynProvider::new(ProviderBuilder::new().wallet(wallet).on_http(url)),
            None => DynProvider::new(ProviderBuilder::new().on_http(url)),
        };

        let chain = Self { profile: profile.clone(), provider };
        if let Some(expected) = profile.chain_id {
            let actual = chain
                .timed(chain.provider.get_chain_id())
                .await?
                .map_err(|e| DeployError::ClientInitialization(e.to_string()))?;

            if actual != expected {
                return Err(DeployError::ClientInitialization(format!(
                    "network `{}` expects chain ID {expected}, node reports {actual}",
                    profile.name
                )));
            }
        }

        debug!(network = %profile.name, url = %profile.redacted_rpc_url(), "connected to node");
        Ok(chain)
    }

    /// Bound a request by the network's timeout
    async fn timed<F: IntoFuture>(&self, fut: F) -> Result<F::Output, DeployError> {
        tokio::time::timeout(self.profile.timeout(), fut).await.map_err(|_| {
            DeployError::NetworkTimeout {
                network: self.profile.name.clone(),
                timeout_ms: self.profile.timeout_millis(),
            }
        })
    }

    /// A transaction request from `from`, carrying the network's fixed gas price
    fn request(&self, from: Address) -> TransactionRequest {
        let tx = TransactionRequest::default().with_from(from);
        match self.profile.gas_price {
            Some(gas_price) => tx.with_gas_price(gas_price),
            None => tx,
        }
    }

    /// Submit a transaction and wait for its receipt
    async fn submit(
        &self,
        tx: TransactionRequest,
        on_error: fn(String) -> DeployError,
    ) -> Result<TransactionReceipt, DeployError> {
        let receipt = self
            .timed(async {
                let pending = self
                    .provider
                    .send_transaction(tx)
                    .await
                    .map_err(|e| classify_rpc_error(e, on_error))?;
                trace!(tx_hash = %pending.tx_hash(), "transaction submitted");

                pending.get_receipt().await.map_err(|e| on_error(e.to_string()))
            })
            .await??;

        if !ReceiptResponse::status(&receipt) {
            return Err(DeployError::Reverted(format!(
                "transaction {:#x} reverted",
                receipt.transaction_hash
            )));
        }

        Ok(receipt)
    }
}

impl Chain for RpcChain {
    fn network(&self) -> &str {
        &self.profile.name
    }

    async fn accounts(&self) -> Result<Vec<Address>, DeployError> {
        self.timed(self.provider.get_accounts())
            .await?
            .map_err(|e| DeployError::ClientInitialization(e.to_string()))
    }

    async fn nonce(&self, address: Address) -> Result<u64, DeployError> {
        self.timed(self.provider.get_transaction_count(address))
            .await?
            .map_err(|e| DeployError::ContractInteraction(e.to_string()))
    }

    async fn deploy(&self, from: Address, creation_code: Bytes) -> Result<TxOutcome, DeployError> {
        self.profile.ensure_can_submit(from)?;

        let tx = self.request(from).with_deploy_code(creation_code);
        let receipt = self.submit(tx, DeployError::ContractDeployment).await?;
        if receipt.contract_address.is_none() {
            return Err(DeployError::ContractDeployment(format!(
                "receipt of {:#x} carries no contract address",
                receipt.transaction_hash
            )));
        }

        Ok(outcome(&receipt))
    }

    async fn send(
        &self,
        from: Address,
        to: Address,
        calldata: Bytes,
    ) -> Result<TxOutcome, DeployError> {
        self.profile.ensure_can_submit(from)?;

        let tx = self.request(from).with_to(to).with_input(calldata);
        let receipt = self.submit(tx, DeployError::ContractInteraction).await?;
        Ok(outcome(&receipt))
    }

    async fn code_at(&self, address: Address) -> Result<Bytes, DeployError> {
        self.timed(self.provider.get_code_at(address))
            .await?
            .map_err(|e| DeployError::ContractInteraction(e.to_string()))
    }

    async fn storage_at(&self, address: Address, slot: U256) -> Result<U256, DeployError> {
        self.timed(self.provider.get_storage_at(address, slot))
            .await?
            .map_err(|e| DeployError::ContractInteraction(e.to_string()))
    }
}

/// Build a wallet holding every local signer of the profile
fn build_wallet(profile: &NetworkProfile) -> Option<EthereumWallet> {
    let (first, rest) = profile.signers.split_first()?;
    let mut wallet = EthereumWallet::new(first.clone());
    for signer in rest {
        wallet.register_signer(signer.clone());
    }

    Some(wallet)
}

/// Map an RPC error to a revert when the node reports one
fn classify_rpc_error(err: TransportError, on_error: fn(String) -> DeployError) -> DeployError {
    match err.as_error_resp() {
        Some(payload) if payload.message.to_lowercase().contains("revert") => {
            DeployError::Reverted(payload.message.to_string())
        }
        _ => on_error(err.to_string()),
    }
}

/// Summarize a mined receipt
fn outcome(receipt: &TransactionReceipt) -> TxOutcome {
    TxOutcome {
        tx_hash: Some(receipt.transaction_hash),
        contract_address: receipt.contract_address,
        gas_used: receipt.gas_used,
        effective_gas_price: receipt.effective_gas_price,
    }
}

// -----------------
// | Dry Run Chain |
// -----------------

/// A chain that reads through to `inner` but never broadcasts.
///
/// Contract creations are given the address a real creation would get, predicted
/// from the sender's nonce, which advances locally with every simulated transaction.
pub struct DryRunChain<'a, C> {
    /// The chain reads are delegated to
    inner: &'a C,
    /// Locally advanced nonces
    nonces: RefCell<HashMap<Address, u64>>,
}

impl<'a, C: Chain> DryRunChain<'a, C> {
    /// Wrap `inner`
    pub fn new(inner: &'a C) -> Self {
        Self { inner, nonces: RefCell::new(HashMap::new()) }
    }

    /// Take the next nonce of `address`, advancing the local counter
    async fn take_nonce(&self, address: Address) -> Result<u64, DeployError> {
        let known = self.local_nonce(address);
        let nonce = match known {
            Some(nonce) => nonce,
            None => self.inner.nonce(address).await?,
        };

        self.nonces.borrow_mut().insert(address, nonce + 1);
        Ok(nonce)
    }

    /// The locally tracked nonce of `address`, if any transaction was simulated from it
    fn local_nonce(&self, address: Address) -> Option<u64> {
        self.nonces.borrow().get(&address).copied()
    }
}

impl<C: Chain> Chain for DryRunChain<'_, C> {
    fn network(&self) -> &str {
        self.inner.network()
    }

    async fn accounts(&self) -> Result<Vec<Address>, DeployError> {
        self.inner.accounts().await
    }

    async fn nonce(&self, address: Address) -> Result<u64, DeployError> {
        match self.local_nonce(address) {
            Some(nonce) => Ok(nonce),
            None => self.inner.nonce(address).await,
        }
    }

    async fn deploy(&self, from: Address, _creation_code: Bytes) -> Result<TxOutcome, DeployError> {
        let nonce = self.take_nonce(from).await?;
        Ok(TxOutcome { contract_address: Some(from.create(nonce)), ..Default::default() })
    }

    async fn send(
        &self,
        from: Address,
        _to: Address,
        _calldata: Bytes,
    ) -> Result<TxOutcome, DeployError> {
        self.take_nonce(from).await?;
        Ok(TxOutcome::default())
    }

    async fn code_at(&self, address: Address) -> Result<Bytes, DeployError> {
        self.inner.code_at(address).await
    }

    async fn storage_at(&self, address: Address, slot: U256) -> Result<U256, DeployError> {
        self.inner.storage_at(address, slot).await
    }
}
