//! Transparent proxy deployment and upgrades through the shared proxy admin

use alloy::{
    dyn_abi::DynSolValue,
    primitives::{keccak256, Address, Bytes, B256, U256},
    sol_types::SolCall,
};
use tracing::{debug, info};

use crate::{
    artifacts::{Artifact, ArtifactSource},
    chain::{Chain, TxOutcome},
    constants::{
        DEFAULT_PROXY_ADMIN_KEY, IMPLEMENTATION_STORAGE_SLOT, NUM_BYTES_ADDRESS,
        NUM_BYTES_STORAGE_SLOT, PROXY_ADMIN_CONTRACT_NAME, PROXY_ADMIN_STORAGE_SLOT,
        PROXY_CONTRACT_NAME,
    },
    deployments::{DeploymentRecord, DeploymentStore, ExecuteRecord},
    errors::DeployError,
    pipeline::DeployContext,
    report::StepReport,
    solidity::{upgradeAndCallCall, upgradeCall},
};

/// Return the shared proxy admin, deploying and recording it on first use
pub async fn ensure_proxy_admin<C: Chain, A: ArtifactSource, S: DeploymentStore>(
    ctx: &mut DeployContext<'_, C, A, S>,
    report: &mut StepReport,
) -> Result<Address, DeployError> {
    if let Some(existing) = ctx.store.get(DEFAULT_PROXY_ADMIN_KEY)? {
        return Ok(existing.address);
    }

    let artifact = ctx.artifacts.artifact(PROXY_ADMIN_CONTRACT_NAME)?;

    // Admins whose constructor takes an initial owner are owned by the deployer
    let args = match artifact.constructor_params().len() {
        0 => Vec::new(),
        _ => vec![ctx.deployer.to_string()],
    };
    let values = artifact.constructor_args(&args)?;

    let tx = ctx.chain.deploy(ctx.deployer, artifact.creation_code(&values)?).await?;
    report.add_tx(&tx);
    let address = created_address(&tx, DEFAULT_PROXY_ADMIN_KEY)?;

    let record = DeploymentRecord {
        address,
        implementation: None,
        proxy_admin: None,
        abi: artifact.abi,
        transaction_hash: tx.tx_hash,
        args,
        execute: None,
        implementation_code_hash: None,
    };
    ctx.store.save(DEFAULT_PROXY_ADMIN_KEY, &record)?;

    info!(%address, "deployed {DEFAULT_PROXY_ADMIN_KEY}");
    Ok(address)
}

/// Deploy an implementation contract, returning its address and the hash of
/// its creation code
pub async fn deploy_implementation<C: Chain, A: ArtifactSource, S: DeploymentStore>(
    ctx: &DeployContext<'_, C, A, S>,
    artifact: &Artifact,
    constructor_args: &[String],
    report: &mut StepReport,
) -> Result<(Address, B256), DeployError> {
    let values = artifact.constructor_args(constructor_args)?;
    let creation_code = artifact.creation_code(&values)?;
    let code_hash = keccak256(&creation_code);

    let tx = ctx.chain.deploy(ctx.deployer, creation_code).await?;
    report.add_tx(&tx);
    let implementation = created_address(&tx, &artifact.contract_name)?;

    debug!(contract = %artifact.contract_name, %implementation, "deployed implementation");
    Ok((implementation, code_hash))
}

/// Deploy a proxy in front of `implementation`.
///
/// Non-empty `init_calldata` is delegated to the implementation from the proxy
/// constructor, so the initializer runs once, through the proxy, in the same
/// transaction that creates it.
pub async fn deploy_proxy<C: Chain, A: ArtifactSource, S: DeploymentStore>(
    ctx: &DeployContext<'_, C, A, S>,
    implementation: Address,
    proxy_admin: Address,
    init_calldata: Bytes,
    report: &mut StepReport,
) -> Result<TxOutcome, DeployError> {
    let artifact = ctx.artifacts.artifact(PROXY_CONTRACT_NAME)?;
    let creation_code = artifact.creation_code(&[
        DynSolValue::Address(implementation),
        DynSolValue::Address(proxy_admin),
        DynSolValue::Bytes(init_calldata.to_vec()),
    ])?;

    let tx = ctx.chain.deploy(ctx.deployer, creation_code).await?;
    report.add_tx(&tx);
    Ok(tx)
}

/// The result of an upgrade request
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UpgradeOutcome {
    /// The compiled implementation matches the recorded one
    Unchanged,
    /// The proxy now points at a new implementation
    Upgraded {
        /// The implementation the proxy pointed at before
        previous: Option<Address>,
        /// The newly deployed implementation
        implementation: Address,
    },
}

/// Point the proxy recorded under `name` at a freshly deployed implementation.
///
/// The implementation is redeployed with the recorded constructor arguments.
/// When `call` is given, the method is invoked through the proxy as part of
/// the upgrade.
pub async fn upgrade_proxy<C: Chain, A: ArtifactSource, S: DeploymentStore>(
    ctx: &mut DeployContext<'_, C, A, S>,
    name: &str,
    call: Option<(&str, &[String])>,
    report: &mut StepReport,
) -> Result<UpgradeOutcome, DeployError> {
    let mut record =
        ctx.store.get(name)?.ok_or_else(|| DeployError::DeploymentNotFound(name.to_string()))?;
    let proxy_admin = record.proxy_admin.ok_or_else(|| {
        DeployError::ContractInteraction(format!("`{name}` was not deployed behind a proxy"))
    })?;

    let artifact = ctx.artifacts.artifact(name)?;
    let values = artifact.constructor_args(&record.args)?;
    let code_hash = keccak256(artifact.creation_code(&values)?);
    if call.is_none() && record.implementation_code_hash == Some(code_hash) {
        info!(contract = name, "implementation unchanged, skipping upgrade");
        return Ok(UpgradeOutcome::Unchanged);
    }

    let (implementation, code_hash) =
        deploy_implementation(ctx, &artifact, &record.args, report).await?;

    let calldata = match call {
        Some((method, args)) => {
            let data = artifact.encode_call(method, args)?;
            upgradeAndCallCall { proxy: record.address, implementation, data }.abi_encode()
        },
        None => upgradeCall { proxy: record.address, implementation }.abi_encode(),
    };

    let tx = ctx.chain.send(ctx.deployer, proxy_admin, Bytes::from(calldata)).await?;
    report.add_tx(&tx);

    let previous = record.implementation.replace(implementation);
    record.abi = artifact.abi;
    record.implementation_code_hash = Some(code_hash);
    if let Some((method, args)) = call {
        record.execute =
            Some(ExecuteRecord { method_name: method.to_string(), args: args.to_vec() });
    }
    ctx.store.save(name, &record)?;

    info!(contract = name, proxy = %record.address, %implementation, "upgraded");
    Ok(UpgradeOutcome::Upgraded { previous, implementation })
}

/// The implementation a proxy currently delegates to, read from its EIP-1967 slot
pub async fn implementation_of<C: Chain>(
    chain: &C,
    proxy: Address,
) -> Result<Address, DeployError> {
    read_address_slot(chain, proxy, IMPLEMENTATION_STORAGE_SLOT).await
}

/// The admin of a proxy, read from its EIP-1967 slot
pub async fn admin_of<C: Chain>(chain: &C, proxy: Address) -> Result<Address, DeployError> {
    read_address_slot(chain, proxy, PROXY_ADMIN_STORAGE_SLOT).await
}

/// Read an address stored right-aligned in a storage slot
async fn read_address_slot<C: Chain>(
    chain: &C,
    contract: Address,
    slot: &str,
) -> Result<Address, DeployError> {
    let slot: U256 = slot.parse().map_err(|e| DeployError::ContractInteraction(format!("{e}")))?;
    let value = chain.storage_at(contract, slot).await?;

    let bytes = value.to_be_bytes::<NUM_BYTES_STORAGE_SLOT>();
    Ok(Address::from_slice(&bytes[NUM_BYTES_STORAGE_SLOT - NUM_BYTES_ADDRESS..]))
}

/// The address created by a contract creation transaction
pub fn created_address(tx: &TxOutcome, contract: &str) -> Result<Address, DeployError> {
    tx.contract_address.ok_or_else(|| {
        DeployError::ContractDeployment(format!("no contract address returned for `{contract}`"))
    })
}
