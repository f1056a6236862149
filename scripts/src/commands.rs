//! Implementations of the deploy script commands

use std::path::Path;

use itertools::Itertools;
use tracing::{info, warn};

use crate::{
    accounts::{network_accounts, resolve_deployer, NamedAccount},
    artifacts::{export_abis, ArtifactDir},
    chain::{Chain, DryRunChain, RpcChain},
    cli::{DeployArgs, ExportAbiArgs, UpgradeArgs},
    config::Config,
    constants::{DEFAULT_DEPLOYER_INDEX, DEPLOYER_ROLE},
    deployments::{DeploymentStore, FileStore, OverlayStore},
    errors::DeployError,
    pipeline::{run_pipeline, DeployContext, Pipeline},
    proxy::{implementation_of, upgrade_proxy, UpgradeOutcome},
    report::{GasReport, StepOutcome, StepReport},
};

/// Run the deployment pipeline against `network`
pub async fn deploy(args: DeployArgs, config: &Config, network: &str) -> Result<(), DeployError> {
    let profile = config.network(network)?;
    let pipeline = load_plan(args.plan.as_deref())?.with_tags(&args.tags)?;

    let chain = RpcChain::connect(profile).await?;
    let deployer = resolve_deployer(&deployer_account(config), profile, &chain).await?;
    let artifacts = ArtifactDir::new(config.paths.artifacts.clone());
    let mut store = FileStore::for_network(&config.paths.deployments, network);

    info!(network, %deployer, steps = pipeline.steps().len(), "running deployment pipeline");
    let run = if args.dry_run {
        warn!(network, "dry run: nothing will be broadcast or persisted");
        let dry_chain = DryRunChain::new(&chain);
        let mut overlay = OverlayStore::new(&store);
        let mut ctx =
            DeployContext::new(&dry_chain, &artifacts, &mut overlay, deployer).simulated();
        run_pipeline(&mut ctx, &pipeline).await?
    } else {
        let mut ctx = DeployContext::new(&chain, &artifacts, &mut store, deployer);
        run_pipeline(&mut ctx, &pipeline).await?
    };

    run.report.log(&config.gas_reporter);
    for (name, record) in &run.records {
        info!(contract = %name, address = %record.address, "deployment");
    }

    Ok(())
}

/// Upgrade the implementation behind a recorded proxy
pub async fn upgrade(args: UpgradeArgs, config: &Config, network: &str) -> Result<(), DeployError> {
    let profile = config.network(network)?;
    let chain = RpcChain::connect(profile).await?;
    let deployer = resolve_deployer(&deployer_account(config), profile, &chain).await?;
    let artifacts = ArtifactDir::new(config.paths.artifacts.clone());
    let mut store = FileStore::for_network(&config.paths.deployments, network);

    let mut ctx = DeployContext::new(&chain, &artifacts, &mut store, deployer);
    let mut report = StepReport::new(&args.contract, StepOutcome::Deployed);
    let call = args.call.as_deref().map(|method| (method, args.args.as_slice()));

    let outcome = upgrade_proxy(&mut ctx, &args.contract, call, &mut report).await?;
    if let UpgradeOutcome::Upgraded { previous, implementation } = outcome {
        let previous = previous.map(|p| p.to_string()).unwrap_or_else(|| "none".to_string());
        info!(contract = %args.contract, %previous, %implementation, "upgrade complete");

        let mut gas = GasReport::default();
        gas.push(report);
        gas.log(&config.gas_reporter);
    }

    Ok(())
}

/// Compare the recorded deployments of `network` against the chain
pub async fn status(config: &Config, network: &str) -> Result<(), DeployError> {
    let profile = config.network(network)?;
    let chain = RpcChain::connect(profile).await?;
    let records = FileStore::for_network(&config.paths.deployments, network).all()?;

    if records.is_empty() {
        info!(network, "no deployments recorded");
        return Ok(());
    }

    for (name, record) in records {
        if chain.code_at(record.address).await?.is_empty() {
            warn!(contract = %name, address = %record.address, "no code at recorded address");
            continue;
        }

        let Some(recorded) = record.implementation else {
            info!(contract = %name, address = %record.address, "deployed");
            continue;
        };

        let on_chain = implementation_of(&chain, record.address).await?;
        if on_chain == recorded {
            info!(contract = %name, address = %record.address, %recorded, "up to date");
        } else {
            warn!(
                contract = %name,
                address = %record.address,
                %recorded,
                %on_chain,
                "implementation differs from record"
            );
        }
    }

    Ok(())
}

/// Write the ABI of every contract in the plan to the export directory
pub fn export_abi(args: ExportAbiArgs, config: &Config) -> Result<(), DeployError> {
    let pipeline = load_plan(args.plan.as_deref())?;
    let out_dir = args.out.unwrap_or_else(|| config.paths.abi.clone());
    let artifacts = ArtifactDir::new(config.paths.artifacts.clone());

    let written = export_abis(&artifacts, pipeline.contracts(), &out_dir)?;
    info!(count = written.len(), dir = %out_dir.display(), "exported ABIs");
    Ok(())
}

/// Print the configured network profiles, with secrets masked
pub fn networks(config: &Config) {
    for profile in config.networks() {
        let signers = profile.signer_addresses().iter().join(", ");
        info!(
            network = %profile.name,
            url = %profile.redacted_rpc_url(),
            chain_id = ?profile.chain_id,
            gas_price = ?profile.gas_price,
            timeout_ms = profile.timeout_millis(),
            requires_credentials = profile.requires_credentials,
            signers = %signers,
            is_default = profile.name == config.default_network,
            "network"
        );
    }

    let explorer_key = if config.etherscan_api_key.is_some() { "set" } else { "unset" };
    info!("block explorer API key {explorer_key}");
}

/// Print the accounts of `network` and the resolved deployer
pub async fn accounts(config: &Config, network: &str) -> Result<(), DeployError> {
    let profile = config.network(network)?;
    let chain = RpcChain::connect(profile).await?;

    for (index, account) in network_accounts(profile, &chain).await?.iter().enumerate() {
        let local_signer = profile.signer_for(*account).is_some();
        info!(index, %account, local_signer, "account");
    }

    let deployer = resolve_deployer(&deployer_account(config), profile, &chain).await?;
    info!(role = DEPLOYER_ROLE, %deployer, "named account");
    Ok(())
}

/// Load a plan from `path`, or the default plan if none is given
fn load_plan(path: Option<&Path>) -> Result<Pipeline, DeployError> {
    match path {
        Some(path) => Pipeline::from_file(path),
        None => Ok(Pipeline::default_plan()),
    }
}

/// The configured deployer role, falling back to the first account
fn deployer_account(config: &Config) -> NamedAccount {
    config
        .named_account(DEPLOYER_ROLE)
        .cloned()
        .unwrap_or_else(|| NamedAccount::positional(DEFAULT_DEPLOYER_INDEX))
}
