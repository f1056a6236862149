use std::str::FromStr;

use alloy::{primitives::address, signers::local::PrivateKeySigner};
use credentials_deploy::{
    accounts::{network_accounts, resolve_deployer, NamedAccount},
    config::NetworkProfile,
    constants::{MAINNET_NETWORK, POLYGON_MAINNET_SUBDOMAIN},
    deployments::MemoryStore,
    errors::DeployError,
    pipeline::{run_pipeline, DeployContext, Pipeline},
};
use eyre::Result;
use tests::{
    mock_chain::{MockChain, MOCK_NETWORK},
    utils::{setup_chain, suite_artifacts, DEPLOYER, SECOND_ACCOUNT, SECOND_ACCOUNT_PKEY},
};

fn mock_profile() -> NetworkProfile {
    NetworkProfile::local(MOCK_NETWORK, "http://127.0.0.1:7545")
}

#[tokio::test]
async fn test_deployer_defaults_to_first_account() -> Result<()> {
    let chain = setup_chain(&suite_artifacts());
    let deployer = resolve_deployer(&NamedAccount::positional(0), &mock_profile(), &chain).await?;

    assert_eq!(deployer, DEPLOYER);
    Ok(())
}

#[tokio::test]
async fn test_override_wins() -> Result<()> {
    let chain = setup_chain(&suite_artifacts());
    let pinned = address!("3C44CdDdB6a900fa2b585dd299e03d12FA4293BC");

    let named = NamedAccount::positional(0).with_override(MOCK_NETWORK, pinned);
    assert_eq!(resolve_deployer(&named, &mock_profile(), &chain).await?, pinned);

    // Overrides only apply to the network they are configured for
    let named = NamedAccount::positional(0).with_override("mainnet", pinned);
    assert_eq!(resolve_deployer(&named, &mock_profile(), &chain).await?, DEPLOYER);

    Ok(())
}

#[tokio::test]
async fn test_no_accounts_fails() -> Result<()> {
    let artifacts = suite_artifacts();
    let chain = MockChain::new(&artifacts, vec![]);

    let err = resolve_deployer(&NamedAccount::positional(0), &mock_profile(), &chain)
        .await
        .unwrap_err();

    assert!(matches!(err, DeployError::NoAccountAvailable { index: 0, .. }));
    Ok(())
}

#[tokio::test]
async fn test_local_signers_replace_node_accounts() -> Result<()> {
    let chain = setup_chain(&suite_artifacts());
    let signer = PrivateKeySigner::from_str(SECOND_ACCOUNT_PKEY)?;
    let profile = mock_profile().with_signers(vec![signer]);

    assert_eq!(network_accounts(&profile, &chain).await?, vec![SECOND_ACCOUNT]);
    assert_eq!(
        resolve_deployer(&NamedAccount::positional(0), &profile, &chain).await?,
        SECOND_ACCOUNT
    );

    Ok(())
}

#[tokio::test]
async fn test_public_network_without_signer_fails() -> Result<()> {
    let chain = setup_chain(&suite_artifacts());
    let profile =
        NetworkProfile::alchemy(MAINNET_NETWORK, POLYGON_MAINNET_SUBDOMAIN, Some("abc123"));

    // The node's own accounts are never consulted for a hosted provider
    let err = network_accounts(&profile, &chain).await.unwrap_err();
    assert!(matches!(
        err,
        DeployError::MissingCredentials { ref network, .. } if network == MAINNET_NETWORK
    ));

    let err = resolve_deployer(&NamedAccount::positional(0), &profile, &chain).await.unwrap_err();
    assert!(matches!(err, DeployError::MissingCredentials { .. }));
    Ok(())
}

#[tokio::test]
async fn test_every_transaction_comes_from_the_deployer() -> Result<()> {
    let artifacts = suite_artifacts();
    let chain = setup_chain(&artifacts);
    let named = NamedAccount::positional(1);
    let deployer = resolve_deployer(&named, &mock_profile(), &chain).await?;

    let mut store = MemoryStore::default();
    let mut ctx = DeployContext::new(&chain, &artifacts, &mut store, deployer);
    run_pipeline(&mut ctx, &Pipeline::default_plan()).await?;

    assert_eq!(deployer, SECOND_ACCOUNT);
    assert!(chain.senders().iter().all(|sender| *sender == SECOND_ACCOUNT));
    Ok(())
}
