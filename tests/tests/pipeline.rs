use credentials_deploy::{
    constants::{DEFAULT_PROXY_ADMIN_KEY, INITIALIZER_METHOD},
    deployments::{DeploymentStore, FileStore, MemoryStore},
    errors::DeployError,
    pipeline::{deploy_step, run_pipeline, Dependencies, DeployContext, Pipeline},
    report::StepOutcome,
    types::{PipelineStep, StepArg},
};
use eyre::Result;
use tests::utils::{setup_chain, suite_artifacts, DEPLOYER};

/// The three step scenario: a token, the institutions registry, and the
/// student NFT initialized with the registry's address
fn token_institutions_students() -> Result<Pipeline> {
    Ok(Pipeline::new(vec![
        PipelineStep::new("Token").with_initializer(INITIALIZER_METHOD, vec![StepArg::literal(100)]),
        PipelineStep::new("Institutions").with_initializer(INITIALIZER_METHOD, vec![]),
        PipelineStep::new("StudentsERC721")
            .with_initializer(INITIALIZER_METHOD, vec![StepArg::deployment("Institutions")]),
    ])?)
}

// --------------
// | FRESH RUNS |
// --------------

#[tokio::test]
async fn test_fresh_run_records_every_step() -> Result<()> {
    let artifacts = suite_artifacts();
    let chain = setup_chain(&artifacts);
    let mut store = MemoryStore::default();

    let mut ctx = DeployContext::new(&chain, &artifacts, &mut store, DEPLOYER);
    let run = run_pipeline(&mut ctx, &token_institutions_students()?).await?;

    assert_eq!(run.records.len(), 3);
    let institutions = &run.records["Institutions"];
    let students = &run.records["StudentsERC721"];

    let execute = students.execute.as_ref().unwrap();
    assert_eq!(execute.method_name, INITIALIZER_METHOD);
    assert_eq!(execute.args, vec![institutions.address.to_string()]);
    assert_eq!(run.records["Token"].execute.as_ref().unwrap().args, vec!["100"]);

    // Every proxy shares the one admin, which is persisted alongside the records
    let admin = store.get(DEFAULT_PROXY_ADMIN_KEY)?.unwrap().address;
    assert!(run.records.values().all(|r| r.proxy_admin == Some(admin)));
    assert_eq!(store.all()?.len(), 4);

    // One admin, then an implementation and a proxy per step
    assert_eq!(chain.deployments(), 1 + 2 * 3);
    assert!(chain.senders().iter().all(|sender| *sender == DEPLOYER));
    assert_eq!(run.report.count(StepOutcome::Deployed), 3);

    Ok(())
}

#[tokio::test]
async fn test_default_plan() -> Result<()> {
    let artifacts = suite_artifacts();
    let chain = setup_chain(&artifacts);
    let mut store = MemoryStore::default();

    let mut ctx = DeployContext::new(&chain, &artifacts, &mut store, DEPLOYER);
    let run = run_pipeline(&mut ctx, &Pipeline::default_plan()).await?;

    assert_eq!(run.records.len(), 4);
    assert_eq!(chain.deployments(), 1 + 2 * 4);
    assert_eq!(
        run.records["StudentsERC721"].execute.as_ref().unwrap().args,
        vec![run.records["Institutions"].address.to_string()]
    );

    Ok(())
}

// ---------------
// | IDEMPOTENCE |
// ---------------

#[tokio::test]
async fn test_rerun_deploys_nothing() -> Result<()> {
    let artifacts = suite_artifacts();
    let chain = setup_chain(&artifacts);
    let pipeline = token_institutions_students()?;
    let mut store = MemoryStore::default();

    let first = run_pipeline(
        &mut DeployContext::new(&chain, &artifacts, &mut store, DEPLOYER),
        &pipeline,
    )
    .await?;
    let deployments = chain.deployments();

    let second = run_pipeline(
        &mut DeployContext::new(&chain, &artifacts, &mut store, DEPLOYER),
        &pipeline,
    )
    .await?;

    assert_eq!(chain.deployments(), deployments);
    assert_eq!(first.records, second.records);
    assert_eq!(second.report.count(StepOutcome::Reused), 3);
    assert_eq!(second.report.transactions(), 0);

    Ok(())
}

#[tokio::test]
async fn test_rerun_from_disk_deploys_nothing() -> Result<()> {
    let artifacts = suite_artifacts();
    let chain = setup_chain(&artifacts);
    let pipeline = Pipeline::default_plan();
    let dir = tempfile::tempdir()?;

    let mut store = FileStore::for_network(dir.path(), "ganache");
    let first = run_pipeline(
        &mut DeployContext::new(&chain, &artifacts, &mut store, DEPLOYER),
        &pipeline,
    )
    .await?;
    let deployments = chain.deployments();

    let mut reopened = FileStore::for_network(dir.path(), "ganache");
    let second = run_pipeline(
        &mut DeployContext::new(&chain, &artifacts, &mut reopened, DEPLOYER),
        &pipeline,
    )
    .await?;

    assert_eq!(chain.deployments(), deployments);
    assert_eq!(first.records, second.records);
    assert!(dir.path().join("ganache").join("StudentsERC721.json").exists());

    Ok(())
}

// ------------
// | FAILURES |
// ------------

#[tokio::test]
async fn test_reverting_initializer_leaves_no_record() -> Result<()> {
    let artifacts = suite_artifacts();
    let chain = setup_chain(&artifacts);
    chain.revert_initializer_of("Institutions");
    let mut store = MemoryStore::default();

    let mut ctx = DeployContext::new(&chain, &artifacts, &mut store, DEPLOYER);
    let err = run_pipeline(&mut ctx, &Pipeline::default_plan()).await.unwrap_err();

    assert!(matches!(
        err,
        DeployError::StepFailed { ref contract, .. } if contract == "Institutions"
    ));
    assert!(matches!(
        err.root_cause(),
        DeployError::Initialization { contract, .. } if contract == "Institutions"
    ));

    // Steps before the failure stay persisted; nothing after it ran
    assert!(store.get("Token")?.is_some());
    assert!(store.get("Indexer")?.is_some());
    assert!(store.get("Institutions")?.is_none());
    assert!(store.get("StudentsERC721")?.is_none());
    assert_eq!(chain.deployments_of("StudentsERC721"), 0);

    Ok(())
}

#[tokio::test]
async fn test_rerun_resumes_after_failure() -> Result<()> {
    let artifacts = suite_artifacts();
    let chain = setup_chain(&artifacts);
    let pipeline = Pipeline::default_plan();
    let mut store = MemoryStore::default();

    chain.revert_initializer_of("Institutions");
    let failed =
        run_pipeline(&mut DeployContext::new(&chain, &artifacts, &mut store, DEPLOYER), &pipeline)
            .await;
    assert!(failed.is_err());
    let token = store.get("Token")?.unwrap();

    chain.clear_reverts();
    let run =
        run_pipeline(&mut DeployContext::new(&chain, &artifacts, &mut store, DEPLOYER), &pipeline)
            .await?;

    assert_eq!(run.records["Token"], token);
    assert_eq!(run.report.count(StepOutcome::Reused), 2);
    assert_eq!(run.report.count(StepOutcome::Deployed), 2);
    assert_eq!(chain.deployments_of("TransparentUpgradeableProxy"), 4);

    Ok(())
}

#[tokio::test]
async fn test_omitted_dependency_is_rejected() -> Result<()> {
    let err = Pipeline::new(vec![
        PipelineStep::new("Token").with_initializer(INITIALIZER_METHOD, vec![StepArg::literal(100)]),
        PipelineStep::new("StudentsERC721")
            .with_initializer(INITIALIZER_METHOD, vec![StepArg::deployment("Institutions")]),
    ])
    .unwrap_err();

    assert!(matches!(
        err,
        DeployError::MissingDependency { ref step, ref dependency }
            if step == "StudentsERC721" && dependency == "Institutions"
    ));

    Ok(())
}

#[tokio::test]
async fn test_missing_dependency_sends_nothing() -> Result<()> {
    let artifacts = suite_artifacts();
    let chain = setup_chain(&artifacts);
    let mut store = MemoryStore::default();
    let step = PipelineStep::new("StudentsERC721")
        .with_initializer(INITIALIZER_METHOD, vec![StepArg::deployment("Institutions")]);

    let mut ctx = DeployContext::new(&chain, &artifacts, &mut store, DEPLOYER);
    let err = deploy_step(&mut ctx, &step, &Dependencies::new()).await.unwrap_err();

    assert!(matches!(err, DeployError::MissingDependency { .. }));
    assert_eq!(chain.deployments(), 0);
    assert!(store.get("StudentsERC721")?.is_none());

    Ok(())
}

// ----------------
// | DEPENDENCIES |
// ----------------

#[tokio::test]
async fn test_dependencies_come_from_earlier_steps_only() -> Result<()> {
    let artifacts = suite_artifacts();
    let chain = setup_chain(&artifacts);
    let mut store = MemoryStore::default();

    // A record persisted by an unrelated run is not visible to a step
    let mut ctx = DeployContext::new(&chain, &artifacts, &mut store, DEPLOYER);
    let institutions =
        PipelineStep::new("Institutions").with_initializer(INITIALIZER_METHOD, vec![]);
    let (record, _) = deploy_step(&mut ctx, &institutions, &Dependencies::new()).await?;

    let students = PipelineStep::new("StudentsERC721")
        .with_initializer(INITIALIZER_METHOD, vec![StepArg::deployment("Institutions")]);
    let err = deploy_step(&mut ctx, &students, &Dependencies::new()).await.unwrap_err();
    assert!(matches!(err, DeployError::MissingDependency { .. }));

    // Handed the earlier step's record, the reference resolves to its proxy
    let dependencies = Dependencies::from([("Institutions".to_string(), record.clone())]);
    let (students_record, _) = deploy_step(&mut ctx, &students, &dependencies).await?;
    assert_eq!(students_record.execute.unwrap().args, vec![record.address.to_string()]);

    Ok(())
}
