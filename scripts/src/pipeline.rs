//! The ordered deployment pipeline.
//!
//! A [`Pipeline`] is an explicit, validated list of [`PipelineStep`]s. Steps
//! run strictly in order; each step sees only the records produced by the
//! steps before it, and the first failure aborts the run. Records already
//! persisted by completed steps are kept, so a re-run resumes where the failed
//! run stopped.

use std::{
    collections::{BTreeMap, HashSet},
    fs,
    path::Path,
    time::Instant,
};

use alloy::primitives::{Address, Bytes};
use tracing::info;

use crate::{
    artifacts::ArtifactSource,
    chain::Chain,
    constants::{
        DEFAULT_PLAN_TAG, DEFAULT_PROXY_ADMIN_KEY, INDEXER_CONTRACT, INITIALIZER_METHOD, INSTITUTIONS_CONTRACT,
        STUDENTS_ERC721_CONTRACT, TOKEN_CONTRACT, TOKEN_INITIAL_SUPPLY,
    },
    deployments::{DeploymentRecord, DeploymentStore, ExecuteRecord},
    errors::DeployError,
    proxy::{created_address, deploy_implementation, deploy_proxy, ensure_proxy_admin},
    report::{GasReport, StepOutcome, StepReport},
    types::{PipelineStep, StepArg},
};

/// Records produced during a run, keyed by logical name
pub type Dependencies = BTreeMap<String, DeploymentRecord>;

// ------------
// | Pipeline |
// ------------

/// A validated, ordered list of deployment steps
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Pipeline {
    /// The steps, in execution order
    steps: Vec<PipelineStep>,
}

impl Pipeline {
    /// Validate `steps` and build a pipeline from them.
    ///
    /// Logical names must be unique, and every reference must name a step that
    /// appears strictly earlier in the list.
    pub fn new(steps: Vec<PipelineStep>) -> Result<Self, DeployError> {
        validate(&steps)?;
        Ok(Self { steps })
    }

    /// The plan deploying the full contract suite
    pub fn default_plan() -> Self {
        let steps = vec![
            PipelineStep::new(TOKEN_CONTRACT)
                .with_initializer(INITIALIZER_METHOD, vec![StepArg::literal(TOKEN_INITIAL_SUPPLY)])
                .with_tag(DEFAULT_PLAN_TAG),
            PipelineStep::new(INDEXER_CONTRACT)
                .with_initializer(INITIALIZER_METHOD, vec![])
                .with_tag(DEFAULT_PLAN_TAG),
            PipelineStep::new(INSTITUTIONS_CONTRACT)
                .with_initializer(INITIALIZER_METHOD, vec![])
                .with_tag(DEFAULT_PLAN_TAG),
            PipelineStep::new(STUDENTS_ERC721_CONTRACT)
                .with_initializer(
                    INITIALIZER_METHOD,
                    vec![StepArg::deployment(INSTITUTIONS_CONTRACT)],
                )
                .with_tag(DEFAULT_PLAN_TAG),
        ];

        Self { steps }
    }

    /// Load a plan from a JSON array of steps
    pub fn from_file(path: &Path) -> Result<Self, DeployError> {
        let contents = fs::read_to_string(path)
            .map_err(|e| DeployError::InvalidPipeline(format!("{}: {e}", path.display())))?;
        let steps: Vec<PipelineStep> = serde_json::from_str(&contents)
            .map_err(|e| DeployError::InvalidPipeline(format!("{}: {e}", path.display())))?;

        Self::new(steps)
    }

    /// Keep only the steps carrying one of `tags`; an empty list keeps every step.
    ///
    /// The filtered plan is revalidated, so dropping a step other steps
    /// reference is reported as a missing dependency.
    pub fn with_tags(self, tags: &[String]) -> Result<Self, DeployError> {
        if tags.is_empty() {
            return Ok(self);
        }

        let steps = self.steps.into_iter().filter(|step| step.has_any_tag(tags)).collect();
        Self::new(steps)
    }

    /// The steps, in execution order
    pub fn steps(&self) -> &[PipelineStep] {
        &self.steps
    }

    /// The contract names deployed by the plan, in execution order
    pub fn contracts(&self) -> impl Iterator<Item = &str> {
        self.steps.iter().map(|step| step.contract.as_str())
    }
}

/// Check the ordering and naming invariants of a plan
fn validate(steps: &[PipelineStep]) -> Result<(), DeployError> {
    let planned: HashSet<&str> = steps.iter().map(PipelineStep::logical_name).collect();
    let mut earlier = HashSet::new();

    for step in steps {
        let name = step.logical_name();
        if name.is_empty() {
            return Err(DeployError::InvalidPipeline("step with an empty contract name".into()));
        }

        if name == DEFAULT_PROXY_ADMIN_KEY {
            return Err(DeployError::InvalidPipeline(format!(
                "`{name}` is reserved for the shared proxy admin"
            )));
        }

        // Logical names become record file names
        if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-') {
            return Err(DeployError::InvalidPipeline(format!(
                "`{name}` may only contain letters, digits, `_` and `-`"
            )));
        }

        for dependency in step.dependencies() {
            if dependency == name {
                return Err(DeployError::InvalidPipeline(format!("`{name}` references itself")));
            }

            if earlier.contains(dependency) {
                continue;
            }

            if planned.contains(dependency) {
                return Err(DeployError::InvalidPipeline(format!(
                    "`{name}` references `{dependency}`, which is deployed after it"
                )));
            }

            return Err(DeployError::MissingDependency {
                step: name.to_string(),
                dependency: dependency.to_string(),
            });
        }

        if !earlier.insert(name) {
            return Err(DeployError::InvalidPipeline(format!("`{name}` appears more than once")));
        }
    }

    Ok(())
}

// -----------
// | Running |
// -----------

/// Everything a deployment step needs besides the step itself
pub struct DeployContext<'a, C, A, S> {
    /// The chain transactions are sent to
    pub chain: &'a C,
    /// The source of compiled artifacts
    pub artifacts: &'a A,
    /// The store records are read from and written to
    pub store: &'a mut S,
    /// The single account every transaction of the run is sent from
    pub deployer: Address,
    /// Whether transactions are simulated rather than broadcast
    pub dry_run: bool,
}

impl<'a, C: Chain, A: ArtifactSource, S: DeploymentStore> DeployContext<'a, C, A, S> {
    /// A context broadcasting from `deployer`
    pub fn new(chain: &'a C, artifacts: &'a A, store: &'a mut S, deployer: Address) -> Self {
        Self { chain, artifacts, store, deployer, dry_run: false }
    }

    /// Mark the context as simulating its transactions
    pub fn simulated(mut self) -> Self {
        self.dry_run = true;
        self
    }

    /// The outcome reported for steps that send transactions
    fn sending_outcome(&self) -> StepOutcome {
        if self.dry_run {
            StepOutcome::Simulated
        } else {
            StepOutcome::Deployed
        }
    }
}

/// The result of a completed pipeline run
#[derive(Clone, Debug)]
pub struct PipelineRun {
    /// The record of every step, keyed by logical name
    pub records: Dependencies,
    /// Gas spent per step
    pub report: GasReport,
}

/// Run every step of `pipeline` in order, stopping at the first failure
pub async fn run_pipeline<C: Chain, A: ArtifactSource, S: DeploymentStore>(
    ctx: &mut DeployContext<'_, C, A, S>,
    pipeline: &Pipeline,
) -> Result<PipelineRun, DeployError> {
    let mut records = Dependencies::new();
    let mut report = GasReport::default();

    for step in pipeline.steps() {
        let (record, step_report) =
            deploy_step(ctx, step, &records).await.map_err(|e| e.in_step(step.logical_name()))?;

        records.insert(step.logical_name().to_string(), record);
        report.push(step_report);
    }

    Ok(PipelineRun { records, report })
}

/// Produce the record of a single step, deploying only if none is persisted.
///
/// References are resolved against `dependencies` alone, i.e. against the
/// records of the steps that ran before this one.
pub async fn deploy_step<C: Chain, A: ArtifactSource, S: DeploymentStore>(
    ctx: &mut DeployContext<'_, C, A, S>,
    step: &PipelineStep,
    dependencies: &Dependencies,
) -> Result<(DeploymentRecord, StepReport), DeployError> {
    let name = step.logical_name();
    let started = Instant::now();

    if let Some(existing) = ctx.store.get(name)? {
        info!(contract = name, address = %existing.address, "reusing existing deployment");
        return Ok((existing, StepReport::new(name, StepOutcome::Reused)));
    }

    // Everything that can fail locally is checked before the first transaction
    let constructor_args = resolve_args(name, &step.constructor_args, dependencies)?;
    let execute = match &step.initializer {
        Some(init) => Some(ExecuteRecord {
            method_name: init.method.clone(),
            args: resolve_args(name, &init.args, dependencies)?,
        }),
        None => None,
    };

    let artifact = ctx.artifacts.artifact(&step.contract)?;
    artifact.constructor_args(&constructor_args)?;
    let init_calldata = match &execute {
        Some(exec) => artifact.encode_call(&exec.method_name, &exec.args)?,
        None => Bytes::new(),
    };

    let mut report = StepReport::new(name, ctx.sending_outcome());
    let proxy_admin = ensure_proxy_admin(ctx, &mut report).await?;
    let (implementation, code_hash) =
        deploy_implementation(ctx, &artifact, &constructor_args, &mut report).await?;

    let proxy_tx = match deploy_proxy(ctx, implementation, proxy_admin, init_calldata, &mut report)
        .await
    {
        Ok(tx) => tx,
        Err(e) if e.is_revert() && execute.is_some() => {
            return Err(DeployError::Initialization {
                contract: name.to_string(),
                reason: e.to_string(),
            });
        },
        Err(e) => return Err(e),
    };
    let address = created_address(&proxy_tx, name)?;

    let record = DeploymentRecord {
        address,
        implementation: Some(implementation),
        proxy_admin: Some(proxy_admin),
        abi: artifact.abi,
        transaction_hash: proxy_tx.tx_hash,
        args: constructor_args,
        execute,
        implementation_code_hash: Some(code_hash),
    };
    ctx.store.save(name, &record)?;

    report.elapsed = started.elapsed();
    info!(contract = name, %address, %implementation, "{} {name}", report.outcome.label());
    Ok((record, report))
}

/// Resolve a step's arguments to their textual form
fn resolve_args(
    step: &str,
    args: &[StepArg],
    dependencies: &Dependencies,
) -> Result<Vec<String>, DeployError> {
    args.iter().map(|arg| arg.resolve(step, dependencies)).collect()
}
