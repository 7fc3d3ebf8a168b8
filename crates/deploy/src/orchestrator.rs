//! The deployment run: preflight, deployment steps, initialization sequence.

use std::collections::{HashMap, HashSet};

use serde::Serialize;
use strum::Display;

use crate::{
    allocation::PartnerAllocation,
    artifacts::{Artifact, ArtifactSource},
    client::ChainClient,
    config::RunConfiguration,
    errors::DeployError,
    graph::deployment_order,
    registry::ContractRegistry,
    sequencer::{ActionReceipt, Effect, InitializationAction, Param, Sequencer, Target, protocol_actions},
    step::{deploy_step, encode_constructor, resolve_args},
    topology::{ContractSource, ContractSpec, protocol_specs},
    values::encode_args,
};

/// The stage a run was in when it stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Stage {
    Preflight,
    Deployment,
    Initialization,
}

/// Progress of a run.
///
/// Moves strictly forward: `NotStarted`, `Deploying`, `Deployed`, `Initializing`,
/// then `Complete`, or `Failed` from any earlier state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunState {
    NotStarted,
    Deploying { index: usize, contract: String },
    Deployed,
    Initializing { index: usize, action: String },
    Complete,
    Failed { stage: Stage, cause: String },
}

/// Everything preflight resolved before touching the chain.
#[derive(Debug, Clone, Serialize)]
pub struct Plan {
    /// Contract specs in deployment order.
    pub contracts: Vec<ContractSpec>,
    pub actions: Vec<InitializationAction>,
    pub allocation: PartnerAllocation,
    #[serde(skip)]
    pub artifacts: HashMap<String, Artifact>,
}

/// A completed run.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub registry: ContractRegistry,
    pub receipts: Vec<ActionReceipt>,
}

/// A run that stopped on a fatal error.
///
/// Carries whatever was deployed and initialized before the error; none of it is
/// rolled back.
#[derive(Debug, thiserror::Error)]
#[error("{stage} failed")]
pub struct RunFailure {
    pub stage: Stage,
    #[source]
    pub error: DeployError,
    pub registry: ContractRegistry,
    pub receipts: Vec<ActionReceipt>,
}

/// Drives one deployment run.
///
/// Every call to [`Orchestrator::run`] starts from an empty registry: running again
/// after a success or a failure deploys a fresh, independent set of contracts.
pub struct Orchestrator<'a, C, A> {
    config: &'a RunConfiguration,
    client: &'a C,
    artifacts: &'a A,
    state: RunState,
}

impl<'a, C: ChainClient, A: ArtifactSource> Orchestrator<'a, C, A> {
    pub fn new(config: &'a RunConfiguration, client: &'a C, artifacts: &'a A) -> Self {
        Self {
            config,
            client,
            artifacts,
            state: RunState::NotStarted,
        }
    }

    pub fn state(&self) -> &RunState {
        &self.state
    }

    /// Validate the configuration and resolve everything the run needs.
    ///
    /// Checks every constructor and every action against its ABI with placeholder
    /// addresses, so type and arity mistakes surface before any transaction is sent.
    pub fn plan(&self) -> Result<Plan, DeployError> {
        self.config.validate()?;

        let specs = protocol_specs(self.config);
        let contracts = deployment_order(&specs)?;
        let allocation = PartnerAllocation::compute(&self.config.partners)?;
        let actions = protocol_actions(self.config, &allocation)?;

        let mut artifacts = HashMap::new();
        let needed = contracts
            .iter()
            .filter_map(ContractSpec::artifact)
            .chain(actions.iter().map(|a| a.abi.as_str()));
        for name in needed {
            if !artifacts.contains_key(name) {
                artifacts.insert(name.to_string(), self.artifacts.load(name)?);
            }
        }

        let registry = ContractRegistry::new();
        for spec in &contracts {
            check_spec(spec, &artifacts, &registry)?;
        }
        self.check_actions(&contracts, &actions, &artifacts)?;

        tracing::info!(
            contracts = contracts.len(),
            actions = actions.len(),
            artifacts = artifacts.len(),
            "Preflight complete"
        );

        Ok(Plan {
            contracts,
            actions,
            allocation,
            artifacts,
        })
    }

    fn check_actions(
        &self,
        contracts: &[ContractSpec],
        actions: &[InitializationAction],
        artifacts: &HashMap<String, Artifact>,
    ) -> Result<(), DeployError> {
        let names: HashSet<&str> = contracts.iter().map(|s| s.name.as_str()).collect();
        let mut bound = HashSet::new();

        fn check_refs(
            params: &[Param],
            names: &HashSet<&str>,
            bound: &HashSet<&str>,
        ) -> Result<(), DeployError> {
            for param in params {
                match param {
                    Param::Contract(name) if !names.contains(name.as_str()) => {
                        return Err(DeployError::UnresolvedDependency { name: name.clone() });
                    }
                    Param::Bound(key) if !bound.contains(key.as_str()) => {
                        return Err(DeployError::UnresolvedDependency { name: key.clone() });
                    }
                    Param::List(items) => check_refs(items, names, bound)?,
                    _ => {}
                }
            }
            Ok(())
        }

        for action in actions {
            match &action.target {
                Target::Contract(name) if !names.contains(name.as_str()) => {
                    return Err(DeployError::UnresolvedDependency { name: name.clone() });
                }
                Target::Bound(key) if !bound.contains(key.as_str()) => {
                    return Err(DeployError::UnresolvedDependency { name: key.clone() });
                }
                _ => {}
            }
            check_refs(&action.params, &names, &bound)?;

            let artifact = artifacts.get(&action.abi).ok_or_else(|| {
                DeployError::config(format!("artifact `{}` was not loaded", action.abi))
            })?;
            let function = artifact.function(&action.method, action.params.len())?;
            encode_args(&function.inputs, &action.placeholder_args(self.client.deployer()))
                .map_err(|e| {
                    DeployError::config(format!("action `{}`: {e}", action.description))
                })?;

            if let Effect::Bind { key } = &action.effect {
                bound.insert(key.as_str());
            }
        }
        Ok(())
    }

    fn fail(
        &mut self,
        stage: Stage,
        error: DeployError,
        registry: ContractRegistry,
        receipts: Vec<ActionReceipt>,
    ) -> RunFailure {
        tracing::error!(
            stage = %stage,
            error = %error,
            deployed = registry.len(),
            initialized = receipts.len(),
            "Run aborted; completed steps are not rolled back"
        );
        self.state = RunState::Failed {
            stage,
            cause: error.to_string(),
        };
        RunFailure {
            stage,
            error,
            registry,
            receipts,
        }
    }

    /// Execute the full run.
    pub async fn run(&mut self) -> Result<RunReport, RunFailure> {
        let mut registry = ContractRegistry::new();
        let mut receipts = Vec::new();

        let plan = match self.plan() {
            Ok(plan) => plan,
            Err(e) => return Err(self.fail(Stage::Preflight, e, registry, receipts)),
        };

        if let Err(e) = self.deploy_all(&plan, &mut registry).await {
            return Err(self.fail(Stage::Deployment, e, registry, receipts));
        }
        self.state = RunState::Deployed;
        tracing::info!(contracts = registry.len(), "All contracts deployed");

        if let Err(e) = self.initialize(&plan, &registry, &mut receipts).await {
            return Err(self.fail(Stage::Initialization, e, registry, receipts));
        }
        self.state = RunState::Complete;
        tracing::info!(actions = receipts.len(), "Initialization complete");

        Ok(RunReport { registry, receipts })
    }

    async fn deploy_all(
        &mut self,
        plan: &Plan,
        registry: &mut ContractRegistry,
    ) -> Result<(), DeployError> {
        for (index, spec) in plan.contracts.iter().enumerate() {
            self.state = RunState::Deploying {
                index,
                contract: spec.name.clone(),
            };
            let artifact = spec.artifact().and_then(|name| plan.artifacts.get(name));
            deploy_step(spec, artifact, registry, self.client).await?;
        }
        Ok(())
    }

    async fn initialize(
        &mut self,
        plan: &Plan,
        registry: &ContractRegistry,
        receipts: &mut Vec<ActionReceipt>,
    ) -> Result<(), DeployError> {
        let mut sequencer = Sequencer::new(self.client, registry, &plan.artifacts);
        for (index, action) in plan.actions.iter().enumerate() {
            self.state = RunState::Initializing {
                index,
                action: action.description.clone(),
            };
            receipts.push(sequencer.execute(action).await?);
        }
        Ok(())
    }
}

/// Check a spec's artifact against its arguments without deploying anything.
fn check_spec(
    spec: &ContractSpec,
    artifacts: &HashMap<String, Artifact>,
    placeholder_registry: &ContractRegistry,
) -> Result<(), DeployError> {
    match &spec.source {
        ContractSource::Existing { address } => {
            if address.is_zero() {
                return Err(DeployError::config(format!(
                    "`{}` is configured with the zero address",
                    spec.name
                )));
            }
        }
        ContractSource::Deploy { artifact, args } => {
            let artifact = artifacts
                .get(artifact)
                .ok_or_else(|| DeployError::config(format!("artifact `{artifact}` was not loaded")))?;
            let values = resolve_args(args, placeholder_registry, true)?;
            encode_constructor(artifact, &values)
                .map_err(|e| DeployError::config(format!("constructor of `{}`: {e}", spec.name)))?;
        }
        ContractSource::Derived {
            abi, method, output, ..
        } => {
            let artifact = artifacts
                .get(abi)
                .ok_or_else(|| DeployError::config(format!("artifact `{abi}` was not loaded")))?;
            let function = artifact.function(method, 0)?;
            if !function.outputs.iter().any(|o| o.name == *output) {
                return Err(DeployError::config(format!(
                    "`{abi}.{method}` has no output `{output}`"
                )));
            }
        }
    }
    Ok(())
}
