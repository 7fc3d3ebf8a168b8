//! Post-deployment initialization.
//!
//! The sequence is data: a list of [`InitializationAction`]s built by
//! [`protocol_actions`] and executed one at a time by [`Sequencer::execute`]. Each
//! action is confirmed before the next one is submitted.

use std::collections::HashMap;

use alloy_core::{
    dyn_abi::DynSolValue,
    primitives::{Address, TxHash, U256},
};
use serde::Serialize;
use strum::Display;

use crate::{
    artifacts::Artifact,
    client::{ChainClient, ContractCall},
    errors::DeployError,
    registry::ContractRegistry,
    topology::ContractName,
    values::{ArgValue, encode_args},
};

mod actions;
pub use actions::{DEFAULT_GAS_LIMIT, protocol_actions};

/// Stages of the initialization sequence, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Phase {
    InitialMint,
    Wiring,
    Whitelist,
    MinterSetup,
    MultipoolLiquidity,
    VoteEscrowLock,
    MultipoolGauge,
    NativePair,
}

/// The contract an action is sent to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "name", rename_all = "snake_case")]
pub enum Target {
    /// A registered contract.
    Contract(String),
    /// An address bound by an earlier action.
    Bound(String),
}

impl std::fmt::Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Contract(name) => write!(f, "{name}"),
            Self::Bound(key) => write!(f, "<{key}>"),
        }
    }
}

/// A call parameter, resolved when the action runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Param {
    Contract(String),
    Bound(String),
    /// An array of resolved parameters.
    List(Vec<Param>),
    /// The deploying account.
    Deployer,
    /// `type(uint256).max`.
    MaxUint,
    Literal(ArgValue),
}

impl Param {
    pub fn contract(name: ContractName) -> Self {
        Self::Contract(name.name())
    }

    pub fn address(address: Address) -> Self {
        Self::Literal(ArgValue::Address(address))
    }

    pub fn uint(value: U256) -> Self {
        Self::Literal(ArgValue::Uint(value))
    }
}

/// What the sequencer does with an action's call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Effect {
    /// Send a transaction and wait for it to be confirmed.
    Transact,
    /// Execute a view call and bind the first address it returns under `key`.
    Bind { key: String },
}

/// One step of the initialization sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InitializationAction {
    pub phase: Phase,
    pub description: String,
    pub target: Target,
    /// Artifact whose ABI declares `method`.
    pub abi: String,
    pub method: String,
    pub params: Vec<Param>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<U256>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gas_limit: Option<u64>,
    pub effect: Effect,
}

impl InitializationAction {
    /// A transaction to a registered contract using that contract's own ABI.
    pub fn on(phase: Phase, contract: ContractName, method: &str, params: Vec<Param>) -> Self {
        Self::new(phase, Target::Contract(contract.name()), contract.as_ref(), method, params)
    }

    pub fn new(phase: Phase, target: Target, abi: &str, method: &str, params: Vec<Param>) -> Self {
        Self {
            phase,
            description: format!("{target}.{method}"),
            target,
            abi: abi.to_string(),
            method: method.to_string(),
            params,
            value: None,
            gas_limit: None,
            effect: Effect::Transact,
        }
    }

    pub fn with_value(mut self, value: U256) -> Self {
        self.value = Some(value);
        self
    }

    pub fn with_gas_limit(mut self, gas_limit: u64) -> Self {
        self.gas_limit = Some(gas_limit);
        self
    }

    /// Turn the action into a view call whose address result is bound under `key`.
    pub fn binding(mut self, key: &str) -> Self {
        self.description = format!("{key} = {}", self.description);
        self.effect = Effect::Bind {
            key: key.to_string(),
        };
        self
    }

    /// Resolve the parameters, with zero addresses standing in for every reference.
    pub(crate) fn placeholder_args(&self, deployer: Address) -> Vec<ArgValue> {
        fn placeholder(param: &Param, deployer: Address) -> ArgValue {
            match param {
                Param::Contract(_) | Param::Bound(_) => ArgValue::Address(Address::ZERO),
                Param::List(items) => {
                    ArgValue::List(items.iter().map(|p| placeholder(p, deployer)).collect())
                }
                Param::Deployer => ArgValue::Address(deployer),
                Param::MaxUint => ArgValue::Uint(U256::MAX),
                Param::Literal(value) => value.clone(),
            }
        }

        self.params.iter().map(|p| placeholder(p, deployer)).collect()
    }
}

/// The outcome of an executed action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActionReceipt {
    pub index: usize,
    pub phase: Phase,
    pub description: String,
    pub target: Address,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tx_hash: Option<TxHash>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block_number: Option<u64>,
    /// Address bound by a view action.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bound: Option<Address>,
}

/// Executes initialization actions against a fully populated registry.
pub struct Sequencer<'a, C> {
    client: &'a C,
    registry: &'a ContractRegistry,
    artifacts: &'a HashMap<String, Artifact>,
    bindings: HashMap<String, Address>,
    executed: usize,
}

impl<'a, C: ChainClient> Sequencer<'a, C> {
    pub fn new(
        client: &'a C,
        registry: &'a ContractRegistry,
        artifacts: &'a HashMap<String, Artifact>,
    ) -> Self {
        Self {
            client,
            registry,
            artifacts,
            bindings: HashMap::new(),
            executed: 0,
        }
    }

    /// Addresses bound so far.
    pub fn bindings(&self) -> &HashMap<String, Address> {
        &self.bindings
    }

    fn bound(&self, key: &str) -> Result<Address, DeployError> {
        self.bindings
            .get(key)
            .copied()
            .ok_or_else(|| DeployError::UnresolvedDependency {
                name: key.to_string(),
            })
    }

    fn resolve_target(&self, target: &Target) -> Result<Address, DeployError> {
        match target {
            Target::Contract(name) => self.registry.address(name),
            Target::Bound(key) => self.bound(key),
        }
    }

    fn resolve_param(&self, param: &Param) -> Result<ArgValue, DeployError> {
        Ok(match param {
            Param::Contract(name) => ArgValue::Address(self.registry.address(name)?),
            Param::Bound(key) => ArgValue::Address(self.bound(key)?),
            Param::List(items) => ArgValue::List(self.resolve_params(items)?),
            Param::Deployer => ArgValue::Address(self.client.deployer()),
            Param::MaxUint => ArgValue::Uint(U256::MAX),
            Param::Literal(value) => value.clone(),
        })
    }

    fn resolve_params(&self, params: &[Param]) -> Result<Vec<ArgValue>, DeployError> {
        params.iter().map(|param| self.resolve_param(param)).collect()
    }

    /// Execute the next action.
    ///
    /// Actions must be passed in sequence order; the receipt's index counts the
    /// actions executed by this sequencer.
    pub async fn execute(
        &mut self,
        action: &InitializationAction,
    ) -> Result<ActionReceipt, DeployError> {
        let fail = |reason: String| DeployError::call(&action.description, reason);

        let artifact = self
            .artifacts
            .get(&action.abi)
            .ok_or_else(|| DeployError::config(format!("artifact `{}` was not loaded", action.abi)))?;
        let function = artifact.function(&action.method, action.params.len())?;

        let target = self.resolve_target(&action.target)?;
        let values = self.resolve_params(&action.params)?;
        let args = encode_args(&function.inputs, &values).map_err(fail)?;

        tracing::info!(
            phase = %action.phase,
            action = %action.description,
            target = %target,
            "Executing initialization action"
        );

        let call = ContractCall {
            target,
            function: function.clone(),
            args,
            value: action.value,
            gas_limit: action.gas_limit,
        };

        let index = self.executed;
        let receipt = match &action.effect {
            Effect::Transact => {
                let tx_hash = self
                    .client
                    .send(&call)
                    .await
                    .map_err(|e| fail(format!("{e:#}")))?;
                let receipt = self
                    .client
                    .await_confirmation(tx_hash)
                    .await
                    .map_err(|e| fail(format!("{e:#}")))?;
                if !receipt.status {
                    return Err(fail(format!(
                        "transaction {tx_hash} reverted in block {}",
                        receipt.block_number
                    )));
                }

                tracing::debug!(
                    action = %action.description,
                    tx_hash = %tx_hash,
                    gas_used = receipt.gas_used,
                    "Initialization action confirmed"
                );
                ActionReceipt {
                    index,
                    phase: action.phase,
                    description: action.description.clone(),
                    target,
                    tx_hash: Some(tx_hash),
                    block_number: Some(receipt.block_number),
                    bound: None,
                }
            }
            Effect::Bind { key } => {
                let outputs = self
                    .client
                    .read(&call)
                    .await
                    .map_err(|e| fail(format!("{e:#}")))?;
                let address = outputs
                    .iter()
                    .find_map(DynSolValue::as_address)
                    .ok_or_else(|| fail(format!("`{}` returned no address", action.method)))?;
                if address.is_zero() {
                    return Err(fail(format!("`{}` returned the zero address", action.method)));
                }

                tracing::info!(key = %key, address = %address, "Bound address");
                self.bindings.insert(key.clone(), address);
                ActionReceipt {
                    index,
                    phase: action.phase,
                    description: action.description.clone(),
                    target,
                    tx_hash: None,
                    block_number: None,
                    bound: Some(address),
                }
            }
        };

        self.executed += 1;
        Ok(receipt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        artifacts::{ArtifactSource, BuiltinArtifacts},
        client::{Fault, SimulatedChain},
        registry::{DeploymentRecord, RecordOrigin},
    };

    fn setup(names: &[&str]) -> (ContractRegistry, HashMap<String, Artifact>) {
        let mut registry = ContractRegistry::new();
        let mut artifacts = HashMap::new();
        for (i, name) in names.iter().enumerate() {
            registry
                .register(DeploymentRecord {
                    name: name.to_string(),
                    origin: RecordOrigin::Existing,
                    artifact: None,
                    args: vec![],
                    address: Address::with_last_byte(i as u8 + 1),
                    tx_hash: None,
                })
                .unwrap();
            artifacts.insert(name.to_string(), BuiltinArtifacts.load(name).unwrap());
        }
        (registry, artifacts)
    }

    #[tokio::test]
    async fn test_transact_records_receipt() {
        let chain = SimulatedChain::default();
        let (registry, artifacts) = setup(&["Minter", "Voter"]);
        let mut sequencer = Sequencer::new(&chain, &registry, &artifacts);

        let action = InitializationAction::on(
            Phase::Whitelist,
            ContractName::Voter,
            "initialize",
            vec![
                Param::List(vec![Param::address(Address::with_last_byte(9))]),
                Param::contract(ContractName::Minter),
            ],
        );
        let receipt = sequencer.execute(&action).await.unwrap();

        assert_eq!(receipt.index, 0);
        assert_eq!(receipt.target, registry.address("Voter").unwrap());
        assert!(receipt.tx_hash.is_some());

        let calls = chain.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].method, "initialize");
        assert_eq!(
            calls[0].args[1],
            DynSolValue::Address(registry.address("Minter").unwrap())
        );
    }

    #[tokio::test]
    async fn test_reverted_action_is_call_failed() {
        let chain = SimulatedChain::default();
        chain.inject(Fault::RevertCall("setMinter".to_string()));
        let (registry, artifacts) = setup(&["Stratum", "Minter"]);
        let mut sequencer = Sequencer::new(&chain, &registry, &artifacts);

        let action = InitializationAction::on(
            Phase::Wiring,
            ContractName::Stratum,
            "setMinter",
            vec![Param::contract(ContractName::Minter)],
        );
        let err = sequencer.execute(&action).await.unwrap_err();

        assert!(matches!(
            err,
            DeployError::CallFailed { ref action, .. } if action == "Stratum.setMinter"
        ));
        assert!(err.to_string().contains("reverted"));
    }

    #[tokio::test]
    async fn test_zero_address_binding_fails() {
        let chain = SimulatedChain::default();
        let (registry, artifacts) = setup(&["Voter", "Swap"]);
        let mut sequencer = Sequencer::new(&chain, &registry, &artifacts);

        // No gauge was created for the pool, so the voter reports the zero address.
        let action = InitializationAction::on(
            Phase::MultipoolGauge,
            ContractName::Voter,
            "gauges",
            vec![Param::contract(ContractName::Swap)],
        )
        .binding("gauge");
        let err = sequencer.execute(&action).await.unwrap_err();

        assert!(err.to_string().contains("zero address"));
        assert!(sequencer.bindings().is_empty());
    }

    #[tokio::test]
    async fn test_unbound_key_is_unresolved() {
        let chain = SimulatedChain::default();
        let (registry, artifacts) = setup(&["Swap"]);
        let mut sequencer = Sequencer::new(&chain, &registry, &artifacts);

        let action = InitializationAction::on(
            Phase::MultipoolGauge,
            ContractName::Swap,
            "setRebaseHandler",
            vec![Param::Bound("gauge".to_string())],
        );
        let err = sequencer.execute(&action).await.unwrap_err();

        assert_eq!(
            err,
            DeployError::UnresolvedDependency {
                name: "gauge".to_string()
            }
        );
        assert!(chain.calls().is_empty());
    }

    #[test]
    fn test_placeholder_args_keep_literals() {
        let action = InitializationAction::on(
            Phase::VoteEscrowLock,
            ContractName::VotingEscrow,
            "create_lock_for",
            vec![Param::uint(U256::from(5u8)), Param::MaxUint, Param::Deployer],
        );
        let deployer = Address::with_last_byte(1);

        assert_eq!(
            action.placeholder_args(deployer),
            vec![
                ArgValue::uint(5),
                ArgValue::Uint(U256::MAX),
                ArgValue::Address(deployer)
            ]
        );
    }
}
