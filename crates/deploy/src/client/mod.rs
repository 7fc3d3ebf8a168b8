//! Chain client abstraction.
//!
//! The orchestrator talks to the chain only through [`ChainClient`]. Every method is
//! one round trip; transactions are sent from the client's deployer account.

use std::future::Future;

use alloy_core::{
    dyn_abi::{DynSolValue, JsonAbiExt},
    json_abi::Function,
    primitives::{Address, Bytes, TxHash, U256},
};
use anyhow::{Context, Result};
use serde::Serialize;

mod rpc;
pub use rpc::RpcChainClient;

mod simulated;
pub use simulated::{Fault, LiquidityDeposit, RecordedCall, SimulatedChain, VeLock};

/// A contract-creation request.
#[derive(Debug, Clone)]
pub struct DeployRequest {
    /// Logical name of the contract being created.
    pub contract: String,
    /// Artifact the bytecode comes from.
    pub artifact: String,
    /// Constructor arguments, already encoded against the constructor ABI.
    pub args: Vec<DynSolValue>,
    /// Creation bytecode followed by the encoded constructor arguments.
    pub init_code: Bytes,
}

/// A call to a deployed contract.
#[derive(Debug, Clone)]
pub struct ContractCall {
    pub target: Address,
    pub function: Function,
    pub args: Vec<DynSolValue>,
    /// Native value sent along.
    pub value: Option<U256>,
    pub gas_limit: Option<u64>,
}

impl ContractCall {
    /// Selector followed by the encoded arguments.
    pub fn calldata(&self) -> Result<Bytes> {
        self.function
            .abi_encode_input(&self.args)
            .map(Bytes::from)
            .with_context(|| format!("Failed to encode call to {}", self.function.name))
    }
}

/// The chain's account of an included transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Receipt {
    pub tx_hash: TxHash,
    /// `false` if the transaction reverted.
    pub status: bool,
    /// Set for contract-creation transactions that succeeded.
    pub contract_address: Option<Address>,
    pub block_number: u64,
    pub gas_used: u64,
}

/// Operations the orchestrator needs from a chain.
pub trait ChainClient: Send + Sync {
    /// The account every transaction is sent from.
    fn deployer(&self) -> Address;

    fn chain_id(&self) -> impl Future<Output = Result<u64>> + Send;

    /// Estimated fee in wei for a contract creation.
    fn estimate_deploy_fee(
        &self,
        request: &DeployRequest,
    ) -> impl Future<Output = Result<U256>> + Send;

    /// Submit a contract-creation transaction.
    fn deploy(&self, request: &DeployRequest) -> impl Future<Output = Result<TxHash>> + Send;

    /// Submit a state-changing call.
    fn send(&self, call: &ContractCall) -> impl Future<Output = Result<TxHash>> + Send;

    /// Execute a view call and decode its outputs.
    fn read(&self, call: &ContractCall) -> impl Future<Output = Result<Vec<DynSolValue>>> + Send;

    /// Wait until the transaction is included and return its receipt.
    ///
    /// A reverted transaction is returned as a receipt with `status == false`, not as
    /// an error.
    fn await_confirmation(&self, tx_hash: TxHash) -> impl Future<Output = Result<Receipt>> + Send;
}
