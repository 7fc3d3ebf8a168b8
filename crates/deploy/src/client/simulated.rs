//! In-memory chain for dry runs and tests.
//!
//! Models the account nonce, CREATE addresses, receipts and the few protocol effects
//! the orchestrator's results can be checked against: multipool balances, LP token
//! creation, gauges, vote-escrow locks (veNFT ids and ownership) and router liquidity.
//! Every other call succeeds as a no-op and every other view returns zero values
//! shaped after the ABI.

use std::{
    collections::HashMap,
    sync::{Mutex, MutexGuard, PoisonError},
};

use alloy_core::{
    dyn_abi::{DynSolValue, Specifier},
    primitives::{Address, TxHash, U256, address, keccak256},
};
use anyhow::{Context, Result};

use super::{ChainClient, ContractCall, DeployRequest, Receipt};
use crate::{config::MAX_LOCK_DURATION_SECS, values::zero_value};

/// First account of the default Hardhat/Anvil mnemonic.
const DEFAULT_DEPLOYER: Address = address!("f39Fd6e51aad88F6F4ce6aB8827279cffFb92266");

/// Hardhat/Anvil chain id.
const DEFAULT_CHAIN_ID: u64 = 31_337;

const GAS_PRICE_WEI: u64 = 1_000_000_000;

/// A failure injected into the simulated chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fault {
    /// Creation of the named artifact is mined but reverts.
    RevertDeploy(String),
    /// Creation of the named artifact is rejected before submission.
    RejectDeploy(String),
    /// Calls to the named method are mined but revert.
    RevertCall(String),
    /// Calls to the named method are rejected before submission.
    RejectCall(String),
}

/// A state-changing call that was mined.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub target: Address,
    pub method: String,
    pub args: Vec<DynSolValue>,
    pub value: Option<U256>,
    pub reverted: bool,
}

/// A vote-escrow lock, created through `create_lock_for` or for a partner by
/// `Minter.initialize`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VeLock {
    pub escrow: Address,
    /// veNFT id, sequential per escrow from 1.
    pub token_id: U256,
    pub owner: Address,
    pub amount: U256,
    pub duration: U256,
}

/// Liquidity added through `Router.addLiquidityETH`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LiquidityDeposit {
    pub pair: Address,
    pub token: Address,
    pub token_amount: U256,
    pub native_value: U256,
    pub stable: bool,
    pub to: Address,
}

#[derive(Debug, Clone)]
struct Pool {
    tokens: Vec<Address>,
    lp_token: Address,
    balances: Vec<U256>,
    rebase_handler: Option<Address>,
}

#[derive(Debug, Default)]
struct State {
    nonce: u64,
    block: u64,
    /// Artifact name of the code at each address.
    code: HashMap<Address, String>,
    receipts: HashMap<TxHash, Receipt>,
    calls: Vec<RecordedCall>,
    pools: HashMap<Address, Pool>,
    /// Router address to its wrapped native token.
    routers: HashMap<Address, Address>,
    /// Pool address to its gauge.
    gauges: HashMap<Address, Address>,
    /// Voter or minter address to its vote escrow.
    escrows: HashMap<Address, Address>,
    /// Gauge address to the vote escrow of the voter that created it.
    gauge_escrows: HashMap<Address, Address>,
    locks: Vec<VeLock>,
    pair_deposits: Vec<LiquidityDeposit>,
    faults: Vec<Fault>,
}

impl State {
    fn has_fault(&self, fault: &Fault) -> bool {
        self.faults.contains(fault)
    }

    fn mine(&mut self, tx_hash: TxHash, status: bool, contract_address: Option<Address>, gas_used: u64) {
        self.block += 1;
        self.receipts.insert(
            tx_hash,
            Receipt {
                tx_hash,
                status,
                contract_address,
                block_number: self.block,
                gas_used,
            },
        );
    }

    fn code_is(&self, address: Address, artifact: &str) -> bool {
        self.code.get(&address).is_some_and(|code| code == artifact)
    }

    fn mint_lock(&mut self, escrow: Address, owner: Address, amount: U256, duration: U256) {
        let token_id = U256::from(self.locks.iter().filter(|l| l.escrow == escrow).count() + 1);
        self.locks.push(VeLock {
            escrow,
            token_id,
            owner,
            amount,
            duration,
        });
    }

    fn lock_owner(&self, escrow: Address, token_id: U256) -> Option<Address> {
        self.locks
            .iter()
            .find(|l| l.escrow == escrow && l.token_id == token_id)
            .map(|l| l.owner)
    }

    fn apply_creation(&mut self, address: Address, request: &DeployRequest) -> Result<(), String> {
        match request.artifact.as_str() {
            "Swap" => {
                let tokens = arg_list(&request.args, 0)?
                    .iter()
                    .map(|token| token.as_address().ok_or("pooled token is not an address"))
                    .collect::<Result<Vec<_>, _>>()?;
                let lp_token = address.create(1);
                self.code.insert(lp_token, "LPToken".to_string());
                self.pools.insert(
                    address,
                    Pool {
                        balances: vec![U256::ZERO; tokens.len()],
                        tokens,
                        lp_token,
                        rebase_handler: None,
                    },
                );
            }
            "Router" => {
                let weth = arg_address(&request.args, 1)?;
                self.routers.insert(address, weth);
            }
            "Voter" => {
                let escrow = arg_address(&request.args, 0)?;
                self.escrows.insert(address, escrow);
            }
            "Minter" => {
                let escrow = arg_address(&request.args, 1)?;
                self.escrows.insert(address, escrow);
            }
            _ => {}
        }
        self.code.insert(address, request.artifact.clone());
        Ok(())
    }

    fn apply_call(&mut self, deployer: Address, call: &ContractCall) -> Result<(), String> {
        let target = call.target;
        let args = &call.args;

        match call.function.name.as_str() {
            "addLiquidity" => {
                let pool = self.pools.get_mut(&target).ok_or("target is not a pool")?;
                let amounts = arg_list(args, 0)?;
                if amounts.len() != pool.tokens.len() {
                    return Err(format!(
                        "expected {} amounts, got {}",
                        pool.tokens.len(),
                        amounts.len()
                    ));
                }
                for (balance, amount) in pool.balances.iter_mut().zip(amounts) {
                    let (amount, _) = amount.as_uint().ok_or("amount is not a uint")?;
                    *balance += amount;
                }
            }
            "setRebaseHandler" => {
                let handler = arg_address(args, 0)?;
                let pool = self.pools.get_mut(&target).ok_or("target is not a pool")?;
                pool.rebase_handler = Some(handler);
            }
            "create_lock_for" => {
                if !self.code_is(target, "VotingEscrow") {
                    return Err("target is not a vote escrow".to_string());
                }
                let amount = arg_uint(args, 0)?;
                let duration = arg_uint(args, 1)?;
                if amount.is_zero() || duration.is_zero() {
                    return Err("lock amount and duration must be positive".to_string());
                }
                let owner = arg_address(args, 2)?;
                self.mint_lock(target, owner, amount, duration);
            }
            "initialize" if self.code_is(target, "Minter") => {
                let escrow = *self.escrows.get(&target).ok_or("minter has no escrow")?;
                let claimants = arg_list(args, 0)?;
                let amounts = arg_list(args, 1)?;
                if claimants.len() != amounts.len() {
                    return Err("claimants and amounts differ in length".to_string());
                }
                // One max-duration lock per partner, in claimant order.
                for (claimant, amount) in claimants.iter().zip(amounts) {
                    let owner = claimant.as_address().ok_or("claimant is not an address")?;
                    let (amount, _) = amount.as_uint().ok_or("amount is not a uint")?;
                    self.mint_lock(escrow, owner, amount, U256::from(MAX_LOCK_DURATION_SECS));
                }
            }
            "deposit" => {
                if let Some(&escrow) = self.gauge_escrows.get(&target) {
                    let token_id = arg_uint(args, 1)?;
                    if !token_id.is_zero() && self.lock_owner(escrow, token_id) != Some(deployer) {
                        return Err(format!("veNFT {token_id} is not owned by the caller"));
                    }
                }
            }
            "createGauge3pool" | "createGauge" => {
                if !self.code_is(target, "Voter") {
                    return Err("target is not the voter".to_string());
                }
                let pool = arg_address(args, 0)?;
                if self.gauges.contains_key(&pool) {
                    return Err("gauge exists".to_string());
                }
                let gauge = Address::from_word(keccak256([target.as_slice(), pool.as_slice()].concat()));
                self.code.insert(gauge, "Gauge".to_string());
                self.gauges.insert(pool, gauge);
                if let Some(&escrow) = self.escrows.get(&target) {
                    self.gauge_escrows.insert(gauge, escrow);
                }
            }
            "addLiquidityETH" => {
                let weth = *self.routers.get(&target).ok_or("target is not a router")?;
                let native_value = call.value.unwrap_or_default();
                if native_value.is_zero() {
                    return Err("no native value sent".to_string());
                }
                let token = arg_address(args, 0)?;
                let stable = args
                    .get(1)
                    .and_then(DynSolValue::as_bool)
                    .ok_or("missing stable flag")?;
                let pair = pair_address(target, token, weth, stable);
                self.code.insert(pair, "Pair".to_string());
                self.pair_deposits.push(LiquidityDeposit {
                    pair,
                    token,
                    token_amount: arg_uint(args, 2)?,
                    native_value,
                    stable,
                    to: arg_address(args, 5).unwrap_or(deployer),
                });
            }
            _ => {}
        }
        Ok(())
    }
}

fn arg_list(args: &[DynSolValue], index: usize) -> Result<&[DynSolValue], String> {
    match args.get(index) {
        Some(DynSolValue::Array(items)) | Some(DynSolValue::FixedArray(items)) => Ok(items),
        _ => Err(format!("argument {index} is not a list")),
    }
}

fn arg_address(args: &[DynSolValue], index: usize) -> Result<Address, String> {
    args.get(index)
        .and_then(DynSolValue::as_address)
        .ok_or_else(|| format!("argument {index} is not an address"))
}

fn arg_uint(args: &[DynSolValue], index: usize) -> Result<U256, String> {
    args.get(index)
        .and_then(DynSolValue::as_uint)
        .map(|(value, _)| value)
        .ok_or_else(|| format!("argument {index} is not a uint"))
}

/// Deterministic pair address for a router, token pair and curve.
fn pair_address(router: Address, a: Address, b: Address, stable: bool) -> Address {
    let (first, second) = if a < b { (a, b) } else { (b, a) };
    let mut preimage = Vec::with_capacity(61);
    preimage.extend_from_slice(router.as_slice());
    preimage.extend_from_slice(first.as_slice());
    preimage.extend_from_slice(second.as_slice());
    preimage.push(u8::from(stable));
    Address::from_word(keccak256(preimage))
}

/// In-memory [`ChainClient`].
#[derive(Debug)]
pub struct SimulatedChain {
    deployer: Address,
    chain_id: u64,
    state: Mutex<State>,
}

impl Default for SimulatedChain {
    fn default() -> Self {
        Self::new(DEFAULT_DEPLOYER, DEFAULT_CHAIN_ID)
    }
}

impl SimulatedChain {
    pub fn new(deployer: Address, chain_id: u64) -> Self {
        Self {
            deployer,
            chain_id,
            state: Mutex::new(State::default()),
        }
    }

    /// Inject a failure that applies to every later matching transaction.
    pub fn inject(&self, fault: Fault) {
        self.snapshot().faults.push(fault);
    }

    /// Remove every injected failure.
    pub fn clear_faults(&self) {
        self.snapshot().faults.clear();
    }

    /// Mined calls, in order.
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.snapshot().calls.clone()
    }

    /// Artifact name of the code deployed at `address`.
    pub fn code_at(&self, address: Address) -> Option<String> {
        self.snapshot().code.get(&address).cloned()
    }

    /// Balances of a multipool, in pool token order.
    pub fn pool_balances(&self, swap: Address) -> Option<Vec<U256>> {
        self.snapshot().pools.get(&swap).map(|pool| pool.balances.clone())
    }

    pub fn pool_tokens(&self, swap: Address) -> Option<Vec<Address>> {
        self.snapshot().pools.get(&swap).map(|pool| pool.tokens.clone())
    }

    pub fn rebase_handler(&self, swap: Address) -> Option<Address> {
        self.snapshot().pools.get(&swap).and_then(|pool| pool.rebase_handler)
    }

    pub fn gauge_for(&self, pool: Address) -> Option<Address> {
        self.snapshot().gauges.get(&pool).copied()
    }

    pub fn locks(&self) -> Vec<VeLock> {
        self.snapshot().locks.clone()
    }

    pub fn pair_deposits(&self) -> Vec<LiquidityDeposit> {
        self.snapshot().pair_deposits.clone()
    }

    /// Transactions mined so far (the deployer's nonce).
    pub fn transaction_count(&self) -> u64 {
        self.snapshot().nonce
    }

    fn snapshot(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn state(&self) -> Result<MutexGuard<'_, State>> {
        self.state
            .lock()
            .map_err(|_| anyhow::anyhow!("Simulated chain state is poisoned"))
    }

    fn tx_hash(&self, nonce: u64) -> TxHash {
        let mut preimage = Vec::with_capacity(36);
        preimage.extend_from_slice(self.deployer.as_slice());
        preimage.extend_from_slice(&self.chain_id.to_be_bytes());
        preimage.extend_from_slice(&nonce.to_be_bytes());
        keccak256(preimage)
    }
}

fn creation_gas(request: &DeployRequest) -> u64 {
    53_000 + 200 * request.init_code.len() as u64
}

impl ChainClient for SimulatedChain {
    fn deployer(&self) -> Address {
        self.deployer
    }

    async fn chain_id(&self) -> Result<u64> {
        Ok(self.chain_id)
    }

    async fn estimate_deploy_fee(&self, request: &DeployRequest) -> Result<U256> {
        Ok(U256::from(creation_gas(request)) * U256::from(GAS_PRICE_WEI))
    }

    async fn deploy(&self, request: &DeployRequest) -> Result<TxHash> {
        let mut state = self.state()?;
        if state.has_fault(&Fault::RejectDeploy(request.artifact.clone())) {
            anyhow::bail!("Simulated rejection of {} creation", request.artifact);
        }

        let nonce = state.nonce;
        state.nonce += 1;
        let tx_hash = self.tx_hash(nonce);
        let address = self.deployer.create(nonce);

        let applied = if state.has_fault(&Fault::RevertDeploy(request.artifact.clone())) {
            Err("injected revert".to_string())
        } else {
            state.apply_creation(address, request)
        };

        if let Err(reason) = &applied {
            tracing::debug!(artifact = %request.artifact, reason = %reason, "Simulated creation reverted");
        }
        let success = applied.is_ok();
        state.mine(tx_hash, success, success.then_some(address), creation_gas(request));
        Ok(tx_hash)
    }

    async fn send(&self, call: &ContractCall) -> Result<TxHash> {
        let method = call.function.name.clone();
        let calldata = call.calldata()?;

        let mut state = self.state()?;
        if state.has_fault(&Fault::RejectCall(method.clone())) {
            anyhow::bail!("Simulated rejection of {method} call");
        }

        let nonce = state.nonce;
        state.nonce += 1;
        let tx_hash = self.tx_hash(nonce);

        let applied = if state.has_fault(&Fault::RevertCall(method.clone())) {
            Err("injected revert".to_string())
        } else {
            state.apply_call(self.deployer, call)
        };

        if let Err(reason) = &applied {
            tracing::debug!(method = %method, reason = %reason, "Simulated call reverted");
        }
        state.calls.push(RecordedCall {
            target: call.target,
            method,
            args: call.args.clone(),
            value: call.value,
            reverted: applied.is_err(),
        });
        state.mine(tx_hash, applied.is_ok(), None, 21_000 + 16 * calldata.len() as u64);
        Ok(tx_hash)
    }

    async fn read(&self, call: &ContractCall) -> Result<Vec<DynSolValue>> {
        let function = &call.function;
        let state = self.state()?;
        if state.has_fault(&Fault::RejectCall(function.name.clone())) {
            anyhow::bail!("Simulated rejection of {} call", function.name);
        }

        let mut outputs = function
            .outputs
            .iter()
            .map(|param| param.resolve().map(|ty| zero_value(&ty)))
            .collect::<Result<Vec<_>, _>>()
            .with_context(|| format!("Unsupported output type in {}", function.name))?;

        let override_address = match function.name.as_str() {
            "swapStorage" => {
                let pool = state
                    .pools
                    .get(&call.target)
                    .with_context(|| format!("swapStorage called on non-pool {}", call.target))?;
                Some(("lpToken", pool.lp_token))
            }
            "gauges" => {
                let pool = arg_address(&call.args, 0).map_err(anyhow::Error::msg)?;
                Some(("", state.gauges.get(&pool).copied().unwrap_or_default()))
            }
            "pairFor" => {
                let a = arg_address(&call.args, 0).map_err(anyhow::Error::msg)?;
                let b = arg_address(&call.args, 1).map_err(anyhow::Error::msg)?;
                let stable = call
                    .args
                    .get(2)
                    .and_then(DynSolValue::as_bool)
                    .context("pairFor needs a stable flag")?;
                Some(("", pair_address(call.target, a, b, stable)))
            }
            _ => None,
        };

        if let Some((name, address)) = override_address {
            let index = if name.is_empty() {
                Some(0)
            } else {
                function.outputs.iter().position(|o| o.name == name)
            };
            if let Some(slot) = index.and_then(|i| outputs.get_mut(i)) {
                *slot = DynSolValue::Address(address);
            }
        }

        Ok(outputs)
    }

    async fn await_confirmation(&self, tx_hash: TxHash) -> Result<Receipt> {
        self.state()?
            .receipts
            .get(&tx_hash)
            .copied()
            .with_context(|| format!("Unknown transaction {tx_hash}"))
    }
}
