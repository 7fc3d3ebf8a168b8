//! End-to-end runs of the orchestrator against the in-memory chain.
//!
//! Run with: cargo test --test orchestrator

use alloy_core::primitives::{Address, U256, address};
use stratum_deploy::{
    BuiltinArtifacts, ContractName, DeployError, Orchestrator, RecordOrigin, RunConfiguration,
    RunState, SimulatedChain, Stage,
    client::{Fault, VeLock},
    config::{PartnerConfig, TokenAmount},
};

const DEPLOYER: Address = address!("f39Fd6e51aad88F6F4ce6aB8827279cffFb92266");
const MULTISIG: Address = address!("70997970C51812dc3A010C7d01b50e0d17dc79C8");

const CONFIG: &str = r#"
team_eoa = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266"
team_multisig = "0x70997970C51812dc3A010C7d01b50e0d17dc79C8"
team_treasury = "0x3C44CdDdB6a900fa2b585dd299e03d12FA4293BC"
emergency_council = "0x70997970C51812dc3A010C7d01b50e0d17dc79C8"
weth = "0x454B8576Eb63e9b36E087FDe38eB7Ab077A44263"
meta_bribe_token = "0x0faF6df7054946141266420b43783387A78d82A9"
merkle_root = "0x6362f8fcdd558ac55b3570b67fdb1d1673bd01bd53302e42f01377f102ac80a9"
token_whitelist = [
    "0xE2Be1686641Dc8514e642f4EE5a2c282f4a56a94",
    "0xc90B0DdCE3215e5dA55289c762727987446beA9A",
    "0x0bdd248745F9D19BE665Fd157C58aDBEdf267677",
]

[[partners]]
address = "0x90F79bf6EB2c4f870365E785982E1f101E93b906"
amount = 1000

[[partners]]
address = "0x15d34AAf54267DB7D7c367839AAf71A00a2C6A65"
amount = "2500.5"

[multipool]
gauge_stake = "5"

[[multipool.assets]]
symbol = "KEK"
address = "0xE2Be1686641Dc8514e642f4EE5a2c282f4a56a94"

[[multipool.assets]]
symbol = "FUN"
address = "0xc90B0DdCE3215e5dA55289c762727987446beA9A"

[[multipool.assets]]
symbol = "USDC"
address = "0x0bdd248745F9D19BE665Fd157C58aDBEdf267677"
decimals = 6

[lock]
amount = 2000
duration_secs = 7776000
"#;

fn config() -> RunConfiguration {
    RunConfiguration::from_toml(CONFIG).unwrap()
}

/// Initialize tracing for tests (idempotent).
fn init_test_tracing() {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_test_writer()
        .try_init()
        .ok();
}

fn ether(amount: u64) -> U256 {
    U256::from(amount) * U256::from(10u64).pow(U256::from(18))
}

/// Locks owned by the deployer, as opposed to partner locks minted by the minter.
fn deployer_locks(chain: &SimulatedChain) -> Vec<VeLock> {
    chain
        .locks()
        .into_iter()
        .filter(|lock| lock.owner == DEPLOYER)
        .collect()
}

#[tokio::test]
async fn test_full_run_deploys_and_wires_protocol() {
    init_test_tracing();
    let config = config();
    let chain = SimulatedChain::default();
    let mut orchestrator = Orchestrator::new(&config, &chain, &BuiltinArtifacts);

    let run = orchestrator.run().await.unwrap();
    assert_eq!(orchestrator.state(), &RunState::Complete);

    // 18 protocol contracts and 3 pooled assets.
    assert_eq!(run.registry.len(), 21);
    for record in &run.registry {
        assert!(!record.address.is_zero(), "{} has no address", record.name);
        if record.origin == RecordOrigin::Deployed {
            assert!(chain.code_at(record.address).is_some());
        }
    }

    let weth = run.registry.lookup(&ContractName::Weth.name()).unwrap();
    assert_eq!(weth.origin, RecordOrigin::Existing);
    assert_eq!(weth.address, config.weth);

    // Every dependency was registered before its dependant.
    let position = |name: ContractName| {
        run.registry
            .iter()
            .position(|r| r.name == name.name())
            .unwrap()
    };
    assert!(position(ContractName::Stratum) < position(ContractName::VotingEscrow));
    assert!(position(ContractName::VotingEscrow) < position(ContractName::Voter));
    assert!(position(ContractName::Voter) < position(ContractName::Minter));
    assert!(position(ContractName::Swap) < position(ContractName::SwapToken));

    // Multipool seeded with 10 tokens of each asset, in the asset's own decimals.
    let swap = run.registry.address(&ContractName::Swap.name()).unwrap();
    assert_eq!(
        chain.pool_balances(swap).unwrap(),
        vec![ether(10), ether(10), U256::from(10_000_000u64)]
    );
    let lp_token = run.registry.address(&ContractName::SwapToken.name()).unwrap();
    assert_eq!(run.registry.lookup("swapToken").unwrap().origin, RecordOrigin::Derived);

    // The multipool's gauge is bound from the voter and installed as rebase handler.
    let gauge = chain.gauge_for(lp_token).unwrap();
    assert_eq!(chain.rebase_handler(swap), Some(gauge));
    let bound = run.receipts.iter().find_map(|r| r.bound).unwrap();
    assert_eq!(bound, gauge);

    // The minter locked for both partners first, then the deployer locked once.
    let escrow = run.registry.address(&ContractName::VotingEscrow.name()).unwrap();
    let partner_locks: Vec<_> = chain
        .locks()
        .into_iter()
        .filter(|lock| lock.owner != DEPLOYER)
        .collect();
    assert_eq!(partner_locks.len(), 2);
    assert_eq!(partner_locks[0].token_id, U256::from(1));
    assert_eq!(partner_locks[1].token_id, U256::from(2));

    let locks = deployer_locks(&chain);
    assert_eq!(locks.len(), 1);
    assert_eq!(locks[0].escrow, escrow);
    assert_eq!(locks[0].token_id, U256::from(3));
    assert_eq!(locks[0].duration, U256::from(7_776_000u64));
    assert_eq!(locks[0].amount, ether(2000));

    // LP stake attached to the deployer's own veNFT.
    let stake = chain
        .calls()
        .into_iter()
        .find(|call| call.method == "deposit" && call.target == gauge)
        .unwrap();
    assert!(!stake.reverted);
    assert_eq!(stake.args[0].as_uint().unwrap().0, ether(5));
    assert_eq!(stake.args[1].as_uint().unwrap().0, locks[0].token_id);

    // Native pair seeded through the router, and the pair got its own gauge.
    let deposits = chain.pair_deposits();
    assert_eq!(deposits.len(), 1);
    assert_eq!(
        deposits[0].token,
        run.registry.address(&ContractName::Stratum.name()).unwrap()
    );
    assert!(deposits[0].stable);
    assert_eq!(deposits[0].to, DEPLOYER);
    assert!(chain.gauge_for(deposits[0].pair).is_some());

    // Nothing reverted.
    assert!(chain.calls().iter().all(|call| !call.reverted));
    assert!(
        chain
            .calls()
            .iter()
            .any(|call| call.method == "setTeam" && call.args[0].as_address() == Some(MULTISIG))
    );
}

#[tokio::test]
async fn test_receipts_follow_action_order() {
    init_test_tracing();
    let config = config();
    let chain = SimulatedChain::default();
    let mut orchestrator = Orchestrator::new(&config, &chain, &BuiltinArtifacts);

    let plan = orchestrator.plan().unwrap();
    let run = orchestrator.run().await.unwrap();

    assert_eq!(run.receipts.len(), plan.actions.len());
    for (index, (receipt, action)) in run.receipts.iter().zip(&plan.actions).enumerate() {
        assert_eq!(receipt.index, index);
        assert_eq!(receipt.description, action.description);
        assert_eq!(receipt.phase, action.phase);
    }
    assert!(run.receipts.windows(2).all(|w| w[0].phase <= w[1].phase));
}

#[tokio::test]
async fn test_partner_allocation_reaches_minter() {
    init_test_tracing();
    let config = config();
    let chain = SimulatedChain::default();
    let mut orchestrator = Orchestrator::new(&config, &chain, &BuiltinArtifacts);

    let plan = orchestrator.plan().unwrap();
    let first = ether(1000);
    let second = ether(25_005) / U256::from(10u64);
    assert_eq!(plan.allocation.amounts, vec![first, second]);
    assert_eq!(plan.allocation.max, U256::from(1) + first + second);

    orchestrator.run().await.unwrap();
    let initialize = chain
        .calls()
        .into_iter()
        .find(|call| call.method == "initialize" && call.args.len() == 3)
        .unwrap();
    assert_eq!(initialize.args[2].as_uint().unwrap().0, plan.allocation.max);
}

#[tokio::test]
async fn test_no_partners_still_completes() {
    init_test_tracing();
    let mut config = config();
    config.partners.clear();
    let chain = SimulatedChain::default();
    let mut orchestrator = Orchestrator::new(&config, &chain, &BuiltinArtifacts);

    let plan = orchestrator.plan().unwrap();
    assert!(plan.allocation.is_empty());
    assert_eq!(plan.allocation.max, U256::from(1));

    let run = orchestrator.run().await.unwrap();
    assert_eq!(orchestrator.state(), &RunState::Complete);
    assert_eq!(run.registry.len(), 21);

    let swap = run.registry.address(&ContractName::Swap.name()).unwrap();
    assert_eq!(
        chain.pool_balances(swap).unwrap(),
        vec![ether(10), ether(10), U256::from(10_000_000u64)]
    );

    // Without partners the deployer's lock is the only one, and the first veNFT.
    let locks = chain.locks();
    assert_eq!(locks.len(), 1);
    assert_eq!(locks[0].owner, DEPLOYER);
    assert_eq!(locks[0].token_id, U256::from(1));
    assert_eq!(locks[0].duration, U256::from(config.lock.duration_secs));
    assert!(chain.calls().iter().all(|call| !call.reverted));
}

#[tokio::test]
async fn test_gauge_stake_with_partners_uses_deployer_venft() {
    init_test_tracing();
    let mut config = config();
    config.partners = (1..=4)
        .map(|i| PartnerConfig {
            address: Address::with_last_byte(0x40 + i),
            amount: TokenAmount::new("1"),
        })
        .collect();
    let chain = SimulatedChain::default();
    let mut orchestrator = Orchestrator::new(&config, &chain, &BuiltinArtifacts);

    let run = orchestrator.run().await.unwrap();
    assert_eq!(orchestrator.state(), &RunState::Complete);

    let locks = deployer_locks(&chain);
    assert_eq!(locks.len(), 1);
    assert_eq!(locks[0].token_id, U256::from(5));

    // The run reached the native pair, past the gauge stake.
    assert_eq!(chain.pair_deposits().len(), 1);
    assert_eq!(run.receipts.len(), orchestrator.plan().unwrap().actions.len());
}

#[tokio::test]
async fn test_deploy_revert_keeps_earlier_records() {
    init_test_tracing();
    let config = config();
    let chain = SimulatedChain::default();
    chain.inject(Fault::RevertDeploy("Swap".to_string()));
    let mut orchestrator = Orchestrator::new(&config, &chain, &BuiltinArtifacts);

    let failure = orchestrator.run().await.unwrap_err();

    assert_eq!(failure.stage, Stage::Deployment);
    assert!(matches!(
        &failure.error,
        DeployError::DeploymentFailed { contract, .. } if contract == "Swap"
    ));
    assert!(failure.receipts.is_empty());

    // Exactly the contracts ordered before the multipool.
    let plan = orchestrator.plan().unwrap();
    let swap = plan
        .contracts
        .iter()
        .position(|spec| spec.name == ContractName::Swap.name())
        .unwrap();
    assert_eq!(swap, 19);
    assert_eq!(failure.registry.len(), swap);
    let registered: Vec<_> = failure.registry.iter().map(|r| r.name.as_str()).collect();
    let expected: Vec<_> = plan.contracts[..swap].iter().map(|s| s.name.as_str()).collect();
    assert_eq!(registered, expected);
    assert!(!failure.registry.contains("Swap"));
    assert!(!failure.registry.contains("swapToken"));
    assert!(chain.calls().is_empty());
    assert!(matches!(
        orchestrator.state(),
        RunState::Failed {
            stage: Stage::Deployment,
            ..
        }
    ));
}

#[tokio::test]
async fn test_rejected_deploy_is_reported() {
    init_test_tracing();
    let config = config();
    let chain = SimulatedChain::default();
    chain.inject(Fault::RejectDeploy("Voter".to_string()));
    let mut orchestrator = Orchestrator::new(&config, &chain, &BuiltinArtifacts);

    let failure = orchestrator.run().await.unwrap_err();
    assert_eq!(failure.stage, Stage::Deployment);
    assert!(failure.error.to_string().contains("Voter"));
    assert!(!failure.registry.contains("Voter"));
}

#[tokio::test]
async fn test_initialization_halts_at_first_failure() {
    init_test_tracing();
    let config = config();
    let chain = SimulatedChain::default();
    chain.inject(Fault::RevertCall("create_lock_for".to_string()));
    let mut orchestrator = Orchestrator::new(&config, &chain, &BuiltinArtifacts);

    let plan = orchestrator.plan().unwrap();
    let failing = plan
        .actions
        .iter()
        .position(|a| a.method == "create_lock_for")
        .unwrap();

    let failure = orchestrator.run().await.unwrap_err();

    assert_eq!(failure.stage, Stage::Initialization);
    assert!(matches!(failure.error, DeployError::CallFailed { .. }));
    assert_eq!(failure.registry.len(), 21);
    assert_eq!(failure.receipts.len(), failing);

    // The reverted call is the last thing sent.
    let calls = chain.calls();
    let last = calls.last().unwrap();
    assert_eq!(last.method, "create_lock_for");
    assert!(last.reverted);
    assert!(calls.iter().all(|call| call.method != "createGauge3pool"));
    assert!(matches!(
        orchestrator.state(),
        RunState::Failed {
            stage: Stage::Initialization,
            ..
        }
    ));
}

#[tokio::test]
async fn test_rerun_deploys_fresh_contracts() {
    init_test_tracing();
    let config = config();
    let chain = SimulatedChain::default();
    chain.inject(Fault::RevertCall("addLiquidityETH".to_string()));

    let mut orchestrator = Orchestrator::new(&config, &chain, &BuiltinArtifacts);
    let failure = orchestrator.run().await.unwrap_err();
    assert_eq!(failure.stage, Stage::Initialization);

    chain.clear_faults();
    let run = orchestrator.run().await.unwrap();
    assert_eq!(orchestrator.state(), &RunState::Complete);

    for name in [ContractName::Stratum, ContractName::Swap, ContractName::Router] {
        let before = failure.registry.address(&name.name()).unwrap();
        let after = run.registry.address(&name.name()).unwrap();
        assert_ne!(before, after, "{name} was not redeployed");
    }
    // Configured contracts keep their address.
    assert_eq!(
        failure.registry.address("KEK").unwrap(),
        run.registry.address("KEK").unwrap()
    );
}

#[tokio::test]
async fn test_rerun_after_success_redeploys_everything() {
    init_test_tracing();
    let config = config();
    let chain = SimulatedChain::default();
    let mut orchestrator = Orchestrator::new(&config, &chain, &BuiltinArtifacts);

    let first = orchestrator.run().await.unwrap();
    let second = orchestrator.run().await.unwrap();
    assert_eq!(orchestrator.state(), &RunState::Complete);
    assert_eq!(first.registry.len(), second.registry.len());

    for record in &first.registry {
        let again = second.registry.lookup(&record.name).unwrap();
        assert_eq!(again.origin, record.origin);
        match record.origin {
            RecordOrigin::Deployed | RecordOrigin::Derived => {
                assert_ne!(again.address, record.address, "{} was reused", record.name)
            }
            RecordOrigin::Existing => assert_eq!(again.address, record.address),
        }
    }
    assert_eq!(deployer_locks(&chain).len(), 2);
}

#[tokio::test]
async fn test_invalid_amount_fails_preflight() {
    init_test_tracing();
    let mut config = config();
    config.partners.push(PartnerConfig {
        address: Address::with_last_byte(9),
        amount: TokenAmount::new("lots"),
    });
    let chain = SimulatedChain::default();
    let mut orchestrator = Orchestrator::new(&config, &chain, &BuiltinArtifacts);

    let failure = orchestrator.run().await.unwrap_err();
    assert_eq!(failure.stage, Stage::Preflight);
    assert_eq!(chain.transaction_count(), 0);
}
