//! The Stratum initialization sequence.

use alloy_core::primitives::U256;

use super::{InitializationAction as Action, Param, Phase, Target};
use crate::{
    allocation::PartnerAllocation,
    config::RunConfiguration,
    errors::DeployError,
    topology::ContractName::{self, *},
    values::ArgValue,
};

/// Gas limit for calls whose estimation is unreliable on zkSync-style nodes.
pub const DEFAULT_GAS_LIMIT: u64 = 30_000_000;

/// veNFT id of the deployer's lock on the freshly deployed escrow.
///
/// `Minter.initialize` mints one lock per partner before the deployer locks, so
/// partners hold ids `1..=n` and the deployer's lock is `n + 1`.
fn deployer_lock_id(allocation: &PartnerAllocation) -> U256 {
    U256::from(allocation.addresses.len() + 1)
}

const GAUGE_KEY: &str = "gauge";
const PAIR_KEY: &str = "pair";

fn contracts(names: &[ContractName]) -> Vec<Param> {
    names.iter().map(|&name| Param::contract(name)).collect()
}

/// Build the full initialization sequence, in execution order.
///
/// Fails only if a configured token amount cannot be converted to base units.
pub fn protocol_actions(
    config: &RunConfiguration,
    allocation: &PartnerAllocation,
) -> Result<Vec<Action>, DeployError> {
    let pool = &config.multipool;
    let mut actions = Vec::new();

    // Initial supply.
    actions.push(Action::on(
        Phase::InitialMint,
        Stratum,
        "initialMint",
        vec![Param::address(config.team_treasury)],
    ));

    // Wiring.
    let wiring = Phase::Wiring;
    actions.extend([
        Action::on(wiring, Stratum, "setMerkleClaim", contracts(&[MerkleClaim])),
        Action::on(wiring, Stratum, "setMinter", contracts(&[Minter])),
        Action::on(wiring, PairFactory, "setPauser", vec![Param::address(config.team_eoa)]),
        Action::on(wiring, VotingEscrow, "setVoter", contracts(&[Voter])),
        Action::on(wiring, VotingEscrow, "setTeam", vec![Param::address(config.team_eoa)]),
        Action::on(wiring, Voter, "setGovernor", vec![Param::address(config.team_eoa)]),
        Action::on(
            wiring,
            Voter,
            "setEmergencyCouncil",
            vec![Param::address(config.emergency_council)],
        ),
        Action::on(wiring, RewardsDistributor, "setDepositor", contracts(&[Minter])),
        Action::on(wiring, StratumGovernor, "setTeam", vec![Param::address(config.team_eoa)]),
        Action::on(wiring, Swap, "setRebaseHandler", vec![Param::Deployer]),
        Action::on(wiring, MetaBribe, "setDepositor", contracts(&[Minter])),
        Action::on(wiring, MetaBribe, "setGovernor", vec![Param::Deployer]),
    ]);

    // Voter whitelist: the governance token first, then the configured tokens.
    let mut whitelist = vec![Param::contract(Stratum)];
    whitelist.extend(config.token_whitelist.iter().map(|&token| Param::address(token)));
    actions.push(
        Action::on(
            Phase::Whitelist,
            Voter,
            "initialize",
            vec![
                Param::List(whitelist),
                Param::contract(Minter),
            ],
        )
        .with_gas_limit(DEFAULT_GAS_LIMIT),
    );
    actions.extend(config.voter_whitelist_additions.iter().map(|&token| {
        Action::on(Phase::Whitelist, Voter, "whitelist", vec![Param::address(token)])
            .with_gas_limit(DEFAULT_GAS_LIMIT)
    }));

    // Minter.
    actions.push(Action::on(
        Phase::MinterSetup,
        Minter,
        "initialize",
        vec![
            Param::Literal(ArgValue::addresses(allocation.addresses.iter().copied())),
            Param::Literal(ArgValue::List(
                allocation.amounts.iter().copied().map(ArgValue::Uint).collect(),
            )),
            Param::uint(allocation.max),
        ],
    ));
    actions.push(Action::on(
        Phase::MinterSetup,
        Minter,
        "setTeam",
        vec![Param::address(config.team_multisig)],
    ));

    // Multipool seed liquidity.
    let mut seed = Vec::with_capacity(pool.assets.len());
    for asset in &pool.assets {
        actions.push(Action::new(
            Phase::MultipoolLiquidity,
            Target::Contract(asset.symbol.clone()),
            "ERC20",
            "approve",
            vec![Param::contract(Swap), Param::MaxUint],
        ));
        seed.push(ArgValue::Uint(pool.seed_amount.base_units(asset.decimals)?));
    }
    actions.push(
        Action::on(
            Phase::MultipoolLiquidity,
            Swap,
            "addLiquidity",
            vec![
                Param::Literal(ArgValue::List(seed)),
                Param::uint(U256::ZERO),
                Param::MaxUint,
            ],
        )
        .with_gas_limit(DEFAULT_GAS_LIMIT),
    );

    // Vote-escrow lock for the deployer.
    actions.push(Action::on(
        Phase::VoteEscrowLock,
        Stratum,
        "approve",
        vec![Param::contract(VotingEscrow), Param::MaxUint],
    ));
    actions.push(
        Action::on(
            Phase::VoteEscrowLock,
            VotingEscrow,
            "create_lock_for",
            vec![
                Param::uint(config.lock.amount.wei()?),
                Param::uint(U256::from(config.lock.duration_secs)),
                Param::Deployer,
            ],
        )
        .with_gas_limit(DEFAULT_GAS_LIMIT),
    );

    // Multipool gauge.
    let gauge_phase = Phase::MultipoolGauge;
    let mut create_gauge = vec![Param::contract(SwapToken)];
    create_gauge.extend(pool.assets.iter().map(|asset| Param::Contract(asset.symbol.clone())));
    create_gauge.push(Param::contract(WrappedExternalBribeFactory));
    actions.push(
        Action::on(gauge_phase, Voter, "createGauge3pool", create_gauge)
            .with_gas_limit(DEFAULT_GAS_LIMIT),
    );
    actions.push(
        Action::on(gauge_phase, Voter, "gauges", contracts(&[SwapToken])).binding(GAUGE_KEY),
    );
    actions.push(Action::on(
        gauge_phase,
        Swap,
        "setRebaseHandler",
        vec![Param::Bound(GAUGE_KEY.to_string())],
    ));

    let stake = pool.gauge_stake.wei()?;
    if !stake.is_zero() {
        actions.push(Action::new(
            gauge_phase,
            Target::Contract(SwapToken.name()),
            "LPToken",
            "approve",
            vec![Param::Bound(GAUGE_KEY.to_string()), Param::MaxUint],
        ));
        actions.push(
            Action::new(
                gauge_phase,
                Target::Bound(GAUGE_KEY.to_string()),
                "Gauge",
                "deposit",
                vec![Param::uint(stake), Param::uint(deployer_lock_id(allocation))],
            )
            .with_gas_limit(DEFAULT_GAS_LIMIT),
        );
    }

    actions.push(Action::on(gauge_phase, PairFactory, "create3Pool", contracts(&[Swap])));
    actions.push(Action::on(gauge_phase, Minter, "update_period", vec![]));

    // Governance token / native pair and its gauge.
    let pair = &config.pair;
    let recipient = pair
        .recipient
        .map(Param::address)
        .unwrap_or(Param::Deployer);
    actions.push(Action::on(
        Phase::NativePair,
        Stratum,
        "approve",
        vec![Param::contract(Router), Param::MaxUint],
    ));
    actions.push(
        Action::on(
            Phase::NativePair,
            Router,
            "addLiquidityETH",
            vec![
                Param::contract(Stratum),
                Param::Literal(ArgValue::Bool(pair.stable)),
                Param::uint(pair.token_amount.wei()?),
                Param::uint(U256::ZERO),
                Param::uint(U256::ZERO),
                recipient,
                Param::MaxUint,
            ],
        )
        .with_value(pair.native_amount.wei()?)
        .with_gas_limit(DEFAULT_GAS_LIMIT),
    );
    actions.push(
        Action::on(
            Phase::NativePair,
            Router,
            "pairFor",
            vec![
                Param::contract(Weth),
                Param::contract(Stratum),
                Param::Literal(ArgValue::Bool(pair.stable)),
            ],
        )
        .binding(PAIR_KEY),
    );
    actions.push(
        Action::on(
            Phase::NativePair,
            Voter,
            "createGauge",
            vec![
                Param::Bound(PAIR_KEY.to_string()),
                Param::contract(WrappedExternalBribeFactory),
            ],
        )
        .with_gas_limit(DEFAULT_GAS_LIMIT),
    );

    tracing::debug!(actions = actions.len(), "Built initialization sequence");
    Ok(actions)
}
