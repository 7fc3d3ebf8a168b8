//! The fixed ABI surface of the Stratum protocol contracts.
//!
//! Only the entry points the orchestrator touches are listed. These fragments back
//! [`crate::BuiltinArtifacts`], which serves dry runs against the simulated chain.

/// Human-readable ABI fragments, keyed by artifact name.
pub const PROTOCOL_ABIS: &[(&str, &[&str])] = &[
    (
        "Stratum",
        &[
            "constructor()",
            "function initialMint(address _recipient)",
            "function setMerkleClaim(address _merkleClaim)",
            "function setMinter(address _minter)",
            "function approve(address spender, uint256 amount) returns (bool)",
            "function balanceOf(address account) view returns (uint256)",
        ],
    ),
    ("GaugeFactory", &["constructor()"]),
    ("BribeFactory", &["constructor()"]),
    (
        "PairFactory",
        &[
            "constructor()",
            "function setPauser(address _pauser)",
            "function create3Pool(address _pool) returns (address)",
        ],
    ),
    (
        "Router",
        &[
            "constructor(address _factory, address _weth)",
            "function addLiquidityETH(address token, bool stable, uint256 amountTokenDesired, uint256 amountTokenMin, uint256 amountETHMin, address to, uint256 deadline) payable returns (uint256 amountToken, uint256 amountETH, uint256 liquidity)",
            "function pairFor(address tokenA, address tokenB, bool stable) view returns (address pair)",
        ],
    ),
    ("StratumLibrary", &["constructor(address _router)"]),
    ("VeArtProxy", &["constructor()"]),
    (
        "VotingEscrow",
        &[
            "constructor(address token_addr, address art_proxy)",
            "function setVoter(address _voter)",
            "function setTeam(address _team)",
            "function create_lock_for(uint256 _value, uint256 _lock_duration, address _to) returns (uint256)",
        ],
    ),
    (
        "RewardsDistributor",
        &[
            "constructor(address _voting_escrow)",
            "function setDepositor(address _depositor)",
        ],
    ),
    (
        "Voter",
        &[
            "constructor(address __ve, address _factory, address _gauges, address _bribes)",
            "function setGovernor(address _governor)",
            "function setEmergencyCouncil(address _council)",
            "function initialize(address[] _tokens, address _minter)",
            "function whitelist(address _token)",
            "function createGauge3pool(address _3pool, address _token1, address _token2, address _token3, address _wxbribeFactory) returns (address)",
            "function createGauge(address _pool, address _wxbribeFactory) returns (address)",
            "function gauges(address _pool) view returns (address)",
        ],
    ),
    (
        "WrappedExternalBribeFactory",
        &["constructor(address _voter)"],
    ),
    (
        "MetaBribe",
        &[
            "constructor(address _ve, address _voter, address _wxbribeFactory, address _router, address _rewardToken)",
            "function setDepositor(address _depositor)",
            "function setGovernor(address _governor)",
        ],
    ),
    (
        "Minter",
        &[
            "constructor(address __voter, address __ve, address __rewards_distributor, address _metaBribe)",
            "function initialize(address[] claimants, uint256[] amounts, uint256 max)",
            "function setTeam(address _team)",
            "function update_period() returns (uint256)",
        ],
    ),
    (
        "StratumGovernor",
        &["constructor(address _ve)", "function setTeam(address _team)"],
    ),
    (
        "MerkleClaim",
        &["constructor(address _stratum, bytes32 _merkleRoot)"],
    ),
    (
        "Swap",
        &[
            "constructor(address[] _pooledTokens, uint8[] decimals, string lpTokenName, string lpTokenSymbol, uint256 _a, uint256 _fee, uint256 _adminFee)",
            "function setRebaseHandler(address _handler)",
            "function addLiquidity(uint256[] amounts, uint256 minToMint, uint256 deadline) returns (uint256)",
            "function swapStorage() view returns (uint256 initialA, uint256 futureA, uint256 initialATime, uint256 futureATime, uint256 swapFee, uint256 adminFee, address lpToken)",
        ],
    ),
    (
        "ERC20",
        &[
            "function approve(address spender, uint256 amount) returns (bool)",
            "function balanceOf(address account) view returns (uint256)",
        ],
    ),
    (
        "LPToken",
        &["function approve(address spender, uint256 amount) returns (bool)"],
    ),
    (
        "Gauge",
        &["function deposit(uint256 amount, uint256 tokenId)"],
    ),
];

/// Look up the fragments for an artifact name.
pub fn fragments(name: &str) -> Option<&'static [&'static str]> {
    PROTOCOL_ABIS
        .iter()
        .find(|(artifact, _)| *artifact == name)
        .map(|(_, fragments)| *fragments)
}
