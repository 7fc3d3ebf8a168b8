//! The Stratum contract topology.
//!
//! Each logical contract is described by a [`ContractSpec`]: how its address comes to
//! exist and which other logical names its constructor references. Ordering is not
//! encoded here; [`crate::deployment_order`] derives it from the references.

use alloy_core::primitives::Address;
use serde::Serialize;
use strum::{AsRefStr, Display, EnumIter, EnumString};

use crate::{config::RunConfiguration, values::ArgValue};

/// Logical names of the protocol's fixed contracts.
///
/// Multipool assets are registered under their configured symbols instead.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, AsRefStr, EnumIter, EnumString,
)]
pub enum ContractName {
    Stratum,
    GaugeFactory,
    BribeFactory,
    PairFactory,
    #[strum(serialize = "WETH")]
    Weth,
    Router,
    Library,
    VeArtProxy,
    VotingEscrow,
    RewardsDistributor,
    Voter,
    WrappedExternalBribeFactory,
    MetaBribe,
    Minter,
    StratumGovernor,
    MerkleClaim,
    Swap,
    #[strum(serialize = "swapToken")]
    SwapToken,
}

impl ContractName {
    pub fn name(self) -> String {
        self.as_ref().to_string()
    }
}

/// A constructor argument.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ConstructorArg {
    /// The address of a previously registered contract.
    Contract(String),
    /// An array of previously registered contract addresses.
    Contracts(Vec<String>),
    /// A literal value.
    Literal(ArgValue),
}

impl ConstructorArg {
    pub fn contract(name: ContractName) -> Self {
        Self::Contract(name.name())
    }

    fn references(&self) -> Vec<&str> {
        match self {
            Self::Contract(name) => vec![name.as_str()],
            Self::Contracts(names) => names.iter().map(String::as_str).collect(),
            Self::Literal(_) => Vec::new(),
        }
    }
}

/// How a logical contract's address comes to exist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ContractSource {
    /// Created from an artifact's bytecode.
    Deploy {
        artifact: String,
        args: Vec<ConstructorArg>,
    },
    /// Already on chain.
    Existing { address: Address },
    /// Read from a view function of another registered contract.
    Derived {
        from: String,
        /// Artifact whose ABI declares `method`.
        abi: String,
        method: String,
        /// Name of the address output to extract.
        output: String,
    },
}

/// A logical contract of the protocol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContractSpec {
    pub name: String,
    #[serde(flatten)]
    pub source: ContractSource,
}

impl ContractSpec {
    /// A contract created from the artifact of the same name.
    pub fn deploy(name: ContractName, args: Vec<ConstructorArg>) -> Self {
        Self::deploy_artifact(name, name.as_ref(), args)
    }

    /// A contract created from an artifact with a different name.
    pub fn deploy_artifact(
        name: ContractName,
        artifact: &str,
        args: Vec<ConstructorArg>,
    ) -> Self {
        Self {
            name: name.name(),
            source: ContractSource::Deploy {
                artifact: artifact.to_string(),
                args,
            },
        }
    }

    pub fn existing(name: impl Into<String>, address: Address) -> Self {
        Self {
            name: name.into(),
            source: ContractSource::Existing { address },
        }
    }

    /// Logical names this spec needs registered before it can be resolved.
    pub fn dependencies(&self) -> Vec<&str> {
        match &self.source {
            ContractSource::Deploy { args, .. } => {
                args.iter().flat_map(ConstructorArg::references).collect()
            }
            ContractSource::Existing { .. } => Vec::new(),
            ContractSource::Derived { from, .. } => vec![from.as_str()],
        }
    }

    /// The artifact to load for this spec, if any.
    pub fn artifact(&self) -> Option<&str> {
        match &self.source {
            ContractSource::Deploy { artifact, .. } => Some(artifact),
            ContractSource::Derived { abi, .. } => Some(abi),
            ContractSource::Existing { .. } => None,
        }
    }
}

/// The full protocol topology for a run, in declaration order.
pub fn protocol_specs(config: &RunConfiguration) -> Vec<ContractSpec> {
    use ConstructorArg as Arg;
    use ContractName::*;

    let pool = &config.multipool;
    let mut specs = vec![
        ContractSpec::deploy(Stratum, vec![]),
        ContractSpec::deploy(GaugeFactory, vec![]),
        ContractSpec::deploy(BribeFactory, vec![]),
        ContractSpec::deploy(PairFactory, vec![]),
        ContractSpec::existing(Weth.name(), config.weth),
        ContractSpec::deploy(Router, vec![Arg::contract(PairFactory), Arg::contract(Weth)]),
        ContractSpec::deploy_artifact(Library, "StratumLibrary", vec![Arg::contract(Router)]),
        ContractSpec::deploy(VeArtProxy, vec![]),
        ContractSpec::deploy(
            VotingEscrow,
            vec![Arg::contract(Stratum), Arg::contract(VeArtProxy)],
        ),
        ContractSpec::deploy(RewardsDistributor, vec![Arg::contract(VotingEscrow)]),
        ContractSpec::deploy(
            Voter,
            vec![
                Arg::contract(VotingEscrow),
                Arg::contract(PairFactory),
                Arg::contract(GaugeFactory),
                Arg::contract(BribeFactory),
            ],
        ),
        ContractSpec::deploy(WrappedExternalBribeFactory, vec![Arg::contract(Voter)]),
        ContractSpec::deploy(
            MetaBribe,
            vec![
                Arg::contract(VotingEscrow),
                Arg::contract(Voter),
                Arg::contract(WrappedExternalBribeFactory),
                Arg::contract(Router),
                Arg::Literal(ArgValue::Address(config.meta_bribe_token)),
            ],
        ),
        ContractSpec::deploy(
            Minter,
            vec![
                Arg::contract(Voter),
                Arg::contract(VotingEscrow),
                Arg::contract(RewardsDistributor),
                Arg::contract(MetaBribe),
            ],
        ),
        ContractSpec::deploy(StratumGovernor, vec![Arg::contract(VotingEscrow)]),
        ContractSpec::deploy(
            MerkleClaim,
            vec![
                Arg::contract(Stratum),
                Arg::Literal(ArgValue::Bytes32(config.merkle_root)),
            ],
        ),
    ];

    specs.extend(
        pool.assets
            .iter()
            .map(|asset| ContractSpec::existing(asset.symbol.clone(), asset.address)),
    );

    specs.push(ContractSpec::deploy(
        Swap,
        vec![
            Arg::Contracts(pool.assets.iter().map(|a| a.symbol.clone()).collect()),
            Arg::Literal(ArgValue::List(
                pool.assets
                    .iter()
                    .map(|a| ArgValue::uint(u64::from(a.decimals)))
                    .collect(),
            )),
            Arg::Literal(ArgValue::String(pool.lp_name.clone())),
            Arg::Literal(ArgValue::String(pool.lp_symbol.clone())),
            Arg::Literal(ArgValue::uint(pool.amplification)),
            Arg::Literal(ArgValue::uint(pool.swap_fee)),
            Arg::Literal(ArgValue::uint(pool.admin_fee)),
        ],
    ));
    specs.push(ContractSpec {
        name: SwapToken.name(),
        source: ContractSource::Derived {
            from: Swap.name(),
            abi: Swap.name(),
            method: "swapStorage".to_string(),
            output: "lpToken".to_string(),
        },
    });

    specs
}
