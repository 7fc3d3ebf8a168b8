//! stratum-deploy - Deployment orchestrator for the Stratum DEX protocol.
//!
//! This crate deploys the Stratum contract suite onto an EVM network in dependency
//! order, records every address in a [`ContractRegistry`], then runs the ordered
//! initialization sequence that wires the contracts together and seeds liquidity,
//! locks, whitelists and gauges.

pub mod abi;

mod allocation;
pub use allocation::PartnerAllocation;

mod artifacts;
pub use artifacts::{Artifact, ArtifactSource, BuiltinArtifacts, HardhatArtifacts};

pub mod client;
pub use client::{ChainClient, RpcChainClient, SimulatedChain};

pub mod config;
pub use config::RunConfiguration;

mod errors;
pub use errors::DeployError;

mod graph;
pub use graph::deployment_order;

mod orchestrator;
pub use orchestrator::{Orchestrator, Plan, RunFailure, RunReport, RunState, Stage};

mod registry;
pub use registry::{ContractRegistry, DeploymentRecord, RecordOrigin};

pub mod report;

mod rpc;

pub mod sequencer;
pub use sequencer::{InitializationAction, Phase, Sequencer, protocol_actions};

mod step;
pub use step::deploy_step;

pub mod topology;
pub use topology::{ContractName, ContractSpec, protocol_specs};

mod values;
pub use values::ArgValue;
