//! The deployment step: resolve, estimate, submit, confirm, classify, record.

use alloy_core::{
    dyn_abi::{DynSolValue, JsonAbiExt},
    primitives::{Address, Bytes, utils::format_ether},
};

use crate::{
    artifacts::Artifact,
    client::{ChainClient, ContractCall, DeployRequest},
    errors::DeployError,
    registry::{ContractRegistry, DeploymentRecord, RecordOrigin},
    topology::{ConstructorArg, ContractSource, ContractSpec},
    values::{ArgValue, encode_args},
};

/// Resolve constructor arguments against the registry.
///
/// With `placeholders`, references resolve to the zero address instead, which lets
/// preflight check argument types before anything is deployed.
pub(crate) fn resolve_args(
    args: &[ConstructorArg],
    registry: &ContractRegistry,
    placeholders: bool,
) -> Result<Vec<ArgValue>, DeployError> {
    let address = |name: &str| {
        if placeholders {
            Ok(Address::ZERO)
        } else {
            registry.address(name)
        }
    };

    args.iter()
        .map(|arg| match arg {
            ConstructorArg::Contract(name) => address(name).map(ArgValue::Address),
            ConstructorArg::Contracts(names) => names
                .iter()
                .map(|name| address(name))
                .collect::<Result<Vec<_>, _>>()
                .map(ArgValue::addresses),
            ConstructorArg::Literal(value) => Ok(value.clone()),
        })
        .collect()
}

/// Encode constructor arguments against an artifact's constructor.
pub(crate) fn encode_constructor(
    artifact: &Artifact,
    values: &[ArgValue],
) -> Result<(Vec<DynSolValue>, Bytes), String> {
    let Some(constructor) = &artifact.abi.constructor else {
        if !values.is_empty() {
            return Err(format!(
                "`{}` has no constructor but {} argument(s) were given",
                artifact.name,
                values.len()
            ));
        }
        return Ok((Vec::new(), artifact.bytecode.clone()));
    };

    let encoded = encode_args(&constructor.inputs, values)?;
    let args_data = constructor
        .abi_encode_input(&encoded)
        .map_err(|e| format!("failed to encode constructor arguments: {e}"))?;

    let mut init_code = Vec::with_capacity(artifact.bytecode.len() + args_data.len());
    init_code.extend_from_slice(&artifact.bytecode);
    init_code.extend_from_slice(&args_data);
    Ok((encoded, Bytes::from(init_code)))
}

/// Execute one deployment step and register its record.
///
/// `artifact` must be the spec's artifact for `Deploy` and `Derived` specs; it is
/// ignored for `Existing` specs.
pub async fn deploy_step<'r, C: ChainClient>(
    spec: &ContractSpec,
    artifact: Option<&Artifact>,
    registry: &'r mut ContractRegistry,
    client: &C,
) -> Result<&'r DeploymentRecord, DeployError> {
    let record = match &spec.source {
        ContractSource::Existing { address } => {
            tracing::info!(contract = %spec.name, address = %address, "Using existing contract");
            DeploymentRecord {
                name: spec.name.clone(),
                origin: RecordOrigin::Existing,
                artifact: None,
                args: Vec::new(),
                address: *address,
                tx_hash: None,
            }
        }
        ContractSource::Deploy { artifact: artifact_name, args } => {
            let artifact = artifact.ok_or_else(|| {
                DeployError::config(format!("artifact `{artifact_name}` was not loaded"))
            })?;
            let values = resolve_args(args, registry, false)?;
            create_contract(spec, artifact, values, client).await?
        }
        ContractSource::Derived {
            from,
            abi,
            method,
            output,
        } => {
            let artifact =
                artifact.ok_or_else(|| DeployError::config(format!("artifact `{abi}` was not loaded")))?;
            let source = registry.address(from)?;
            let address = read_address(&spec.name, artifact, source, method, output, client).await?;

            tracing::info!(
                contract = %spec.name,
                address = %address,
                from = %from,
                "Resolved derived contract"
            );
            DeploymentRecord {
                name: spec.name.clone(),
                origin: RecordOrigin::Derived,
                artifact: None,
                args: Vec::new(),
                address,
                tx_hash: None,
            }
        }
    };

    registry.register(record)
}

async fn create_contract<C: ChainClient>(
    spec: &ContractSpec,
    artifact: &Artifact,
    values: Vec<ArgValue>,
    client: &C,
) -> Result<DeploymentRecord, DeployError> {
    let (encoded, init_code) = encode_constructor(artifact, &values)
        .map_err(|reason| DeployError::deployment(&spec.name, reason))?;

    let request = DeployRequest {
        contract: spec.name.clone(),
        artifact: artifact.name.clone(),
        args: encoded,
        init_code,
    };

    let fee = client
        .estimate_deploy_fee(&request)
        .await
        .map_err(|e| DeployError::deployment(&spec.name, format!("{e:#}")))?;
    tracing::info!(
        contract = %spec.name,
        fee = %format_ether(fee),
        "Deploying contract (estimated fee in ETH)"
    );

    let tx_hash = client
        .deploy(&request)
        .await
        .map_err(|e| DeployError::deployment(&spec.name, format!("{e:#}")))?;
    let receipt = client
        .await_confirmation(tx_hash)
        .await
        .map_err(|e| DeployError::deployment(&spec.name, format!("{e:#}")))?;

    if !receipt.status {
        return Err(DeployError::deployment(
            &spec.name,
            format!("transaction {tx_hash} reverted in block {}", receipt.block_number),
        ));
    }
    let address = receipt.contract_address.ok_or_else(|| {
        DeployError::deployment(
            &spec.name,
            format!("receipt of {tx_hash} carries no contract address"),
        )
    })?;

    tracing::info!(
        contract = %spec.name,
        address = %address,
        tx_hash = %tx_hash,
        gas_used = receipt.gas_used,
        "Contract deployed"
    );

    Ok(DeploymentRecord {
        name: spec.name.clone(),
        origin: RecordOrigin::Deployed,
        artifact: Some(artifact.name.clone()),
        args: values,
        address,
        tx_hash: Some(tx_hash),
    })
}

async fn read_address<C: ChainClient>(
    contract: &str,
    artifact: &Artifact,
    source: Address,
    method: &str,
    output: &str,
    client: &C,
) -> Result<Address, DeployError> {
    let function = artifact
        .function(method, 0)
        .map_err(|e| DeployError::deployment(contract, e))?;
    let position = function
        .outputs
        .iter()
        .position(|o| o.name == output)
        .ok_or_else(|| {
            DeployError::deployment(contract, format!("`{method}` has no output `{output}`"))
        })?;

    let call = ContractCall {
        target: source,
        function: function.clone(),
        args: Vec::new(),
        value: None,
        gas_limit: None,
    };
    let outputs = client
        .read(&call)
        .await
        .map_err(|e| DeployError::deployment(contract, format!("{e:#}")))?;

    let address = outputs
        .get(position)
        .and_then(DynSolValue::as_address)
        .ok_or_else(|| {
            DeployError::deployment(contract, format!("`{method}.{output}` is not an address"))
        })?;
    if address.is_zero() {
        return Err(DeployError::deployment(
            contract,
            format!("`{method}.{output}` returned the zero address"),
        ));
    }
    Ok(address)
}
