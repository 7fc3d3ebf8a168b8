//! [`ChainClient`] over JSON-RPC, sending from an account unlocked on the node.

use std::time::Duration;

use alloy_core::{
    dyn_abi::{DynSolValue, FunctionExt},
    primitives::{Address, Bytes, TxHash, U64, U256},
};
use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::{Value, json};
use url::Url;

use super::{ChainClient, ContractCall, DeployRequest, Receipt};
use crate::{
    config::NetworkConfig,
    rpc::{create_client, json_rpc_call, poll_until},
};

/// Receipt fields read from `eth_getTransactionReceipt`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcReceipt {
    transaction_hash: TxHash,
    status: Option<U64>,
    contract_address: Option<Address>,
    block_number: U64,
    gas_used: U64,
}

impl From<RpcReceipt> for Receipt {
    fn from(receipt: RpcReceipt) -> Self {
        Self {
            tx_hash: receipt.transaction_hash,
            status: receipt.status.is_some_and(|s| s == U64::from(1)),
            contract_address: receipt.contract_address,
            block_number: receipt.block_number.to::<u64>(),
            gas_used: receipt.gas_used.to::<u64>(),
        }
    }
}

/// JSON-RPC chain client.
#[derive(Debug, Clone)]
pub struct RpcChainClient {
    http: reqwest::Client,
    url: Url,
    deployer: Address,
    poll_interval: Duration,
    receipt_timeout: Duration,
}

impl RpcChainClient {
    /// Connect to the node and resolve the deployer account.
    ///
    /// Without a configured deployer, the node's first unlocked account is used.
    pub async fn connect(network: &NetworkConfig) -> Result<Self> {
        let http = create_client()?;

        let deployer = match network.deployer {
            Some(deployer) => deployer,
            None => {
                let accounts: Vec<Address> =
                    json_rpc_call(&http, &network.rpc_url, "eth_accounts", vec![]).await?;
                accounts
                    .first()
                    .copied()
                    .context("Node exposes no unlocked account to deploy from")?
            }
        };

        tracing::info!(
            rpc_url = %network.rpc_url,
            deployer = %deployer,
            "Connected to chain"
        );

        Ok(Self {
            http,
            url: network.rpc_url.clone(),
            deployer,
            poll_interval: Duration::from_millis(network.poll_interval_ms),
            receipt_timeout: Duration::from_secs(network.receipt_timeout_secs),
        })
    }

    async fn call<T: serde::de::DeserializeOwned>(
        &self,
        method: &str,
        params: Vec<Value>,
    ) -> Result<T> {
        json_rpc_call(&self.http, &self.url, method, params).await
    }

    fn creation_tx(&self, request: &DeployRequest) -> Value {
        json!({
            "from": self.deployer,
            "data": request.init_code,
        })
    }

    fn call_tx(&self, call: &ContractCall) -> Result<Value> {
        let mut tx = json!({
            "from": self.deployer,
            "to": call.target,
            "data": call.calldata()?,
        });
        if let Some(value) = call.value {
            tx["value"] = json!(value);
        }
        if let Some(gas) = call.gas_limit {
            tx["gas"] = json!(format!("{gas:#x}"));
        }
        Ok(tx)
    }
}

impl ChainClient for RpcChainClient {
    fn deployer(&self) -> Address {
        self.deployer
    }

    async fn chain_id(&self) -> Result<u64> {
        let chain_id: U64 = self.call("eth_chainId", vec![]).await?;
        Ok(chain_id.to::<u64>())
    }

    async fn estimate_deploy_fee(&self, request: &DeployRequest) -> Result<U256> {
        let gas: U256 = self
            .call("eth_estimateGas", vec![self.creation_tx(request)])
            .await
            .with_context(|| format!("Failed to estimate gas for {}", request.contract))?;
        let gas_price: U256 = self.call("eth_gasPrice", vec![]).await?;
        Ok(gas.saturating_mul(gas_price))
    }

    async fn deploy(&self, request: &DeployRequest) -> Result<TxHash> {
        self.call("eth_sendTransaction", vec![self.creation_tx(request)])
            .await
            .with_context(|| format!("Failed to submit creation of {}", request.contract))
    }

    async fn send(&self, call: &ContractCall) -> Result<TxHash> {
        let tx = self.call_tx(call)?;
        self.call("eth_sendTransaction", vec![tx])
            .await
            .with_context(|| format!("Failed to submit {} call", call.function.name))
    }

    async fn read(&self, call: &ContractCall) -> Result<Vec<DynSolValue>> {
        let tx = self.call_tx(call)?;
        let data: Bytes = self
            .call("eth_call", vec![tx, json!("latest")])
            .await
            .with_context(|| format!("Failed to call {}", call.function.name))?;

        call.function
            .abi_decode_output(&data, true)
            .with_context(|| format!("Failed to decode {} output", call.function.name))
    }

    async fn await_confirmation(&self, tx_hash: TxHash) -> Result<Receipt> {
        let what = format!("receipt of {tx_hash}");
        let receipt: RpcReceipt =
            poll_until(&what, self.receipt_timeout, self.poll_interval, || async {
                self.call("eth_getTransactionReceipt", vec![json!(tx_hash)])
                    .await
            })
            .await?;

        let receipt = Receipt::from(receipt);
        tracing::debug!(
            tx_hash = %tx_hash,
            block = receipt.block_number,
            gas_used = receipt.gas_used,
            status = receipt.status,
            "Transaction confirmed"
        );
        Ok(receipt)
    }
}
