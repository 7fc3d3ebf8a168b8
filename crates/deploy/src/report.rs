//! Deployment report written for operators after a run.
//!
//! The report is output only: a later run never reads it back.

use std::path::Path;

use alloy_core::primitives::Address;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use comfy_table::{ContentArrangement, Table, presets::UTF8_FULL};
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::{
    config::RunConfiguration,
    orchestrator::{RunFailure, RunReport, Stage},
    registry::{ContractRegistry, DeploymentRecord},
    sequencer::ActionReceipt,
};

/// Compute a SHA-256 fingerprint of the deployment-relevant configuration.
///
/// Network settings (endpoint, polling) and the artifacts location are excluded: they
/// change how a run talks to the chain, not what it deploys.
pub fn config_hash(config: &RunConfiguration) -> Result<String> {
    let mut value =
        serde_json::to_value(config).context("Failed to serialize run configuration")?;
    if let Some(fields) = value.as_object_mut() {
        fields.remove("network");
        fields.remove("artifacts_dir");
    }

    // serde_json maps are sorted by key, so the encoding is stable.
    let json = serde_json::to_string(&value).context("Failed to encode run configuration")?;
    let mut hasher = Sha256::new();
    hasher.update(json.as_bytes());
    Ok(hex::encode(hasher.finalize()))
}

/// How the run ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    Complete,
    Failed { stage: String, error: String },
}

/// Everything a run produced.
#[derive(Debug, Clone, Serialize)]
pub struct DeploymentReport {
    pub config_hash: String,
    pub chain_id: u64,
    pub deployer: Address,
    pub deployed_at: DateTime<Utc>,
    /// Version of the tool that produced the report.
    pub version: String,
    #[serde(flatten)]
    pub outcome: Outcome,
    pub contracts: Vec<DeploymentRecord>,
    pub actions: Vec<ActionReceipt>,
}

impl DeploymentReport {
    fn new(
        config: &RunConfiguration,
        chain_id: u64,
        deployer: Address,
        outcome: Outcome,
        registry: &ContractRegistry,
        receipts: &[ActionReceipt],
    ) -> Result<Self> {
        Ok(Self {
            config_hash: config_hash(config)?,
            chain_id,
            deployer,
            deployed_at: Utc::now(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            outcome,
            contracts: registry.iter().cloned().collect(),
            actions: receipts.to_vec(),
        })
    }

    /// Report of a completed run.
    pub fn complete(
        config: &RunConfiguration,
        chain_id: u64,
        deployer: Address,
        run: &RunReport,
    ) -> Result<Self> {
        Self::new(config, chain_id, deployer, Outcome::Complete, &run.registry, &run.receipts)
    }

    /// Report of a run that stopped on an error, with what it left on chain.
    pub fn failed(
        config: &RunConfiguration,
        chain_id: u64,
        deployer: Address,
        failure: &RunFailure,
    ) -> Result<Self> {
        let outcome = Outcome::Failed {
            stage: failure.stage.to_string(),
            error: failure.error.to_string(),
        };
        Self::new(config, chain_id, deployer, outcome, &failure.registry, &failure.receipts)
    }

    /// Save the report as formatted JSON.
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("Failed to serialize report")?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write report to {}", path.display()))?;

        tracing::info!(path = %path.display(), "Deployment report written");
        Ok(())
    }
}

/// Table of every registered contract, in registration order.
pub fn summary_table(registry: &ContractRegistry) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["Contract", "Address", "Origin"]);

    for record in registry {
        table.add_row(vec![
            record.name.clone(),
            record.address.to_string(),
            record.origin.to_string(),
        ]);
    }
    table
}

/// Whether a failed stage left anything on chain.
pub fn left_state_on_chain(failure: &RunFailure) -> bool {
    failure.stage != Stage::Preflight
        && (failure.registry.iter().any(|r| r.tx_hash.is_some()) || !failure.receipts.is_empty())
}
