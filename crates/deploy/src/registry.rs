//! The contract registry: logical name to deployment record.

use std::collections::HashMap;

use alloy_core::primitives::{Address, TxHash};
use serde::Serialize;
use strum::Display;

use crate::{errors::DeployError, values::ArgValue};

/// How a record's address was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RecordOrigin {
    /// Created by this run.
    Deployed,
    /// Supplied by the run configuration.
    Existing,
    /// Read from another registered contract.
    Derived,
}

/// A resolved logical contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeploymentRecord {
    pub name: String,
    pub origin: RecordOrigin,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifact: Option<String>,
    /// Constructor arguments with every reference resolved to an address.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<ArgValue>,
    pub address: Address,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tx_hash: Option<TxHash>,
}

/// Append-only map from logical name to [`DeploymentRecord`].
///
/// Iteration follows registration order.
#[derive(Debug, Clone, Default)]
pub struct ContractRegistry {
    records: Vec<DeploymentRecord>,
    index: HashMap<String, usize>,
}

impl ContractRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a record. A second record under the same name is rejected.
    pub fn register(&mut self, record: DeploymentRecord) -> Result<&DeploymentRecord, DeployError> {
        if self.index.contains_key(&record.name) {
            return Err(DeployError::DuplicateRegistration { name: record.name });
        }

        tracing::debug!(
            contract = %record.name,
            address = %record.address,
            origin = %record.origin,
            "Registered contract"
        );

        let position = self.records.len();
        self.index.insert(record.name.clone(), position);
        self.records.push(record);
        Ok(&self.records[position])
    }

    pub fn lookup(&self, name: &str) -> Result<&DeploymentRecord, DeployError> {
        self.index
            .get(name)
            .map(|&i| &self.records[i])
            .ok_or_else(|| DeployError::UnresolvedDependency {
                name: name.to_string(),
            })
    }

    /// The address registered under `name`.
    pub fn address(&self, name: &str) -> Result<Address, DeployError> {
        self.lookup(name).map(|record| record.address)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &DeploymentRecord> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl<'a> IntoIterator for &'a ContractRegistry {
    type Item = &'a DeploymentRecord;
    type IntoIter = std::slice::Iter<'a, DeploymentRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}
