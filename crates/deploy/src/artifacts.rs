//! Contract artifact loading.
//!
//! An artifact pairs a contract's creation bytecode with its ABI. Real runs read the
//! JSON files emitted by Hardhat (or the zkSync Hardhat plugin); dry runs use the
//! protocol's fixed ABI with placeholder bytecode.

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};

use alloy_core::{
    json_abi::{Function, JsonAbi},
    primitives::Bytes,
};
use anyhow::Context;
use serde::Deserialize;

use crate::{abi, errors::DeployError};

/// Bytecode and ABI of a contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    /// The artifact (contract) name.
    pub name: String,
    /// The contract ABI.
    pub abi: JsonAbi,
    /// The creation bytecode.
    pub bytecode: Bytes,
}

impl Artifact {
    /// Find a function by name and arity.
    ///
    /// Overloads are disambiguated by input count only.
    pub fn function(&self, method: &str, arity: usize) -> Result<&Function, DeployError> {
        self.abi
            .function(method)
            .and_then(|overloads| overloads.iter().find(|f| f.inputs.len() == arity))
            .ok_or_else(|| {
                DeployError::config(format!(
                    "artifact `{}` has no function `{method}` taking {arity} argument(s)",
                    self.name
                ))
            })
    }
}

/// Source of contract artifacts.
pub trait ArtifactSource {
    /// Load an artifact by contract name.
    ///
    /// A missing artifact is a [`DeployError::Configuration`] error.
    fn load(&self, name: &str) -> Result<Artifact, DeployError>;
}

/// On-disk layout of a Hardhat artifact.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HardhatArtifactFile {
    contract_name: String,
    abi: JsonAbi,
    bytecode: Bytes,
}

/// Artifacts read from a Hardhat `artifacts/` directory.
///
/// The directory is indexed once by file stem: `contracts/Voter.sol/Voter.json` is
/// served as `Voter`. Debug files (`*.dbg.json`) are skipped.
#[derive(Debug, Clone)]
pub struct HardhatArtifacts {
    root: PathBuf,
    index: HashMap<String, PathBuf>,
}

impl HardhatArtifacts {
    /// Index every artifact under `root`.
    pub fn open(root: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let root = root.into();
        let mut index = HashMap::new();
        Self::index_dir(&root, &mut index)
            .with_context(|| format!("Failed to index artifacts under {}", root.display()))?;

        tracing::debug!(
            root = %root.display(),
            artifacts = index.len(),
            "Indexed contract artifacts"
        );

        Ok(Self { root, index })
    }

    fn index_dir(dir: &Path, index: &mut HashMap<String, PathBuf>) -> anyhow::Result<()> {
        for entry in std::fs::read_dir(dir)
            .with_context(|| format!("Failed to read directory {}", dir.display()))?
        {
            let path = entry?.path();
            if path.is_dir() {
                Self::index_dir(&path, index)?;
                continue;
            }

            let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if file_name.ends_with(".dbg.json") {
                continue;
            }
            if let Some(stem) = file_name.strip_suffix(".json") {
                // First match wins.
                index.entry(stem.to_string()).or_insert(path);
            }
        }
        Ok(())
    }

    /// The indexed root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl ArtifactSource for HardhatArtifacts {
    fn load(&self, name: &str) -> Result<Artifact, DeployError> {
        let path = self.index.get(name).ok_or_else(|| {
            DeployError::config(format!(
                "artifact `{name}` not found under {}",
                self.root.display()
            ))
        })?;

        let content = std::fs::read_to_string(path).map_err(|e| {
            DeployError::config(format!("failed to read {}: {e}", path.display()))
        })?;
        let file: HardhatArtifactFile = serde_json::from_str(&content).map_err(|e| {
            DeployError::config(format!("failed to parse {}: {e}", path.display()))
        })?;

        Ok(Artifact {
            name: file.contract_name,
            abi: file.abi,
            bytecode: file.bytecode,
        })
    }
}

/// Artifacts built from the protocol's fixed ABI, with placeholder bytecode.
///
/// Only meaningful against [`crate::SimulatedChain`].
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinArtifacts;

/// Placeholder creation code (`INVALID`), never executed by a real node.
const PLACEHOLDER_BYTECODE: &[u8] = &[0xfe];

impl ArtifactSource for BuiltinArtifacts {
    fn load(&self, name: &str) -> Result<Artifact, DeployError> {
        let fragments = abi::fragments(name)
            .ok_or_else(|| DeployError::config(format!("no builtin ABI for `{name}`")))?;
        let abi = JsonAbi::parse(fragments.iter().copied())
            .map_err(|e| DeployError::config(format!("invalid builtin ABI for `{name}`: {e}")))?;

        Ok(Artifact {
            name: name.to_string(),
            abi,
            bytecode: Bytes::from_static(PLACEHOLDER_BYTECODE),
        })
    }
}
