//! Error taxonomy for a deployment run.
//!
//! Every variant is fatal: the orchestrator never catches, retries or compensates.
//! Chain client failures travel as [`anyhow::Error`] inside the client and are folded
//! into [`DeployError::DeploymentFailed`] or [`DeployError::CallFailed`] with their full
//! context chain rendered into `reason`.

/// Errors that abort a deployment run.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeployError {
    /// Missing artifact, malformed run configuration or ABI mismatch.
    ///
    /// Raised during preflight, before any chain interaction.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A logical contract name was looked up before its record existed.
    #[error("unresolved dependency: no deployment record for `{name}`")]
    UnresolvedDependency { name: String },

    /// The contract topology contains a cycle.
    #[error("cyclic dependency between contracts: {}", members.join(", "))]
    CyclicDependency { members: Vec<String> },

    /// A second record was registered under the same logical name.
    #[error("duplicate registration for `{name}`")]
    DuplicateRegistration { name: String },

    /// A contract-creation transaction reverted or the client rejected it.
    #[error("deployment of `{contract}` failed: {reason}")]
    DeploymentFailed { contract: String, reason: String },

    /// An initialization action's transaction reverted or the client rejected it.
    #[error("initialization action `{action}` failed: {reason}")]
    CallFailed { action: String, reason: String },
}

impl DeployError {
    pub(crate) fn config(reason: impl Into<String>) -> Self {
        Self::Configuration(reason.into())
    }

    pub(crate) fn deployment(contract: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::DeploymentFailed {
            contract: contract.into(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn call(action: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::CallFailed {
            action: action.into(),
            reason: reason.to_string(),
        }
    }

    /// Whether the error was raised before any chain interaction.
    pub fn is_preflight(&self) -> bool {
        matches!(self, Self::Configuration(_) | Self::CyclicDependency { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        let err = DeployError::UnresolvedDependency {
            name: "Voter".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "unresolved dependency: no deployment record for `Voter`"
        );

        let err = DeployError::CyclicDependency {
            members: vec!["A".to_string(), "B".to_string()],
        };
        assert_eq!(err.to_string(), "cyclic dependency between contracts: A, B");
    }

    #[test]
    fn test_client_errors_keep_context_chain() {
        let source = anyhow::anyhow!("connection refused").context("Failed to send request");
        let err = DeployError::deployment("Router", format!("{source:#}"));
        assert_eq!(
            err.to_string(),
            "deployment of `Router` failed: Failed to send request: connection refused"
        );
    }
}
