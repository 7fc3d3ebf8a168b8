//! Run configuration.
//!
//! The configuration is loaded once, before any chain interaction, from a TOML file
//! merged with `STRATUM_`-prefixed environment variables (nested keys separated by
//! `__`, e.g. `STRATUM_NETWORK__RPC_URL`). It is read-only for the whole run.

use std::{
    collections::HashSet,
    path::{Path, PathBuf},
};

use alloy_core::primitives::{
    Address, B256, U256,
    utils::{ParseUnits, parse_units},
};
use figment::{
    Figment,
    providers::{Env, Format, Toml},
};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::errors::DeployError;

/// Environment variable prefix for configuration overrides.
pub const ENV_PREFIX: &str = "STRATUM_";

/// Maximum vote-escrow lock duration accepted by `VotingEscrow` (4 years).
pub const MAX_LOCK_DURATION_SECS: u64 = 4 * 365 * 86_400;

/// Number of assets in the stable multipool.
pub const MULTIPOOL_ASSET_COUNT: usize = 3;

/// A token amount written as a decimal number of whole tokens.
///
/// Accepts a TOML integer (`10`) or a string (`"0.01"`). Conversion to base units
/// happens against the token's decimals with exact decimal arithmetic.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct TokenAmount(String);

impl TokenAmount {
    /// Create an amount from its decimal representation.
    pub fn new(amount: impl Into<String>) -> Self {
        Self(amount.into())
    }

    /// The decimal representation.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Convert to base units for a token with `decimals` decimals.
    pub fn base_units(&self, decimals: u8) -> Result<U256, DeployError> {
        match parse_units(&self.0, decimals) {
            Ok(ParseUnits::U256(value)) => Ok(value),
            Ok(ParseUnits::I256(_)) => Err(DeployError::config(format!(
                "token amount `{}` must not be negative",
                self.0
            ))),
            Err(e) => Err(DeployError::config(format!(
                "invalid token amount `{}`: {e}",
                self.0
            ))),
        }
    }

    /// Convert to base units of an 18-decimal token (or wei).
    pub fn wei(&self) -> Result<U256, DeployError> {
        self.base_units(18)
    }
}

impl<'de> Deserialize<'de> for TokenAmount {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        struct AmountVisitor;

        impl serde::de::Visitor<'_> for AmountVisitor {
            type Value = TokenAmount;

            fn expecting(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str("a non-negative integer or a decimal string")
            }

            fn visit_u64<E: serde::de::Error>(self, v: u64) -> Result<Self::Value, E> {
                Ok(TokenAmount(v.to_string()))
            }

            fn visit_i64<E: serde::de::Error>(self, v: i64) -> Result<Self::Value, E> {
                if v < 0 {
                    return Err(E::custom(format!("token amount {v} must not be negative")));
                }
                Ok(TokenAmount(v.to_string()))
            }

            fn visit_f64<E: serde::de::Error>(self, v: f64) -> Result<Self::Value, E> {
                Err(E::custom(format!(
                    "token amount {v} must be written as a string to stay exact"
                )))
            }

            fn visit_str<E: serde::de::Error>(self, v: &str) -> Result<Self::Value, E> {
                Ok(TokenAmount(v.trim().to_string()))
            }
        }

        deserializer.deserialize_any(AmountVisitor)
    }
}

/// One partner allocation entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartnerConfig {
    /// Partner address receiving the allocation.
    pub address: Address,
    /// Allocation in whole governance tokens.
    pub amount: TokenAmount,
}

/// An asset of the stable multipool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolAsset {
    /// Logical name under which the asset is registered (e.g. `KEK`).
    pub symbol: String,
    /// Token address.
    pub address: Address,
    /// Token decimals.
    #[serde(default = "default_decimals")]
    pub decimals: u8,
}

/// Configuration of the stable multipool (`Swap`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MultipoolConfig {
    /// The pooled assets, in pool order.
    pub assets: Vec<PoolAsset>,
    /// LP token name.
    #[serde(default = "default_lp_name")]
    pub lp_name: String,
    /// LP token symbol.
    #[serde(default = "default_lp_symbol")]
    pub lp_symbol: String,
    /// Amplification coefficient.
    #[serde(default = "default_amplification")]
    pub amplification: u64,
    /// Swap fee, in 1e-10 units.
    #[serde(default = "default_swap_fee")]
    pub swap_fee: u64,
    /// Admin fee, in 1e-10 units.
    #[serde(default = "default_admin_fee")]
    pub admin_fee: u64,
    /// Initial liquidity seeded for each asset, in whole tokens.
    #[serde(default = "default_seed_amount")]
    pub seed_amount: TokenAmount,
    /// LP tokens staked into the multipool gauge after creation. `0` skips staking.
    #[serde(default = "default_gauge_stake")]
    pub gauge_stake: TokenAmount,
}

/// Vote-escrow lock created for the deployer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockConfig {
    /// Governance tokens locked.
    pub amount: TokenAmount,
    /// Lock duration in seconds.
    pub duration_secs: u64,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            amount: TokenAmount::new("1000"),
            duration_secs: 365 * 86_400,
        }
    }
}

/// Governance token / native token pair seeded through the router.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairConfig {
    /// Governance tokens added to the pair.
    pub token_amount: TokenAmount,
    /// Native currency sent along, in ether.
    pub native_amount: TokenAmount,
    /// Whether the pair uses the stable curve.
    pub stable: bool,
    /// LP recipient. Defaults to the deployer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipient: Option<Address>,
}

impl Default for PairConfig {
    fn default() -> Self {
        Self {
            token_amount: TokenAmount::new("10"),
            native_amount: TokenAmount::new("0.01"),
            stable: true,
            recipient: None,
        }
    }
}

/// Chain client settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// JSON-RPC endpoint.
    pub rpc_url: Url,
    /// Deployer account, unlocked on the node. Defaults to the node's first account.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deployer: Option<Address>,
    /// Interval between receipt polls, in milliseconds.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Maximum time to wait for a receipt, in seconds.
    #[serde(default = "default_receipt_timeout_secs")]
    pub receipt_timeout_secs: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            rpc_url: default_rpc_url(),
            deployer: None,
            poll_interval_ms: default_poll_interval_ms(),
            receipt_timeout_secs: default_receipt_timeout_secs(),
        }
    }
}

/// Static input of a deployment run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunConfiguration {
    /// Chain client settings.
    #[serde(default)]
    pub network: NetworkConfig,
    /// Hardhat artifacts directory.
    #[serde(default = "default_artifacts_dir")]
    pub artifacts_dir: PathBuf,

    /// Team externally-owned account (pauser, governor, team roles).
    pub team_eoa: Address,
    /// Team multisig (minter team).
    pub team_multisig: Address,
    /// Treasury receiving the initial governance token mint.
    pub team_treasury: Address,
    /// Voter emergency council.
    pub emergency_council: Address,

    /// Wrapped native token.
    pub weth: Address,
    /// Reward token handed to `MetaBribe`.
    pub meta_bribe_token: Address,
    /// Airdrop merkle root.
    pub merkle_root: B256,

    /// Tokens whitelisted by `Voter.initialize`, after the governance token.
    #[serde(default)]
    pub token_whitelist: Vec<Address>,
    /// Tokens whitelisted one by one after initialization.
    #[serde(default)]
    pub voter_whitelist_additions: Vec<Address>,
    /// Partner allocations passed to `Minter.initialize`.
    #[serde(default)]
    pub partners: Vec<PartnerConfig>,

    /// Stable multipool.
    pub multipool: MultipoolConfig,
    /// Vote-escrow lock.
    #[serde(default)]
    pub lock: LockConfig,
    /// Governance / native pair.
    #[serde(default)]
    pub pair: PairConfig,
}

impl RunConfiguration {
    /// Load the configuration from a TOML file merged with environment overrides.
    pub fn load(path: &Path) -> Result<Self, DeployError> {
        if !path.exists() {
            return Err(DeployError::config(format!(
                "configuration file not found: {}",
                path.display()
            )));
        }

        let config: Self = Figment::new()
            .merge(Toml::file(path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .map_err(|e| DeployError::config(format!("invalid configuration: {e}")))?;

        config.validate()?;

        tracing::info!(
            path = %path.display(),
            rpc_url = %config.network.rpc_url,
            "Configuration loaded"
        );
        Ok(config)
    }

    /// Parse a configuration from a TOML string, without environment overrides.
    pub fn from_toml(content: &str) -> Result<Self, DeployError> {
        let config: Self = toml::from_str(content)
            .map_err(|e| DeployError::config(format!("invalid configuration: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Check the configuration for values that cannot produce a coherent run.
    pub fn validate(&self) -> Result<(), DeployError> {
        for (role, address) in [
            ("team_eoa", self.team_eoa),
            ("team_multisig", self.team_multisig),
            ("team_treasury", self.team_treasury),
            ("emergency_council", self.emergency_council),
            ("weth", self.weth),
            ("meta_bribe_token", self.meta_bribe_token),
        ] {
            if address.is_zero() {
                return Err(DeployError::config(format!("`{role}` must not be the zero address")));
            }
        }

        let mut whitelist = HashSet::new();
        for token in self.token_whitelist.iter().chain(&self.voter_whitelist_additions) {
            if !whitelist.insert(token) {
                return Err(DeployError::config(format!("token {token} is whitelisted twice")));
            }
        }

        let assets = &self.multipool.assets;
        if assets.len() != MULTIPOOL_ASSET_COUNT {
            return Err(DeployError::config(format!(
                "the multipool needs exactly {MULTIPOOL_ASSET_COUNT} assets, got {}",
                assets.len()
            )));
        }
        let mut symbols = HashSet::new();
        let mut addresses = HashSet::new();
        for asset in assets {
            if asset.symbol.is_empty() || !symbols.insert(asset.symbol.as_str()) {
                return Err(DeployError::config(format!(
                    "multipool asset symbol `{}` is empty or duplicated",
                    asset.symbol
                )));
            }
            if asset.address.is_zero() || !addresses.insert(asset.address) {
                return Err(DeployError::config(format!(
                    "multipool asset `{}` has a zero or duplicated address",
                    asset.symbol
                )));
            }
            self.multipool.seed_amount.base_units(asset.decimals)?;
        }
        self.multipool.gauge_stake.wei()?;

        if self.lock.duration_secs == 0 || self.lock.duration_secs > MAX_LOCK_DURATION_SECS {
            return Err(DeployError::config(format!(
                "lock duration must be within 1..={MAX_LOCK_DURATION_SECS} seconds, got {}",
                self.lock.duration_secs
            )));
        }
        if self.lock.amount.wei()?.is_zero() {
            return Err(DeployError::config("lock amount must be positive"));
        }

        self.pair.token_amount.wei()?;
        self.pair.native_amount.wei()?;

        if self.network.poll_interval_ms == 0 {
            return Err(DeployError::config("network.poll_interval_ms must be positive"));
        }

        Ok(())
    }
}

fn default_decimals() -> u8 {
    18
}

fn default_lp_name() -> String {
    "usd-3".to_string()
}

fn default_lp_symbol() -> String {
    "U3".to_string()
}

fn default_amplification() -> u64 {
    20_000
}

fn default_swap_fee() -> u64 {
    1_000
}

fn default_admin_fee() -> u64 {
    500
}

fn default_seed_amount() -> TokenAmount {
    TokenAmount::new("10")
}

fn default_gauge_stake() -> TokenAmount {
    TokenAmount::new("30")
}

fn default_rpc_url() -> Url {
    Url::parse("http://localhost:8545").expect("static URL is valid")
}

fn default_poll_interval_ms() -> u64 {
    1_000
}

fn default_receipt_timeout_secs() -> u64 {
    300
}

fn default_artifacts_dir() -> PathBuf {
    PathBuf::from("artifacts")
}
