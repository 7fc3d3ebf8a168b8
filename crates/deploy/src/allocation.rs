//! Partner allocation totals passed to `Minter.initialize`.

use alloy_core::primitives::{Address, U256};
use serde::Serialize;

use crate::{config::PartnerConfig, errors::DeployError};

/// Partner addresses, their allocations in base units and the minter's `max` bound.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PartnerAllocation {
    pub addresses: Vec<Address>,
    pub amounts: Vec<U256>,
    /// One base unit above the sum of all allocations.
    pub max: U256,
}

impl PartnerAllocation {
    /// Convert the partner table to base units and compute the upper bound.
    ///
    /// Amounts are 18-decimal token amounts converted exactly. An empty table yields
    /// `max = 1`.
    pub fn compute(partners: &[PartnerConfig]) -> Result<Self, DeployError> {
        let mut addresses = Vec::with_capacity(partners.len());
        let mut amounts = Vec::with_capacity(partners.len());
        let mut max = U256::from(1u8);

        for partner in partners {
            let amount = partner.amount.wei()?;
            max = max.checked_add(amount).ok_or_else(|| {
                DeployError::config("partner allocations overflow uint256")
            })?;
            addresses.push(partner.address);
            amounts.push(amount);
        }

        tracing::debug!(
            partners = addresses.len(),
            max = %max,
            "Computed partner allocation"
        );

        Ok(Self {
            addresses,
            amounts,
            max,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.addresses.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TokenAmount;
    use alloy_core::primitives::address;

    fn partner(address: Address, amount: &str) -> PartnerConfig {
        PartnerConfig {
            address,
            amount: TokenAmount::new(amount),
        }
    }

    #[test]
    fn test_empty_partners() {
        let allocation = PartnerAllocation::compute(&[]).unwrap();
        assert!(allocation.is_empty());
        assert_eq!(allocation.max, U256::from(1));
    }

    #[test]
    fn test_max_is_one_above_total() {
        let a = address!("E2Be1686641Dc8514e642f4EE5a2c282f4a56a94");
        let b = address!("c90B0DdCE3215e5dA55289c762727987446beA9A");
        let allocation =
            PartnerAllocation::compute(&[partner(a, "1000"), partner(b, "0.5")]).unwrap();

        let thousand = U256::from(1000u64) * U256::from(10u64).pow(U256::from(18));
        let half = U256::from(500_000_000_000_000_000u64);
        assert_eq!(allocation.addresses, vec![a, b]);
        assert_eq!(allocation.amounts, vec![thousand, half]);
        assert_eq!(allocation.max, thousand + half + U256::from(1));
    }

    #[test]
    fn test_rejects_malformed_amount() {
        let err = PartnerAllocation::compute(&[partner(Address::ZERO, "1e3")]).unwrap_err();
        assert!(matches!(err, DeployError::Configuration(_)));

        let err = PartnerAllocation::compute(&[partner(Address::ZERO, "-5")]).unwrap_err();
        assert!(matches!(err, DeployError::Configuration(_)));
    }
}
