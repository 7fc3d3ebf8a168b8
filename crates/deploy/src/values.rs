//! Literal argument values and their coercion to ABI types.
//!
//! Constructor arguments and action parameters are described without knowing the
//! exact Solidity width of each parameter (`uint8` vs `uint256`). The concrete
//! [`DynSolValue`] is produced against the ABI parameter type at encode time, with
//! range checks, so a topology entry cannot silently truncate a value.

use alloy_core::{
    dyn_abi::{DynSolType, DynSolValue, Specifier},
    json_abi::Param,
    primitives::{Address, B256, I256, U256},
};
use serde::{Deserialize, Serialize};

/// A literal argument value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum ArgValue {
    Address(Address),
    Uint(U256),
    Bool(bool),
    String(String),
    Bytes32(B256),
    List(Vec<ArgValue>),
}

impl ArgValue {
    /// Shorthand for a small unsigned integer.
    pub fn uint(value: u64) -> Self {
        Self::Uint(U256::from(value))
    }

    /// Shorthand for a list of addresses.
    pub fn addresses(addresses: impl IntoIterator<Item = Address>) -> Self {
        Self::List(addresses.into_iter().map(Self::Address).collect())
    }

    /// Coerce this value into the given ABI type.
    pub fn coerce(&self, ty: &DynSolType) -> Result<DynSolValue, String> {
        match (self, ty) {
            (Self::Address(a), DynSolType::Address) => Ok(DynSolValue::Address(*a)),
            (Self::Uint(v), DynSolType::Uint(bits)) => {
                if *bits < 256 && *v >= (U256::from(1u8) << *bits) {
                    return Err(format!("{v} does not fit in uint{bits}"));
                }
                Ok(DynSolValue::Uint(*v, *bits))
            }
            (Self::Uint(v), DynSolType::Int(bits)) => {
                let signed = I256::try_from(*v).map_err(|_| format!("{v} does not fit in int{bits}"))?;
                if *bits < 256 && *v >= (U256::from(1u8) << (*bits - 1)) {
                    return Err(format!("{v} does not fit in int{bits}"));
                }
                Ok(DynSolValue::Int(signed, *bits))
            }
            (Self::Bool(b), DynSolType::Bool) => Ok(DynSolValue::Bool(*b)),
            (Self::String(s), DynSolType::String) => Ok(DynSolValue::String(s.clone())),
            (Self::Bytes32(b), DynSolType::FixedBytes(32)) => Ok(DynSolValue::FixedBytes(*b, 32)),
            (Self::List(items), DynSolType::Array(inner)) => items
                .iter()
                .map(|item| item.coerce(inner))
                .collect::<Result<Vec<_>, _>>()
                .map(DynSolValue::Array),
            (Self::List(items), DynSolType::FixedArray(inner, len)) => {
                if items.len() != *len {
                    return Err(format!("expected {len} elements, got {}", items.len()));
                }
                items
                    .iter()
                    .map(|item| item.coerce(inner))
                    .collect::<Result<Vec<_>, _>>()
                    .map(DynSolValue::FixedArray)
            }
            (value, ty) => Err(format!("cannot encode {value} as {ty}")),
        }
    }
}

impl std::fmt::Display for ArgValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Address(a) => write!(f, "{a}"),
            Self::Uint(v) => write!(f, "{v}"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::String(s) => write!(f, "{s:?}"),
            Self::Bytes32(b) => write!(f, "{b}"),
            Self::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
        }
    }
}

/// Coerce a list of values against ABI input parameters.
pub fn encode_args(params: &[Param], values: &[ArgValue]) -> Result<Vec<DynSolValue>, String> {
    if params.len() != values.len() {
        return Err(format!(
            "expected {} arguments, got {}",
            params.len(),
            values.len()
        ));
    }

    params
        .iter()
        .zip(values)
        .map(|(param, value)| {
            let ty = param
                .resolve()
                .map_err(|e| format!("unsupported ABI type `{}`: {e}", param.ty))?;
            value
                .coerce(&ty)
                .map_err(|e| format!("argument `{}`: {e}", param.name))
        })
        .collect()
}

/// The zero value of an ABI type.
///
/// Used by the simulated chain to shape view-call outputs.
pub fn zero_value(ty: &DynSolType) -> DynSolValue {
    match ty {
        DynSolType::Bool => DynSolValue::Bool(false),
        DynSolType::Int(bits) => DynSolValue::Int(I256::ZERO, *bits),
        DynSolType::Uint(bits) => DynSolValue::Uint(U256::ZERO, *bits),
        DynSolType::FixedBytes(size) => DynSolValue::FixedBytes(B256::ZERO, *size),
        DynSolType::Address => DynSolValue::Address(Address::ZERO),
        DynSolType::Bytes => DynSolValue::Bytes(Vec::new()),
        DynSolType::String => DynSolValue::String(String::new()),
        DynSolType::Array(_) => DynSolValue::Array(Vec::new()),
        DynSolType::FixedArray(inner, len) => {
            DynSolValue::FixedArray(vec![zero_value(inner); *len])
        }
        DynSolType::Tuple(types) => DynSolValue::Tuple(types.iter().map(zero_value).collect()),
        _ => DynSolValue::Bytes(Vec::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_core::primitives::address;

    #[test]
    fn test_coerce_uint_widths() {
        let value = ArgValue::uint(18);
        assert_eq!(
            value.coerce(&DynSolType::Uint(8)).unwrap(),
            DynSolValue::Uint(U256::from(18), 8)
        );

        let too_big = ArgValue::uint(256);
        assert!(too_big.coerce(&DynSolType::Uint(8)).is_err());
        assert!(ArgValue::Uint(U256::MAX).coerce(&DynSolType::Uint(256)).is_ok());
    }

    #[test]
    fn test_coerce_int_range() {
        assert!(ArgValue::uint(127).coerce(&DynSolType::Int(8)).is_ok());
        assert!(ArgValue::uint(128).coerce(&DynSolType::Int(8)).is_err());
        assert!(ArgValue::Uint(U256::MAX).coerce(&DynSolType::Int(256)).is_err());
    }

    #[test]
    fn test_coerce_address_list() {
        let a = address!("E2Be1686641Dc8514e642f4EE5a2c282f4a56a94");
        let b = address!("c90B0DdCE3215e5dA55289c762727987446beA9A");
        let list = ArgValue::addresses([a, b]);

        let coerced = list
            .coerce(&DynSolType::Array(Box::new(DynSolType::Address)))
            .unwrap();
        assert_eq!(
            coerced,
            DynSolValue::Array(vec![DynSolValue::Address(a), DynSolValue::Address(b)])
        );

        let fixed = DynSolType::FixedArray(Box::new(DynSolType::Address), 3);
        assert!(list.coerce(&fixed).is_err());
    }

    #[test]
    fn test_coerce_type_mismatch() {
        let err = ArgValue::Bool(true).coerce(&DynSolType::Address).unwrap_err();
        assert!(err.contains("cannot encode true as address"));
    }

    #[test]
    fn test_encode_args_arity() {
        let params = vec![Param {
            ty: "address".to_string(),
            name: "_router".to_string(),
            components: vec![],
            internal_type: None,
        }];

        let err = encode_args(&params, &[]).unwrap_err();
        assert_eq!(err, "expected 1 arguments, got 0");

        let ok = encode_args(&params, &[ArgValue::Address(Address::ZERO)]).unwrap();
        assert_eq!(ok, vec![DynSolValue::Address(Address::ZERO)]);
    }

    #[test]
    fn test_zero_value_shapes() {
        let ty = DynSolType::Tuple(vec![DynSolType::Uint(256), DynSolType::Address]);
        assert_eq!(
            zero_value(&ty),
            DynSolValue::Tuple(vec![
                DynSolValue::Uint(U256::ZERO, 256),
                DynSolValue::Address(Address::ZERO)
            ])
        );
    }
}
