//! Conversions from the string-typed fields Etherscan returns.

use alloy::primitives::U256;

use super::error::{Error, Result};

/// Strings Etherscan uses for a false or absent flag, compared lowercase.
const FALSY: [&str; 6] = ["0", "false", "none", "null", "n/a", ""];

/// Integer types that can be parsed from a base-10 string.
pub trait FromDecimal: Sized {
    /// Name used in parse errors
    const NAME: &'static str;

    fn from_decimal(s: &str) -> Option<Self>;
}

macro_rules! impl_from_decimal {
    ($($ty:ty),*) => {
        $(
            impl FromDecimal for $ty {
                const NAME: &'static str = stringify!($ty);

                fn from_decimal(s: &str) -> Option<Self> {
                    <$ty>::from_str_radix(s, 10).ok()
                }
            }
        )*
    };
}

impl_from_decimal!(u64, u128);

impl FromDecimal for U256 {
    const NAME: &'static str = "U256";

    fn from_decimal(s: &str) -> Option<Self> {
        U256::from_str_radix(s, 10).ok()
    }
}

/// Converts a flag string to a bool
pub fn to_bool(x: &str) -> bool {
    !FALSY.contains(&x.to_lowercase().as_str())
}

/// Returns `None` for an empty string, otherwise the parsed integer.
///
/// Only unsigned targets are implemented, so a leading `-` is a parse error.
/// The API never sends negative numbers in these fields.
pub fn to_optional_int<T: FromDecimal>(x: &str) -> Result<Option<T>> {
    if x.is_empty() {
        return Ok(None);
    }

    T::from_decimal(x)
        .map(Some)
        .ok_or_else(|| Error::parse(x, T::NAME))
}

/// Returns `None` for an empty string, otherwise the string itself
pub fn to_optional_string(x: &str) -> Option<String> {
    if x.is_empty() {
        None
    } else {
        Some(x.to_string())
    }
}

/// Parses a required base-10 integer.
pub fn to_int<T: FromDecimal>(x: &str) -> Result<T> {
    T::from_decimal(x).ok_or_else(|| Error::parse(x, T::NAME))
}

/// Parses a required decimal number such as a price.
pub fn to_float(x: &str) -> Result<f64> {
    x.parse().map_err(|_| Error::parse(x, "f64"))
}

/// Parses a `0x`-prefixed JSON-RPC quantity.
pub fn parse_hex_quantity<T: TryFrom<u128>>(x: &str) -> Result<T> {
    let digits = x
        .strip_prefix("0x")
        .or_else(|| x.strip_prefix("0X"))
        .ok_or_else(|| Error::parse(x, "hex quantity"))?;

    u128::from_str_radix(digits, 16)
        .ok()
        .and_then(|value| T::try_from(value).ok())
        .ok_or_else(|| Error::parse(x, "hex quantity"))
}
