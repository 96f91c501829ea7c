use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::TypeError;

/// Limb base used when converting hex input to decimal.
const DECIMAL_LIMB: u64 = 1_000_000_000;

/// Arbitrary-precision non-negative integer.
///
/// Token ids and prices on chain are 256-bit (or wider) unsigned values. The
/// indexer never does arithmetic on them; it only stores, compares, and
/// renders them. The value is therefore held as its canonical decimal text:
/// ASCII digits, no sign, no leading zeros (zero is `"0"`).
///
/// Input may be decimal or `0x`-prefixed hex; both normalize to the same
/// canonical decimal form.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Uint(String);

impl Uint {
    /// The value zero.
    pub fn zero() -> Self {
        Self("0".to_string())
    }

    pub fn from_u64(value: u64) -> Self {
        Self(value.to_string())
    }

    pub fn from_u128(value: u128) -> Self {
        Self(value.to_string())
    }

    pub fn is_zero(&self) -> bool {
        self.0 == "0"
    }

    /// Canonical decimal digits.
    pub fn as_decimal(&self) -> &str {
        &self.0
    }

    /// Narrow to `u128` if the value fits.
    pub fn to_u128(&self) -> Option<u128> {
        self.0.parse().ok()
    }

    /// Parse decimal or `0x`-prefixed hex text. Surrounding whitespace is
    /// rejected, matching [`Address::from_hex`](crate::Address::from_hex).
    pub fn parse(input: &str) -> Result<Self, TypeError> {
        if input.trim() != input {
            return Err(invalid(input, "surrounding whitespace"));
        }
        match input.strip_prefix("0x").or_else(|| input.strip_prefix("0X")) {
            Some(digits) => Self::from_hex_digits(input, digits),
            None => Self::from_decimal_digits(input, input),
        }
    }

    fn from_decimal_digits(input: &str, digits: &str) -> Result<Self, TypeError> {
        if digits.is_empty() {
            return Err(invalid(input, "empty integer"));
        }
        if !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid(input, "expected decimal digits"));
        }
        let stripped = digits.trim_start_matches('0');
        if stripped.is_empty() {
            Ok(Self::zero())
        } else {
            Ok(Self(stripped.to_string()))
        }
    }

    fn from_hex_digits(input: &str, digits: &str) -> Result<Self, TypeError> {
        if digits.is_empty() {
            return Err(invalid(input, "empty hex integer"));
        }

        // Little-endian base-10^9 limbs; the top limb is non-zero unless the
        // whole value is zero.
        let mut limbs: Vec<u32> = vec![0];
        for c in digits.chars() {
            let nibble = c
                .to_digit(16)
                .ok_or_else(|| invalid(input, "expected hex digits"))?;
            let mut carry = u64::from(nibble);
            for limb in limbs.iter_mut() {
                let value = u64::from(*limb) * 16 + carry;
                *limb = (value % DECIMAL_LIMB) as u32;
                carry = value / DECIMAL_LIMB;
            }
            while carry > 0 {
                limbs.push((carry % DECIMAL_LIMB) as u32);
                carry /= DECIMAL_LIMB;
            }
        }

        let mut out = String::new();
        let mut iter = limbs.iter().rev();
        if let Some(top) = iter.next() {
            out.push_str(&top.to_string());
        }
        for limb in iter {
            out.push_str(&format!("{limb:09}"));
        }
        Ok(Self(out))
    }
}

fn invalid(input: &str, reason: &str) -> TypeError {
    TypeError::InvalidInteger {
        input: input.to_string(),
        reason: reason.to_string(),
    }
}

impl Default for Uint {
    fn default() -> Self {
        Self::zero()
    }
}

impl From<u64> for Uint {
    fn from(value: u64) -> Self {
        Self::from_u64(value)
    }
}

impl PartialOrd for Uint {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Uint {
    fn cmp(&self, other: &Self) -> Ordering {
        // Canonical form has no leading zeros, so longer means larger.
        self.0
            .len()
            .cmp(&other.0.len())
            .then_with(|| self.0.cmp(&other.0))
    }
}

impl fmt::Debug for Uint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Uint({})", self.0)
    }
}

impl fmt::Display for Uint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Uint {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for Uint {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

struct UintVisitor;

impl<'de> Visitor<'de> for UintVisitor {
    type Value = Uint;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a non-negative integer as a number, decimal string, or 0x hex string")
    }

    fn visit_u64<E: de::Error>(self, value: u64) -> Result<Uint, E> {
        Ok(Uint::from_u64(value))
    }

    fn visit_u128<E: de::Error>(self, value: u128) -> Result<Uint, E> {
        Ok(Uint::from_u128(value))
    }

    fn visit_i64<E: de::Error>(self, value: i64) -> Result<Uint, E> {
        u64::try_from(value)
            .map(Uint::from_u64)
            .map_err(|_| E::custom(format!("negative integer {value}")))
    }

    fn visit_str<E: de::Error>(self, value: &str) -> Result<Uint, E> {
        Uint::parse(value).map_err(E::custom)
    }
}

impl<'de> Deserialize<'de> for Uint {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        // Binary formats are not self-describing; they always carry the string.
        if deserializer.is_human_readable() {
            deserializer.deserialize_any(UintVisitor)
        } else {
            deserializer.deserialize_string(UintVisitor)
        }
    }
}
