//! Spec-Unit Quantities
//!
//! Quotas are configured in spec units, that is, decimal numbers with an optional SI suffix like
//! `500m`, `2`, `4Gi` or `1e3`. This module parses those into `[Quantity]` values and normalizes
//! them into the integer units that usage ledgers count in. CPU is counted in milli-units, every
//! other resource in whole units (which makes memory count in bytes).

use std::convert::TryFrom;

use num::{CheckedMul, Integer, ToPrimitive};

use crate::error::{Error, Result};

/// Name of the resource counted in milli-units.
pub const RESOURCE_CPU: &str = "cpu";

// Maximum number of significant digits accepted in a quantity. Anything more precise cannot be
// represented at milli-unit precision anyway.
const MAX_DIGITS: usize = 24;

/// A parsed spec-unit quantity.
///
/// The quantity is kept at milli-unit precision. More precise quantities are rounded up, so
/// `1n` becomes `1m`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Quantity {
    milli: i128,
}

// Multiplier encoded by a quantity suffix, as `2^binary * 10^decimal`.
struct Suffix {
    binary: u32,
    decimal: i32,
}

fn invalid(text: &str, reason: &str) -> Error {
    Error::InvalidQuantity {
        quantity: text.to_owned(),
        reason: reason.to_owned(),
    }
}

fn parse_suffix(text: &str, suffix: &str) -> Result<Suffix> {
    let (binary, decimal) = match suffix {
        "" => (0, 0),
        "n" => (0, -9),
        "u" => (0, -6),
        "m" => (0, -3),
        "k" => (0, 3),
        "M" => (0, 6),
        "G" => (0, 9),
        "T" => (0, 12),
        "P" => (0, 15),
        "E" => (0, 18),
        "Ki" => (10, 0),
        "Mi" => (20, 0),
        "Gi" => (30, 0),
        "Ti" => (40, 0),
        "Pi" => (50, 0),
        "Ei" => (60, 0),
        _ => {
            // Decimal exponent, e.g. `1e3` or `5E-2`.
            let exponent = suffix
                .strip_prefix('e')
                .or_else(|| suffix.strip_prefix('E'))
                .ok_or_else(|| invalid(text, "unknown suffix"))?;
            let digits = exponent.trim_start_matches(|c: char| c == '+' || c == '-');
            if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
                return Err(invalid(text, "malformed exponent"));
            }
            let decimal = exponent
                .parse::<i32>()
                .map_err(|_| invalid(text, "exponent out of range"))?;
            (0, decimal)
        }
    };

    Ok(Suffix { binary, decimal })
}

// Calculate `10^exp` in `i128`, or `None` on overflow.
fn pow10(exp: u32) -> Option<i128> {
    num::checked_pow(10i128, exp as usize)
}

// Divide rounding towards positive infinity.
fn div_ceil(a: i128, b: i128) -> i128 {
    -Integer::div_floor(&-a, &b)
}

fn saturate(v: i128) -> i64 {
    v.to_i64().unwrap_or(if v < 0 { i64::MIN } else { i64::MAX })
}

impl Quantity {
    /// Create a quantity of `units` whole units.
    pub fn from_units(units: i64) -> Self {
        Quantity {
            milli: i128::from(units) * 1000,
        }
    }

    /// Create a quantity of `milli` milli-units.
    pub fn from_milli(milli: i64) -> Self {
        Quantity {
            milli: i128::from(milli),
        }
    }

    /// Parse a quantity from its textual representation.
    pub fn parse(text: &str) -> Result<Self> {
        let (negative, rest) = match text.as_bytes().first() {
            Some(&b'-') => (true, &text[1..]),
            Some(&b'+') => (false, &text[1..]),
            _ => (false, text),
        };

        let number_len = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or_else(|| rest.len());
        let (number, suffix) = rest.split_at(number_len);

        let mut parts = number.splitn(2, '.');
        let integral = parts.next().unwrap_or("");
        let fraction = parts.next().unwrap_or("");
        if fraction.contains('.') {
            return Err(invalid(text, "more than one decimal point"));
        }
        if integral.is_empty() && fraction.is_empty() {
            return Err(invalid(text, "missing digits"));
        }

        // Trailing zeros of the fraction carry no precision, drop them early so they do not
        // count towards the digit limit.
        let fraction = fraction.trim_end_matches('0');
        let integral = integral.trim_start_matches('0');
        if integral.len() + fraction.len() > MAX_DIGITS {
            return Err(invalid(text, "too many significant digits"));
        }

        let mut mantissa: i128 = 0;
        for b in integral.bytes().chain(fraction.bytes()) {
            mantissa = mantissa * 10 + i128::from(b - b'0');
        }
        if negative {
            mantissa = -mantissa;
        }

        let suffix = parse_suffix(text, suffix)?;
        let overflow = || invalid(text, "value out of range");

        let binary = num::checked_pow(2i128, suffix.binary as usize).ok_or_else(overflow)?;
        let mantissa = CheckedMul::checked_mul(&mantissa, &binary).ok_or_else(overflow)?;

        // Scale to milli-units: `mantissa * 10^(decimal - fraction_len + 3)`.
        let scale = i64::from(suffix.decimal) - fraction.len() as i64 + 3;
        let milli = if scale >= 0 {
            let factor = u32::try_from(scale).ok().and_then(pow10).ok_or_else(overflow)?;
            CheckedMul::checked_mul(&mantissa, &factor).ok_or_else(overflow)?
        } else {
            match u32::try_from(-scale).ok().and_then(pow10) {
                Some(divisor) => div_ceil(mantissa, divisor),
                // The divisor exceeds any representable mantissa, so only the sign survives.
                None => if mantissa > 0 { 1 } else { 0 },
            }
        };

        Ok(Quantity { milli })
    }

    /// Value in whole units, rounded up and saturated to the `i64` range.
    pub fn value(&self) -> i64 {
        saturate(div_ceil(self.milli, 1000))
    }

    /// Value in milli-units, saturated to the `i64` range.
    pub fn milli_value(&self) -> i64 {
        saturate(self.milli)
    }
}

impl std::str::FromStr for Quantity {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Quantity::parse(s)
    }
}

impl std::fmt::Display for Quantity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.milli % 1000 == 0 {
            write!(f, "{}", self.milli / 1000)
        } else {
            write!(f, "{}m", self.milli)
        }
    }
}

impl<'de> serde::Deserialize<'de> for Quantity {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error> where
        D: serde::Deserializer<'de>,
    {
        struct Visitor;

        impl<'de> serde::de::Visitor<'de> for Visitor {
            type Value = Quantity;

            fn expecting(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str("a quantity string or an integer")
            }

            fn visit_str<E>(self, v: &str) -> std::result::Result<Quantity, E> where
                E: serde::de::Error,
            {
                Quantity::parse(v).map_err(E::custom)
            }

            fn visit_i64<E>(self, v: i64) -> std::result::Result<Quantity, E> where
                E: serde::de::Error,
            {
                Ok(Quantity::from_units(v))
            }

            fn visit_u64<E>(self, v: u64) -> std::result::Result<Quantity, E> where
                E: serde::de::Error,
            {
                let v = i64::try_from(v).map_err(|_| E::custom("quantity out of range"))?;
                Ok(Quantity::from_units(v))
            }
        }

        deserializer.deserialize_any(Visitor)
    }
}

/// Normalize a quantity of `resource` into ledger units.
///
/// CPU is counted in milli-units, everything else in whole units.
pub fn resource_value(resource: &str, quantity: &Quantity) -> i64 {
    if resource == RESOURCE_CPU {
        quantity.milli_value()
    } else {
        quantity.value()
    }
}
