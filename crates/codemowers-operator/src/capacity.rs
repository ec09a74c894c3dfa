//! Parsing of human readable capacity strings like `5Gi` into byte counts.
//!
//! Unlike the Kubernetes [`Quantity`] format, capacities are always a positive
//! integer followed by exactly one multiple. A trailing `i` selects powers of
//! 1024, otherwise powers of 1000 are used.
//!
//! ```
//! # use codemowers_operator::capacity::Capacity;
//! let capacity: Capacity = "5Mi".parse().unwrap();
//! assert_eq!(capacity.bytes(), 5 * 1024 * 1024);
//! ```
//!
//! [`Quantity`]: k8s_openapi::apimachinery::pkg::api::resource::Quantity
use std::{fmt::Display, str::FromStr, sync::LazyLock};

use regex::Regex;
use snafu::{OptionExt, Snafu, ensure};

/// The pattern every capacity string must match. It is also emitted as the
/// schema pattern of the `capacity` instance property.
pub const CAPACITY_PATTERN: &str = "^[1-9][0-9]*[PTGMK]i?$";

static CAPACITY_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(CAPACITY_PATTERN).expect("failed to compile capacity regex"));

#[derive(Debug, PartialEq, Eq, Snafu)]
pub enum ParseCapacityError {
    #[snafu(display("capacity {input:?} is invalid, expected a string matching {CAPACITY_PATTERN}"))]
    InvalidCapacity { input: String },
}

/// Multiples supported in capacity strings. The exponent is applied to either
/// 1000 or 1024, depending on the presence of the trailing `i`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, strum::Display, strum::EnumString)]
pub enum Multiple {
    #[strum(serialize = "K")]
    Kilo,

    #[strum(serialize = "M")]
    Mega,

    #[strum(serialize = "G")]
    Giga,

    #[strum(serialize = "T")]
    Tera,

    #[strum(serialize = "P")]
    Peta,
}

impl Multiple {
    pub fn exponent(&self) -> u32 {
        match self {
            Self::Kilo => 1,
            Self::Mega => 2,
            Self::Giga => 3,
            Self::Tera => 4,
            Self::Peta => 5,
        }
    }
}

/// A validated capacity. It keeps the original string around, because vendor
/// custom resources receive the capacity verbatim.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Capacity {
    raw: String,
    bytes: u64,
}

impl Capacity {
    /// The capacity in bytes.
    pub fn bytes(&self) -> u64 {
        self.bytes
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl FromStr for Capacity {
    type Err = ParseCapacityError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        ensure!(
            CAPACITY_REGEX.is_match(input),
            InvalidCapacitySnafu { input }
        );

        let (rest, base) = match input.strip_suffix('i') {
            Some(rest) => (rest, 1024u64),
            None => (input, 1000u64),
        };

        // The regex guarantees an ASCII multiple as the last character
        let (digits, multiple) = rest.split_at(rest.len() - 1);
        let multiple = Multiple::from_str(multiple)
            .ok()
            .context(InvalidCapacitySnafu { input })?;
        let value: u64 = digits.parse().ok().context(InvalidCapacitySnafu { input })?;

        let bytes = base
            .checked_pow(multiple.exponent())
            .and_then(|factor| value.checked_mul(factor))
            .context(InvalidCapacitySnafu { input })?;

        Ok(Self {
            raw: input.to_owned(),
            bytes,
        })
    }
}

impl Display for Capacity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Parses `input` and returns the byte count.
pub fn parse_capacity(input: &str) -> Result<u64, ParseCapacityError> {
    Capacity::from_str(input).map(|capacity| capacity.bytes)
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("5M", 5_000_000)]
    #[case("5Mi", 5_242_880)]
    #[case("1K", 1_000)]
    #[case("1Ki", 1_024)]
    #[case("1Gi", 1_073_741_824)]
    #[case("10G", 10_000_000_000)]
    #[case("2Ti", 2 * 1024u64.pow(4))]
    #[case("3P", 3 * 1000u64.pow(5))]
    fn parse_valid(#[case] input: &str, #[case] expected: u64) {
        assert_eq!(parse_capacity(input), Ok(expected));
    }

    #[rstest]
    #[case("")]
    #[case("0M")]
    #[case("05M")]
    #[case("5")]
    #[case("5m")]
    #[case("5Mb")]
    #[case("5E")]
    #[case("5 Mi")]
    #[case("99999999999999999999P")]
    fn parse_invalid(#[case] input: &str) {
        assert_eq!(
            parse_capacity(input),
            Err(ParseCapacityError::InvalidCapacity {
                input: input.to_owned()
            })
        );
    }

    #[test]
    fn display_keeps_original() {
        let capacity: Capacity = "512Mi".parse().unwrap();
        assert_eq!(capacity.to_string(), "512Mi");
        assert_eq!(capacity.bytes(), 512 * 1024 * 1024);
    }
}
