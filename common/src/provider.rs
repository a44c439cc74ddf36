//! Rate provider tags.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Error returned when a provider name cannot be resolved.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("value {0:?} is not a valid rate provider")]
pub struct ProviderParseError(pub String);

/// The upstream source of a rate observation.
///
/// A closed enumeration: every fetched or persisted record carries exactly
/// one of these tags. The canonical string encoding is lowercase and parsing
/// is case-insensitive; unknown names fail instead of defaulting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RateProvider {
    #[serde(rename = "freecurrconversion")]
    FreeCurrConversion,
    #[serde(rename = "exchangeratesapi")]
    ExchangeRatesApi,
}

impl RateProvider {
    /// The canonical lowercase encoding.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::FreeCurrConversion => "freecurrconversion",
            Self::ExchangeRatesApi => "exchangeratesapi",
        }
    }

    /// All known providers.
    pub const fn all() -> [Self; 2] {
        [Self::FreeCurrConversion, Self::ExchangeRatesApi]
    }

    /// Parse a list of configuration strings, failing on the first unknown.
    pub fn parse_list<S: AsRef<str>>(values: &[S]) -> Result<Vec<Self>, ProviderParseError> {
        values.iter().map(|v| v.as_ref().parse()).collect()
    }
}

impl FromStr for RateProvider {
    type Err = ProviderParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "freecurrconversion" => Ok(Self::FreeCurrConversion),
            "exchangeratesapi" => Ok(Self::ExchangeRatesApi),
            _ => Err(ProviderParseError(s.to_string())),
        }
    }
}

impl fmt::Display for RateProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
