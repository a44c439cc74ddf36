//! Currency pair keys.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Error returned when a currency pair key cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid currency pair {input:?}: {reason}")]
pub struct PairParseError {
    /// The offending input.
    pub input: String,
    /// Why it was rejected.
    pub reason: &'static str,
}

impl PairParseError {
    fn new(input: impl Into<String>, reason: &'static str) -> Self {
        Self {
            input: input.into(),
            reason,
        }
    }
}

/// A validated currency pair, canonically encoded as `"<FROM>_<TO>"`.
///
/// Both codes are exactly three ASCII letters, stored uppercase. The
/// canonical string doubles as the storage key, so malformed input is
/// rejected at construction instead of surfacing later as a bad split.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CurrencyPair {
    from: String,
    to: String,
}

impl CurrencyPair {
    /// Create a pair from two ISO 4217 codes.
    pub fn new(from: &str, to: &str) -> Result<Self, PairParseError> {
        Ok(Self {
            from: validate_code(from)?,
            to: validate_code(to)?,
        })
    }

    /// The source currency code.
    pub fn from(&self) -> &str {
        &self.from
    }

    /// The target currency code.
    pub fn to(&self) -> &str {
        &self.to
    }

    /// The canonical `"<FROM>_<TO>"` key used by storage backends.
    pub fn storage_key(&self) -> String {
        format!("{}_{}", self.from, self.to)
    }

    /// Parse a list of pair keys, failing on the first malformed entry.
    pub fn parse_list<S: AsRef<str>>(keys: &[S]) -> Result<Vec<Self>, PairParseError> {
        keys.iter().map(|k| k.as_ref().parse()).collect()
    }
}

fn validate_code(code: &str) -> Result<String, PairParseError> {
    if code.len() != 3 || !code.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(PairParseError::new(
            code,
            "currency code must be exactly three ASCII letters",
        ));
    }
    Ok(code.to_ascii_uppercase())
}

impl FromStr for CurrencyPair {
    type Err = PairParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split('_');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(from), Some(to), None) => Self::new(from, to)
                .map_err(|e| PairParseError::new(s, e.reason)),
            _ => Err(PairParseError::new(
                s,
                "expected exactly one '_' separating two currency codes",
            )),
        }
    }
}

impl TryFrom<String> for CurrencyPair {
    type Error = PairParseError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<CurrencyPair> for String {
    fn from(pair: CurrencyPair) -> Self {
        pair.storage_key()
    }
}

impl fmt::Display for CurrencyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.from, self.to)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn parses_canonical_key() {
        let pair: CurrencyPair = "EUR_USD".parse().unwrap();
        assert_eq!(pair.from(), "EUR");
        assert_eq!(pair.to(), "USD");
        assert_eq!(pair.storage_key(), "EUR_USD");
    }

    #[test]
    fn uppercases_codes() {
        let pair: CurrencyPair = "eur_usd".parse().unwrap();
        assert_eq!(pair.storage_key(), "EUR_USD");
    }

    #[test]
    fn rejects_malformed_keys() {
        for bad in ["EURUSD", "EUR_USD_JPY", "EU_USD", "EUR_US1", "", "_", "EUR_"] {
            assert!(bad.parse::<CurrencyPair>().is_err(), "accepted {bad:?}");
        }
    }

    #[test]
    fn serde_round_trip() {
        let pair: CurrencyPair = "GBP_JPY".parse().unwrap();
        let json = serde_json::to_string(&pair).unwrap();
        assert_eq!(json, "\"GBP_JPY\"");
        let back: CurrencyPair = serde_json::from_str(&json).unwrap();
        assert_eq!(back, pair);
    }

    proptest! {
        #[test]
        fn round_trips_valid_codes(from in "[A-Z]{3}", to in "[A-Z]{3}") {
            let pair = CurrencyPair::new(&from, &to).unwrap();
            let parsed: CurrencyPair = pair.storage_key().parse().unwrap();
            prop_assert_eq!(parsed, pair);
        }
    }
}
