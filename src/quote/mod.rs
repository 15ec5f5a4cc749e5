//! Core quote types
//!
//! A `Bid` is the upstream price exactly as reported plus its numeric parse.
//! A `Quote` pins a bid to the time bucket it was fetched in, and a
//! `ServedQuote` is what the orchestrator hands to the reply formatter.

pub mod bucket;

pub use bucket::BucketGranularity;

use thiserror::Error;

/// Reasons an upstream price string cannot become a `Bid`
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BidParseError {
    /// The price field was present but empty
    #[error("bid price is empty")]
    Empty,

    /// The price field is not a finite decimal number
    #[error("bid price {0:?} is not a number")]
    NotNumeric(String),
}

/// An upstream bid price
///
/// `value` is always the exact parse of `raw_text`; the only way to build a
/// `Bid` is through [`Bid::parse`].
#[derive(Debug, Clone, PartialEq)]
pub struct Bid {
    raw_text: String,
    value: f64,
}

impl Bid {
    /// Parses an upstream price string
    pub fn parse(raw_text: &str) -> Result<Self, BidParseError> {
        if raw_text.is_empty() {
            return Err(BidParseError::Empty);
        }

        let value: f64 = raw_text
            .parse()
            .map_err(|_| BidParseError::NotNumeric(raw_text.to_string()))?;

        // "NaN" and "inf" parse as f64 but are not prices
        if !value.is_finite() {
            return Err(BidParseError::NotNumeric(raw_text.to_string()));
        }

        Ok(Self {
            raw_text: raw_text.to_string(),
            value,
        })
    }

    /// The price exactly as upstream reported it
    pub fn raw_text(&self) -> &str {
        &self.raw_text
    }

    /// The numeric price
    pub fn value(&self) -> f64 {
        self.value
    }
}

/// A bid fetched for a specific time bucket
#[derive(Debug, Clone, PartialEq)]
pub struct Quote {
    pub bucket_key: String,
    pub bid: Bid,
}

/// Where a served quote came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    Cache,
    Upstream,
}

impl Origin {
    pub fn as_str(self) -> &'static str {
        match self {
            Origin::Cache => "cache",
            Origin::Upstream => "upstream",
        }
    }
}

/// A quote ready to be rendered into a reply
#[derive(Debug, Clone, PartialEq)]
pub struct ServedQuote {
    /// Price text placed verbatim in the `bidPrice` field
    pub bid_price: String,
    pub origin: Origin,
}

impl ServedQuote {
    /// Cached values are rendered with fixed four-decimal precision
    pub fn from_cache(value: f64) -> Self {
        Self {
            bid_price: format!("{:.4}", value),
            origin: Origin::Cache,
        }
    }

    /// Fresh quotes keep the upstream text untouched
    pub fn from_upstream(quote: &Quote) -> Self {
        Self {
            bid_price: quote.bid.raw_text().to_string(),
            origin: Origin::Upstream,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_keeps_raw_text_and_value() {
        let bid = Bid::parse("5.2097").unwrap();

        assert_eq!(bid.raw_text(), "5.2097");
        assert_eq!(bid.value(), 5.2097);
    }

    #[test]
    fn test_parse_rejects_empty() {
        assert_eq!(Bid::parse(""), Err(BidParseError::Empty));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        let err = Bid::parse("five").unwrap_err();
        assert_eq!(err, BidParseError::NotNumeric("five".to_string()));
        assert!(err.to_string().contains("five"));
    }

    #[test]
    fn test_parse_rejects_non_finite() {
        assert!(Bid::parse("NaN").is_err());
        assert!(Bid::parse("inf").is_err());
    }

    #[test]
    fn test_parse_rejects_padded_text() {
        assert!(Bid::parse(" 5.21").is_err());
    }

    #[test]
    fn test_cached_value_uses_four_decimals() {
        assert_eq!(ServedQuote::from_cache(5.1).bid_price, "5.1000");
        assert_eq!(ServedQuote::from_cache(5.20971).bid_price, "5.2097");
    }

    #[test]
    fn test_upstream_value_is_not_reformatted() {
        let quote = Quote {
            bucket_key: "2024-01-15".to_string(),
            bid: Bid::parse("5.21").unwrap(),
        };

        let served = ServedQuote::from_upstream(&quote);

        assert_eq!(served.bid_price, "5.21");
        assert_eq!(served.origin, Origin::Upstream);
    }
}
