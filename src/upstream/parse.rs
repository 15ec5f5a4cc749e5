//! Upstream body parsing
//!
//! Upstream providers disagree on shape. The bid may sit on a top-level
//! object, on the single element of a top-level list, or one level down under
//! a currency-pair key:
//!
//! ```text
//! {"bidPrice": "5.2097"}
//! [{"bidPrice": "5.2097"}]
//! {"currency": [{"bidPrice": "5.2097", ...}]}
//! {"USDBRL": {"bid": "5.2097", ...}}
//! ```

use serde_json::{Map, Value};

use super::FetchError;
use crate::quote::Bid;

/// Field names that carry the bid price, in lookup order
const BID_FIELDS: [&str; 2] = ["bidPrice", "bid"];

/// Extracts the bid price from an upstream response body
pub fn parse_bid(body: &str) -> Result<Bid, FetchError> {
    let json: Value = serde_json::from_str(body)
        .map_err(|e| FetchError::Malformed(format!("invalid JSON: {}", e)))?;

    let field = locate(&json)
        .ok_or_else(|| FetchError::Malformed("bid price field missing".to_string()))?;

    let raw = field
        .as_str()
        .ok_or_else(|| FetchError::Malformed(format!("bid price is not a string: {}", field)))?;

    Bid::parse(raw).map_err(|e| FetchError::Malformed(e.to_string()))
}

/// Finds the bid field directly on the body, or one level below it
fn locate(json: &Value) -> Option<&Value> {
    direct(json).or_else(|| match json {
        Value::Object(map) => map.values().find_map(direct),
        _ => None,
    })
}

/// Looks for the bid on an object, or on the first element of a list
fn direct(value: &Value) -> Option<&Value> {
    match value {
        Value::Object(map) => field(map),
        Value::Array(items) => items.first().and_then(Value::as_object).and_then(field),
        _ => None,
    }
}

fn field(map: &Map<String, Value>) -> Option<&Value> {
    BID_FIELDS.iter().find_map(|name| map.get(*name))
}
