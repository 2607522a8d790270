//! Decimal money on the wire.
//!
//! Amounts go out as plain decimal strings (`"29003.30"`, never exponent
//! form). Incoming amounts may be strings or JSON numbers; numbers are parsed
//! from their literal text so no value passes through `f64`.

use std::str::FromStr;

use bigdecimal::BigDecimal;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serializer};
use serde_json::value::RawValue;

/// Plain decimal text. Negative scales (`1e10`) are widened to whole units.
pub fn to_plain(amount: &BigDecimal) -> String {
    let (_, scale) = amount.as_bigint_and_exponent();
    if scale < 0 {
        amount.with_scale(0).to_string()
    } else {
        amount.to_string()
    }
}

/// Parse a raw JSON literal holding either a string or a number.
fn from_raw(raw: &RawValue) -> Result<BigDecimal, String> {
    let text = raw.get().trim();
    let literal = if text.starts_with('"') {
        serde_json::from_str::<String>(text).map_err(|e| e.to_string())?
    } else {
        text.to_string()
    };
    BigDecimal::from_str(literal.trim()).map_err(|e| format!("invalid amount {literal:?}: {e}"))
}

pub fn serialize<S: Serializer>(amount: &BigDecimal, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&to_plain(amount))
}

pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<BigDecimal, D::Error> {
    let raw = Box::<RawValue>::deserialize(deserializer)?;
    from_raw(&raw).map_err(D::Error::custom)
}

/// `#[serde(with = "crate::money::option")]` for `Option<BigDecimal>` fields.
pub mod option {
    use super::*;

    pub fn serialize<S: Serializer>(amount: &Option<BigDecimal>, serializer: S) -> Result<S::Ok, S::Error> {
        match amount {
            Some(amount) => serializer.serialize_some(&to_plain(amount)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<BigDecimal>, D::Error> {
        let raw = Option::<Box<RawValue>>::deserialize(deserializer)?;
        match raw {
            Some(raw) if raw.get().trim() != "null" => from_raw(&raw).map(Some).map_err(D::Error::custom),
            _ => Ok(None),
        }
    }
}
