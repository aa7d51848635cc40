//! Raw payload shapes and the source field names we look for.
//!
//! Feeds name the same thing differently; each canonical field has an ordered list
//! of candidates and the first present one wins.

use serde_json::Value;

pub const AMOUNT_FIELDS: &[&str] = &["amount", "value", "price", "total"];
pub const TYPE_FIELDS: &[&str] = &["type", "transactionType", "txnType"];
pub const DR_CR_FIELDS: &[&str] = &["drCr", "creditDebitIndicator", "indicator"];
pub const TIMESTAMP_FIELDS: &[&str] = &[
    "timestamp",
    "date",
    "transactionTimestamp",
    "bookingDate",
    "valueDate",
];
pub const COUNTERPARTY_FIELDS: &[&str] = &[
    "accountNumber",
    "payerAccount",
    "payeeAccount",
    "vpa",
    "counterpartyVpa",
    "narration",
];
pub const NARRATION_FIELDS: &[&str] = &["narration", "description"];
pub const MODE_FIELDS: &[&str] = &["mode", "paymentMode"];
pub const STATUS_FIELDS: &[&str] = &["status", "state"];
pub const REFERENCE_FIELDS: &[&str] = &["reference", "referenceNumber"];
pub const ID_FIELDS: &[&str] = &["id", "txnId"];
pub const CURRENCY_FIELDS: &[&str] = &["currencySymbol", "currency"];

pub const DEFAULT_MODE: &str = "Payment";
pub const DEFAULT_STATUS: &str = "Success";

/// Pull the record list out of a transactions response: either a bare array or
/// `{ "transactions": [...] }`. Any other shape holds no records.
pub fn records_from_payload(payload: &Value) -> Vec<Value> {
    match payload {
        Value::Array(items) => items.clone(),
        Value::Object(map) => match map.get("transactions") {
            Some(Value::Array(items)) => items.clone(),
            _ => Vec::new(),
        },
        _ => Vec::new(),
    }
}

/// First candidate that is present: not null, and not blank if it is a string
pub fn first_present<'a>(record: &'a Value, fields: &[&str]) -> Option<&'a Value> {
    let obj = record.as_object()?;
    fields
        .iter()
        .filter_map(|f| obj.get(*f))
        .find(|v| match v {
            Value::Null => false,
            Value::String(s) => !s.trim().is_empty(),
            _ => true,
        })
}

/// Text form of a scalar value. Arrays and objects have none.
pub fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// First candidate with a usable text form
pub fn first_text(record: &Value, fields: &[&str]) -> Option<String> {
    first_present(record, fields).and_then(scalar_text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_payload_shapes() {
        assert_eq!(records_from_payload(&json!([{ "amount": 1 }])).len(), 1);
        assert_eq!(
            records_from_payload(&json!({ "transactions": [{}, {}] })).len(),
            2
        );
        assert!(records_from_payload(&json!({ "data": [] })).is_empty());
        assert!(records_from_payload(&json!({ "transactions": "nope" })).is_empty());
        assert!(records_from_payload(&json!(null)).is_empty());
    }

    #[test]
    fn test_first_present_skips_null_and_blank() {
        let rec = json!({ "amount": null, "value": "  ", "price": 12 });
        assert_eq!(first_present(&rec, AMOUNT_FIELDS), Some(&json!(12)));
        assert_eq!(first_present(&json!("scalar"), AMOUNT_FIELDS), None);
    }

    #[test]
    fn test_first_text_ignores_structures() {
        let rec = json!({ "status": { "code": 1 } });
        assert_eq!(first_text(&rec, STATUS_FIELDS), None);
        let rec = json!({ "status": " SETTLED " });
        assert_eq!(first_text(&rec, STATUS_FIELDS).as_deref(), Some("SETTLED"));
    }
}
