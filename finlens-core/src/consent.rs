//! Consent records as persisted locally.
//!
//! The external consent service owns the authoritative state. These records are a
//! cache of what we last created or refreshed, so every field tolerates being
//! missing and unknown fields ride along untouched.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// A consent as known to this client
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ConsentRecord {
    /// Opaque id issued by the consent service
    #[serde(default, deserialize_with = "null_default")]
    pub id: String,
    #[serde(default, deserialize_with = "null_default")]
    pub status: ConsentStatus,
    /// Virtual user address, e.g. `9999999999@onemoney`
    #[serde(rename = "vua", alias = "counterpartyHandle", default, deserialize_with = "null_default")]
    pub counterparty_handle: String,
    #[serde(rename = "dataRange", default, skip_serializing_if = "Option::is_none")]
    pub validity: Option<ValidityWindow>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub consent_duration: Option<ConsentDuration>,
    #[serde(rename = "consentTypes", default, deserialize_with = "null_default")]
    pub requested_data_types: Vec<DataType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(rename = "accountsLinked", default, deserialize_with = "null_default")]
    pub linked_accounts: Vec<LinkedAccount>,
    /// Authorization link returned at creation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Status last reported by an explicit refresh, as opposed to the optimistic `status`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_confirmed_status: Option<ConsentStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confirmed_at: Option<DateTime<Utc>>,
    /// Fields we don't model, kept so merges never lose them
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ConsentStatus {
    #[default]
    Pending,
    Active,
    Rejected,
    Expired,
    Paused,
    Revoked,
    Other(String),
}

impl ConsentStatus {
    pub fn as_str(&self) -> &str {
        match self {
            ConsentStatus::Pending => "PENDING",
            ConsentStatus::Active => "ACTIVE",
            ConsentStatus::Rejected => "REJECTED",
            ConsentStatus::Expired => "EXPIRED",
            ConsentStatus::Paused => "PAUSED",
            ConsentStatus::Revoked => "REVOKED",
            ConsentStatus::Other(s) => s,
        }
    }
}

impl From<String> for ConsentStatus {
    fn from(s: String) -> Self {
        ConsentStatus::from(s.as_str())
    }
}

impl From<&str> for ConsentStatus {
    fn from(s: &str) -> Self {
        match s.trim().to_ascii_uppercase().as_str() {
            "" | "PENDING" => ConsentStatus::Pending,
            "ACTIVE" => ConsentStatus::Active,
            "REJECTED" => ConsentStatus::Rejected,
            "EXPIRED" => ConsentStatus::Expired,
            "PAUSED" => ConsentStatus::Paused,
            "REVOKED" => ConsentStatus::Revoked,
            other => ConsentStatus::Other(other.to_string()),
        }
    }
}

impl From<ConsentStatus> for String {
    fn from(s: ConsentStatus) -> Self {
        s.as_str().to_string()
    }
}

impl std::fmt::Display for ConsentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Window of financial data the consent covers. Either end may be missing in
/// records written by older clients.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ValidityWindow {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<DateTime<Utc>>,
}

impl ValidityWindow {
    pub fn new(from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        Self {
            from: Some(from),
            to: Some(to),
        }
    }
}

/// How long the consent stays valid, e.g. 2 MONTH
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ConsentDuration {
    #[serde(default, deserialize_with = "null_default")]
    pub unit: String,
    #[serde(default, deserialize_with = "string_or_number")]
    pub value: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum DataType {
    Profile,
    Summary,
    Transactions,
    #[serde(other)]
    Unknown,
}

impl DataType {
    pub const ALL: [DataType; 3] = [DataType::Profile, DataType::Summary, DataType::Transactions];

    pub fn parse(s: &str) -> Option<DataType> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PROFILE" => Some(DataType::Profile),
            "SUMMARY" => Some(DataType::Summary),
            "TRANSACTIONS" => Some(DataType::Transactions),
            _ => None,
        }
    }
}

/// Account summary the consent service reports once the user links accounts
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct LinkedAccount {
    #[serde(rename = "fipId", default, deserialize_with = "null_default")]
    pub institution_id: String,
    #[serde(rename = "accType", default, deserialize_with = "null_default")]
    pub account_type: String,
    #[serde(rename = "maskedAccNumber", default, deserialize_with = "null_default")]
    pub masked_number: String,
    #[serde(rename = "fiType", default, deserialize_with = "null_default")]
    pub financial_instrument_type: String,
}

impl LinkedAccount {
    /// Institution name without the sandbox prefix
    pub fn institution_name(&self) -> String {
        self.institution_id
            .strip_prefix("setu-")
            .unwrap_or(&self.institution_id)
            .to_uppercase()
    }

    pub fn last4(&self) -> &str {
        let n = self.masked_number.chars().count();
        match self.masked_number.char_indices().nth(n.saturating_sub(4)) {
            Some((i, _)) => &self.masked_number[i..],
            None => &self.masked_number,
        }
    }
}

/// Keys the service may use for a field we persist under another name
const FIELD_ALIASES: &[(&str, &str)] = &[("counterpartyHandle", "vua")];

impl ConsentRecord {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    /// Overlay `patch` onto this record. Keys absent from the patch, or null in it,
    /// keep their current value.
    pub fn merged(&self, patch: &Map<String, Value>) -> serde_json::Result<ConsentRecord> {
        let mut base = match serde_json::to_value(self)? {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        for (key, value) in patch {
            if value.is_null() {
                continue;
            }
            let key = FIELD_ALIASES
                .iter()
                .find(|(alias, _)| alias == key)
                .map(|(_, canonical)| *canonical)
                .unwrap_or(key);
            base.insert(key.to_string(), value.clone());
        }
        serde_json::from_value(Value::Object(base))
    }

    /// Short label for pickers: `9999999999 (onemoney)` or a truncated id
    pub fn display_label(&self) -> String {
        if self.counterparty_handle.is_empty() {
            let short: String = self.id.chars().take(8).collect();
            return format!("Consent ID: {short}...");
        }
        match self.counterparty_handle.split_once('@') {
            Some((user, provider)) if !provider.is_empty() => format!("{user} ({provider})"),
            Some((user, _)) => format!("{user} (VUA)"),
            None => format!("{} (VUA)", self.counterparty_handle),
        }
    }
}

/// `null` reads as the field's default, the same as a missing key
fn null_default<'de, D, T>(de: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(de)?.unwrap_or_default())
}

fn string_or_number<'de, D>(de: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(de)? {
        Value::Null => Ok(String::new()),
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number, got {other}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn patch(v: Value) -> Map<String, Value> {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn test_nested_nulls_read_as_defaults() {
        let rec: ConsentRecord = serde_json::from_value(json!({
            "id": "c-3",
            "status": null,
            "vua": null,
            "consentTypes": null,
            "accountsLinked": [
                { "fipId": "setu-fip", "accType": null, "maskedAccNumber": "XX9876", "fiType": null }
            ],
            "consentDuration": { "unit": null, "value": null }
        }))
        .unwrap();
        assert_eq!(rec.status, ConsentStatus::Pending);
        assert_eq!(rec.counterparty_handle, "");
        assert!(rec.requested_data_types.is_empty());
        assert_eq!(rec.linked_accounts[0].account_type, "");
        assert_eq!(rec.linked_accounts[0].last4(), "9876");
        assert_eq!(rec.consent_duration, Some(ConsentDuration::default()));
    }

    #[test]
    fn test_partial_data_range_deserializes() {
        let rec: ConsentRecord = serde_json::from_value(json!({
            "id": "c-4",
            "dataRange": { "from": "2024-01-01T00:00:00Z" },
            "consentDuration": { "value": 3 }
        }))
        .unwrap();
        let range = rec.validity.unwrap();
        assert!(range.from.is_some());
        assert!(range.to.is_none());
        assert_eq!(rec.consent_duration.unwrap().value, "3");
    }

    #[test]
    fn test_sparse_record_deserializes() {
        let rec: ConsentRecord = serde_json::from_value(json!({ "id": "c-1" })).unwrap();
        assert_eq!(rec.id, "c-1");
        assert_eq!(rec.status, ConsentStatus::Pending);
        assert!(rec.linked_accounts.is_empty());
        assert!(rec.created_at.is_none());
    }

    #[test]
    fn test_status_payload_shape() {
        let rec: ConsentRecord = serde_json::from_value(json!({
            "id": "c-2",
            "status": "active",
            "vua": "9999999999@onemoney",
            "accountsLinked": [
                { "fipId": "setu-fip", "accType": "SAVINGS", "maskedAccNumber": "XXXXXX1234", "fiType": "DEPOSIT" }
            ],
            "detail": { "x": 1 }
        }))
        .unwrap();
        assert_eq!(rec.status, ConsentStatus::Active);
        assert_eq!(rec.linked_accounts[0].institution_name(), "FIP");
        assert_eq!(rec.linked_accounts[0].last4(), "1234");
        assert!(rec.extra.contains_key("detail"));
    }

    #[test]
    fn test_merge_keeps_unspecified_fields() {
        let mut rec = ConsentRecord::new("c-3");
        rec.counterparty_handle = "8888888888@onemoney".to_string();
        rec.requested_data_types = vec![DataType::Transactions];
        rec.extra.insert("context".to_string(), json!([]));

        let merged = rec.merged(&patch(json!({ "status": "ACTIVE", "url": null }))).unwrap();
        assert_eq!(merged.status, ConsentStatus::Active);
        assert_eq!(merged.counterparty_handle, "8888888888@onemoney");
        assert_eq!(merged.requested_data_types, vec![DataType::Transactions]);
        assert_eq!(merged.extra.get("context"), Some(&json!([])));
    }

    #[test]
    fn test_merge_maps_handle_alias() {
        let rec = ConsentRecord::new("c-4");
        let merged = rec
            .merged(&patch(json!({ "counterpartyHandle": "7777@onemoney" })))
            .unwrap();
        assert_eq!(merged.counterparty_handle, "7777@onemoney");
    }

    #[test]
    fn test_unknown_status_round_trips() {
        let s = ConsentStatus::from("SUSPENDED");
        assert_eq!(s, ConsentStatus::Other("SUSPENDED".to_string()));
        assert_eq!(serde_json::to_value(&s).unwrap(), json!("SUSPENDED"));
    }

    #[test]
    fn test_duration_value_accepts_number() {
        let d: ConsentDuration = serde_json::from_value(json!({ "unit": "MONTH", "value": 2 })).unwrap();
        assert_eq!(d.value, "2");
    }

    #[test]
    fn test_display_label() {
        let mut rec = ConsentRecord::new("abcdef123456");
        assert_eq!(rec.display_label(), "Consent ID: abcdef12...");
        rec.counterparty_handle = "9999999999@onemoney".to_string();
        assert_eq!(rec.display_label(), "9999999999 (onemoney)");
    }
}
