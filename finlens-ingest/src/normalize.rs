//! Turn loosely-shaped transaction records into [`Transaction`]s.
//!
//! Normalization never fails. Missing or malformed fields fall back to defaults:
//! amount 0, direction credit, no timestamp, mode "Payment", status "Success".

use std::sync::OnceLock;

use chrono_tz::Tz;
use finlens_core::time::{DEFAULT_TZ, from_epoch, parse_timestamp};
use finlens_core::{Direction, Timestamp, Transaction};
use regex::Regex;
use serde_json::Value;
use tracing::debug;

use crate::types::*;

fn amount_noise_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^0-9.\-]").expect("amount noise regex"))
}

/// Normalizer reading naive date-times in a fixed zone
#[derive(Debug, Clone, Copy)]
pub struct Normalizer {
    tz: Tz,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self { tz: DEFAULT_TZ }
    }
}

impl Normalizer {
    pub fn new(tz: Tz) -> Self {
        Self { tz }
    }

    pub fn normalize(&self, record: &Value) -> Transaction {
        let raw_amount = first_present(record, AMOUNT_FIELDS);
        let signed = raw_amount.map(parse_amount).unwrap_or(0.0);
        let id = first_text(record, ID_FIELDS);

        Transaction {
            amount: signed.abs(),
            direction: direction_of(record, raw_amount, signed),
            timestamp: first_present(record, TIMESTAMP_FIELDS).and_then(|v| self.timestamp_of(v)),
            counterparty: counterparty_of(record, id.as_deref()),
            narration: first_text(record, NARRATION_FIELDS).unwrap_or_default(),
            mode: first_text(record, MODE_FIELDS).unwrap_or_else(|| DEFAULT_MODE.to_string()),
            status: first_text(record, STATUS_FIELDS).unwrap_or_else(|| DEFAULT_STATUS.to_string()),
            reference: first_text(record, REFERENCE_FIELDS),
            currency: first_text(record, CURRENCY_FIELDS),
            id,
        }
    }

    /// Unwrap a transactions response and normalize every record in it
    pub fn normalize_payload(&self, payload: &Value) -> Vec<Transaction> {
        let records = records_from_payload(payload);
        debug!(count = records.len(), "normalizing transaction payload");
        records.iter().map(|r| self.normalize(r)).collect()
    }

    fn timestamp_of(&self, value: &Value) -> Option<Timestamp> {
        match value {
            Value::String(s) => parse_timestamp(s, self.tz),
            Value::Number(n) => n.as_f64().and_then(from_epoch),
            _ => None,
        }
    }
}

/// Normalize with the default zone
pub fn normalize(record: &Value) -> Transaction {
    Normalizer::default().normalize(record)
}

pub fn normalize_payload(payload: &Value) -> Vec<Transaction> {
    Normalizer::default().normalize_payload(payload)
}

/// Signed numeric value of a raw amount. Strings lose every character other than
/// digits, '.', and '-'; whatever does not then parse as a finite number is 0.
pub fn parse_amount(value: &Value) -> f64 {
    let parsed = match value {
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::String(s) => amount_noise_re()
            .replace_all(s, "")
            .parse::<f64>()
            .unwrap_or(0.0),
        _ => 0.0,
    };
    if parsed.is_finite() { parsed } else { 0.0 }
}

fn direction_of(record: &Value, raw_amount: Option<&Value>, signed: f64) -> Direction {
    if let Some(d) = first_text(record, TYPE_FIELDS).and_then(|t| direction_code(&t)) {
        return d;
    }
    if let Some(d) = first_text(record, DR_CR_FIELDS).and_then(|t| direction_code(&t)) {
        return d;
    }
    let leading_minus = matches!(raw_amount, Some(Value::String(s)) if s.trim_start().starts_with('-'));
    if leading_minus || signed < 0.0 {
        Direction::Debit
    } else {
        Direction::Credit
    }
}

fn direction_code(code: &str) -> Option<Direction> {
    match code.trim().to_ascii_uppercase().as_str() {
        "DEBIT" | "DR" | "D" => Some(Direction::Debit),
        "CREDIT" | "CR" | "C" => Some(Direction::Credit),
        _ => None,
    }
}

fn counterparty_of(record: &Value, id: Option<&str>) -> String {
    if let Some(c) = first_text(record, COUNTERPARTY_FIELDS) {
        return c;
    }
    match id {
        Some(id) => {
            let n = id.chars().count();
            let tail: String = id.chars().skip(n.saturating_sub(4)).collect();
            format!("Account {tail}")
        }
        None => "Account Unknown".to_string(),
    }
}
