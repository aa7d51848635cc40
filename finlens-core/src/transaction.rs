//! Canonical transaction types produced by the normalizer

use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

/// A transaction after normalization. Downstream code never sees raw payloads.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Transaction {
    /// Source identifier, when the feed carries one
    pub id: Option<String>,
    /// Non-negative magnitude; the sign lives in `direction`
    pub amount: f64,
    pub direction: Direction,
    /// `None` when no source field held a parseable date
    pub timestamp: Option<Timestamp>,
    /// Merchant / VPA / account reference, best effort
    pub counterparty: String,
    pub narration: String,
    /// Payment rail (UPI, NEFT, card, ...)
    pub mode: String,
    /// Settlement status as reported by the feed
    pub status: String,
    pub reference: Option<String>,
    /// Raw currency code or symbol, if present
    pub currency: Option<String>,
}

/// Whether a transaction adds to or takes from the balance
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Direction {
    #[serde(rename = "CREDIT")]
    Credit,
    #[serde(rename = "DEBIT")]
    Debit,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Credit => "CREDIT",
            Direction::Debit => "DEBIT",
        }
    }

    /// Sign used when rendering amounts
    pub fn sign(&self) -> char {
        match self {
            Direction::Credit => '+',
            Direction::Debit => '-',
        }
    }
}

/// When a transaction happened. Feeds send either a bare date or a full instant.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum Timestamp {
    Date(NaiveDate),
    Instant(DateTime<Utc>),
}

impl Timestamp {
    /// Calendar day in `tz`. Bare dates are taken as already local.
    pub fn local_date(&self, tz: Tz) -> NaiveDate {
        match self {
            Timestamp::Date(d) => *d,
            Timestamp::Instant(dt) => dt.with_timezone(&tz).date_naive(),
        }
    }
}

/// Spending categories assigned to debits
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Category {
    #[serde(rename = "upi-payments")]
    UpiPayments,
    #[serde(rename = "transfers")]
    Transfers,
    #[serde(rename = "card-spend")]
    CardSpend,
    #[serde(rename = "cash-withdrawal")]
    CashWithdrawal,
    #[serde(rename = "bank-charges-interest")]
    BankChargesInterest,
    #[serde(rename = "food-dining")]
    FoodDining,
    #[serde(rename = "transport")]
    Transport,
    #[serde(rename = "others")]
    Others,
}

impl Category {
    pub const ALL: [Category; 8] = [
        Category::UpiPayments,
        Category::Transfers,
        Category::CardSpend,
        Category::CashWithdrawal,
        Category::BankChargesInterest,
        Category::FoodDining,
        Category::Transport,
        Category::Others,
    ];

    /// Display name
    pub fn label(&self) -> &'static str {
        match self {
            Category::UpiPayments => "UPI Payments",
            Category::Transfers => "Transfers",
            Category::CardSpend => "Card Spend",
            Category::CashWithdrawal => "Cash Withdrawal",
            Category::BankChargesInterest => "Bank Charges/Interest",
            Category::FoodDining => "Food & Dining",
            Category::Transport => "Transport",
            Category::Others => "Others",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

impl Transaction {
    /// A credit with every text field at its fallback value
    pub fn new(amount: f64, direction: Direction) -> Self {
        Self {
            id: None,
            amount,
            direction,
            timestamp: None,
            counterparty: "Account Unknown".to_string(),
            narration: String::new(),
            mode: "Payment".to_string(),
            status: "Success".to_string(),
            reference: None,
            currency: None,
        }
    }

    pub fn with_narration(mut self, narration: impl Into<String>) -> Self {
        self.narration = narration.into();
        self
    }

    pub fn with_mode(mut self, mode: impl Into<String>) -> Self {
        self.mode = mode.into();
        self
    }

    pub fn with_timestamp(mut self, timestamp: Timestamp) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn with_date(self, date: NaiveDate) -> Self {
        self.with_timestamp(Timestamp::Date(date))
    }

    pub fn is_debit(&self) -> bool {
        self.direction == Direction::Debit
    }

    pub fn is_credit(&self) -> bool {
        self.direction == Direction::Credit
    }

    /// Amount with the direction applied (debits negative)
    pub fn signed_amount(&self) -> f64 {
        match self.direction {
            Direction::Credit => self.amount,
            Direction::Debit => -self.amount,
        }
    }

    /// The timestamp to show; undated transactions display as `now`
    pub fn display_time(&self, now: DateTime<Utc>) -> Timestamp {
        self.timestamp.unwrap_or(Timestamp::Instant(now))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_signed_amount() {
        let debit = Transaction::new(30.0, Direction::Debit);
        let credit = Transaction::new(100.0, Direction::Credit);
        assert_eq!(debit.signed_amount(), -30.0);
        assert_eq!(credit.signed_amount(), 100.0);
        assert!(debit.is_debit());
        assert!(credit.is_credit());
    }

    #[test]
    fn test_local_date_crosses_midnight() {
        // 20:00 UTC on Jan 5 is already Jan 6 in Kolkata (UTC+5:30)
        let instant = Utc.with_ymd_and_hms(2024, 1, 5, 20, 0, 0).unwrap();
        let ts = Timestamp::Instant(instant);
        assert_eq!(
            ts.local_date(chrono_tz::Asia::Kolkata),
            NaiveDate::from_ymd_opt(2024, 1, 6).unwrap()
        );
        assert_eq!(
            ts.local_date(chrono_tz::UTC),
            NaiveDate::from_ymd_opt(2024, 1, 5).unwrap()
        );
    }

    #[test]
    fn test_bare_date_ignores_timezone() {
        let d = NaiveDate::from_ymd_opt(2024, 1, 5).unwrap();
        let ts = Timestamp::Date(d);
        assert_eq!(ts.local_date(chrono_tz::America::Chicago), d);
    }

    #[test]
    fn test_category_labels_are_distinct() {
        let labels: std::collections::HashSet<_> = Category::ALL.iter().map(|c| c.label()).collect();
        assert_eq!(labels.len(), 8);
        assert_eq!(Category::BankChargesInterest.to_string(), "Bank Charges/Interest");
    }

    #[test]
    fn test_direction_serde() {
        let json = serde_json::to_string(&Direction::Debit).unwrap();
        assert_eq!(json, "\"DEBIT\"");
    }

    #[test]
    fn test_undated_displays_as_now() {
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap();
        let t = Transaction::new(5.0, Direction::Debit);
        assert_eq!(t.display_time(now), Timestamp::Instant(now));
    }
}
