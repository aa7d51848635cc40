//! Deterministic category rules for debits.
//!
//! Rules are checked in order and the first match wins. Order matters more than
//! specificity: a UPI payment to a food-delivery app is a UPI payment.

use finlens_core::{Category, Transaction};

/// Lower-cased text a rule looks at
#[derive(Debug, Clone)]
pub struct RuleInput {
    pub narration: String,
    pub mode: String,
}

impl RuleInput {
    pub fn new(narration: &str, mode: &str) -> Self {
        Self {
            narration: narration.to_lowercase(),
            mode: mode.to_lowercase(),
        }
    }

    fn narration_has(&self, words: &[&str]) -> bool {
        words.iter().any(|w| self.narration.contains(w))
    }

    fn mode_has(&self, words: &[&str]) -> bool {
        words.iter().any(|w| self.mode.contains(w))
    }
}

/// One entry of the ordered rule list
pub struct Rule {
    pub category: Category,
    pub matches: fn(&RuleInput) -> bool,
}

pub const FOOD_TOKENS: &[&str] = &["food", "zomato", "swiggy"];
pub const TRANSPORT_TOKENS: &[&str] = &["uber", "ola", "fuel"];

pub const RULES: &[Rule] = &[
    Rule {
        category: Category::UpiPayments,
        matches: |t| t.mode_has(&["upi"]) || t.narration_has(&["upi"]),
    },
    Rule {
        category: Category::Transfers,
        matches: |t| t.mode_has(&["imps", "neft", "rtgs"]),
    },
    Rule {
        category: Category::CardSpend,
        matches: |t| t.mode_has(&["card"]) || t.narration_has(&["pos", "visa", "mastercard"]),
    },
    Rule {
        category: Category::CashWithdrawal,
        matches: |t| t.mode_has(&["atm"]) || t.narration_has(&["atm", "withdraw"]),
    },
    Rule {
        category: Category::BankChargesInterest,
        matches: |t| t.narration_has(&["interest"]),
    },
    Rule {
        category: Category::FoodDining,
        matches: |t| t.narration_has(FOOD_TOKENS),
    },
    Rule {
        category: Category::Transport,
        matches: |t| t.narration_has(TRANSPORT_TOKENS),
    },
];

/// Category for a debit's narration and mode. Falls back to Others.
pub fn categorize_text(narration: &str, mode: &str) -> Category {
    let input = RuleInput::new(narration, mode);
    RULES
        .iter()
        .find(|r| (r.matches)(&input))
        .map(|r| r.category)
        .unwrap_or(Category::Others)
}

/// Category for a transaction; credits are never categorized
pub fn categorize(txn: &Transaction) -> Option<Category> {
    if !txn.is_debit() {
        return None;
    }
    Some(categorize_text(&txn.narration, &txn.mode))
}
