//! Dashboard statistics derived from one or more accounts' transactions.
//!
//! Stats are always recomputed from scratch over the full input.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use chrono_tz::Tz;
use finlens_core::time::{days_between, today_in};
use finlens_core::{Category, Direction, Transaction};
use serde::{Deserialize, Serialize};

use crate::category_rules::categorize;

/// How many expenses the "most spent" list keeps
pub const TOP_EXPENSES: usize = 5;

/// Latest data this close to today (in days) anchors the trend at today
pub const ANCHOR_GRACE_DAYS: i64 = 2;

/// Trailing window for the trend series
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Window {
    #[default]
    Weekly,
    Monthly,
}

impl Window {
    pub fn buckets(&self) -> usize {
        match self {
            Window::Weekly => 7,
            Window::Monthly => 30,
        }
    }

    fn label(&self, day: NaiveDate) -> String {
        match self {
            Window::Weekly => day.format("%a").to_string(),
            Window::Monthly => day.format("%d %b").to_string(),
        }
    }
}

impl std::str::FromStr for Window {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "weekly" | "week" | "7" => Ok(Window::Weekly),
            "monthly" | "month" | "30" => Ok(Window::Monthly),
            other => Err(format!("unknown window '{other}' (expected weekly or monthly)")),
        }
    }
}

/// One calendar day of the trend series
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendBucket {
    pub date: NaiveDate,
    pub label: String,
    pub income: f64,
    pub expense: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryTotal {
    pub category: Category,
    pub total: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardStats {
    pub total_income: f64,
    pub total_spending: f64,
    pub net_savings: f64,
    pub transaction_count: usize,
    /// `None` when nothing was spent
    pub top_spending_category: Option<Category>,
    /// Debit totals per category, in the order categories were first seen
    pub category_totals: Vec<CategoryTotal>,
    pub spending_trend: Vec<TrendBucket>,
    pub top_expenses: Vec<Transaction>,
    pub window: Window,
    /// Last day of the trend series
    pub anchor: NaiveDate,
}

impl DashboardStats {
    pub fn top_category_label(&self) -> &'static str {
        self.top_spending_category.map(|c| c.label()).unwrap_or("None")
    }
}

/// Compute stats over every account's transactions. `now` and `tz` decide what
/// "today" is for the trend series.
pub fn aggregate(
    accounts: &[Vec<Transaction>],
    window: Window,
    now: DateTime<Utc>,
    tz: Tz,
) -> DashboardStats {
    let all: Vec<&Transaction> = accounts.iter().flatten().collect();

    let mut income = 0.0;
    let mut spending = 0.0;
    let mut category_totals: Vec<CategoryTotal> = Vec::new();

    for t in &all {
        match t.direction {
            Direction::Credit => income += t.amount,
            Direction::Debit => spending += t.amount,
        }
        if let Some(category) = categorize(t) {
            match category_totals.iter_mut().find(|c| c.category == category) {
                Some(entry) => entry.total += t.amount,
                None => category_totals.push(CategoryTotal {
                    category,
                    total: t.amount,
                }),
            }
        }
    }

    let anchor = trend_anchor(&all, now, tz);

    DashboardStats {
        total_income: income,
        total_spending: spending,
        net_savings: income - spending,
        transaction_count: all.len(),
        top_spending_category: top_category(&category_totals),
        spending_trend: trend(&all, window, anchor, tz),
        top_expenses: top_expenses(&all, TOP_EXPENSES),
        category_totals,
        window,
        anchor,
    }
}

/// Strict argmax over positive totals; the first category seen wins ties
fn top_category(totals: &[CategoryTotal]) -> Option<Category> {
    let mut best: Option<&CategoryTotal> = None;
    for entry in totals {
        let current = best.map(|b| b.total).unwrap_or(0.0);
        if entry.total > current {
            best = Some(entry);
        }
    }
    best.map(|b| b.category)
}

/// Day the trend ends on: the latest transaction date, unless the feed is current
/// (latest within the grace period, or in the future), in which case today.
/// A latest date with no room for a full series before it also falls back to today.
pub fn trend_anchor(txns: &[&Transaction], now: DateTime<Utc>, tz: Tz) -> NaiveDate {
    let today = today_in(now, tz);
    let latest = txns
        .iter()
        .filter_map(|t| t.timestamp.map(|ts| ts.local_date(tz)))
        .max();
    match latest {
        Some(latest)
            if days_between(latest, today) > ANCHOR_GRACE_DAYS
                && series_start(latest, Window::Monthly.buckets()).is_some() =>
        {
            latest
        }
        _ => today,
    }
}

/// First day of an `n`-day series ending on `anchor`
fn series_start(anchor: NaiveDate, n: usize) -> Option<NaiveDate> {
    anchor.checked_sub_signed(Duration::days(n.saturating_sub(1) as i64))
}

fn trend(txns: &[&Transaction], window: Window, anchor: NaiveDate, tz: Tz) -> Vec<TrendBucket> {
    let n = window.buckets();
    let Some(start) = series_start(anchor, n) else {
        return Vec::new();
    };
    let mut buckets: Vec<TrendBucket> = start
        .iter_days()
        .take(n)
        .map(|date| TrendBucket {
            date,
            label: window.label(date),
            income: 0.0,
            expense: 0.0,
        })
        .collect();

    for t in txns {
        let Some(ts) = t.timestamp else { continue };
        let diff = days_between(ts.local_date(tz), anchor);
        if diff < 0 || diff >= n as i64 {
            continue;
        }
        let bucket = &mut buckets[n - 1 - diff as usize];
        match t.direction {
            Direction::Credit => bucket.income += t.amount,
            Direction::Debit => bucket.expense += t.amount,
        }
    }
    buckets
}

/// Largest debits first; equal amounts keep their input order
pub fn top_expenses(txns: &[&Transaction], limit: usize) -> Vec<Transaction> {
    let mut debits: Vec<&Transaction> = txns.iter().copied().filter(|t| t.is_debit()).collect();
    debits.sort_by(|a, b| b.amount.total_cmp(&a.amount));
    debits.into_iter().take(limit).cloned().collect()
}
