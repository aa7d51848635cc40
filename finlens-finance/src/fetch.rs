//! Multi-account fetching for the dashboard.
//!
//! Accounts are fetched concurrently. A failed account is logged and contributes
//! nothing; the rest still make it to the aggregator.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use finlens_core::{ConsentRecord, Transaction};
use futures_util::future::join_all;
use tracing::{debug, warn};

use crate::aggregator::{DashboardStats, Window, aggregate};
use crate::api::TransactionSource;

/// Which accounts the dashboard covers
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum AccountSelection {
    #[default]
    All,
    Single(String),
}

impl AccountSelection {
    /// Consent ids to fetch. `All` means every active consent, in store order. A
    /// single id that is not among `active` selects nothing.
    pub fn consent_ids(&self, active: &[&ConsentRecord]) -> Vec<String> {
        match self {
            AccountSelection::All => active.iter().map(|c| c.id.clone()).collect(),
            AccountSelection::Single(id) => {
                if active.iter().any(|c| &c.id == id) {
                    vec![id.clone()]
                } else {
                    debug!(consent_id = %id, "selected consent is not active");
                    Vec::new()
                }
            }
        }
    }
}

impl std::str::FromStr for AccountSelection {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() || s.eq_ignore_ascii_case("all") {
            Ok(AccountSelection::All)
        } else {
            Ok(AccountSelection::Single(s.to_string()))
        }
    }
}

/// Fetch every account concurrently. The output has one entry per id, in order;
/// failed accounts come back empty.
pub async fn fetch_accounts<S>(source: &S, consent_ids: &[String]) -> Vec<Vec<Transaction>>
where
    S: TransactionSource + ?Sized,
{
    let fetches = consent_ids.iter().map(|id| async move {
        match source.fetch_transactions(id).await {
            Ok(txns) => {
                debug!(consent_id = %id, count = txns.len(), "fetched account");
                txns
            }
            Err(e) => {
                warn!(consent_id = %id, error = %e, "account fetch failed, excluding it");
                Vec::new()
            }
        }
    });
    join_all(fetches).await
}

/// Loads dashboard data, dropping results that a newer load has superseded.
pub struct DashboardLoader<S> {
    source: S,
    generation: AtomicU64,
}

impl<S: TransactionSource> DashboardLoader<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            generation: AtomicU64::new(0),
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Per-account transactions, or `None` if another load started meanwhile
    pub async fn load(&self, consent_ids: &[String]) -> Option<Vec<Vec<Transaction>>> {
        let ticket = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let accounts = fetch_accounts(&self.source, consent_ids).await;
        if self.generation.load(Ordering::SeqCst) != ticket {
            debug!(ticket, "discarding superseded dashboard load");
            return None;
        }
        Some(accounts)
    }

    pub async fn load_stats(
        &self,
        consent_ids: &[String],
        window: Window,
        now: DateTime<Utc>,
        tz: Tz,
    ) -> Option<DashboardStats> {
        let accounts = self.load(consent_ids).await?;
        Some(aggregate(&accounts, window, now, tz))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ApiError, ApiResult};
    use async_trait::async_trait;
    use finlens_core::{ConsentStatus, Direction};
    use std::sync::Arc;
    use tokio::sync::Notify;

    struct FakeSource {
        gate: Arc<Notify>,
    }

    impl FakeSource {
        fn new() -> Self {
            Self {
                gate: Arc::new(Notify::new()),
            }
        }
    }

    #[async_trait]
    impl TransactionSource for FakeSource {
        async fn fetch_transactions(&self, consent_id: &str) -> ApiResult<Vec<Transaction>> {
            match consent_id {
                "a" => Ok(vec![
                    Transaction::new(100.0, Direction::Credit),
                    Transaction::new(40.0, Direction::Debit),
                ]),
                "b" => Ok(vec![Transaction::new(7.0, Direction::Debit)]),
                "slow" => {
                    self.gate.notified().await;
                    Ok(vec![Transaction::new(1.0, Direction::Credit)])
                }
                _ => Err(ApiError::InvalidResponse {
                    operation: "transaction fetch",
                    message: "boom".to_string(),
                }),
            }
        }
    }

    fn ids(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_fetch_keeps_order_and_isolates_failures() {
        let source = FakeSource::new();
        let accounts = fetch_accounts(&source, &ids(&["b", "broken", "a"])).await;
        assert_eq!(accounts.len(), 3);
        assert_eq!(accounts[0].len(), 1);
        assert!(accounts[1].is_empty());
        assert_eq!(accounts[2].len(), 2);
    }

    #[tokio::test]
    async fn test_partial_failure_matches_successful_account() {
        let loader = DashboardLoader::new(FakeSource::new());
        let now = Utc::now();
        let tz = chrono_tz::UTC;
        let mixed = loader
            .load_stats(&ids(&["a", "broken"]), Window::Weekly, now, tz)
            .await
            .unwrap();
        let alone = loader
            .load_stats(&ids(&["a"]), Window::Weekly, now, tz)
            .await
            .unwrap();
        assert_eq!(mixed.total_income, alone.total_income);
        assert_eq!(mixed.total_spending, alone.total_spending);
        assert_eq!(mixed.transaction_count, 2);
    }

    #[tokio::test]
    async fn test_superseded_load_is_discarded() {
        let loader = DashboardLoader::new(FakeSource::new());
        let gate = loader.source().gate.clone();

        let slow = ids(&["slow"]);
        let fast = ids(&["b"]);
        let first = loader.load(&slow);
        let second = async {
            let result = loader.load(&fast).await;
            gate.notify_one();
            result
        };
        let (first, second) = tokio::join!(first, second);

        assert!(first.is_none());
        assert_eq!(second.unwrap()[0].len(), 1);
    }

    #[tokio::test]
    async fn test_empty_selection() {
        let loader = DashboardLoader::new(FakeSource::new());
        let stats = loader
            .load_stats(&[], Window::Monthly, Utc::now(), chrono_tz::UTC)
            .await
            .unwrap();
        assert_eq!(stats.transaction_count, 0);
        assert_eq!(stats.spending_trend.len(), 30);
    }

    #[test]
    fn test_selection() {
        let mut active = ConsentRecord::new("c1");
        active.status = ConsentStatus::Active;
        let other = ConsentRecord::new("c2");
        let records = vec![&active, &other];

        assert_eq!(AccountSelection::All.consent_ids(&records), ids(&["c1", "c2"]));
        assert_eq!(
            AccountSelection::Single("c2".into()).consent_ids(&records),
            ids(&["c2"])
        );

        let only_active = vec![&active];
        assert_eq!(
            AccountSelection::Single("c2".into()).consent_ids(&only_active),
            Vec::<String>::new()
        );
        assert!(AccountSelection::Single("x".into()).consent_ids(&records).is_empty());
        assert_eq!("ALL".parse::<AccountSelection>().unwrap(), AccountSelection::All);
        assert_eq!(
            "c9".parse::<AccountSelection>().unwrap(),
            AccountSelection::Single("c9".into())
        );
    }
}
