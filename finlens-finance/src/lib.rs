//! finlens-finance: categorization, dashboard aggregation, backend client, and consent flows

pub mod aggregator;
pub mod api;
pub mod category_rules;
pub mod consent_flow;
pub mod error;
pub mod export;
pub mod fetch;

pub use aggregator::{CategoryTotal, DashboardStats, TrendBucket, Window, aggregate};
pub use api::{BackendClient, ConsentApi, ConsentCreated, TransactionSource};
pub use category_rules::{categorize, categorize_text};
pub use consent_flow::{
    ConsentForm, ConsentRequest, DurableLocation, FormError, Location, RedirectOutcome,
    RequestSettings, complete_redirect, create_consent, refresh_consent,
};
pub use error::{ApiError, ApiResult};
pub use export::{export_csv, write_csv};
pub use fetch::{AccountSelection, DashboardLoader, fetch_accounts};
