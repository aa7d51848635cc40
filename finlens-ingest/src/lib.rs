//! finlens-ingest: normalization of loosely-shaped transaction feeds.

pub mod currency;
pub mod normalize;
pub mod types;

pub use currency::{currency_symbol, format_currency};
pub use normalize::{Normalizer, normalize, normalize_payload, parse_amount};
pub use types::records_from_payload;
