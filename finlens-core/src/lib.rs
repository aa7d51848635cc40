//! finlens-core: canonical transaction and consent types, the durable store
//! boundary, and pagination.

pub mod consent;
pub mod consent_store;
pub mod paging;
pub mod session;
pub mod store;
pub mod time;
pub mod transaction;

pub use consent::{
    ConsentDuration, ConsentRecord, ConsentStatus, DataType, LinkedAccount, ValidityWindow,
};
pub use consent_store::{CONSENTS_KEY, ConsentStore, UNREADABLE_KEY};
pub use paging::{page_markers, page_slice, total_pages, PageMarker};
pub use session::{SessionStore, UserProfile};
pub use store::{DurableBackend, MemoryBackend};
pub use transaction::{Category, Direction, Timestamp, Transaction};
