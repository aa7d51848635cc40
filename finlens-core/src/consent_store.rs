//! Locally persisted collection of consent records.
//!
//! Records are kept newest first. Every mutation rewrites the whole array under
//! [`CONSENTS_KEY`] before returning. Nothing is removed implicitly: entries that
//! fail to decode are written back untouched, and a payload that is not an array
//! at all is copied to [`UNREADABLE_KEY`] before the first write replaces it.

use anyhow::{Context, Result};
use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::consent::{ConsentRecord, ConsentStatus};
use crate::store::DurableBackend;

/// Key holding the JSON array of consent records
pub const CONSENTS_KEY: &str = "setu_consents";

/// Key a non-array consent payload is moved to before it is overwritten
pub const UNREADABLE_KEY: &str = "setu_consents_unreadable";

pub struct ConsentStore<B: DurableBackend> {
    backend: B,
    records: Vec<ConsentRecord>,
    /// Array entries that did not decode, kept verbatim at the tail
    skipped: Vec<Value>,
    /// Whole payload that was not a JSON array, pending backup
    unreadable: Option<String>,
}

impl<B: DurableBackend> ConsentStore<B> {
    /// Read the persisted records. Entries that do not decode are left out of the
    /// list but kept for the next write; a payload that is not an array loads empty.
    pub fn load(backend: B) -> Result<Self> {
        let raw = backend.get(CONSENTS_KEY).context("read consent records")?;
        let mut records = Vec::new();
        let mut skipped = Vec::new();
        let mut unreadable = None;

        if let Some(s) = raw {
            match serde_json::from_str::<Value>(&s) {
                Ok(Value::Array(items)) => {
                    for item in items {
                        match serde_json::from_value::<ConsentRecord>(item.clone()) {
                            Ok(record) => records.push(record),
                            Err(e) => {
                                warn!("keeping undecodable consent record as is: {e}");
                                skipped.push(item);
                            }
                        }
                    }
                }
                Ok(_) => {
                    warn!("consent records are not a list, ignoring them");
                    unreadable = Some(s);
                }
                Err(e) => {
                    warn!("ignoring unreadable consent records: {e}");
                    unreadable = Some(s);
                }
            }
        }
        Ok(Self {
            backend,
            records,
            skipped,
            unreadable,
        })
    }

    pub fn all(&self) -> &[ConsentRecord] {
        &self.records
    }

    pub fn get(&self, id: &str) -> Option<&ConsentRecord> {
        self.records.iter().find(|r| r.id == id)
    }

    pub fn by_status(&self, status: &ConsentStatus) -> Vec<&ConsentRecord> {
        self.records.iter().filter(|r| &r.status == status).collect()
    }

    /// Consents whose accounts can be queried for transactions
    pub fn active(&self) -> Vec<&ConsentRecord> {
        self.by_status(&ConsentStatus::Active)
    }

    /// Add a record at the head of the list
    pub fn append(&mut self, record: ConsentRecord) -> Result<()> {
        info!(consent_id = %record.id, status = %record.status, "consent recorded");
        self.records.insert(0, record);
        self.persist()
    }

    /// Merge `patch` into the record with `id`, or insert a new record built from
    /// the patch when none matches. Returns the stored record.
    pub fn update_by_status(&mut self, id: &str, patch: &Map<String, Value>) -> Result<&ConsentRecord> {
        // The caller's id wins over any id inside the patch.
        let idx = match self.records.iter().position(|r| r.id == id) {
            Some(i) => {
                let mut merged = self.records[i]
                    .merged(patch)
                    .with_context(|| format!("merge consent {id}"))?;
                merged.id = id.to_string();
                self.records[i] = merged;
                i
            }
            None => {
                let mut fresh = ConsentRecord::new(id)
                    .merged(patch)
                    .with_context(|| format!("build consent {id}"))?;
                fresh.id = id.to_string();
                self.records.insert(0, fresh);
                0
            }
        };
        info!(consent_id = %id, status = %self.records[idx].status, "consent updated");
        self.persist()?;
        Ok(&self.records[idx])
    }

    /// Drop a record. Returns whether one was removed.
    pub fn remove(&mut self, id: &str) -> Result<bool> {
        let before = self.records.len();
        self.records.retain(|r| r.id != id);
        if self.records.len() == before {
            return Ok(false);
        }
        self.persist()?;
        Ok(true)
    }

    fn persist(&mut self) -> Result<()> {
        if let Some(raw) = &self.unreadable {
            self.backend
                .set(UNREADABLE_KEY, raw)
                .context("back up unreadable consent records")?;
            warn!(key = UNREADABLE_KEY, "unreadable consent records moved aside");
            self.unreadable = None;
        }

        let mut items = Vec::with_capacity(self.records.len() + self.skipped.len());
        for record in &self.records {
            items.push(serde_json::to_value(record).context("serialize consent record")?);
        }
        items.extend(self.skipped.iter().cloned());
        let json = serde_json::to_string(&items).context("serialize consent records")?;
        self.backend
            .set(CONSENTS_KEY, &json)
            .context("write consent records")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryBackend;
    use serde_json::json;

    fn patch(v: Value) -> Map<String, Value> {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn test_empty_backend_loads_empty() {
        let b = MemoryBackend::new();
        let store = ConsentStore::load(&b).unwrap();
        assert!(store.all().is_empty());
    }

    #[test]
    fn test_corrupt_data_loads_empty() {
        let b = MemoryBackend::new();
        b.set(CONSENTS_KEY, "{not json").unwrap();
        let store = ConsentStore::load(&b).unwrap();
        assert!(store.all().is_empty());
    }

    #[test]
    fn test_corrupt_data_backed_up_before_overwrite() {
        let b = MemoryBackend::new();
        b.set(CONSENTS_KEY, "{not json").unwrap();
        let mut store = ConsentStore::load(&b).unwrap();
        assert_eq!(b.get(UNREADABLE_KEY).unwrap(), None);

        store.append(ConsentRecord::new("c")).unwrap();
        assert_eq!(b.get(UNREADABLE_KEY).unwrap().as_deref(), Some("{not json"));
        assert_eq!(ConsentStore::load(&b).unwrap().all().len(), 1);
    }

    #[test]
    fn test_partial_data_range_survives_append() {
        let b = MemoryBackend::new();
        let stored = json!([
            { "id": "a", "status": "ACTIVE", "vua": "9999999999@onemoney" },
            { "id": "b", "dataRange": { "from": "2024-01-01T00:00:00Z" } }
        ]);
        b.set(CONSENTS_KEY, &stored.to_string()).unwrap();

        let mut store = ConsentStore::load(&b).unwrap();
        assert_eq!(store.all().len(), 2);
        store.append(ConsentRecord::new("c")).unwrap();

        let reloaded = ConsentStore::load(&b).unwrap();
        let ids: Vec<_> = reloaded.all().iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["c", "a", "b"]);
        assert_eq!(reloaded.get("a").unwrap().status, ConsentStatus::Active);
        let range = reloaded.get("b").unwrap().validity.clone().unwrap();
        assert!(range.from.is_some() && range.to.is_none());
    }

    #[test]
    fn test_undecodable_entry_written_back() {
        let b = MemoryBackend::new();
        let odd = json!({ "id": "x", "createdAt": "last tuesday" });
        let stored = json!([{ "id": "a", "status": "ACTIVE" }, odd.clone(), 7]);
        b.set(CONSENTS_KEY, &stored.to_string()).unwrap();

        let mut store = ConsentStore::load(&b).unwrap();
        assert_eq!(store.all().len(), 1);
        store.remove("a").unwrap();
        store.append(ConsentRecord::new("c")).unwrap();

        let raw: Value = serde_json::from_str(&b.get(CONSENTS_KEY).unwrap().unwrap()).unwrap();
        let items = raw.as_array().unwrap();
        assert_eq!(items.len(), 3);
        assert_eq!(items[0]["id"], "c");
        assert_eq!(items[1], odd);
        assert_eq!(items[2], json!(7));
    }

    #[test]
    fn test_null_nested_fields_merge() {
        let b = MemoryBackend::new();
        let mut store = ConsentStore::load(&b).unwrap();
        store.append(ConsentRecord::new("a")).unwrap();

        let rec = store
            .update_by_status(
                "a",
                &patch(json!({
                    "status": "ACTIVE",
                    "accountsLinked": [
                        { "fipId": "setu-fip", "accType": null, "maskedAccNumber": "XX1234", "fiType": "DEPOSIT" }
                    ]
                })),
            )
            .unwrap();
        assert_eq!(rec.status, ConsentStatus::Active);
        assert_eq!(rec.linked_accounts.len(), 1);
        assert_eq!(rec.linked_accounts[0].account_type, "");
    }

    #[test]
    fn test_append_persists_newest_first() {
        let b = MemoryBackend::new();
        let mut store = ConsentStore::load(&b).unwrap();
        store.append(ConsentRecord::new("a")).unwrap();
        store.append(ConsentRecord::new("b")).unwrap();

        let reloaded = ConsentStore::load(&b).unwrap();
        let ids: Vec<_> = reloaded.all().iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a"]);
    }

    #[test]
    fn test_update_unknown_id_inserts() {
        let b = MemoryBackend::new();
        let mut store = ConsentStore::load(&b).unwrap();
        store.append(ConsentRecord::new("a")).unwrap();

        let rec = store
            .update_by_status("new", &patch(json!({ "status": "ACTIVE" })))
            .unwrap();
        assert_eq!(rec.id, "new");
        assert_eq!(rec.status, ConsentStatus::Active);
        assert_eq!(store.all().len(), 2);
        assert_eq!(store.all()[0].id, "new");
    }

    #[test]
    fn test_update_known_id_merges() {
        let b = MemoryBackend::new();
        let mut store = ConsentStore::load(&b).unwrap();
        let mut rec = ConsentRecord::new("a");
        rec.counterparty_handle = "9999999999@onemoney".to_string();
        rec.url = Some("https://aa.example/consent/a".to_string());
        store.append(rec).unwrap();

        store
            .update_by_status("a", &patch(json!({ "status": "REJECTED" })))
            .unwrap();

        let reloaded = ConsentStore::load(&b).unwrap();
        let a = reloaded.get("a").unwrap();
        assert_eq!(a.status, ConsentStatus::Rejected);
        assert_eq!(a.counterparty_handle, "9999999999@onemoney");
        assert_eq!(a.url.as_deref(), Some("https://aa.example/consent/a"));
        assert_eq!(reloaded.all().len(), 1);
    }

    #[test]
    fn test_patch_id_cannot_rename_record() {
        let b = MemoryBackend::new();
        let mut store = ConsentStore::load(&b).unwrap();
        let rec = store
            .update_by_status("x", &patch(json!({ "id": "other", "status": "ACTIVE" })))
            .unwrap();
        assert_eq!(rec.id, "x");
    }

    #[test]
    fn test_filter_by_status_and_remove() {
        let b = MemoryBackend::new();
        let mut store = ConsentStore::load(&b).unwrap();
        let mut active = ConsentRecord::new("a");
        active.status = ConsentStatus::Active;
        store.append(active).unwrap();
        store.append(ConsentRecord::new("p")).unwrap();

        assert_eq!(store.active().len(), 1);
        assert_eq!(store.by_status(&ConsentStatus::Pending).len(), 1);

        assert!(store.remove("a").unwrap());
        assert!(!store.remove("a").unwrap());
        assert!(ConsentStore::load(&b).unwrap().active().is_empty());
    }
}
