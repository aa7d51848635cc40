//! Consent lifecycle as seen from this client: build a request from the form,
//! create it, and pick up the result when the authorization page redirects back.

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use finlens_core::{
    ConsentDuration, ConsentRecord, ConsentStatus, ConsentStore, DataType, DurableBackend,
    ValidityWindow,
};
use reqwest::Url;
use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{info, warn};

use crate::api::ConsentApi;
use crate::error::ApiError;

/// Durable key holding the current location
pub const LOCATION_KEY: &str = "location";

pub const DEFAULT_AA_HANDLE: &str = "onemoney";

#[derive(Error, Debug, PartialEq, Eq)]
pub enum FormError {
    #[error("Mobile number is required")]
    MissingMobileNumber,
    #[error("Select at least one data type")]
    NoDataTypes,
    #[error("Start date {from} is after end date {to}")]
    InvertedRange { from: NaiveDate, to: NaiveDate },
    #[error("Consent duration must be positive")]
    ZeroDuration,
}

/// Where requests point: the aggregator handle and the origin to return to
#[derive(Debug, Clone)]
pub struct RequestSettings {
    pub aa_handle: String,
    pub redirect_origin: String,
}

impl RequestSettings {
    pub fn redirect_url(&self) -> String {
        format!("{}/dashboard", self.redirect_origin.trim_end_matches('/'))
    }
}

/// What the user fills in to request a consent
#[derive(Debug, Clone)]
pub struct ConsentForm {
    pub mobile_number: String,
    pub duration_unit: String,
    pub duration_value: u32,
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub data_types: Vec<DataType>,
}

impl Default for ConsentForm {
    fn default() -> Self {
        Self {
            mobile_number: String::new(),
            duration_unit: "MONTH".to_string(),
            duration_value: 2,
            from: NaiveDate::from_ymd_opt(2022, 1, 1).unwrap_or_default(),
            to: NaiveDate::from_ymd_opt(2024, 1, 24).unwrap_or_default(),
            data_types: DataType::ALL.to_vec(),
        }
    }
}

impl ConsentForm {
    pub fn to_request(&self, settings: &RequestSettings) -> Result<ConsentRequest, FormError> {
        let mobile = self.mobile_number.trim();
        if mobile.is_empty() {
            return Err(FormError::MissingMobileNumber);
        }
        if self.data_types.is_empty() {
            return Err(FormError::NoDataTypes);
        }
        if self.from > self.to {
            return Err(FormError::InvertedRange {
                from: self.from,
                to: self.to,
            });
        }
        if self.duration_value == 0 {
            return Err(FormError::ZeroDuration);
        }
        let mut consent_types = Vec::new();
        for t in &self.data_types {
            if !consent_types.contains(t) {
                consent_types.push(*t);
            }
        }
        Ok(ConsentRequest {
            consent_duration: ConsentDuration {
                unit: self.duration_unit.to_ascii_uppercase(),
                value: self.duration_value.to_string(),
            },
            vua: format!("{mobile}@{}", settings.aa_handle),
            data_range: ValidityWindow::new(start_of_day(self.from), start_of_day(self.to)),
            consent_types,
            context: Vec::new(),
            redirect_url: settings.redirect_url(),
        })
    }
}

fn start_of_day(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(chrono::NaiveTime::MIN).and_utc()
}

/// Body of a consent creation call
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ConsentRequest {
    pub consent_duration: ConsentDuration,
    pub vua: String,
    pub data_range: ValidityWindow,
    pub consent_types: Vec<DataType>,
    pub context: Vec<Value>,
    pub redirect_url: String,
}

/// Create a consent and record it locally, newest first. The returned record
/// carries the authorization url when the backend supplied one.
pub async fn create_consent<A, B>(
    api: &A,
    token: Option<&str>,
    store: &mut ConsentStore<B>,
    request: &ConsentRequest,
    now: DateTime<Utc>,
) -> Result<ConsentRecord>
where
    A: ConsentApi + ?Sized,
    B: DurableBackend,
{
    let created = api.create_consent(token, request).await?;

    let mut record = ConsentRecord::new(created.id);
    record.status = created
        .status
        .as_deref()
        .map(ConsentStatus::from)
        .unwrap_or_default();
    record.url = created.url;
    record.extra = created.extra;
    record.counterparty_handle = request.vua.clone();
    record.validity = Some(request.data_range.clone());
    record.consent_duration = Some(request.consent_duration.clone());
    record.requested_data_types = request.consent_types.clone();
    record.created_at = Some(now);

    store.append(record.clone())?;
    Ok(record)
}

/// Where the user currently is; the authorization page redirects here with
/// `?success=true&id=<consent>`
pub trait Location {
    fn current(&self) -> Result<Option<String>>;
    fn replace(&self, url: &str) -> Result<()>;
}

/// Location kept in the durable store under [`LOCATION_KEY`]
pub struct DurableLocation<B: DurableBackend> {
    backend: B,
}

impl<B: DurableBackend> DurableLocation<B> {
    pub fn new(backend: B) -> Self {
        Self { backend }
    }
}

impl<B: DurableBackend> Location for DurableLocation<B> {
    fn current(&self) -> Result<Option<String>> {
        self.backend.get(LOCATION_KEY)
    }

    fn replace(&self, url: &str) -> Result<()> {
        self.backend.set(LOCATION_KEY, url)
    }
}

#[derive(Debug)]
pub enum RedirectOutcome {
    /// The location carried no successful redirect
    Nothing,
    Refreshed(ConsentRecord),
    /// The status fetch failed; the location was still cleaned up
    Failed { consent_id: String, error: ApiError },
}

/// Handle a redirect back from the authorization page, at most once per redirect.
///
/// With `success=true` and an `id` in the query, the consent's status is fetched
/// once and upserted into the store. Those two parameters are then removed from the
/// location whether or not the fetch worked.
pub async fn complete_redirect<A, B, L>(
    api: &A,
    token: Option<&str>,
    store: &mut ConsentStore<B>,
    location: &L,
    now: DateTime<Utc>,
) -> Result<RedirectOutcome>
where
    A: ConsentApi + ?Sized,
    B: DurableBackend,
    L: Location + ?Sized,
{
    let Some(current) = location.current()? else {
        return Ok(RedirectOutcome::Nothing);
    };
    let mut url = match Url::parse(&current) {
        Ok(url) => url,
        Err(e) => {
            warn!(location = %current, "ignoring unparseable location: {e}");
            return Ok(RedirectOutcome::Nothing);
        }
    };

    let mut success = false;
    let mut consent_id = None;
    for (key, value) in url.query_pairs() {
        match &*key {
            "success" => success = value == "true",
            "id" if !value.is_empty() => consent_id = Some(value.into_owned()),
            _ => {}
        }
    }
    let Some(consent_id) = consent_id.filter(|_| success) else {
        return Ok(RedirectOutcome::Nothing);
    };

    let outcome = match api.consent_status(token, &consent_id).await {
        Ok(status) => {
            upsert_confirmed(store, &consent_id, status, now).map(RedirectOutcome::Refreshed)
        }
        Err(error) => {
            warn!(consent_id = %consent_id, error = %error, "consent status refresh failed");
            Ok(RedirectOutcome::Failed { consent_id, error })
        }
    };

    strip_redirect_params(&mut url);
    location
        .replace(url.as_str())
        .context("clear redirect parameters")?;
    if let Ok(RedirectOutcome::Refreshed(record)) = &outcome {
        info!(consent_id = %record.id, status = %record.status, "consent confirmed by redirect");
    }
    outcome
}

/// Fetch one consent's current status and record it, inserting the consent when
/// it is not known locally
pub async fn refresh_consent<A, B>(
    api: &A,
    token: Option<&str>,
    store: &mut ConsentStore<B>,
    consent_id: &str,
    now: DateTime<Utc>,
) -> Result<ConsentRecord>
where
    A: ConsentApi + ?Sized,
    B: DurableBackend,
{
    let status = api.consent_status(token, consent_id).await?;
    upsert_confirmed(store, consent_id, status, now)
}

fn upsert_confirmed<B: DurableBackend>(
    store: &mut ConsentStore<B>,
    consent_id: &str,
    status: Map<String, Value>,
    now: DateTime<Utc>,
) -> Result<ConsentRecord> {
    let patch = confirmed_patch(status, store.get(consent_id).is_none(), now);
    let record = store.update_by_status(consent_id, &patch)?;
    Ok(record.clone())
}

/// Status payload as a store patch: status defaults to ACTIVE, and a consent we
/// have never seen gets a creation time and a placeholder handle.
fn confirmed_patch(
    mut status: Map<String, Value>,
    inserting: bool,
    now: DateTime<Utc>,
) -> Map<String, Value> {
    let confirmed = status
        .get("status")
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(ConsentStatus::Active.as_str())
        .to_string();
    status.insert("status".into(), Value::String(confirmed.clone()));
    status.insert("lastConfirmedStatus".into(), Value::String(confirmed));
    status.insert("confirmedAt".into(), Value::String(now.to_rfc3339()));

    if inserting {
        status.insert("createdAt".into(), Value::String(now.to_rfc3339()));
        let has_handle = ["vua", "counterpartyHandle"]
            .iter()
            .any(|k| status.get(*k).and_then(Value::as_str).is_some_and(|s| !s.is_empty()));
        if !has_handle {
            status.insert("vua".into(), Value::String("Unknown".into()));
        }
    }
    status
}

fn strip_redirect_params(url: &mut Url) {
    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| k != "success" && k != "id")
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    if kept.is_empty() {
        url.set_query(None);
    } else {
        url.query_pairs_mut().clear().extend_pairs(kept);
    }
}
