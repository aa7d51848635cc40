use anyhow::{Result, bail};
use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use finlens_core::{ConsentRecord, ConsentStore, DataType, DurableBackend, SessionStore};
use finlens_finance::consent_flow::{self, ConsentForm, Location, RedirectOutcome};
use finlens_finance::{ApiError, BackendClient};

use crate::config::Config;

pub struct CreateArgs {
    pub mobile: String,
    pub unit: String,
    pub value: u32,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub types: Vec<String>,
}

impl CreateArgs {
    fn into_form(self) -> Result<ConsentForm> {
        let defaults = ConsentForm::default();
        let data_types = if self.types.is_empty() {
            defaults.data_types
        } else {
            let mut parsed = Vec::new();
            for t in &self.types {
                match DataType::parse(t) {
                    Some(dt) => parsed.push(dt),
                    None => bail!("unknown data type '{t}' (expected PROFILE, SUMMARY, TRANSACTIONS)"),
                }
            }
            parsed
        };
        Ok(ConsentForm {
            mobile_number: self.mobile,
            duration_unit: self.unit,
            duration_value: self.value,
            from: self.from.unwrap_or(defaults.from),
            to: self.to.unwrap_or(defaults.to),
            data_types,
        })
    }
}

pub async fn create<B: DurableBackend>(
    client: &BackendClient,
    backend: &B,
    cfg: &Config,
    args: CreateArgs,
) -> Result<()> {
    let request = args.into_form()?.to_request(&cfg.request_settings())?;
    let token = SessionStore::new(backend).token()?;
    let mut store = ConsentStore::load(backend)?;

    let record = consent_flow::create_consent(client, token.as_deref(), &mut store, &request, Utc::now())
        .await
        .map_err(explain_auth)?;

    println!("Created consent {} ({})", record.id, record.status);
    match &record.url {
        Some(url) => {
            println!("Approve it here: {url}");
            println!("After approving, run: finlens consent callback '<redirect url>'");
        }
        None => println!("The backend returned no approval link."),
    }
    Ok(())
}

pub fn list<B: DurableBackend>(backend: &B, tz: Tz) -> Result<()> {
    let store = ConsentStore::load(backend)?;
    if store.all().is_empty() {
        println!("No consents yet. Run: finlens consent create --mobile <number>");
        return Ok(());
    }
    println!("{:<38} {:<9} {:<26} CREATED", "ID", "STATUS", "ACCOUNT");
    for c in store.all() {
        let created = c
            .created_at
            .map(|t| t.with_timezone(&tz).format("%d %b %Y").to_string())
            .unwrap_or_else(|| "-".to_string());
        println!("{:<38} {:<9} {:<26} {}", c.id, c.status, c.display_label(), created);
    }
    Ok(())
}

pub fn show<B: DurableBackend>(backend: &B, id: &str, tz: Tz) -> Result<()> {
    let store = ConsentStore::load(backend)?;
    let Some(c) = store.get(id) else {
        bail!("no consent {id} stored locally (see: finlens consent list)");
    };
    print_details(c, tz);
    Ok(())
}

fn print_details(c: &ConsentRecord, tz: Tz) {
    println!("Consent {}", c.id);
    println!("  Status:   {}", c.status);
    if let (Some(status), Some(at)) = (&c.last_confirmed_status, c.confirmed_at) {
        println!(
            "  Confirmed {} at {}",
            status,
            at.with_timezone(&tz).format("%d %b %Y %H:%M")
        );
    }
    println!("  VUA:      {}", c.counterparty_handle);
    if let Some(range) = &c.validity {
        let day = |t: Option<DateTime<Utc>>| {
            t.map(|t| t.with_timezone(&tz).format("%d %b %Y").to_string())
                .unwrap_or_else(|| "?".to_string())
        };
        println!("  Data:     {} to {}", day(range.from), day(range.to));
    }
    if let Some(d) = &c.consent_duration {
        println!("  Duration: {} {}", d.value, d.unit);
    }
    if !c.requested_data_types.is_empty() {
        let types: Vec<String> = c
            .requested_data_types
            .iter()
            .map(|t| format!("{t:?}").to_uppercase())
            .collect();
        println!("  Types:    {}", types.join(", "));
    }
    if let Some(url) = &c.url {
        println!("  Link:     {url}");
    }
    if c.linked_accounts.is_empty() {
        println!("  No linked accounts yet.");
    } else {
        println!("  Linked accounts:");
        for a in &c.linked_accounts {
            println!(
                "    {} {} ****{} ({})",
                a.institution_name(),
                a.account_type,
                a.last4(),
                a.financial_instrument_type
            );
        }
    }
}

pub async fn refresh<B: DurableBackend>(client: &BackendClient, backend: &B, id: &str, tz: Tz) -> Result<()> {
    let token = SessionStore::new(backend).token()?;
    let mut store = ConsentStore::load(backend)?;
    let record = consent_flow::refresh_consent(client, token.as_deref(), &mut store, id, Utc::now())
        .await
        .map_err(explain_auth)?;
    print_details(&record, tz);
    Ok(())
}

/// Process whatever redirect is waiting in the stored location
pub async fn complete<B: DurableBackend, L: Location>(
    client: &BackendClient,
    backend: &B,
    location: &L,
    tz: Tz,
) -> Result<()> {
    let token = SessionStore::new(backend).token()?;
    let mut store = ConsentStore::load(backend)?;
    match consent_flow::complete_redirect(client, token.as_deref(), &mut store, location, Utc::now()).await? {
        RedirectOutcome::Nothing => println!("No pending consent redirect."),
        RedirectOutcome::Refreshed(record) => {
            println!("Consent confirmed.");
            print_details(&record, tz);
        }
        RedirectOutcome::Failed { consent_id, error } => {
            bail!("Failed to verify consent {consent_id} from redirect: {}", auth_hint(&error));
        }
    }
    Ok(())
}

/// Record the url the consent page sent the user to, then process it
pub async fn callback<B: DurableBackend, L: Location>(
    client: &BackendClient,
    backend: &B,
    location: &L,
    url: &str,
    tz: Tz,
) -> Result<()> {
    location.replace(url)?;
    complete(client, backend, location, tz).await
}

pub fn remove<B: DurableBackend>(backend: &B, id: &str) -> Result<()> {
    let mut store = ConsentStore::load(backend)?;
    if store.remove(id)? {
        println!("Removed consent {id}.");
    } else {
        println!("No consent {id} stored locally.");
    }
    Ok(())
}

fn auth_hint(error: &ApiError) -> String {
    if error.is_auth_required() {
        format!("{error} (run: finlens login)")
    } else {
        error.to_string()
    }
}

fn explain_auth(e: anyhow::Error) -> anyhow::Error {
    match e.downcast_ref::<ApiError>() {
        Some(api) if api.is_auth_required() => anyhow::anyhow!(auth_hint(api)),
        _ => e,
    }
}
