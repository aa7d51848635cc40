use anyhow::{Context, Result};
use finlens_core::{DurableBackend, SessionStore, UserProfile};
use finlens_finance::BackendClient;
use tracing::info;

pub async fn login<B: DurableBackend>(client: &BackendClient, session: &SessionStore<B>) -> Result<()> {
    let token = client
        .login()
        .await
        .with_context(|| format!("logging in at {}", client.base_url()))?;
    session.set_token(&token)?;
    info!("stored access token");
    println!("Logged in.");
    Ok(())
}

pub fn logout<B: DurableBackend>(session: &SessionStore<B>) -> Result<()> {
    session.clear()?;
    println!("Logged out.");
    Ok(())
}

pub fn whoami<B: DurableBackend>(session: &SessionStore<B>) -> Result<()> {
    let profile = session.profile()?;
    let email = profile.display_email();
    println!("{} [{}]", profile.display_name(), profile.initials());
    if !email.is_empty() {
        println!("{email}");
    }
    let state = if session.token()?.is_some() {
        "logged in"
    } else {
        "not logged in (run: finlens login)"
    };
    println!("Session: {state}");
    Ok(())
}

pub fn set_profile<B: DurableBackend>(session: &SessionStore<B>, profile: &UserProfile) -> Result<()> {
    session.update_profile(profile)?;
    println!("Profile updated: {}", session.profile()?.display_name());
    Ok(())
}

