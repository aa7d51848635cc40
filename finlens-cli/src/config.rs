use anyhow::{Context, Result};
use chrono_tz::Tz;
use finlens_core::time::parse_timezone;
use finlens_finance::consent_flow::{DEFAULT_AA_HANDLE, RequestSettings};
use finlens_finance::Window;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::state::ensure_finlens_home;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub backend: BackendSection,
    #[serde(default)]
    pub dashboard: DashboardSection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendSection {
    pub base_url: String,
    /// Origin the consent page redirects back to (`<origin>/dashboard`)
    pub redirect_origin: String,
    pub aa_handle: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardSection {
    pub window: Window,
    pub page_size: usize,
    pub timezone: String,
}

impl Default for BackendSection {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8072/api/setu".to_string(),
            redirect_origin: "http://localhost:5173".to_string(),
            aa_handle: DEFAULT_AA_HANDLE.to_string(),
            timeout_secs: 30,
        }
    }
}

impl Default for DashboardSection {
    fn default() -> Self {
        Self {
            window: Window::Weekly,
            page_size: 12,
            timezone: "Asia/Kolkata".to_string(),
        }
    }
}

impl Config {
    pub fn timezone(&self) -> Result<Tz> {
        parse_timezone(&self.dashboard.timezone)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.backend.timeout_secs)
    }

    pub fn request_settings(&self) -> RequestSettings {
        RequestSettings {
            aa_handle: self.backend.aa_handle.clone(),
            redirect_origin: self.backend.redirect_origin.clone(),
        }
    }
}

pub fn config_path() -> Result<PathBuf> {
    Ok(ensure_finlens_home()?.join("config.toml"))
}

pub fn load_config() -> Result<Config> {
    load_config_from(&config_path()?)
}

pub fn load_config_from(p: &Path) -> Result<Config> {
    if !p.exists() {
        return Ok(Config::default());
    }
    let s = fs::read_to_string(p).with_context(|| format!("read {}", p.display()))?;
    toml::from_str(&s).with_context(|| format!("parse {}", p.display()))
}

pub fn save_config_to(cfg: &Config, p: &Path) -> Result<()> {
    let s = toml::to_string_pretty(cfg).context("serialize config")?;
    fs::write(p, s).with_context(|| format!("write {}", p.display()))?;
    Ok(())
}

pub fn init_config() -> Result<()> {
    let p = config_path()?;
    if p.exists() {
        println!("Config already exists: {}", p.display());
        return Ok(());
    }
    save_config_to(&Config::default(), &p)?;
    println!("Wrote {}", p.display());
    Ok(())
}
