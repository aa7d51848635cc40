use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use finlens_core::{SessionStore, UserProfile};
use finlens_finance::consent_flow::DurableLocation;
use finlens_finance::{AccountSelection, BackendClient, Window};
use finlens_ingest::Normalizer;
use std::path::PathBuf;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

mod auth;
mod config;
mod consents;
mod dashboard;
mod state;

#[derive(Parser, Debug)]
#[command(name = "finlens", version, about = "Account-aggregator consents and spending insights")]
struct Cli {
    /// Log debug output (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Get a session token from the backend
    Login,

    /// Forget the session token and profile
    Logout,

    /// Show the current user and session
    Whoami,

    /// Profile display fields
    Profile {
        #[command(subcommand)]
        command: ProfileCommand,
    },

    /// Create, inspect, and confirm data-sharing consents
    Consent {
        #[command(subcommand)]
        command: ConsentCommand,
    },

    /// List one consent's transactions
    Transactions {
        consent_id: String,

        #[arg(long, default_value_t = 1)]
        page: usize,

        /// Rows per page (default: dashboard.page_size)
        #[arg(long)]
        page_size: Option<usize>,

        /// Write every transaction to this CSV file instead of printing a page
        #[arg(long)]
        csv: Option<PathBuf>,
    },

    /// Income, spending, categories, and trend over active consents
    Dashboard {
        /// A consent id, or "all" for every active consent
        #[arg(long, default_value = "all")]
        consent: AccountSelection,

        /// weekly or monthly (default: dashboard.window)
        #[arg(long)]
        window: Option<Window>,
    },

    /// Configuration file commands
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[derive(Subcommand, Debug)]
enum ProfileCommand {
    /// Set any of the display fields
    Set {
        #[arg(long)]
        username: Option<String>,
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        first_name: Option<String>,
        #[arg(long)]
        last_name: Option<String>,
    },
}

#[derive(Subcommand, Debug)]
enum ConsentCommand {
    /// Request a new consent and print its approval link
    Create {
        /// Mobile number registered with the account aggregator
        #[arg(long)]
        mobile: String,

        /// MONTH, YEAR, or DAY
        #[arg(long, default_value = "MONTH")]
        unit: String,

        #[arg(long, default_value_t = 2)]
        value: u32,

        /// Start of the data range (YYYY-MM-DD)
        #[arg(long)]
        from: Option<NaiveDate>,

        /// End of the data range (YYYY-MM-DD)
        #[arg(long)]
        to: Option<NaiveDate>,

        /// PROFILE, SUMMARY, TRANSACTIONS (repeatable; default: all)
        #[arg(long = "type")]
        types: Vec<String>,
    },

    /// List locally recorded consents, newest first
    List,

    /// Show one consent's details
    Show { id: String },

    /// Fetch a consent's status from the backend and record it
    Refresh { id: String },

    /// Handle the url the approval page redirected to
    Callback { url: String },

    /// Process a pending redirect, if any
    Complete,

    /// Forget a consent locally
    Remove { id: String },
}

#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Write ~/.finlens/config.toml with defaults
    Init,
    /// Print the effective configuration
    Show,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("warn")
    };
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr).compact())
        .init();

    if let Command::Config { command } = &cli.command {
        return match command {
            ConfigCommand::Init => config::init_config(),
            ConfigCommand::Show => {
                let cfg = config::load_config()?;
                print!("{}", toml::to_string_pretty(&cfg).context("serialize config")?);
                Ok(())
            }
        };
    }

    let cfg = config::load_config()?;
    let tz = cfg.timezone()?;
    let backend = state::FileBackend::open_default()?;
    let client = BackendClient::with_timeout(&cfg.backend.base_url, cfg.timeout())?
        .with_normalizer(Normalizer::new(tz));
    let session = SessionStore::new(&backend);

    match cli.command {
        Command::Login => auth::login(&client, &session).await?,
        Command::Logout => auth::logout(&session)?,
        Command::Whoami => auth::whoami(&session)?,
        Command::Profile { command } => match command {
            ProfileCommand::Set {
                username,
                email,
                first_name,
                last_name,
            } => {
                let profile = UserProfile {
                    username,
                    email,
                    first_name,
                    last_name,
                };
                auth::set_profile(&session, &profile)?;
            }
        },

        Command::Consent { command } => {
            let location = DurableLocation::new(&backend);
            match command {
                ConsentCommand::Create {
                    mobile,
                    unit,
                    value,
                    from,
                    to,
                    types,
                } => {
                    let args = consents::CreateArgs {
                        mobile,
                        unit,
                        value,
                        from,
                        to,
                        types,
                    };
                    consents::create(&client, &backend, &cfg, args).await?;
                }
                ConsentCommand::List => consents::list(&backend, tz)?,
                ConsentCommand::Show { id } => consents::show(&backend, &id, tz)?,
                ConsentCommand::Refresh { id } => consents::refresh(&client, &backend, &id, tz).await?,
                ConsentCommand::Callback { url } => {
                    consents::callback(&client, &backend, &location, &url, tz).await?
                }
                ConsentCommand::Complete => consents::complete(&client, &backend, &location, tz).await?,
                ConsentCommand::Remove { id } => consents::remove(&backend, &id)?,
            }
        }

        Command::Transactions {
            consent_id,
            page,
            page_size,
            csv,
        } => {
            let args = dashboard::TransactionsArgs {
                consent_id,
                page,
                page_size: page_size.unwrap_or(cfg.dashboard.page_size),
                csv,
            };
            dashboard::transactions(&client, args, tz).await?;
        }

        Command::Dashboard { consent, window } => {
            let window = window.unwrap_or(cfg.dashboard.window);
            dashboard::dashboard(client, &backend, consent, window, tz).await?;
        }

        Command::Config { .. } => {}
    }

    Ok(())
}
