use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use serde_json::json;

use onboardd::catalog::{NewWebsite, WebsitePatch};
use onboardd::config::OnboardConfig;
use onboardd::ledger::{AccountStatus, RegistrationStep};
use onboardd::onboarding::{ExecutionDispatcher, NoopDispatcher};
use onboardd::registry::{ClientFilter, ClientPatch, ClientStatus, NewClient, Page};
use onboardd::{AppContext, CoreError};

#[derive(Parser)]
#[command(
    name = "onboardd",
    about = "Client onboarding core — provisioning ledger, PII vault, and dashboard",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Data directory for the SQLite database, vault key, and audit log
    #[arg(long, env = "ONBOARDD_DATA_DIR", global = true)]
    data_dir: Option<std::path::PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "ONBOARDD_LOG", global = true)]
    log: Option<String>,
}

#[derive(Subcommand)]
enum Command {
    /// Manage client identity records.
    Client {
        #[command(subcommand)]
        action: ClientAction,
    },
    /// Manage the website catalog.
    Website {
        #[command(subcommand)]
        action: WebsiteAction,
    },
    /// Start onboarding: reconcile provisioning records for a client
    /// against a set of target websites. Idempotent — re-running reports
    /// the existing records with created=false.
    Onboard {
        client_id: String,
        /// One or more website ids (duplicates collapse).
        #[arg(required = true)]
        website_ids: Vec<String>,
    },
    /// Inspect and drive provisioning records.
    Account {
        #[command(subcommand)]
        action: AccountAction,
    },
    /// Read identity-verification results.
    Verification {
        #[command(subcommand)]
        action: VerificationAction,
    },
    /// Dashboard statistics and recent ledger activity.
    Stats {
        /// Also include the recent-event feed.
        #[arg(long)]
        events: bool,
    },
}

#[derive(Subcommand)]
enum ClientAction {
    /// Register a new client (status ACTIVE).
    Add(AddClientArgs),
    /// List clients with optional search/status filter.
    List {
        /// Case-insensitive substring match on name or email.
        #[arg(long)]
        search: Option<String>,
        /// Exact status: ACTIVE | INACTIVE | SUSPENDED.
        #[arg(long)]
        status: Option<String>,
        #[arg(long, default_value_t = 1)]
        page: i64,
        #[arg(long, default_value_t = 20)]
        limit: i64,
    },
    /// Full client detail: record, accounts with events, verifications.
    Show { id: String },
    /// Decrypt and print the stored national id.
    Reveal { id: String },
    /// Partially update a client.
    Update(UpdateClientArgs),
    /// Remove a client (refused while provisioning records exist).
    Remove { id: String },
}

#[derive(Args)]
struct AddClientArgs {
    #[arg(long)]
    first_name: String,
    #[arg(long)]
    last_name: String,
    #[arg(long)]
    email: String,
    #[arg(long)]
    phone: String,
    /// Date of birth, ISO 8601 (YYYY-MM-DD).
    #[arg(long)]
    dob: String,
    #[arg(long)]
    address: String,
    #[arg(long)]
    city: String,
    #[arg(long)]
    state: String,
    #[arg(long)]
    zip: String,
    #[arg(long, default_value = "US")]
    country: String,
    /// Optional sensitive identifier; stored encrypted, never in the clear.
    #[arg(long)]
    national_id: Option<String>,
}

#[derive(Args)]
struct UpdateClientArgs {
    id: String,
    #[arg(long)]
    first_name: Option<String>,
    #[arg(long)]
    last_name: Option<String>,
    #[arg(long)]
    phone: Option<String>,
    #[arg(long)]
    address: Option<String>,
    #[arg(long)]
    city: Option<String>,
    #[arg(long)]
    state: Option<String>,
    #[arg(long)]
    zip: Option<String>,
    /// ACTIVE | INACTIVE | SUSPENDED (any-to-any).
    #[arg(long)]
    status: Option<String>,
}

#[derive(Subcommand)]
enum WebsiteAction {
    /// Add a website to the catalog.
    Add {
        #[arg(long)]
        name: String,
        #[arg(long)]
        url: String,
        #[arg(long)]
        category: String,
        /// Site-specific automation parameters as a JSON object.
        #[arg(long, default_value = "{}")]
        config: String,
        /// Create the site disabled (provisioning refuses inactive sites).
        #[arg(long)]
        inactive: bool,
    },
    /// List websites ordered by name.
    List {
        /// Only sites provisioning may target.
        #[arg(long)]
        active: bool,
    },
    /// Partially update a website (including the is_active toggle).
    Update {
        id: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        url: Option<String>,
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        config: Option<String>,
        #[arg(long)]
        active: Option<bool>,
    },
}

#[derive(Subcommand)]
enum AccountAction {
    /// List provisioning records, newest update first.
    List {
        #[arg(long)]
        client: Option<String>,
        #[arg(long)]
        website: Option<String>,
        /// PENDING | COMPLETED | FAILED.
        #[arg(long)]
        status: Option<String>,
    },
    /// Show a record with its trailing event log.
    Show {
        id: String,
        #[arg(long, default_value_t = 10)]
        events: i64,
    },
    /// Advance a record one step along the registration graph.
    Transition {
        id: String,
        /// IN_PROGRESS | SUBMITTED | COMPLETED | FAILED.
        to: String,
        /// Human-readable cause recorded in the event log.
        #[arg(long, default_value = "operator transition")]
        cause: String,
    },
    /// Move a FAILED record back to PENDING (no-op otherwise).
    Retry { id: String },
}

#[derive(Subcommand)]
enum VerificationAction {
    /// Show one verification result.
    Show { id: String },
    /// List a client's verification history.
    List { client_id: String },
    /// Record a verification outcome (external collaborator surface).
    Record {
        client_id: String,
        kind: String,
        outcome: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = OnboardConfig::new(cli.data_dir.clone(), cli.log.clone());
    init_tracing(&config.log, &config.log_format);

    let ctx = AppContext::init(config).await?;

    match run(cli.command, &ctx).await {
        Ok(value) => {
            println!("{}", serde_json::to_string_pretty(&value)?);
            Ok(())
        }
        Err(e) => {
            eprintln!(
                "{}",
                serde_json::to_string_pretty(&json!({
                    "error": { "kind": e.kind(), "message": e.to_string() }
                }))?
            );
            std::process::exit(1);
        }
    }
}

fn init_tracing(log_level: &str, log_format: &str) {
    if log_format == "json" {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(log_level)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(log_level)
            .with_writer(std::io::stderr)
            .compact()
            .init();
    }
}

async fn run(command: Command, ctx: &AppContext) -> std::result::Result<serde_json::Value, CoreError> {
    match command {
        Command::Client { action } => client_cmd(action, ctx).await,
        Command::Website { action } => website_cmd(action, ctx).await,
        Command::Onboard {
            client_id,
            website_ids,
        } => {
            let outcomes = ctx
                .orchestrator
                .start_onboarding(&client_id, &website_ids)
                .await?;
            // Hand freshly created records to the execution collaborator;
            // pre-existing records are already queued or done.
            let dispatcher = NoopDispatcher;
            for outcome in outcomes.iter().filter(|o| o.created) {
                if let Err(e) = dispatcher.enqueue(&outcome.account).await {
                    tracing::warn!(err = %e, account_id = %outcome.account.id,
                        "execution dispatch failed");
                }
            }
            Ok(json!({ "accounts": outcomes }))
        }
        Command::Account { action } => account_cmd(action, ctx).await,
        Command::Verification { action } => verification_cmd(action, ctx).await,
        Command::Stats { events } => {
            let stats = ctx.dashboard.stats().await?;
            if events {
                let recent = ctx.dashboard.recent_events().await?;
                Ok(json!({ "stats": stats, "recent_activity": recent }))
            } else {
                Ok(json!({ "stats": stats }))
            }
        }
    }
}

async fn client_cmd(
    action: ClientAction,
    ctx: &AppContext,
) -> std::result::Result<serde_json::Value, CoreError> {
    match action {
        ClientAction::Add(a) => {
            let client = ctx
                .registry
                .register(NewClient {
                    first_name: a.first_name,
                    last_name: a.last_name,
                    email: a.email,
                    phone: a.phone,
                    date_of_birth: a.dob,
                    address: a.address,
                    city: a.city,
                    state: a.state,
                    zip_code: a.zip,
                    country: a.country,
                    national_id: a.national_id,
                })
                .await?;
            Ok(json!(client))
        }
        ClientAction::List {
            search,
            status,
            page,
            limit,
        } => {
            let status = status.map(|s| s.parse::<ClientStatus>()).transpose()?;
            let filter = ClientFilter { search, status };
            let page = Page {
                limit,
                offset: (page.max(1) - 1) * limit,
            };
            let (clients, total) = ctx.registry.list(&filter, page).await?;
            Ok(json!({
                "clients": clients,
                "pagination": {
                    "total": total,
                    "limit": page.limit,
                    "offset": page.offset,
                }
            }))
        }
        ClientAction::Show { id } => Ok(json!(ctx.registry.detail(&id).await?)),
        ClientAction::Reveal { id } => {
            let national_id = ctx.registry.reveal_national_id(&id).await?;
            Ok(json!({ "id": id, "national_id": national_id }))
        }
        ClientAction::Update(a) => {
            let status = a.status.map(|s| s.parse::<ClientStatus>()).transpose()?;
            let client = ctx
                .registry
                .update(
                    &a.id,
                    ClientPatch {
                        first_name: a.first_name,
                        last_name: a.last_name,
                        phone: a.phone,
                        address: a.address,
                        city: a.city,
                        state: a.state,
                        zip_code: a.zip,
                        status,
                    },
                )
                .await?;
            Ok(json!(client))
        }
        ClientAction::Remove { id } => {
            ctx.registry.remove(&id).await?;
            Ok(json!({ "removed": id }))
        }
    }
}

async fn website_cmd(
    action: WebsiteAction,
    ctx: &AppContext,
) -> std::result::Result<serde_json::Value, CoreError> {
    match action {
        WebsiteAction::Add {
            name,
            url,
            category,
            config,
            inactive,
        } => {
            let website = ctx
                .catalog
                .create(NewWebsite {
                    name,
                    url,
                    category,
                    config,
                    is_active: !inactive,
                })
                .await?;
            Ok(json!(website))
        }
        WebsiteAction::List { active } => {
            let websites = ctx.catalog.list(active.then_some(true)).await?;
            Ok(json!({ "websites": websites }))
        }
        WebsiteAction::Update {
            id,
            name,
            url,
            category,
            config,
            active,
        } => {
            let website = ctx
                .catalog
                .update(
                    &id,
                    WebsitePatch {
                        name,
                        url,
                        category,
                        config,
                        is_active: active,
                    },
                )
                .await?;
            Ok(json!(website))
        }
    }
}

async fn account_cmd(
    action: AccountAction,
    ctx: &AppContext,
) -> std::result::Result<serde_json::Value, CoreError> {
    match action {
        AccountAction::List {
            client,
            website,
            status,
        } => {
            let status = status.map(|s| s.parse::<AccountStatus>()).transpose()?;
            let accounts = ctx
                .ledger
                .list(client.as_deref(), website.as_deref(), status)
                .await?;
            Ok(json!({ "accounts": accounts }))
        }
        AccountAction::Show { id, events } => {
            let account = ctx.ledger.get(&id).await?;
            let events = ctx.ledger.events(&id, events).await?;
            Ok(json!({ "account": account, "events": events }))
        }
        AccountAction::Transition { id, to, cause } => {
            let to = to.parse::<RegistrationStep>()?;
            let account = ctx.ledger.transition(&id, to, &cause).await?;
            Ok(json!(account))
        }
        AccountAction::Retry { id } => {
            let account = ctx.ledger.retry(&id).await?;
            Ok(json!(account))
        }
    }
}

async fn verification_cmd(
    action: VerificationAction,
    ctx: &AppContext,
) -> std::result::Result<serde_json::Value, CoreError> {
    match action {
        VerificationAction::Show { id } => Ok(json!(ctx.registry.get_verification(&id).await?)),
        VerificationAction::List { client_id } => {
            Ok(json!(ctx.registry.verifications(&client_id).await?))
        }
        VerificationAction::Record {
            client_id,
            kind,
            outcome,
        } => {
            // Existence check before the write so a typo'd id is NotFound.
            ctx.registry.get(&client_id).await?;
            let row = ctx
                .storage
                .insert_verification(&client_id, &kind, &outcome)
                .await?;
            Ok(json!(row))
        }
    }
}
