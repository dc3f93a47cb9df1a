use clap::{Parser, Subcommand};
use dataverse::api::{AppState, app_router};
use dataverse::auth::{Auth, normalize_email};
use dataverse::completion::CompletionClient;
use dataverse::config::{Config, redact_db_url};
use dataverse::entity::users::Role;
use dataverse::storage::LocalStore;
use migration::{Migrator, MigratorTrait};
use sea_orm::Database;
use std::sync::Arc;
use tokio::net::TcpListener;

#[derive(Parser)]
#[command(name = "dataverse", about = "Dataverse: spreadsheet upload and chart analytics API")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the API server (default)
    Serve,
    /// Manage user accounts
    User {
        #[command(subcommand)]
        action: UserAction,
    },
}

#[derive(Subcommand)]
enum UserAction {
    /// Create a new user account
    Create {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
        #[arg(long, action = clap::ArgAction::SetTrue)]
        admin: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Init structured logging (respects RUST_LOG; defaults to info)
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();

    // Load .env if present
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let config = Config::from_env();

    tracing::info!(database = %redact_db_url(&config.database_url), "connecting to database");

    let db = Database::connect(&config.database_url).await?;
    Migrator::up(&db, None).await?;

    tracing::info!("database initialized");

    let auth = Arc::new(Auth::new(db.clone(), config.admin_email()));

    match cli.command {
        None | Some(Commands::Serve) => {
            serve(auth, db, config).await?;
        }
        Some(Commands::User { action }) => {
            handle_user_action(auth, action).await?;
        }
    }

    Ok(())
}

async fn serve(
    auth: Arc<Auth>,
    db: sea_orm::DatabaseConnection,
    config: Config,
) -> Result<(), Box<dyn std::error::Error>> {
    // Seed (or promote) the configured admin account
    if let Some(seed) = &config.admin_seed {
        let admin = auth.ensure_admin(seed).await?;
        tracing::info!(email = %admin.email, "admin account ready");
    } else if auth.count_users().await? == 0 {
        tracing::warn!(
            "No users found and DV_ADMIN_EMAIL/DV_ADMIN_PASSWORD not set. \
             Create an admin with `dataverse user create --admin`."
        );
    }

    tokio::fs::create_dir_all(&config.upload_dir).await?;

    let store = Arc::new(LocalStore::new(&config.upload_dir));
    let completion = CompletionClient::new(config.completion.clone())?;
    if !completion.is_configured() {
        tracing::info!("DV_AI_API_KEY not set, /api/ai/query will answer 503");
    }

    let bind_addr = config.bind_addr.clone();
    let state = AppState {
        auth,
        db,
        config: Arc::new(config),
        store,
        completion,
    };

    let listener = TcpListener::bind(&bind_addr).await?;
    tracing::info!(addr = %bind_addr, "API online");

    axum::serve(listener, app_router(state)).await?;

    Ok(())
}

async fn handle_user_action(
    auth: Arc<Auth>,
    action: UserAction,
) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        UserAction::Create {
            name,
            email,
            password,
            admin,
        } => {
            let email = normalize_email(&email)?;
            let role = if admin { Role::Admin } else { Role::User };
            let user = auth.create_user(&name, &email, &password, role).await?;
            tracing::info!(user_id = %user.id, email = %user.email, role = role.as_str(), "Created user");
        }
    }
    Ok(())
}
