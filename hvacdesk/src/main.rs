use std::path::PathBuf;
use std::sync::Arc;

use axum::ServiceExt;
use axum::extract::Request;
use clap::{Parser, Subcommand};
use hvacdesk::api::{AppState, RouterOptions, app_router};
use hvacdesk::auth::{Auth, UserParams};
use hvacdesk::config::{ServerConfig, StoreKind, redact_db_url};
use hvacdesk::entity::app_user::UserRole;
use hvacdesk::entity::contractor::PipelineStatus;
use hvacdesk::import::{ImportOptions, import_file};
use hvacdesk::store::{MemStore, SeaOrmStore, Store};
use migration::{Migrator, MigratorTrait};
use sea_orm::Database;
use tokio::net::TcpListener;

#[derive(Parser)]
#[command(name = "hvacdesk", about = "HVACDesk - contractor backend and Atlas sales pipeline")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server (default)
    Serve,
    /// Manage users
    User {
        #[command(subcommand)]
        action: UserAction,
    },
    /// Load scraped contractors from a JSON file into the pipeline
    Import {
        #[arg(long)]
        file: PathBuf,
        /// Skip the first N records (resume a partial run)
        #[arg(long, default_value_t = 0)]
        skip: usize,
        /// Pipeline status for the new rows
        #[arg(long, default_value = "prospect")]
        status: PipelineStatus,
    },
}

#[derive(Subcommand)]
enum UserAction {
    /// Create a new user
    Create {
        #[arg(long)]
        username: String,
        #[arg(long)]
        password: String,
        /// admin, contractor or employee
        #[arg(long, default_value = "employee")]
        role: UserRole,
        #[arg(long)]
        contractor_id: Option<i32>,
        #[arg(long)]
        email: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env if present, before anything reads the environment
    dotenvy::dotenv().ok();

    // Init structured logging (respects RUST_LOG; defaults to info)
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();
    let config = ServerConfig::from_env()?;
    let store = open_store(&config).await?;

    match cli.command {
        None | Some(Commands::Serve) => serve(config, store).await?,
        Some(Commands::User { action }) => handle_user_action(store, action).await?,
        Some(Commands::Import { file, skip, status }) => {
            let opts = ImportOptions { skip, status };
            let report = import_file(store.as_ref(), &file, &opts).await?;
            println!(
                "inserted {}, duplicates {}, invalid {}",
                report.inserted, report.duplicates, report.invalid
            );
        }
    }

    Ok(())
}

async fn open_store(
    config: &ServerConfig,
) -> Result<Arc<dyn Store>, Box<dyn std::error::Error>> {
    match config.store {
        StoreKind::Memory => {
            tracing::warn!("HD_STORE=memory: all data is lost when the process exits");
            Ok(Arc::new(MemStore::new()))
        }
        StoreKind::Database => {
            tracing::info!(
                database = %redact_db_url(&config.database_url),
                "connecting to database"
            );
            let db = Database::connect(&config.database_url).await?;
            Migrator::up(&db, None).await?;
            tracing::info!("database initialized");
            Ok(Arc::new(SeaOrmStore::new(db)))
        }
    }
}

async fn serve(
    config: ServerConfig,
    store: Arc<dyn Store>,
) -> Result<(), Box<dyn std::error::Error>> {
    let state = AppState::new(store, config.jwt_secret, config.jwt_expiry_hours);

    // Auto-seed an admin if no users exist
    if state.auth.count_users().await? == 0 {
        match config.admin_password {
            Some(password) => {
                tracing::warn!(username = %config.admin_user, "no users found, seeding admin");
                state
                    .auth
                    .create_user(UserParams {
                        username: config.admin_user,
                        password,
                        role: UserRole::Admin,
                        contractor_id: None,
                        email: None,
                    })
                    .await?;
            }
            None => tracing::warn!(
                "no users found and HD_ADMIN_PASSWORD unset; \
                 the first POST /api/register becomes admin"
            ),
        }
    }

    let opts = RouterOptions {
        cors_allowed_origins: config.cors_allowed_origins,
        static_dir: config.static_dir,
    };

    let listener = TcpListener::bind(config.bind_addr).await?;
    tracing::info!(addr = %config.bind_addr, "HTTP API online");

    let app = app_router(state, &opts);
    axum::serve(listener, ServiceExt::<Request>::into_make_service(app)).await?;
    Ok(())
}

async fn handle_user_action(
    store: Arc<dyn Store>,
    action: UserAction,
) -> Result<(), Box<dyn std::error::Error>> {
    let auth = Auth::new(store);
    match action {
        UserAction::Create {
            username,
            password,
            role,
            contractor_id,
            email,
        } => {
            let user = auth
                .create_user(UserParams {
                    username,
                    password,
                    role,
                    contractor_id,
                    email,
                })
                .await?;
            tracing::info!(
                id = user.id,
                username = %user.username,
                role = ?user.role,
                "created user"
            );
        }
    }
    Ok(())
}
