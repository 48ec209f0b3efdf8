mod config;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use hostel_api::auth::{AuthService, NewAccount};
use hostel_api::complaints::ComplaintService;
use hostel_api::password::Passwords;
use hostel_api::provision;
use hostel_api::routes::router;
use hostel_api::state::AppStateInner;
use hostel_api::storage::ImageStore;
use hostel_api::token::TokenKeys;
use hostel_db::Database;
use hostel_types::models::Role;

use crate::config::Config;

const DEFAULT_LOG_FILTER: &str = "hostel=debug,hostel_api=debug,hostel_db=info,tower_http=debug";

#[derive(Debug, Parser)]
#[command(name = "hostel", about = "Hostel complaint desk backend", version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the HTTP server (the default).
    Serve,
    /// Create an account of any role.
    CreateUser {
        email: String,
        password: String,
        full_name: String,
        /// student, warden, department or super_admin.
        #[arg(long, default_value = "student")]
        role: String,
        /// Category name; required for department accounts.
        #[arg(long)]
        category: Option<String>,
    },
    /// Add a complaint category.
    AddCategory { name: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into()),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::from_env()?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config).await,
        Command::CreateUser {
            email,
            password,
            full_name,
            role,
            category,
        } => {
            let role: Role = role.parse()?;
            let db = Arc::new(Database::open(&config.db_path)?);
            let category_id = category
                .map(|name| provision::category_id_by_name(&db, &name))
                .transpose()?;
            let auth = auth_service(&config, db)?;

            let user = provision::create_user(
                &auth,
                NewAccount {
                    email,
                    password,
                    full_name,
                    role,
                    category_id,
                },
            )
            .await?;
            println!("{} {} ({})", user.id, user.email, user.role);
            Ok(())
        }
        Command::AddCategory { name } => {
            let db = Database::open(&config.db_path)?;
            let id = provision::add_category(&db, &name)?;
            println!("{id} {}", name.trim());
            Ok(())
        }
    }
}

fn auth_service(config: &Config, db: Arc<Database>) -> anyhow::Result<AuthService> {
    let passwords = Passwords::new(config.argon2_memory_kib, config.argon2_iterations)?;
    let tokens = TokenKeys::new(&config.jwt_secret, config.jwt_ttl);
    Ok(AuthService::new(db, passwords, tokens, config.reset_key.clone()))
}

async fn serve(config: Config) -> anyhow::Result<()> {
    if !config.has_usable_jwt_secret() {
        eprintln!("FATAL: HOSTEL_JWT_SECRET is unset or still a placeholder.");
        eprintln!("       Set it in your .env file and restart.");
        std::process::exit(1);
    }
    if config.reset_key.is_none() {
        info!("HOSTEL_SUPER_ADMIN_RESET_KEY not set; super admin reset is disabled");
    }

    // Init database
    let db = Arc::new(Database::open(&config.db_path)?);
    let auth = auth_service(&config, db.clone())?;

    // Provisioning
    if let Some(password) = &config.super_admin_password {
        provision::ensure_super_admin(&auth, &db, &config.super_admin_email, password)
            .await
            .context("seeding super admin")?;
    }
    if let Some(password) = &config.department_password {
        let created = provision::ensure_department_accounts(&auth, &db, password)
            .context("seeding department accounts")?;
        info!("Department accounts ready ({} new)", created);
    }

    let images = ImageStore::new(config.upload_dir.clone()).await?;
    let complaints = ComplaintService::new(db.clone(), images);
    let state = AppStateInner::new(db, auth, complaints);

    let app = router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!("Hostel server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
                    _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
                }
            }
            Err(e) => {
                warn!("Could not install SIGTERM handler: {}", e);
                ctrl_c.await.ok();
                info!("Received Ctrl+C, shutting down...");
            }
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}
