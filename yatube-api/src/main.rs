use clap::{Parser, Subcommand};
use std::{net::SocketAddr, sync::Arc};
use thiserror::Error;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use yatube_api::{
    config::{ConfigError, Env, get_env},
    seed::{SeedError, seed_groups},
    server::{ServerState, Settings, app},
};
use yatube_common::model::{ModelValidationError, group::CreateGroup};
use yatube_db::{DbClient, DbError, MemoryStore, Store};

#[derive(Debug, Error)]
enum InitError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("Error setting up the database: {0}")]
    Database(#[from] DbError),
    #[error("Invalid group: {0}")]
    InvalidGroup(#[from] ModelValidationError),
    #[error("Seeding groups failed: {0}")]
    Seed(#[from] SeedError),
    #[error("The in-memory store only lives inside `serve`; use SEED_GROUPS instead")]
    MemoryStore,
    #[error("Error binding tcp listener: {0}")]
    TcpBind(std::io::Error),
    #[error("Error serving server: {0}")]
    TcpServe(std::io::Error),
}

#[derive(Debug, Parser)]
#[command(name = "yatube", about = "A small blogging site")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Serve the site (the default).
    Serve,
    /// Apply pending database migrations.
    Migrate,
    /// Add a group posts can be filed under.
    CreateGroup {
        #[arg(long)]
        title: String,
        #[arg(long)]
        slug: String,
        #[arg(long, default_value = "")]
        description: String,
    },
}

fn install_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "yatube=debug,yatube_api=debug,yatube_common=debug,yatube_db=debug,\
                tower_http=debug,axum::rejection=trace,sqlx=warn"
                    .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

async fn connect_db(env: &Env) -> Result<DbClient, InitError> {
    if env.uses_memory_store() {
        return Err(InitError::MemoryStore);
    }

    Ok(DbClient::connect(&env.database_url, env.worker_id, env.process_id).await?)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Listening for shutdown signal failed");
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
}

async fn serve(env: Env) -> Result<(), InitError> {
    let store: Arc<dyn Store> = if env.uses_memory_store() {
        warn!("Using the in-memory store, nothing will be persisted");
        Arc::new(MemoryStore::new(env.worker_id, env.process_id))
    } else {
        let db = connect_db(&env).await?;
        db.migrate().await?;
        Arc::new(db)
    };
    seed_groups(store.as_ref(), &env.seed_groups).await?;

    let state = ServerState::new(store, Settings::from(&env));
    let app = app(state);

    let server_address = SocketAddr::new(env.server_address, env.server_port);
    let listener = tokio::net::TcpListener::bind(server_address)
        .await
        .map_err(InitError::TcpBind)?;
    info!(%server_address, "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(InitError::TcpServe)?;

    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), InitError> {
    install_tracing();
    let cli = Cli::parse();
    let env = get_env()?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(env).await,
        Command::Migrate => {
            connect_db(&env).await?.migrate().await?;
            info!("Migrations applied");
            Ok(())
        }
        Command::CreateGroup {
            title,
            slug,
            description,
        } => {
            let db = connect_db(&env).await?;
            let group = db
                .create_group(&CreateGroup::new(title, slug, description)?)
                .await?;
            info!(group_id = %group.id, slug = %group.slug, "Created group");
            Ok(())
        }
    }
}
