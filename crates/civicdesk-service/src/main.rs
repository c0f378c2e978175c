use civicdesk_core::{QuotaPolicyConfig, TimelineStorageConfig};
use civicdesk_service::{build_router, ServiceConfig, ServiceState};
use clap::{Parser, ValueEnum};
use std::net::SocketAddr;
use tracing::info;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum TimelineStorageMode {
    Auto,
    Memory,
    Postgres,
}

#[derive(Debug, Parser)]
#[command(name = "civicdeskd", version, about = "CivicDesk REST service")]
struct Cli {
    /// Socket address to bind, e.g. 127.0.0.1:8080
    #[arg(long, default_value = "127.0.0.1:8080")]
    listen: SocketAddr,
    /// Timeline persistence backend. `auto` picks postgres when a database
    /// url is configured.
    #[arg(long, value_enum, default_value_t = TimelineStorageMode::Auto, env = "CIVICDESK_TIMELINE_STORAGE")]
    timeline_storage: TimelineStorageMode,
    /// PostgreSQL url for the audit timeline mirror.
    #[arg(long, env = "CIVICDESK_TIMELINE_DATABASE_URL")]
    timeline_database_url: Option<String>,
    /// Max PostgreSQL pool connections for the timeline mirror.
    #[arg(long, default_value_t = 5, env = "CIVICDESK_TIMELINE_PG_MAX_CONNECTIONS")]
    timeline_pg_max_connections: u32,
    /// Issues an unverified citizen may file before upgrading.
    #[arg(long, default_value_t = 3, env = "CIVICDESK_FREE_ISSUE_LIMIT")]
    free_issue_limit: u64,
}

fn resolve_timeline_storage(cli: &Cli) -> anyhow::Result<TimelineStorageConfig> {
    let resolved_url = cli
        .timeline_database_url
        .clone()
        .or_else(|| std::env::var("DATABASE_URL").ok());

    let storage = match cli.timeline_storage {
        TimelineStorageMode::Memory => TimelineStorageConfig::Memory,
        TimelineStorageMode::Postgres => {
            let database_url = resolved_url.ok_or_else(|| {
                anyhow::anyhow!(
                    "timeline_storage=postgres requires --timeline-database-url or DATABASE_URL"
                )
            })?;
            TimelineStorageConfig::postgres(database_url, cli.timeline_pg_max_connections)
        }
        TimelineStorageMode::Auto => {
            if let Some(database_url) = resolved_url {
                TimelineStorageConfig::postgres(database_url, cli.timeline_pg_max_connections)
            } else {
                TimelineStorageConfig::Memory
            }
        }
    };

    Ok(storage)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "civicdesk_service=info,info".to_string()),
        )
        .init();

    let cli = Cli::parse();
    let timeline_storage = resolve_timeline_storage(&cli)?;
    info!("timeline backend: {}", timeline_storage.label());

    let config = ServiceConfig {
        quota: QuotaPolicyConfig {
            free_issue_limit: cli.free_issue_limit,
        },
        timeline_storage,
    };
    let state = ServiceState::bootstrap(config).await?;
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(cli.listen).await?;
    info!("civicdesk-service listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;

    Ok(())
}
