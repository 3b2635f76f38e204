//! Carelink API server binary.
//!
//! Serves the REST API and the notification WebSocket on one listener.

use std::sync::Arc;

use carelink_api::config::ApiConfig;
use carelink_core::mail::{LogMailer, Mailer, SmtpMailer};
use carelink_core::notify::{ConnectionRegistry, EventPublisher, PgNotifyPublisher, run_pg_relay};
use carelink_core::store::{MemoryUserStore, PgUserStore, UserStore};
use clap::Parser;
use sqlx::postgres::PgPoolOptions;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// CLI arguments. Anything not given here falls back to the environment.
#[derive(Parser, Debug)]
#[command(name = "carelink_server", about = "Carelink API server")]
struct Args {
    /// Address to listen on, e.g. `0.0.0.0:8000`.
    #[arg(long, env = "BIND_ADDR")]
    bind: Option<String>,

    /// PostgreSQL connection URL.
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,

    /// Maximum number of database connections in the pool.
    #[arg(long, env = "MAX_CONNECTIONS", default_value_t = 5)]
    max_connections: u32,

    /// Keep users in memory instead of PostgreSQL. Data is lost on exit and
    /// notifications stay inside this process.
    #[arg(long, default_value_t = false)]
    memory_store: bool,
}

/// Strip the password from a connection URL before it is logged.
fn redact_url(url: &str) -> String {
    let Some((scheme, rest)) = url.split_once("://") else {
        return url.to_string();
    };
    let authority_end = rest.find('/').unwrap_or(rest.len());
    let Some((userinfo, host)) = rest[..authority_end].rsplit_once('@') else {
        return url.to_string();
    };
    match userinfo.split_once(':') {
        Some((user, _)) => format!("{scheme}://{user}:***@{host}{}", &rest[authority_end..]),
        None => url.to_string(),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                tracing_subscriber::EnvFilter::new("info,carelink_api=debug,carelink_core=debug")
            }),
        )
        .init();

    let args = Args::parse();

    let mut config = ApiConfig::from_env();
    if let Some(bind) = args.bind {
        config.bind_addr = bind;
    }
    if let Some(url) = args.database_url {
        config.pg_connection_url = url;
    }

    let mailer: Arc<dyn Mailer> = match &config.smtp {
        Some(smtp) => {
            info!(host = %smtp.host, "sending mail through SMTP");
            Arc::new(SmtpMailer::new(
                &smtp.host,
                &smtp.username,
                &smtp.password,
                &smtp.from,
            )?)
        }
        None => {
            warn!("SMTP not configured, emails will only be logged");
            Arc::new(LogMailer)
        }
    };

    let registry = Arc::new(ConnectionRegistry::new());
    let relay_ct = CancellationToken::new();
    let mut relay_handle = None;

    let (store, publisher): (Arc<dyn UserStore>, Arc<dyn EventPublisher>) = if args.memory_store
    {
        warn!("using in-memory user store");
        let store: Arc<dyn UserStore> = Arc::new(MemoryUserStore::new());
        let publisher: Arc<dyn EventPublisher> = registry.clone();
        (store, publisher)
    } else {
        info!(
            database = %redact_url(&config.pg_connection_url),
            max_connections = args.max_connections,
            "configuring connection pool"
        );
        let pool = PgPoolOptions::new()
            .max_connections(args.max_connections)
            .acquire_timeout(std::time::Duration::from_secs(30))
            .connect(&config.pg_connection_url)
            .await?;

        info!("running database migrations");
        carelink_core::migrate::migrate(&pool).await?;

        relay_handle = Some(tokio::spawn({
            let pool = pool.clone();
            let registry = registry.clone();
            let ct = relay_ct.clone();
            async move {
                tokio::select! {
                    result = run_pg_relay(&pool, registry) => {
                        if let Err(e) = result {
                            error!(error = %e, "notification relay stopped");
                        }
                    }
                    _ = ct.cancelled() => {}
                }
            }
        }));

        let store: Arc<dyn UserStore> = Arc::new(PgUserStore::new(pool.clone()));
        let publisher: Arc<dyn EventPublisher> = Arc::new(PgNotifyPublisher::new(pool));
        (store, publisher)
    };

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    let local_addr = listener.local_addr()?;

    let state = carelink_api::AppState::new(store, mailer, publisher, registry, config);
    let app = carelink_api::router(state);

    info!(addr = %local_addr, "REST API listening");

    let api_result = axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown signal received");
        })
        .await;

    relay_ct.cancel();
    if let Some(handle) = relay_handle {
        let _ = handle.await;
    }

    api_result?;

    Ok(())
}
