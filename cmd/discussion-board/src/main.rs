//! # discussion-board
//!
//! Composition root: loads settings, sets up logging, picks a store and
//! serves the thread API.
//!
//! `discussion-board issue-token <name> [user-id]` prints a 24h bearer token
//! signed with the configured secret, for local testing.

use anyhow::Context;
use api_adapters::{router, AppState};
use auth_adapters::JwtIdentityProvider;
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::Method;
use configs::{DatabaseSettings, LoggingSettings, Settings};
use domains::{Author, LikeRepository, ThreadRepository, UserId};
use secrecy::ExposeSecret;
use services::{MutationService, ThreadRules, TreeAssembler};
use std::sync::Arc;
use storage_adapters::MemoryStore;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::load().context("loading settings")?;
    init_tracing(&settings.logging);

    let identity = JwtIdentityProvider::new(
        settings.auth.token_secret.expose_secret().as_bytes(),
        settings.auth.issuer.as_deref(),
    );

    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.first().map(String::as_str) == Some("issue-token") {
        return issue_token(&identity, &args[1..]);
    }

    let (threads, likes) = open_store(&settings.database).await?;
    let rules = ThreadRules {
        max_body_chars: settings.threads.max_body_chars,
        max_title_chars: settings.threads.max_title_chars,
        tombstones: settings.threads.tombstones,
    };

    let state = AppState::new(
        Arc::new(TreeAssembler::new(threads.clone(), likes.clone(), rules.tombstones)),
        Arc::new(MutationService::new(threads, likes, rules)),
        Arc::new(identity),
    );

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE]);
    let app = router(state).layer(cors);

    let listener = tokio::net::TcpListener::bind(&settings.server.bind)
        .await
        .with_context(|| format!("binding {}", settings.server.bind))?;
    info!(addr = %settings.server.bind, tombstones = ?rules.tombstones, "discussion board listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("server stopped");
    Ok(())
}

fn init_tracing(logging: &LoggingSettings) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.filter));
    if logging.json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

async fn open_store(
    database: &DatabaseSettings,
) -> anyhow::Result<(Arc<dyn ThreadRepository>, Arc<dyn LikeRepository>)> {
    #[cfg(feature = "db-postgres")]
    {
        if let Some(url) = &database.url {
            let store = storage_adapters::PgStore::connect(url.expose_secret(), database.max_connections)
                .await
                .context("connecting to postgres")?;
            let store = Arc::new(store);
            let threads: Arc<dyn ThreadRepository> = store.clone();
            let likes: Arc<dyn LikeRepository> = store;
            return Ok((threads, likes));
        }
    }
    #[cfg(not(feature = "db-postgres"))]
    {
        if database.url.is_some() {
            warn!("database.url is set but this build lacks db-postgres");
        }
    }

    warn!("using the in-memory store; threads are lost on restart");
    let store = Arc::new(MemoryStore::new());
    let threads: Arc<dyn ThreadRepository> = store.clone();
    let likes: Arc<dyn LikeRepository> = store;
    Ok((threads, likes))
}

fn issue_token(identity: &JwtIdentityProvider, args: &[String]) -> anyhow::Result<()> {
    let name = args
        .first()
        .context("usage: discussion-board issue-token <name> [user-id]")?;
    let id = match args.get(1) {
        Some(raw) => raw.parse::<UserId>().context("user id must be a UUID")?,
        None => UserId(Uuid::new_v4()),
    };
    let author = Author { id, name: name.clone() };
    let token = identity.issue(&author, chrono::Duration::hours(24))?;
    println!("{token}");
    info!(user = %author.id, "token issued");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}
