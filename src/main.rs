//! Hairstore back office - catalog, pricing and order administration API

use anyhow::Result;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use hairstore::application::Services;
use hairstore::config::Config;
use hairstore::domain::ports::{Notifier, Store};
use hairstore::infrastructure::{FanoutNotifier, InMemoryStore, LogNotifier, NatsNotifier, PgStore};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry().with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into())).with(tracing_subscriber::fmt::layer()).init();
    let config = Config::from_env()?;

    let store: Arc<dyn Store> = match &config.database_url {
        Some(url) => {
            let db = PgPoolOptions::new().max_connections(config.db_max_connections).connect(url).await?;
            sqlx::migrate!("./migrations").run(&db).await?;
            Arc::new(PgStore::new(db))
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using the in-memory store; data is lost on restart");
            Arc::new(InMemoryStore::new())
        }
    };

    let mut notifiers: Vec<Arc<dyn Notifier>> = vec![Arc::new(LogNotifier)];
    if let Some(url) = &config.nats_url {
        match async_nats::connect(url.as_str()).await {
            Ok(client) => notifiers.push(Arc::new(NatsNotifier::new(client))),
            Err(e) => tracing::warn!(error = %e, "NATS unavailable, notifications go to the log only"),
        }
    }

    let port = config.port;
    let app = hairstore::api::router(Services::new(store, Arc::new(FanoutNotifier::new(notifiers)), config));

    tracing::info!("Hairstore back office listening on 0.0.0.0:{}", port);
    axum::serve(tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?, app).await?;
    Ok(())
}
