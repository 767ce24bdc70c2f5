pub(crate) mod api;
pub(crate) mod core;
pub(crate) mod db;
pub(crate) mod repositories;
pub(crate) mod schemas;
pub(crate) mod services;
pub(crate) mod tasks;

#[cfg(test)]
mod test_support;

use std::sync::Arc;

use crate::core::{config::Settings, redis::RedisHandle, state::AppState, telemetry};
use crate::services::generator::GeneratorClient;
use crate::services::job_store::{InMemoryJobStore, JobStore, RedisJobStore};

pub async fn run() -> anyhow::Result<()> {
    let (state, redis) = bootstrap().await?;

    let app = api::router::router(state.clone());
    let listener = tokio::net::TcpListener::bind(state.settings().server_addr()).await?;

    tracing::info!(
        addr = %state.settings().server_addr(),
        environment = %state.settings().runtime().environment.as_str(),
        "Scrolls of Wisdom API listening"
    );

    let result =
        axum::serve(listener, app).with_graceful_shutdown(core::shutdown::shutdown_signal()).await;

    teardown(redis).await;
    result.map_err(Into::into)
}

pub async fn run_worker() -> anyhow::Result<()> {
    let (state, redis) = bootstrap().await?;

    let result = tasks::scheduler::run(state).await;

    teardown(redis).await;
    result
}

/// Shared startup for the API process and the background worker.
async fn bootstrap() -> anyhow::Result<(AppState, RedisHandle)> {
    dotenvy::dotenv().ok();

    let settings = Settings::load()?;
    telemetry::init_tracing(&settings)?;
    core::metrics::init(&settings)?;

    let db_pool = db::init_pool(&settings).await?;
    db::run_migrations(&db_pool).await?;

    let redis = RedisHandle::new(settings.redis().redis_url());
    match redis.connect().await {
        Ok(()) => tracing::info!("Redis connected successfully"),
        Err(err) => {
            tracing::error!(error = %err, "Failed to connect to Redis; continuing without cache");
        }
    }

    let jobs = job_store_for(&redis).await;
    let generator = GeneratorClient::from_settings(&settings)?;
    let state = AppState::new(settings, db_pool, redis.clone(), jobs, generator);

    Ok((state, redis))
}

async fn teardown(redis: RedisHandle) {
    redis.disconnect().await;
    tracing::info!("Redis disconnected");
}

/// Generation jobs live in Redis when it is reachable, so every replica and
/// the worker read one ledger. Without Redis a process-local store keeps
/// single-node deployments working; jobs are lost on restart.
async fn job_store_for(redis: &RedisHandle) -> Arc<dyn JobStore> {
    if redis.manager().await.is_some() {
        Arc::new(RedisJobStore::new(redis.clone()))
    } else {
        tracing::warn!("Generation jobs will be tracked in process memory only");
        Arc::new(InMemoryJobStore::default())
    }
}
