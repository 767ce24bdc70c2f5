use std::sync::Arc;

use sqlx::PgPool;

use crate::core::{config::Settings, redis::RedisHandle};
use crate::services::generator::GeneratorClient;
use crate::services::job_store::JobStore;

#[derive(Clone)]
pub(crate) struct AppState {
    inner: Arc<InnerState>,
}

struct InnerState {
    settings: Settings,
    db: PgPool,
    redis: RedisHandle,
    jobs: Arc<dyn JobStore>,
    generator: GeneratorClient,
}

impl AppState {
    pub(crate) fn new(
        settings: Settings,
        db: PgPool,
        redis: RedisHandle,
        jobs: Arc<dyn JobStore>,
        generator: GeneratorClient,
    ) -> Self {
        Self { inner: Arc::new(InnerState { settings, db, redis, jobs, generator }) }
    }

    pub(crate) fn settings(&self) -> &Settings {
        &self.inner.settings
    }

    pub(crate) fn db(&self) -> &PgPool {
        &self.inner.db
    }

    pub(crate) fn redis(&self) -> &RedisHandle {
        &self.inner.redis
    }

    pub(crate) fn jobs(&self) -> &dyn JobStore {
        self.inner.jobs.as_ref()
    }

    pub(crate) fn generator(&self) -> &GeneratorClient {
        &self.inner.generator
    }
}
