//! Request facade.
//!
//! An [`Engine`] bundles the shared, read-only pieces of a deployment: the
//! registry, the emitter and the pool. It is cheap to clone and safe to
//! share between concurrent requests.

use std::sync::Arc;
use std::time::Duration;

use tracing::warn;

use crate::config::{Settings, SettingsError};
use crate::error::{EngineError, EngineResult};
use crate::executor::{self, ConnectionManager, Executed, Pool};
use crate::planner::{Planner, QueryPlan, DEFAULT_MAX_DEPTH};
use crate::result::Response;
use crate::schema::SchemaRegistry;
use crate::selection::Request;
use crate::sql::{Emitter, Statement};

/// Per-request limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineOptions {
    pub max_depth: usize,
    /// `None` lets a request run until its statements finish.
    pub request_timeout: Option<Duration>,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            request_timeout: Some(Duration::from_secs(30)),
        }
    }
}

impl EngineOptions {
    pub fn from_settings(settings: &Settings) -> Result<Self, SettingsError> {
        Ok(Self {
            max_depth: settings.execution.max_depth,
            request_timeout: settings.execution.request_timeout()?,
        })
    }
}

pub struct Engine<M: ConnectionManager> {
    registry: Arc<SchemaRegistry>,
    emitter: Emitter,
    pool: Pool<M>,
    options: EngineOptions,
}

impl<M: ConnectionManager> Clone for Engine<M> {
    fn clone(&self) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
            emitter: self.emitter.clone(),
            pool: self.pool.clone(),
            options: self.options,
        }
    }
}

impl<M: ConnectionManager> Engine<M> {
    pub fn new(registry: Arc<SchemaRegistry>, emitter: Emitter, pool: Pool<M>) -> Self {
        Self {
            registry,
            emitter,
            pool,
            options: EngineOptions::default(),
        }
    }

    /// Build an engine from settings: dialect, schema qualifier, pool and limits.
    pub fn from_settings(
        settings: &Settings,
        registry: Arc<SchemaRegistry>,
        manager: M,
    ) -> Result<Self, SettingsError> {
        let mut emitter = Emitter::new(settings.dialect()?);
        if let Some(schema) = settings.schema() {
            emitter = emitter.with_schema(schema);
        }
        let pool = Pool::new(manager, settings.pool.to_pool_config()?);
        Ok(Self::new(registry, emitter, pool).with_options(EngineOptions::from_settings(settings)?))
    }

    pub fn with_options(mut self, options: EngineOptions) -> Self {
        self.options = options;
        self
    }

    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    pub fn emitter(&self) -> &Emitter {
        &self.emitter
    }

    pub fn pool(&self) -> &Pool<M> {
        &self.pool
    }

    pub fn plan(&self, request: &Request) -> EngineResult<QueryPlan> {
        Planner::new(&self.registry)
            .with_max_depth(self.options.max_depth)
            .plan_request(request)
    }

    /// The statements `request` would issue, one per level.
    pub fn explain(&self, request: &Request) -> EngineResult<Vec<Statement>> {
        Ok(self.emitter.explain(&self.plan(request)?))
    }

    pub async fn execute(&self, request: &Request) -> EngineResult<Executed> {
        let plan = self.plan(request)?;
        self.execute_plan(&plan).await
    }

    /// Run an already planned request under the configured deadline.
    pub async fn execute_plan(&self, plan: &QueryPlan) -> EngineResult<Executed> {
        let run = executor::execute(plan, &self.emitter, &self.pool);
        match self.options.request_timeout {
            Some(limit) => tokio::time::timeout(limit, run).await.map_err(|_| {
                warn!(entity = %plan.entity, ?limit, "request timed out");
                EngineError::Timeout(limit)
            })?,
            None => run.await,
        }
    }

    /// Execute and wrap the outcome in the response envelope.
    pub async fn respond(&self, request: &Request) -> Response {
        Response::from_result(self.execute(request).await.map(|executed| executed.data))
    }
}
