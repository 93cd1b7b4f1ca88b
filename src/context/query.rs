//! Query context

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::warn;
use uuid::Uuid;

use super::bindings::Bindings;
use crate::config::ExecutionConfig;
use crate::executor::{ExecutorError, ExecutorResult};
use crate::observability::{Event, MetricsRegistry};
use crate::row::Value;
use crate::schema::Catalog;
use crate::storage::StoreAdapter;

/// Services one execution of a cursor tree consults.
#[derive(Clone)]
pub struct QueryContext {
    /// Session the query runs in
    session_id: Uuid,

    /// Storage collaborator
    store: Arc<dyn StoreAdapter>,

    /// Parameter values
    bindings: Bindings,

    /// Execution configuration
    config: Arc<ExecutionConfig>,

    /// Shared counters
    metrics: Arc<MetricsRegistry>,

    /// Start time for deadline tracking
    started_at: Instant,

    /// Rows may not be fetched after this instant
    deadline: Option<Instant>,
}

impl QueryContext {
    /// Create a context with the default configuration
    pub fn new(store: Arc<dyn StoreAdapter>) -> Self {
        Self::with_config(store, Arc::new(ExecutionConfig::default()))
    }

    /// Create a context; the deadline starts counting now
    pub fn with_config(store: Arc<dyn StoreAdapter>, config: Arc<ExecutionConfig>) -> Self {
        let started_at = Instant::now();
        Self {
            session_id: Uuid::new_v4(),
            store,
            bindings: Bindings::new(),
            deadline: config.query_timeout().map(|t| started_at + t),
            config,
            metrics: Arc::new(MetricsRegistry::new()),
            started_at,
        }
    }

    /// Share a metrics registry
    pub fn with_metrics(mut self, metrics: Arc<MetricsRegistry>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Run inside an existing session
    pub fn with_session(mut self, session_id: Uuid) -> Self {
        self.session_id = session_id;
        self
    }

    /// Replace the deadline with one `timeout` from now
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.deadline = Some(Instant::now() + timeout);
        self
    }

    /// Binds a parameter value
    pub fn bind(&mut self, position: usize, value: Value) {
        self.bindings.set(position, value);
    }

    /// Parameter bindings
    pub fn bindings(&self) -> &Bindings {
        &self.bindings
    }

    /// Session id
    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    /// Storage collaborator
    pub fn store(&self) -> &dyn StoreAdapter {
        self.store.as_ref()
    }

    /// Current catalog snapshot
    pub fn catalog(&self) -> Arc<Catalog> {
        self.store.catalog()
    }

    /// Execution configuration
    pub fn config(&self) -> &ExecutionConfig {
        &self.config
    }

    /// Shared counters
    pub fn metrics(&self) -> &MetricsRegistry {
        &self.metrics
    }

    /// Elapsed time in milliseconds
    pub fn elapsed_ms(&self) -> u128 {
        self.started_at.elapsed().as_millis()
    }

    /// Fails with a timeout once the deadline has passed
    pub fn check_deadline(&self) -> ExecutorResult<()> {
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => {
                let elapsed_ms = self.elapsed_ms();
                self.metrics.increment_timeouts();
                warn!(
                    event = Event::QueryTimeout.as_str(),
                    session = %self.session_id,
                    elapsed_ms = elapsed_ms as u64,
                    "query deadline exceeded"
                );
                Err(ExecutorError::query_timeout(elapsed_ms))
            }
            _ => Ok(()),
        }
    }
}

impl fmt::Debug for QueryContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryContext")
            .field("session_id", &self.session_id)
            .field("bindings", &self.bindings)
            .field("config", &self.config)
            .field("deadline", &self.deadline)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::ExecutorErrorCode;
    use crate::schema::Catalog;
    use crate::storage::MemoryStore;

    fn store() -> Arc<dyn StoreAdapter> {
        Arc::new(MemoryStore::new(Catalog::new()).unwrap())
    }

    #[test]
    fn test_no_deadline_by_default() {
        let ctx = QueryContext::new(store());
        assert!(ctx.check_deadline().is_ok());
    }

    #[test]
    fn test_expired_deadline_times_out() {
        let metrics = Arc::new(MetricsRegistry::new());
        let ctx = QueryContext::new(store())
            .with_metrics(metrics.clone())
            .with_timeout(Duration::ZERO);
        let err = ctx.check_deadline().unwrap_err();
        assert_eq!(err.code(), ExecutorErrorCode::AeroQueryTimeout);
        assert_eq!(metrics.snapshot().timeouts, 1);
    }

    #[test]
    fn test_config_timeout_sets_deadline() {
        let config = Arc::new(ExecutionConfig::with_timeout(Duration::from_secs(60)));
        let mut ctx = QueryContext::with_config(store(), config);
        ctx.bind(0, Value::Int(1));
        assert!(ctx.check_deadline().is_ok());
        assert_eq!(ctx.bindings().get(0).unwrap(), &Value::Int(1));
    }
}
