use super::clock::{Clock, SystemClock};
use super::collaborators::{
    CaseEndInterceptor, ConditionEvaluator, HistorySink, JobScheduler, NoopJobScheduler,
};
use super::listener::{LifecycleListener, ListenerRegistry};
use std::sync::Arc;

/// Collaborators threaded through every operation of a unit of work.
#[derive(Clone)]
pub struct ExecutionContext {
    pub evaluator: Arc<dyn ConditionEvaluator>,
    pub history: Arc<dyn HistorySink>,
    pub jobs: Arc<dyn JobScheduler>,
    pub clock: Arc<dyn Clock>,
    pub listeners: ListenerRegistry,
    pub end_interceptor: Option<Arc<dyn CaseEndInterceptor>>,
}

impl ExecutionContext {
    pub fn new(evaluator: Arc<dyn ConditionEvaluator>, history: Arc<dyn HistorySink>) -> Self {
        Self {
            evaluator,
            history,
            jobs: Arc::new(NoopJobScheduler),
            clock: Arc::new(SystemClock),
            listeners: ListenerRegistry::new(),
            end_interceptor: None,
        }
    }

    pub fn with_jobs(mut self, jobs: Arc<dyn JobScheduler>) -> Self {
        self.jobs = jobs;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_listener(mut self, name: impl Into<String>, listener: Arc<dyn LifecycleListener>) -> Self {
        self.listeners.register(name, listener);
        self
    }

    pub fn with_end_interceptor(mut self, interceptor: Arc<dyn CaseEndInterceptor>) -> Self {
        self.end_interceptor = Some(interceptor);
        self
    }
}

impl std::fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("listeners", &self.listeners)
            .field("end_interceptor", &self.end_interceptor.is_some())
            .finish_non_exhaustive()
    }
}
