mod clock;
mod collaborators;
mod execution;
mod listener;

pub use clock::{format_timestamp, Clock, FixedClock, SystemClock};
pub use collaborators::{
    CaseEndInterceptor, ConditionEvaluator, HistorySink, JobRequest, JobScheduler,
    NoopJobScheduler, RecordingJobScheduler,
};
pub use execution::ExecutionContext;
pub use listener::{
    LifecycleListener, ListenerContext, ListenerRegistry, SetVariablesListener,
};
