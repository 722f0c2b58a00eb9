use crate::events::CaseEventRecord;
use crate::model::CaseInstance;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Mutex;

/// Evaluates an if-part condition against the case variables.
pub trait ConditionEvaluator: Send + Sync {
    fn evaluate(&self, condition: &str, variables: &Map<String, Value>) -> Result<bool, String>;
}

/// Receives events of committed units of work only.
pub trait HistorySink: Send + Sync {
    fn record_events(&self, records: &[CaseEventRecord]);
    fn record_case_ended(&self, case: &CaseInstance);
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum JobRequest {
    ScheduleTimer {
        job_id: String,
        case_instance_id: String,
        plan_item_instance_id: String,
        timer_expression: String,
    },
    MarkExecutable {
        job_id: String,
    },
    Cancel {
        job_id: String,
    },
}

impl JobRequest {
    pub fn job_id(&self) -> &str {
        match self {
            JobRequest::ScheduleTimer { job_id, .. }
            | JobRequest::MarkExecutable { job_id }
            | JobRequest::Cancel { job_id } => job_id,
        }
    }
}

/// Timer infrastructure. Requests are submitted after the unit of work that produced them
/// has been committed.
pub trait JobScheduler: Send + Sync {
    fn submit(&self, request: &JobRequest);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopJobScheduler;

impl JobScheduler for NoopJobScheduler {
    fn submit(&self, _request: &JobRequest) {}
}

#[derive(Debug, Default)]
pub struct RecordingJobScheduler {
    requests: Mutex<Vec<JobRequest>>,
}

impl RecordingJobScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn requests(&self) -> Vec<JobRequest> {
        match self.requests.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl JobScheduler for RecordingJobScheduler {
    fn submit(&self, request: &JobRequest) {
        match self.requests.lock() {
            Ok(mut guard) => guard.push(request.clone()),
            Err(poisoned) => poisoned.into_inner().push(request.clone()),
        }
    }
}

/// Runs right before a case completes normally. An error aborts the unit of work.
/// Not invoked on termination.
pub trait CaseEndInterceptor: Send + Sync {
    fn before_case_end(&self, case: &CaseInstance) -> Result<(), String>;
}
