use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const CASE_EVENT_SCHEMA_0_0_1: &str = "case-engine-event/0.0.1";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaseEventType {
    CaseStarted,
    CaseCompleted,
    CaseTerminated,
    PlanItemCreated,
    PlanItemTransitioned,
    PlanItemRemoved,
    SentryFired,
    MilestoneReached,
    CompletionDeferred,
    CompletableEvaluated,
    VariablesUpdated,
    CaseNameChanged,
    BusinessStatusChanged,
    TimerScheduled,
    TimerExecutable,
    TimerCancelled,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CaseEvent {
    #[serde(rename = "type")]
    pub event_type: CaseEventType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan_item_instance_id: Option<String>,
    #[serde(default)]
    pub data: Map<String, Value>,
}

impl CaseEvent {
    pub fn new(event_type: CaseEventType) -> Self {
        Self {
            event_type,
            plan_item_instance_id: None,
            data: Map::new(),
        }
    }

    pub fn for_plan_item(event_type: CaseEventType, plan_item_instance_id: impl Into<String>) -> Self {
        Self {
            event_type,
            plan_item_instance_id: Some(plan_item_instance_id.into()),
            data: Map::new(),
        }
    }

    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.data.insert(key.to_string(), value.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CaseEventRecord {
    pub schema: String,
    pub case_instance_id: String,
    pub seq: u64,
    pub ts: String,
    pub event: CaseEvent,
}

impl CaseEventRecord {
    pub fn new(
        case_instance_id: impl Into<String>,
        seq: u64,
        ts: impl Into<String>,
        event: CaseEvent,
    ) -> Self {
        Self {
            schema: CASE_EVENT_SCHEMA_0_0_1.to_string(),
            case_instance_id: case_instance_id.into(),
            seq,
            ts: ts.into(),
            event,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CaseEventStream {
    case_instance_id: String,
    next_seq: u64,
}

impl CaseEventStream {
    pub fn new(case_instance_id: impl Into<String>) -> Self {
        Self::with_start_seq(case_instance_id, 0)
    }

    pub fn with_start_seq(case_instance_id: impl Into<String>, start_seq: u64) -> Self {
        Self {
            case_instance_id: case_instance_id.into(),
            next_seq: start_seq,
        }
    }

    pub fn next_record(&mut self, ts: impl Into<String>, event: CaseEvent) -> CaseEventRecord {
        let seq = self.next_seq;
        self.next_seq = self.next_seq.saturating_add(1);
        CaseEventRecord::new(self.case_instance_id.clone(), seq, ts, event)
    }

    pub fn next_seq(&self) -> u64 {
        self.next_seq
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CaseEventSequenceError {
    #[error("sequence is empty")]
    Empty,
    #[error("sequence must start at 0, got {actual}")]
    InvalidStart { actual: u64 },
    #[error("sequence is not monotonic at index {index}: expected {expected}, got {actual}")]
    NonMonotonic {
        index: usize,
        expected: u64,
        actual: u64,
    },
}

/// Checks that one case's full event history is gap free and starts at 0.
pub fn ensure_monotonic_sequence(records: &[CaseEventRecord]) -> Result<(), CaseEventSequenceError> {
    let Some(first) = records.first() else {
        return Err(CaseEventSequenceError::Empty);
    };
    if first.seq != 0 {
        return Err(CaseEventSequenceError::InvalidStart { actual: first.seq });
    }
    for (index, pair) in records.windows(2).enumerate() {
        let expected = pair[0].seq + 1;
        let actual = pair[1].seq;
        if actual != expected {
            return Err(CaseEventSequenceError::NonMonotonic {
                index: index + 1,
                expected,
                actual,
            });
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "types_test.rs"]
mod tests;
