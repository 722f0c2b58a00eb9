use super::CaseEngine;
use crate::checkpoint::create_checkpoint_document;
use crate::commands::{
    CaseCommand, CaseCommandEnvelope, DuplicateCommandMode, PlanItemTarget, StartCaseRequest,
};
use crate::condition::ExpressionConditionEvaluator;
use crate::context::{
    CaseEndInterceptor, ConditionEvaluator, ExecutionContext, JobRequest, RecordingJobScheduler,
};
use crate::engine::EngineOptions;
use crate::error::EngineError;
use crate::events::CaseEventType;
use crate::history::InMemoryHistory;
use crate::model::{CaseInstance, CaseState};
use crate::query::PlanItemInstanceQuery;
use crate::store::{CaseStore, CaseStoreError, InMemoryCaseStore};
use crate::test_support::FailingEvaluator;
use case_core::{CaseDefinition, PlanItemState};
use serde_json::{json, Map, Value};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};

fn definition(value: Value) -> CaseDefinition {
    serde_json::from_value(value).expect("definition")
}

fn review_definition() -> CaseDefinition {
    definition(json!({
        "key": "review",
        "plan_model": {
            "id": "root",
            "kind": "stage",
            "children": [
                {"id": "draft", "name": "Draft", "kind": "human_task"},
                {
                    "id": "approve",
                    "name": "Approve",
                    "kind": "human_task",
                    "entry_criteria": [{
                        "id": "draft_done",
                        "on_parts": [{"source": "draft", "state": "completed"}],
                        "if_part": {"condition": "${ready}"}
                    }]
                }
            ]
        }
    }))
}

fn engine_with(history: &Arc<InMemoryHistory>) -> CaseEngine {
    let context = ExecutionContext::new(Arc::new(ExpressionConditionEvaluator::new()), history.clone());
    CaseEngine::in_memory(context)
}

fn complete(case_instance_id: &str, name: &str) -> CaseCommand {
    CaseCommand::CompletePlanItem(PlanItemTarget::by_name(case_instance_id, name))
}

fn live_names(engine: &CaseEngine, case_instance_id: &str) -> Vec<(String, PlanItemState)> {
    engine
        .plan_items(&PlanItemInstanceQuery::new().case_instance_id(case_instance_id))
        .expect("query")
        .into_iter()
        .map(|item| (item.name, item.state))
        .collect()
}

#[test]
fn unknown_definition_is_rejected() {
    let history = Arc::new(InMemoryHistory::new());
    let engine = engine_with(&history);
    let err = engine
        .start_case(StartCaseRequest::new("missing"))
        .expect_err("nothing deployed");
    assert_eq!(
        err,
        EngineError::UnknownDefinition {
            key: "missing".to_string()
        }
    );
}

#[test]
fn completed_case_leaves_the_store_and_lands_in_history() {
    let history = Arc::new(InMemoryHistory::new());
    let engine = engine_with(&history);
    engine.deploy(review_definition()).expect("deploy");
    let mut request = StartCaseRequest::new("review");
    request.variables.insert("ready".to_string(), json!(true));
    request.business_key = Some("order-7".to_string());
    let case = engine.start_case(request).expect("start");
    assert_eq!(case.version, 1);
    assert_eq!(
        live_names(&engine, &case.id),
        vec![
            ("Draft".to_string(), PlanItemState::Active),
            ("Approve".to_string(), PlanItemState::Available)
        ]
    );

    engine.execute(&complete(&case.id, "Draft")).expect("complete draft");
    assert_eq!(
        live_names(&engine, &case.id),
        vec![("Approve".to_string(), PlanItemState::Active)]
    );

    let outcome = engine.execute(&complete(&case.id, "Approve")).expect("complete approve");
    let ended = outcome.case_instance.expect("snapshot");
    assert_eq!(ended.state, CaseState::Completed);
    assert!(engine.case_instance(&case.id).expect("load").is_none());
    let archived = history.ended_case(&case.id).expect("archived");
    assert_eq!(archived.business_key.as_deref(), Some("order-7"));
    assert_eq!(history.ended_cases().len(), 1);

    let err = engine
        .execute(&complete(&case.id, "Approve"))
        .expect_err("case is gone");
    assert!(matches!(err, EngineError::NotFound { entity: "case instance", .. }));
}

#[test]
fn failing_condition_rolls_back_the_whole_unit() {
    let history = Arc::new(InMemoryHistory::new());
    let context = ExecutionContext::new(Arc::new(FailingEvaluator), history.clone());
    let engine = CaseEngine::in_memory(context);
    engine.deploy(review_definition()).expect("deploy");
    let case = engine.start_case(StartCaseRequest::new("review")).expect("start");
    let events_before = history.events_for(&case.id).len();

    let err = engine
        .execute(&complete(&case.id, "Draft"))
        .expect_err("condition fails");
    assert!(matches!(err, EngineError::EvaluationFailure { .. }));

    let stored = engine.case_instance(&case.id).expect("load").expect("still stored");
    assert_eq!(stored.version, case.version);
    assert_eq!(stored, case);
    assert_eq!(history.events_for(&case.id).len(), events_before);
}

#[test]
fn invalid_command_transition_is_reported() {
    let history = Arc::new(InMemoryHistory::new());
    let engine = engine_with(&history);
    engine.deploy(review_definition()).expect("deploy");
    let case = engine.start_case(StartCaseRequest::new("review")).expect("start");
    let err = engine
        .execute(&CaseCommand::StartPlanItem(PlanItemTarget::by_name(&case.id, "Draft")))
        .expect_err("draft is already active");
    assert!(matches!(err, EngineError::InvalidTransition { .. }));

    let err = engine
        .execute(&CaseCommand::CompleteUserEventListener(PlanItemTarget::by_name(
            &case.id, "Draft",
        )))
        .expect_err("not a user event listener");
    assert!(matches!(err, EngineError::WrongPlanItemKind { .. }));
}

#[test]
fn duplicate_envelopes_are_noops_by_default() {
    let history = Arc::new(InMemoryHistory::new());
    let engine = engine_with(&history);
    engine.deploy(review_definition()).expect("deploy");
    let case = engine.start_case(StartCaseRequest::new("review")).expect("start");

    let rename = CaseCommandEnvelope::new(
        "cmd-1",
        CaseCommand::SetCaseName {
            case_instance_id: case.id.clone(),
            name: Some("Quarterly review".to_string()),
        },
    );
    let first = engine.execute_envelope(&rename).expect("first");
    assert!(!first.duplicate);
    let second = engine.execute_envelope(&rename).expect("second");
    assert!(second.duplicate);
    assert!(second.events.is_empty());

    let stored = engine.case_instance(&case.id).expect("load").expect("stored");
    assert_eq!(stored.name.as_deref(), Some("Quarterly review"));
    assert_eq!(stored.version, 2);
    assert_eq!(engine.seen_command_ids(), vec!["cmd-1".to_string()]);
}

#[test]
fn duplicate_envelopes_can_be_rejected_and_failed_ids_are_released() {
    let history = Arc::new(InMemoryHistory::new());
    let context = ExecutionContext::new(Arc::new(ExpressionConditionEvaluator::new()), history);
    let options = EngineOptions {
        duplicate_command_mode: DuplicateCommandMode::Reject,
        ..EngineOptions::default()
    };
    let engine = CaseEngine::new(context, Arc::new(InMemoryCaseStore::new()), options);
    engine.deploy(review_definition()).expect("deploy");
    let case = engine.start_case(StartCaseRequest::new("review")).expect("start");

    let failing = CaseCommandEnvelope::new("cmd-1", complete(&case.id, "Nope"));
    assert!(engine.execute_envelope(&failing).is_err());
    assert!(engine.seen_command_ids().is_empty());

    let working = CaseCommandEnvelope::new("cmd-1", complete(&case.id, "Draft"));
    engine.execute_envelope(&working).expect("id was released");
    let err = engine.execute_envelope(&working).expect_err("rejected");
    assert_eq!(
        err,
        EngineError::DuplicateCommand {
            command_id: "cmd-1".to_string()
        }
    );
}

#[test]
fn is_completable_is_side_effect_free() {
    let history = Arc::new(InMemoryHistory::new());
    let engine = engine_with(&history);
    engine
        .deploy(definition(json!({
            "key": "optional",
            "plan_model": {
                "id": "root",
                "kind": "stage",
                "children": [
                    {"id": "extra", "name": "Extra", "kind": "human_task", "manual_activation": true}
                ]
            }
        })))
        .expect("deploy");
    let case = engine.start_case(StartCaseRequest::new("optional")).expect("start");
    let events_before = history.events_for(&case.id).len();

    assert!(engine.is_completable(&case.id, None).expect("read"));
    assert!(engine.is_completable(&case.id, None).expect("read again"));
    let stored = engine.case_instance(&case.id).expect("load").expect("stored");
    assert_eq!(stored, case);
    assert_eq!(history.events_for(&case.id).len(), events_before);

    let err = engine
        .is_completable(&case.id, Some("no-such-stage"))
        .expect_err("unknown stage");
    assert!(matches!(err, EngineError::NotFound { .. }));

    engine
        .execute(&CaseCommand::CompleteCase {
            case_instance_id: case.id.clone(),
        })
        .expect("manual completion");
    assert_eq!(
        history.ended_case(&case.id).map(|case| case.state),
        Some(CaseState::Completed)
    );
}

#[test]
fn complete_case_requires_a_completable_root() {
    let history = Arc::new(InMemoryHistory::new());
    let engine = engine_with(&history);
    engine.deploy(review_definition()).expect("deploy");
    let case = engine.start_case(StartCaseRequest::new("review")).expect("start");
    let err = engine
        .execute(&CaseCommand::CompleteCase {
            case_instance_id: case.id.clone(),
        })
        .expect_err("draft is active");
    assert_eq!(err, EngineError::NotCompletable { id: case.id.clone() });
}

#[test]
fn timers_are_scheduled_and_fired_through_the_job_scheduler() {
    let history = Arc::new(InMemoryHistory::new());
    let jobs = Arc::new(RecordingJobScheduler::new());
    let context = ExecutionContext::new(Arc::new(ExpressionConditionEvaluator::new()), history)
        .with_jobs(jobs.clone());
    let engine = CaseEngine::in_memory(context);
    engine
        .deploy(definition(json!({
            "key": "sla",
            "plan_model": {
                "id": "root",
                "kind": "stage",
                "children": [
                    {"id": "work", "name": "Work", "kind": "human_task"},
                    {"id": "deadline", "name": "Deadline", "kind": "timer_event_listener", "timer_expression": "PT4H"},
                    {
                        "id": "escalate",
                        "name": "Escalate",
                        "kind": "human_task",
                        "entry_criteria": [{"id": "late", "on_parts": [{"source": "deadline", "state": "completed"}]}]
                    }
                ]
            }
        })))
        .expect("deploy");
    let case = engine.start_case(StartCaseRequest::new("sla")).expect("start");

    let requests = jobs.requests();
    assert_eq!(requests.len(), 1);
    let JobRequest::ScheduleTimer {
        job_id,
        timer_expression,
        ..
    } = &requests[0]
    else {
        panic!("expected a schedule request, got {requests:?}");
    };
    assert_eq!(timer_expression, "PT4H");

    engine
        .execute(&CaseCommand::MoveTimerToExecutable { job_id: job_id.clone() })
        .expect("mark executable");
    engine
        .execute(&CaseCommand::ExecuteJob { job_id: job_id.clone() })
        .expect("execute");
    assert_eq!(
        jobs.requests()[1],
        JobRequest::MarkExecutable { job_id: job_id.clone() }
    );
    assert_eq!(
        live_names(&engine, &case.id),
        vec![
            ("Work".to_string(), PlanItemState::Active),
            ("Escalate".to_string(), PlanItemState::Active)
        ]
    );
    let err = engine
        .execute(&CaseCommand::ExecuteJob { job_id: job_id.clone() })
        .expect_err("job already consumed");
    assert!(matches!(err, EngineError::NotFound { entity: "job", .. }));
}

#[test]
fn terminating_a_case_cancels_pending_timers() {
    let history = Arc::new(InMemoryHistory::new());
    let jobs = Arc::new(RecordingJobScheduler::new());
    let context = ExecutionContext::new(Arc::new(ExpressionConditionEvaluator::new()), history.clone())
        .with_jobs(jobs.clone());
    let engine = CaseEngine::in_memory(context);
    engine
        .deploy(definition(json!({
            "key": "reminder",
            "plan_model": {
                "id": "root",
                "kind": "stage",
                "children": [
                    {"id": "work", "kind": "human_task"},
                    {"id": "nudge", "kind": "timer_event_listener", "timer_expression": "P1D"}
                ]
            }
        })))
        .expect("deploy");
    let case = engine.start_case(StartCaseRequest::new("reminder")).expect("start");
    engine
        .execute(&CaseCommand::TerminateCase {
            case_instance_id: case.id.clone(),
        })
        .expect("terminate");

    let requests = jobs.requests();
    assert!(matches!(requests.last(), Some(JobRequest::Cancel { .. })));
    assert_eq!(
        history.ended_case(&case.id).map(|case| case.state),
        Some(CaseState::Terminated)
    );
}

struct RejectingInterceptor;

impl CaseEndInterceptor for RejectingInterceptor {
    fn before_case_end(&self, case: &CaseInstance) -> Result<(), String> {
        Err(format!("case {} is under audit", case.id))
    }
}

#[test]
fn interceptor_can_veto_case_completion() {
    let history = Arc::new(InMemoryHistory::new());
    let context = ExecutionContext::new(Arc::new(ExpressionConditionEvaluator::new()), history.clone())
        .with_end_interceptor(Arc::new(RejectingInterceptor));
    let engine = CaseEngine::in_memory(context);
    engine
        .deploy(definition(json!({
            "key": "single",
            "plan_model": {
                "id": "root",
                "kind": "stage",
                "children": [{"id": "only", "name": "Only", "kind": "human_task"}]
            }
        })))
        .expect("deploy");
    let case = engine.start_case(StartCaseRequest::new("single")).expect("start");
    let err = engine
        .execute(&complete(&case.id, "Only"))
        .expect_err("interceptor vetoes");
    assert!(matches!(err, EngineError::InterceptorFailure { .. }));
    assert!(engine.case_instance(&case.id).expect("load").is_some());
    assert!(history.ended_case(&case.id).is_none());
}

/// Store that lets another writer slip in before the next `races` commits.
struct RacingStore {
    inner: InMemoryCaseStore,
    races: Mutex<usize>,
}

impl CaseStore for RacingStore {
    fn insert(&self, case: CaseInstance) -> Result<u64, CaseStoreError> {
        self.inner.insert(case)
    }

    fn load(&self, case_instance_id: &str) -> Result<Option<CaseInstance>, CaseStoreError> {
        self.inner.load(case_instance_id)
    }

    fn commit(&self, case: CaseInstance, expected_version: u64) -> Result<u64, CaseStoreError> {
        let race = {
            let mut races = self.races.lock().expect("races lock");
            let race = *races > 0;
            *races = races.saturating_sub(1);
            race
        };
        if race {
            if let Some(current) = self.inner.load(&case.id)? {
                let version = current.version;
                self.inner.commit(current, version)?;
            }
        }
        self.inner.commit(case, expected_version)
    }

    fn remove(&self, case_instance_id: &str, expected_version: u64) -> Result<(), CaseStoreError> {
        self.inner.remove(case_instance_id, expected_version)
    }

    fn list(&self) -> Result<Vec<CaseInstance>, CaseStoreError> {
        self.inner.list()
    }

    fn find_case_for_plan_item(
        &self,
        plan_item_instance_id: &str,
    ) -> Result<Option<String>, CaseStoreError> {
        self.inner.find_case_for_plan_item(plan_item_instance_id)
    }

    fn find_case_for_job(&self, job_id: &str) -> Result<Option<String>, CaseStoreError> {
        self.inner.find_case_for_job(job_id)
    }
}

#[test]
fn lost_races_surface_as_concurrent_modification_and_retry() {
    let history = Arc::new(InMemoryHistory::new());
    let context = ExecutionContext::new(Arc::new(ExpressionConditionEvaluator::new()), history);
    let store = Arc::new(RacingStore {
        inner: InMemoryCaseStore::new(),
        races: Mutex::new(1),
    });
    let engine = CaseEngine::new(context, store.clone(), EngineOptions::default());
    engine.deploy(review_definition()).expect("deploy");
    let case = engine.start_case(StartCaseRequest::new("review")).expect("start");

    let rename = CaseCommand::SetBusinessStatus {
        case_instance_id: case.id.clone(),
        business_status: Some("escalated".to_string()),
    };
    let err = engine.execute(&rename).expect_err("race lost");
    assert!(err.is_concurrent_modification());

    *store.races.lock().expect("races lock") = 1;
    let outcome = engine.execute_with_retry(&rename, 3).expect("second attempt wins");
    let committed = outcome.case_instance.expect("snapshot");
    assert_eq!(committed.business_status.as_deref(), Some("escalated"));
    assert_eq!(committed.version, 4);
}

#[test]
fn checkpoints_restore_cases_into_a_fresh_engine() {
    let history = Arc::new(InMemoryHistory::new());
    let source = engine_with(&history);
    source.deploy(review_definition()).expect("deploy");
    let case = source.start_case(StartCaseRequest::new("review")).expect("start");
    source
        .execute_envelope(&CaseCommandEnvelope::new("cmd-1", complete(&case.id, "Draft")))
        .expect("complete draft");
    let stored = source.case_instance(&case.id).expect("load").expect("stored");
    let document = create_checkpoint_document(&stored, source.seen_command_ids());

    let target = engine_with(&Arc::new(InMemoryHistory::new()));
    target.deploy(review_definition()).expect("deploy");
    let restored = target.import_checkpoint(&document).expect("import");
    assert_eq!(restored.plan_items, stored.plan_items);
    assert_eq!(target.seen_command_ids(), vec!["cmd-1".to_string()]);

    let other = engine_with(&Arc::new(InMemoryHistory::new()));
    let mut changed = review_definition();
    changed.name = Some("Changed".to_string());
    other.deploy(changed).expect("deploy");
    let err = other.import_checkpoint(&document).expect_err("hash differs");
    assert!(matches!(err, EngineError::DefinitionHashMismatch { .. }));
}

#[test]
fn independent_cases_run_in_parallel() {
    let history = Arc::new(InMemoryHistory::new());
    let engine = engine_with(&history);
    engine
        .deploy(definition(json!({
            "key": "single",
            "plan_model": {
                "id": "root",
                "kind": "stage",
                "children": [{"id": "only", "name": "Only", "kind": "human_task"}]
            }
        })))
        .expect("deploy");

    std::thread::scope(|scope| {
        for _ in 0..4 {
            scope.spawn(|| {
                let case = engine.start_case(StartCaseRequest::new("single")).expect("start");
                engine
                    .execute_with_retry(&complete(&case.id, "Only"), 3)
                    .expect("complete");
            });
        }
    });
    assert_eq!(history.ended_cases().len(), 4);
    assert!(engine.store().list().expect("list").is_empty());
}

#[test]
fn stage_with_running_required_child_refuses_to_complete_on_request() {
    let history = Arc::new(InMemoryHistory::new());
    let engine = engine_with(&history);
    engine
        .deploy(definition(json!({
            "key": "staged",
            "plan_model": {
                "id": "root",
                "kind": "stage",
                "children": [{
                    "id": "review",
                    "name": "Review",
                    "kind": "stage",
                    "children": [
                        {"id": "work", "name": "Work", "kind": "human_task", "required": true},
                        {"id": "extra", "name": "Extra", "kind": "human_task", "manual_activation": true}
                    ]
                }]
            }
        })))
        .expect("deploy");
    let case = engine.start_case(StartCaseRequest::new("staged")).expect("start");
    let before = live_names(&engine, &case.id);
    assert!(before.contains(&("Review".to_string(), PlanItemState::Active)));
    assert!(before.contains(&("Work".to_string(), PlanItemState::Active)));

    let err = engine
        .execute(&complete(&case.id, "Review"))
        .expect_err("work is still active");
    assert!(matches!(err, EngineError::NotCompletable { .. }));
    let err = engine
        .execute(&CaseCommand::TriggerPlanItem(PlanItemTarget::by_name(&case.id, "Review")))
        .expect_err("trigger completes too");
    assert!(matches!(err, EngineError::NotCompletable { .. }));
    assert_eq!(live_names(&engine, &case.id), before);
    let stored = engine.case_instance(&case.id).expect("load").expect("stored");
    assert_eq!(stored.version, case.version);

    engine.execute(&complete(&case.id, "Work")).expect("complete work");
    assert!(live_names(&engine, &case.id).contains(&("Review".to_string(), PlanItemState::Active)));

    let outcome = engine
        .execute(&complete(&case.id, "Review"))
        .expect("only an enabled optional child is left");
    assert!(outcome.events.iter().any(|record| {
        record.event.event_type == CaseEventType::PlanItemTransitioned
            && record.event.data.get("to") == Some(&json!("unavailable"))
    }));
    assert_eq!(
        outcome.case_instance.map(|snapshot| snapshot.state),
        Some(CaseState::Completed)
    );
}

/// Signals when an evaluation starts, then blocks until released and fails. Only the first
/// evaluation after arming is held; all others report `false`.
#[derive(Default)]
struct GatedEvaluator {
    entered: Mutex<Option<Sender<()>>>,
    release: Mutex<Option<Receiver<()>>>,
}

impl GatedEvaluator {
    fn arm(&self) -> (Receiver<()>, Sender<()>) {
        let (entered_tx, entered_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel();
        *self.entered.lock().expect("lock") = Some(entered_tx);
        *self.release.lock().expect("lock") = Some(release_rx);
        (entered_rx, release_tx)
    }
}

impl ConditionEvaluator for GatedEvaluator {
    fn evaluate(&self, _condition: &str, _variables: &Map<String, Value>) -> Result<bool, String> {
        let Some(entered) = self.entered.lock().expect("lock").take() else {
            return Ok(false);
        };
        let _ = entered.send(());
        if let Some(release) = self.release.lock().expect("lock").take() {
            let _ = release.recv();
        }
        Err("evaluator went offline".to_string())
    }
}

#[test]
fn envelope_id_stays_reserved_while_its_command_runs() {
    let evaluator = Arc::new(GatedEvaluator::default());
    let history = Arc::new(InMemoryHistory::new());
    let engine = CaseEngine::in_memory(ExecutionContext::new(evaluator.clone(), history));
    engine
        .deploy(definition(json!({
            "key": "gated",
            "plan_model": {
                "id": "root",
                "kind": "stage",
                "children": [{
                    "id": "gate",
                    "name": "Gate",
                    "kind": "task",
                    "entry_criteria": [{"id": "go", "if_part": {"condition": "${go}"}}]
                }]
            }
        })))
        .expect("deploy");
    let case = engine.start_case(StartCaseRequest::new("gated")).expect("start");

    let envelope = CaseCommandEnvelope::new(
        "cmd-1",
        CaseCommand::SetVariables {
            case_instance_id: case.id.clone(),
            variables: Map::from_iter([("go".to_string(), json!(true))]),
        },
    );
    let (entered, release) = evaluator.arm();
    std::thread::scope(|scope| {
        let first = scope.spawn(|| engine.execute_envelope(&envelope));
        entered.recv().expect("first envelope reached the evaluator");

        let err = engine
            .execute_envelope(&envelope)
            .expect_err("same id is still running");
        assert_eq!(
            err,
            EngineError::CommandInFlight {
                command_id: "cmd-1".to_string()
            }
        );

        release.send(()).expect("release");
        let first = first.join().expect("thread");
        assert!(matches!(first, Err(EngineError::EvaluationFailure { .. })));
    });
    assert!(engine.seen_command_ids().is_empty());

    let applied = engine.execute_envelope(&envelope).expect("id was released");
    assert!(!applied.duplicate);
    assert!(engine.execute_envelope(&envelope).expect("noop").duplicate);
    assert_eq!(engine.seen_command_ids(), vec!["cmd-1".to_string()]);
}
