use super::operation::{Operation, TransitionOrigin};
use super::queue::Agenda;
use crate::completion::{
    mark_ancestors_dirty, mark_dirty, refresh_completable, scope_is_active,
    set_state_change_unprocessed, state_change_unprocessed, CompletionScope,
};
use crate::context::{format_timestamp, ExecutionContext, JobRequest, ListenerContext};
use crate::error::EngineError;
use crate::events::{CaseEvent, CaseEventRecord, CaseEventStream, CaseEventType};
use crate::model::{record_milestone, CaseInstance, CaseState, PlanItemInstance, SentryMarks, TimerJob};
use crate::sentry::{evaluate_armed_sentries, evaluate_on_part_event, SentryFiring, SentryTarget};
use case_core::{
    resolve_transition, DefinitionGraph, ListenerAction, PlanItemDefinition, PlanItemKind,
    PlanItemState, PlanItemTransition, SentryKind,
};
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use tracing::{debug, info};

/// Result of a drained unit of work, ready to be committed.
#[derive(Debug, Clone)]
pub struct UnitOfWorkOutcome {
    pub case: CaseInstance,
    pub records: Vec<CaseEventRecord>,
    pub job_requests: Vec<JobRequest>,
}

/// Working copy of one case plus the agenda that drives it to quiescence. Nothing leaves the
/// unit of work until `finish` hands back the outcome; dropping it discards every change.
pub struct UnitOfWork<'a> {
    pub(super) case: CaseInstance,
    pub(super) graph: &'a DefinitionGraph,
    pub(super) context: &'a ExecutionContext,
    pub(super) agenda: Agenda,
    stream: CaseEventStream,
    records: Vec<CaseEventRecord>,
    pub(super) job_requests: Vec<JobRequest>,
}

impl<'a> UnitOfWork<'a> {
    pub fn new(
        case: CaseInstance,
        graph: &'a DefinitionGraph,
        context: &'a ExecutionContext,
        max_operations: usize,
    ) -> Self {
        let stream = CaseEventStream::with_start_seq(case.id.clone(), case.next_event_seq);
        Self {
            case,
            graph,
            context,
            agenda: Agenda::new(max_operations),
            stream,
            records: Vec::new(),
            job_requests: Vec::new(),
        }
    }

    pub fn case(&self) -> &CaseInstance {
        &self.case
    }

    pub fn enqueue(&mut self, operation: Operation) {
        self.agenda.push(operation);
    }

    /// Starts a freshly created case: activates the plan model and materializes its children.
    pub fn begin_case(&mut self) {
        let event = CaseEvent::new(CaseEventType::CaseStarted)
            .with("definition_key", self.case.definition_key.clone())
            .with("definition_version", self.case.definition_version)
            .with("definition_hash", self.case.definition_hash.clone());
        self.emit(event);
        info!(
            case_instance_id = %self.case.id,
            definition_key = %self.case.definition_key,
            "case started"
        );
        self.case.state_change_unprocessed = true;
        self.agenda.push(Operation::CreateChildren {
            scope: CompletionScope::CaseRoot,
        });
    }

    /// Drains the agenda until it is empty.
    pub fn run(&mut self) -> Result<(), EngineError> {
        while let Some(operation) = self.agenda.pop()? {
            debug!(
                case_instance_id = %self.case.id,
                operation = operation.name(),
                pending = self.agenda.len(),
                "executing operation"
            );
            self.execute(operation)?;
        }
        Ok(())
    }

    pub fn finish(mut self) -> UnitOfWorkOutcome {
        self.case.next_event_seq = self.stream.next_seq();
        UnitOfWorkOutcome {
            case: self.case,
            records: self.records,
            job_requests: self.job_requests,
        }
    }

    pub(super) fn execute(&mut self, operation: Operation) -> Result<(), EngineError> {
        match operation {
            Operation::CreateChildren { scope } => self.create_children(scope),
            Operation::InitializePlanItem {
                plan_item_instance_id,
            } => self.initialize_plan_item(&plan_item_instance_id),
            Operation::FinishChildMaterialization { scope } => {
                set_state_change_unprocessed(&mut self.case, &scope, false);
                mark_dirty(&mut self.case, &scope);
                self.agenda.push(Operation::EvaluateCompletion { scope });
                Ok(())
            }
            Operation::Transition {
                plan_item_instance_id,
                transition,
                origin,
            } => self.transition(&plan_item_instance_id, transition, origin),
            Operation::EvaluateSentries {
                source_definition_id,
                source_instance_id,
                state,
            } => {
                if !self.case.is_active() {
                    return Ok(());
                }
                let firings = evaluate_on_part_event(
                    &mut self.case,
                    self.graph,
                    self.context.evaluator.as_ref(),
                    &source_definition_id,
                    state,
                )?;
                debug!(
                    source = %source_instance_id,
                    state = %state,
                    fired = firings.len(),
                    "evaluated on-part sentries"
                );
                for firing in firings {
                    self.fire(firing, false)?;
                }
                Ok(())
            }
            Operation::EvaluateConditionSentries => {
                if !self.case.is_active() {
                    return Ok(());
                }
                let firings = evaluate_armed_sentries(
                    &mut self.case,
                    self.graph,
                    self.context.evaluator.as_ref(),
                    None,
                )?;
                for firing in firings {
                    self.fire(firing, false)?;
                }
                Ok(())
            }
            Operation::EvaluateCompletion { scope } => self.evaluate_completion(scope),
            Operation::ForceCompletable { scope } => {
                let Some(status) = refresh_completable(&mut self.case, self.graph, &scope) else {
                    return Err(EngineError::not_found("stage instance", scope.label()));
                };
                let mut event = CaseEvent::new(CaseEventType::CompletableEvaluated)
                    .with("completable", status.completable);
                if let Some(stage_id) = scope.parent_id() {
                    event.plan_item_instance_id = Some(stage_id.to_string());
                }
                self.emit(event);
                Ok(())
            }
            Operation::CompleteCase => self.complete_case(),
            Operation::TerminateCase => self.terminate_case(),
            Operation::ApplyListenerCommand(command) => {
                if !self.case.is_active() {
                    debug!(command = command.command_type(), "case ended, listener command dropped");
                    return Ok(());
                }
                self.apply_command(&command, TransitionOrigin::Engine)
            }
        }
    }

    fn create_children(&mut self, scope: CompletionScope) -> Result<(), EngineError> {
        if !scope_is_active(&self.case, &scope) {
            debug!(scope = scope.label(), "scope is no longer active, children not created");
            return Ok(());
        }
        let graph = self.graph;
        let parent_definition = match &scope {
            CompletionScope::CaseRoot => Some(graph.root()),
            CompletionScope::Stage(id) => self
                .case
                .plan_item(id)
                .and_then(|stage| graph.get(&stage.definition_id)),
        };
        let Some(parent_definition) = parent_definition else {
            return Err(EngineError::not_found("plan item definition", scope.label()));
        };

        for child in &parent_definition.children {
            let id = self.create_plan_item(child, scope.parent_id());
            self.agenda.push(Operation::InitializePlanItem {
                plan_item_instance_id: id,
            });
        }
        self.agenda.push(Operation::FinishChildMaterialization { scope });
        Ok(())
    }

    fn create_plan_item(&mut self, definition: &PlanItemDefinition, parent_id: Option<&str>) -> String {
        let now = self.now();
        let seq = self.case.next_plan_item_seq;
        self.case.next_plan_item_seq += 1;
        let item = PlanItemInstance {
            id: uuid::Uuid::new_v4().to_string(),
            case_instance_id: self.case.id.clone(),
            definition_id: definition.id.clone(),
            name: definition.display_name().to_string(),
            kind: definition.kind,
            state: PlanItemState::Available,
            parent_id: parent_id.map(str::to_string),
            seq,
            state_change_unprocessed: false,
            completable: false,
            completable_dirty: true,
            sentry_marks: SentryMarks::default(),
            created_at: now,
            last_transition_at: now,
            ended_at: None,
        };
        let mut event = CaseEvent::for_plan_item(CaseEventType::PlanItemCreated, item.id.clone())
            .with("definition_id", item.definition_id.clone())
            .with("name", item.name.clone())
            .with("kind", item.kind.as_str());
        if let Some(parent_id) = parent_id {
            event = event.with("parent_id", parent_id);
        }
        self.emit(event);
        let id = item.id.clone();
        self.case.plan_items.insert(id.clone(), item);
        id
    }

    fn initialize_plan_item(&mut self, id: &str) -> Result<(), EngineError> {
        let graph = self.graph;
        let Some(item) = self.case.plan_item(id) else {
            return Ok(());
        };
        if item.state != PlanItemState::Available || !self.case.is_active() {
            return Ok(());
        }
        let Some(definition) = graph.get(&item.definition_id) else {
            return Err(EngineError::not_found("plan item definition", item.definition_id.clone()));
        };

        if definition.kind == PlanItemKind::TimerEventListener {
            if let Some(expression) = definition.timer_expression.as_deref() {
                self.schedule_timer(id, expression);
            }
        }

        if definition.entry_criteria.is_empty() {
            if definition.kind.waits_for_occurrence() {
                return Ok(());
            }
            return self.transition(id, entry_transition(definition), TransitionOrigin::Engine);
        }

        let firings = evaluate_armed_sentries(
            &mut self.case,
            graph,
            self.context.evaluator.as_ref(),
            Some(id),
        )?;
        for firing in firings {
            self.fire(firing, true)?;
        }
        Ok(())
    }

    /// Records a satisfied sentry and schedules, or with `inline` applies, its transition.
    fn fire(&mut self, firing: SentryFiring, inline: bool) -> Result<(), EngineError> {
        let kind = match firing.kind {
            SentryKind::Entry => "entry",
            SentryKind::Exit => "exit",
        };
        let mut event = CaseEvent::new(CaseEventType::SentryFired)
            .with("sentry_id", firing.sentry_id.clone())
            .with("kind", kind)
            .with("target_definition_id", firing.target_definition_id.clone());
        if let SentryTarget::PlanItem(id) = &firing.target {
            event.plan_item_instance_id = Some(id.clone());
        }
        self.emit(event);
        info!(
            case_instance_id = %self.case.id,
            sentry = %firing.sentry_id,
            target = %firing.target_definition_id,
            kind,
            "sentry fired"
        );

        let operation = match (firing.target, firing.kind) {
            (SentryTarget::CaseRoot, SentryKind::Exit) => Operation::TerminateCase,
            (SentryTarget::CaseRoot, SentryKind::Entry) => return Ok(()),
            (SentryTarget::PlanItem(id), SentryKind::Exit) => Operation::Transition {
                plan_item_instance_id: id,
                transition: PlanItemTransition::Exit,
                origin: TransitionOrigin::Sentry,
            },
            (SentryTarget::PlanItem(id), SentryKind::Entry) => {
                let graph = self.graph;
                let Some(definition) = graph.get(&firing.target_definition_id) else {
                    return Ok(());
                };
                Operation::Transition {
                    plan_item_instance_id: id,
                    transition: entry_transition(definition),
                    origin: TransitionOrigin::Sentry,
                }
            }
        };
        if inline {
            self.execute(operation)
        } else {
            self.agenda.push(operation);
            Ok(())
        }
    }

    pub(super) fn transition(
        &mut self,
        id: &str,
        transition: PlanItemTransition,
        origin: TransitionOrigin,
    ) -> Result<(), EngineError> {
        let strict = origin == TransitionOrigin::Command;
        if !self.case.is_active() {
            if strict {
                return Err(EngineError::CaseNotActive {
                    case_instance_id: self.case.id.clone(),
                });
            }
            return Ok(());
        }
        let Some(item) = self.case.plan_item(id) else {
            if strict {
                return Err(EngineError::not_found("plan item instance", id));
            }
            debug!(plan_item_instance_id = id, %transition, "stale transition skipped, item removed");
            return Ok(());
        };
        let from = item.state;
        let is_stage = item.is_stage();
        let to = match resolve_transition(from, transition) {
            Ok(to) => to,
            Err(source) if strict => {
                return Err(EngineError::InvalidTransition {
                    plan_item_instance_id: id.to_string(),
                    source,
                });
            }
            Err(_) => {
                debug!(plan_item_instance_id = id, %transition, %from, "stale transition skipped");
                return Ok(());
            }
        };

        if is_stage && to.is_terminal() {
            self.cascade_parent_exit(Some(id))?;
        }
        self.apply_state(id, transition, from, to)?;
        if is_stage && to.is_terminal() {
            for removed in self.case.remove_descendants(id) {
                self.emit(CaseEvent::for_plan_item(CaseEventType::PlanItemRemoved, removed));
            }
        }
        Ok(())
    }

    /// Moves every live descendant of `parent_id` out of the way, children before parents:
    /// active items terminate, items that never started become unavailable.
    fn cascade_parent_exit(&mut self, parent_id: Option<&str>) -> Result<(), EngineError> {
        for id in self.case.descendants_post_order(parent_id) {
            let Some(item) = self.case.plan_item(&id) else {
                continue;
            };
            let from = item.state;
            let Ok(to) = resolve_transition(from, PlanItemTransition::ParentExit) else {
                continue;
            };
            self.apply_state(&id, PlanItemTransition::ParentExit, from, to)?;
        }
        Ok(())
    }

    fn apply_state(
        &mut self,
        id: &str,
        transition: PlanItemTransition,
        from: PlanItemState,
        to: PlanItemState,
    ) -> Result<(), EngineError> {
        let now = self.now();
        let Some(item) = self.case.plan_item_mut(id) else {
            return Ok(());
        };
        item.state = to;
        item.last_transition_at = now;
        if to.is_terminal() {
            item.ended_at = Some(now);
        }
        let activates_stage = item.is_stage() && to == PlanItemState::Active;
        if activates_stage {
            item.state_change_unprocessed = true;
        }
        let item = item.clone();

        self.emit(
            CaseEvent::for_plan_item(CaseEventType::PlanItemTransitioned, item.id.clone())
                .with("transition", transition.as_str())
                .with("from", from.as_str())
                .with("to", to.as_str())
                .with("definition_id", item.definition_id.clone())
                .with("name", item.name.clone()),
        );
        debug!(
            plan_item_instance_id = %item.id,
            name = %item.name,
            %transition,
            %from,
            %to,
            "plan item transitioned"
        );

        self.invoke_listeners(&item, from, to)?;

        if item.kind == PlanItemKind::Milestone && to == PlanItemState::Completed {
            if let Some(milestone) = record_milestone(&mut self.case, &item, now) {
                info!(case_instance_id = %self.case.id, milestone = %milestone.name, "milestone reached");
                self.emit(
                    CaseEvent::for_plan_item(CaseEventType::MilestoneReached, item.id.clone())
                        .with("milestone_instance_id", milestone.id)
                        .with("name", milestone.name),
                );
            }
        }
        if to.is_terminal() {
            self.cancel_timer(&item.id);
        }

        if activates_stage {
            self.agenda.push(Operation::CreateChildren {
                scope: CompletionScope::Stage(item.id.clone()),
            });
        }
        self.agenda.push(Operation::EvaluateSentries {
            source_definition_id: item.definition_id.clone(),
            source_instance_id: item.id.clone(),
            state: to,
        });
        mark_ancestors_dirty(&mut self.case, &item.id);
        self.agenda.push(Operation::EvaluateCompletion {
            scope: CompletionScope::parent_of(&item),
        });
        Ok(())
    }

    fn invoke_listeners(
        &mut self,
        item: &PlanItemInstance,
        from: PlanItemState,
        to: PlanItemState,
    ) -> Result<(), EngineError> {
        let graph = self.graph;
        let Some(definition) = graph.get(&item.definition_id) else {
            return Ok(());
        };
        for listener in definition.listeners.iter().filter(|listener| listener.matches(from, to)) {
            match &listener.action {
                ListenerAction::SetVariables { variables } => {
                    self.update_variables(variables.clone(), Some(&item.id));
                }
                ListenerAction::Delegate { name } => {
                    let Some(handler) = self.context.listeners.get(name).cloned() else {
                        return Err(EngineError::ListenerFailure {
                            listener: name.clone(),
                            reason: "listener is not registered".to_string(),
                        });
                    };
                    let mut listener_context = ListenerContext::new(
                        &self.case.id,
                        &item.id,
                        &item.definition_id,
                        item.kind,
                        from,
                        to,
                        &self.case.variables,
                    );
                    handler
                        .on_transition(&mut listener_context)
                        .map_err(|reason| EngineError::ListenerFailure {
                            listener: name.clone(),
                            reason,
                        })?;
                    let (writes, commands) = listener_context.into_effects();
                    self.update_variables(writes, Some(&item.id));
                    for command in commands {
                        self.agenda.push(Operation::ApplyListenerCommand(command));
                    }
                }
            }
        }
        Ok(())
    }

    /// Merges `variables` into the case scope and schedules re-evaluation of if-parts and of
    /// every running stage's completion.
    pub(super) fn update_variables(&mut self, variables: Map<String, Value>, source: Option<&str>) {
        if variables.is_empty() {
            return;
        }
        let names = variables.keys().cloned().map(Value::String).collect::<Vec<_>>();
        self.case.variables.extend(variables);
        let mut event = CaseEvent::new(CaseEventType::VariablesUpdated).with("names", names);
        event.plan_item_instance_id = source.map(str::to_string);
        self.emit(event);

        self.agenda.push(Operation::EvaluateConditionSentries);
        let graph = self.graph;
        let mut stages = self
            .case
            .plan_items
            .values()
            .filter(|item| item.is_stage() && item.state == PlanItemState::Active)
            .map(|item| (graph.document_order(&item.definition_id), item.seq, item.id.clone()))
            .collect::<Vec<_>>();
        stages.sort();
        for (_, _, id) in stages {
            self.agenda.push(Operation::EvaluateCompletion {
                scope: CompletionScope::Stage(id),
            });
        }
        self.agenda.push(Operation::EvaluateCompletion {
            scope: CompletionScope::CaseRoot,
        });
    }

    fn evaluate_completion(&mut self, scope: CompletionScope) -> Result<(), EngineError> {
        if !scope_is_active(&self.case, &scope) {
            return Ok(());
        }
        if state_change_unprocessed(&self.case, &scope) {
            debug!(scope = scope.label(), "children not materialized yet, completion deferred");
            let mut event = CaseEvent::new(CaseEventType::CompletionDeferred);
            event.plan_item_instance_id = scope.parent_id().map(str::to_string);
            self.emit(event);
            self.agenda.push(Operation::EvaluateCompletion { scope });
            return Ok(());
        }

        let graph = self.graph;
        let Some(status) = refresh_completable(&mut self.case, graph, &scope) else {
            return Ok(());
        };
        let auto_complete = match &scope {
            CompletionScope::CaseRoot => graph.root().auto_complete,
            CompletionScope::Stage(id) => self
                .case
                .plan_item(id)
                .and_then(|stage| graph.get(&stage.definition_id))
                .is_some_and(|definition| definition.auto_complete),
        };
        if !status.should_auto_complete(auto_complete) {
            return Ok(());
        }
        match scope {
            CompletionScope::CaseRoot => self.complete_case(),
            CompletionScope::Stage(id) => {
                self.transition(&id, PlanItemTransition::Complete, TransitionOrigin::Engine)
            }
        }
    }

    fn complete_case(&mut self) -> Result<(), EngineError> {
        if !self.case.is_active() {
            return Ok(());
        }
        if let Some(interceptor) = self.context.end_interceptor.as_ref() {
            interceptor
                .before_case_end(&self.case)
                .map_err(|reason| EngineError::InterceptorFailure {
                    case_instance_id: self.case.id.clone(),
                    reason,
                })?;
        }
        self.cascade_parent_exit(None)?;
        self.end_case(CaseState::Completed, CaseEventType::CaseCompleted);
        Ok(())
    }

    fn terminate_case(&mut self) -> Result<(), EngineError> {
        if !self.case.is_active() {
            return Ok(());
        }
        self.cascade_parent_exit(None)?;
        self.end_case(CaseState::Terminated, CaseEventType::CaseTerminated);
        Ok(())
    }

    fn end_case(&mut self, state: CaseState, event_type: CaseEventType) {
        self.case.state = state;
        self.case.ended_at = Some(self.now());
        self.case.completable_dirty = true;
        self.emit(CaseEvent::new(event_type));
        info!(case_instance_id = %self.case.id, state = ?state, "case ended");
    }

    fn schedule_timer(&mut self, plan_item_instance_id: &str, expression: &str) {
        let job = TimerJob {
            id: uuid::Uuid::new_v4().to_string(),
            plan_item_instance_id: plan_item_instance_id.to_string(),
            timer_expression: expression.to_string(),
            executable: false,
        };
        self.job_requests.push(JobRequest::ScheduleTimer {
            job_id: job.id.clone(),
            case_instance_id: self.case.id.clone(),
            plan_item_instance_id: job.plan_item_instance_id.clone(),
            timer_expression: job.timer_expression.clone(),
        });
        self.emit(
            CaseEvent::for_plan_item(CaseEventType::TimerScheduled, plan_item_instance_id)
                .with("job_id", job.id.clone())
                .with("timer_expression", expression),
        );
        self.case.timer_jobs.insert(job.id.clone(), job);
    }

    fn cancel_timer(&mut self, plan_item_instance_id: &str) {
        let Some(job_id) = self
            .case
            .timer_job_for(plan_item_instance_id)
            .map(|job| job.id.clone())
        else {
            return;
        };
        self.case.timer_jobs.remove(&job_id);
        self.job_requests.push(JobRequest::Cancel {
            job_id: job_id.clone(),
        });
        self.emit(
            CaseEvent::for_plan_item(CaseEventType::TimerCancelled, plan_item_instance_id)
                .with("job_id", job_id),
        );
    }

    pub(super) fn emit(&mut self, event: CaseEvent) {
        let ts = format_timestamp(self.now());
        let record = self.stream.next_record(ts, event);
        self.records.push(record);
    }

    pub(super) fn now(&self) -> DateTime<Utc> {
        self.context.clock.now()
    }
}

/// Transition an entry sentry (or the absence of entry criteria) applies to `definition`.
pub(crate) fn entry_transition(definition: &PlanItemDefinition) -> PlanItemTransition {
    if definition.kind.occurs_instantly() {
        PlanItemTransition::Occur
    } else if definition.manual_activation {
        PlanItemTransition::Enable
    } else {
        PlanItemTransition::Start
    }
}
