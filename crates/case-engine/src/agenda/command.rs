use super::operation::{Operation, TransitionOrigin};
use super::unit_of_work::UnitOfWork;
use crate::commands::{CaseCommand, PlanItemTarget};
use crate::completion::{read_completable, CompletionScope};
use crate::context::JobRequest;
use crate::error::EngineError;
use crate::events::{CaseEvent, CaseEventType};
use case_core::{resolve_transition, PlanItemKind, PlanItemState, PlanItemTransition};
use tracing::debug;

impl UnitOfWork<'_> {
    /// Translates a command into operations on this case. Case creation is handled by the engine.
    pub fn apply_command(
        &mut self,
        command: &CaseCommand,
        origin: TransitionOrigin,
    ) -> Result<(), EngineError> {
        if let Some(case_instance_id) = command.case_instance_id() {
            if case_instance_id != self.case.id {
                return Err(match origin {
                    TransitionOrigin::Command => {
                        EngineError::not_found("case instance", case_instance_id)
                    }
                    _ => EngineError::UnsupportedListenerCommand {
                        command_type: command.command_type().to_string(),
                    },
                });
            }
        }
        if !self.case.is_active() {
            return Err(EngineError::CaseNotActive {
                case_instance_id: self.case.id.clone(),
            });
        }
        debug!(case_instance_id = %self.case.id, command = command.command_type(), "applying command");

        match command {
            CaseCommand::StartCase(_) => Err(EngineError::UnsupportedListenerCommand {
                command_type: command.command_type().to_string(),
            }),
            CaseCommand::StartPlanItem(target) => {
                self.push_checked_transition(target, PlanItemTransition::ManualStart, origin)
            }
            CaseCommand::TriggerPlanItem(target) => {
                let id = self.resolve_target(target)?;
                let transition = match self.case.plan_item(&id) {
                    Some(item)
                        if item.kind.waits_for_occurrence()
                            && matches!(item.state, PlanItemState::Available | PlanItemState::Enabled) =>
                    {
                        PlanItemTransition::Occur
                    }
                    _ => PlanItemTransition::Complete,
                };
                if transition == PlanItemTransition::Complete {
                    self.ensure_stage_completable(&id)?;
                }
                self.push_transition(id, transition, origin)
            }
            CaseCommand::CompletePlanItem(target) => {
                let id = self.resolve_target(target)?;
                self.ensure_stage_completable(&id)?;
                self.push_transition(id, PlanItemTransition::Complete, origin)
            }
            CaseCommand::TerminatePlanItem(target) => {
                self.push_checked_transition(target, PlanItemTransition::Terminate, origin)
            }
            CaseCommand::CompleteUserEventListener(target) => {
                let id = self.resolve_target(target)?;
                if let Some(item) = self.case.plan_item(&id) {
                    if item.kind != PlanItemKind::UserEventListener {
                        return Err(EngineError::WrongPlanItemKind {
                            plan_item_instance_id: id,
                            expected: PlanItemKind::UserEventListener.as_str(),
                            actual: item.kind.as_str(),
                        });
                    }
                }
                self.push_transition(id, PlanItemTransition::Occur, origin)
            }
            CaseCommand::TerminateCase { .. } => {
                self.agenda.push(Operation::TerminateCase);
                Ok(())
            }
            CaseCommand::CompleteCase { .. } => {
                if read_completable(&self.case, self.graph, &CompletionScope::CaseRoot) != Some(true) {
                    return Err(EngineError::NotCompletable {
                        id: self.case.id.clone(),
                    });
                }
                self.agenda.push(Operation::CompleteCase);
                Ok(())
            }
            CaseCommand::SetCaseName { name, .. } => {
                self.case.name = name.clone();
                let event = CaseEvent::new(CaseEventType::CaseNameChanged)
                    .with("name", name.clone().map_or(serde_json::Value::Null, Into::into));
                self.emit(event);
                Ok(())
            }
            CaseCommand::SetBusinessStatus {
                business_status, ..
            } => {
                self.case.business_status = business_status.clone();
                let event = CaseEvent::new(CaseEventType::BusinessStatusChanged).with(
                    "business_status",
                    business_status
                        .clone()
                        .map_or(serde_json::Value::Null, Into::into),
                );
                self.emit(event);
                Ok(())
            }
            CaseCommand::SetVariables { variables, .. } => {
                self.update_variables(variables.clone(), None);
                Ok(())
            }
            CaseCommand::MoveTimerToExecutable { job_id } => {
                let Some(job) = self.case.timer_jobs.get_mut(job_id) else {
                    return Err(EngineError::not_found("job", job_id.clone()));
                };
                job.executable = true;
                let plan_item_instance_id = job.plan_item_instance_id.clone();
                self.job_requests.push(JobRequest::MarkExecutable {
                    job_id: job_id.clone(),
                });
                self.emit(
                    CaseEvent::for_plan_item(CaseEventType::TimerExecutable, plan_item_instance_id)
                        .with("job_id", job_id.clone()),
                );
                Ok(())
            }
            CaseCommand::ExecuteJob { job_id } => {
                let Some(job) = self.case.timer_jobs.remove(job_id) else {
                    return Err(EngineError::not_found("job", job_id.clone()));
                };
                self.agenda.push(Operation::Transition {
                    plan_item_instance_id: job.plan_item_instance_id,
                    transition: PlanItemTransition::Occur,
                    origin,
                });
                Ok(())
            }
            CaseCommand::EvaluateCompletable {
                plan_item_instance_id,
                ..
            } => {
                let scope = match plan_item_instance_id {
                    None => CompletionScope::CaseRoot,
                    Some(id) => {
                        if !self.case.plan_item(id).is_some_and(|item| item.is_stage()) {
                            return Err(EngineError::not_found("stage instance", id.clone()));
                        }
                        CompletionScope::Stage(id.clone())
                    }
                };
                self.agenda.push(Operation::ForceCompletable { scope });
                Ok(())
            }
        }
    }

    fn push_checked_transition(
        &mut self,
        target: &PlanItemTarget,
        transition: PlanItemTransition,
        origin: TransitionOrigin,
    ) -> Result<(), EngineError> {
        let id = self.resolve_target(target)?;
        self.push_transition(id, transition, origin)
    }

    /// Stages complete on request only when no child is active and every required child is
    /// terminal. Other kinds pass through.
    fn ensure_stage_completable(&self, id: &str) -> Result<(), EngineError> {
        let is_stage = self.case.plan_item(id).is_some_and(|item| item.is_stage());
        if is_stage
            && read_completable(&self.case, self.graph, &CompletionScope::Stage(id.to_string())) != Some(true)
        {
            return Err(EngineError::NotCompletable { id: id.to_string() });
        }
        Ok(())
    }

    /// Validates `transition` against the current state before queueing it.
    fn push_transition(
        &mut self,
        id: String,
        transition: PlanItemTransition,
        origin: TransitionOrigin,
    ) -> Result<(), EngineError> {
        let Some(item) = self.case.plan_item(&id) else {
            return Err(EngineError::not_found("plan item instance", id));
        };
        if let Err(source) = resolve_transition(item.state, transition) {
            return Err(EngineError::InvalidTransition {
                plan_item_instance_id: id,
                source,
            });
        }
        self.agenda.push(Operation::Transition {
            plan_item_instance_id: id,
            transition,
            origin,
        });
        Ok(())
    }

    /// Finds the single live plan item instance addressed by `target`.
    pub fn resolve_target(&self, target: &PlanItemTarget) -> Result<String, EngineError> {
        if let Some(id) = target.plan_item_instance_id.as_ref() {
            return match self.case.plan_item(id) {
                Some(item) => Ok(item.id.clone()),
                None => Err(EngineError::not_found("plan item instance", id.clone())),
            };
        }
        let Some(name) = target.name.as_ref() else {
            return Err(EngineError::not_found("plan item instance", "<unnamed target>"));
        };
        let matches = self
            .case
            .plan_items
            .values()
            .filter(|item| !item.is_terminal() && &item.name == name)
            .collect::<Vec<_>>();
        match matches.as_slice() {
            [] => Err(EngineError::not_found("plan item instance", name.clone())),
            [item] => Ok(item.id.clone()),
            _ => Err(EngineError::AmbiguousResult {
                entity: "plan item instance",
                count: matches.len(),
            }),
        }
    }
}
