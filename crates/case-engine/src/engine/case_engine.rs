use super::definitions::{DefinitionRepository, DeployedDefinition};
use super::options::EngineOptions;
use crate::agenda::{TransitionOrigin, UnitOfWork, UnitOfWorkOutcome};
use crate::checkpoint::CheckpointDocument;
use crate::commands::{
    CaseCommand, CaseCommandEnvelope, CommandAdmission, CommandDeduper, DuplicateCommandMode, StartCaseRequest,
};
use crate::completion::{read_completable, CompletionScope};
use crate::context::ExecutionContext;
use crate::error::EngineError;
use crate::events::CaseEventRecord;
use crate::model::{CaseInstance, PlanItemInstance};
use crate::query::{CaseInstanceQuery, PlanItemInstanceQuery, QueryError};
use crate::store::{CaseStore, CaseStoreError, InMemoryCaseStore};
use case_core::CaseDefinition;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq)]
pub struct CommandOutcome {
    /// Snapshot after commit. Ended cases are returned once more even though they left the store.
    pub case_instance: Option<CaseInstance>,
    pub events: Vec<CaseEventRecord>,
    pub duplicate: bool,
}

impl CommandOutcome {
    fn duplicate() -> Self {
        Self {
            case_instance: None,
            events: Vec::new(),
            duplicate: true,
        }
    }
}

pub struct CaseEngine {
    context: ExecutionContext,
    store: Arc<dyn CaseStore>,
    definitions: DefinitionRepository,
    options: EngineOptions,
    deduper: Mutex<CommandDeduper>,
}

impl CaseEngine {
    pub fn new(context: ExecutionContext, store: Arc<dyn CaseStore>, options: EngineOptions) -> Self {
        let deduper = CommandDeduper::new(options.duplicate_command_mode);
        Self {
            context,
            store,
            definitions: DefinitionRepository::new(),
            options,
            deduper: Mutex::new(deduper),
        }
    }

    pub fn in_memory(context: ExecutionContext) -> Self {
        Self::new(context, Arc::new(InMemoryCaseStore::new()), EngineOptions::default())
    }

    pub fn context(&self) -> &ExecutionContext {
        &self.context
    }

    pub fn store(&self) -> &dyn CaseStore {
        self.store.as_ref()
    }

    pub fn definitions(&self) -> &DefinitionRepository {
        &self.definitions
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    pub fn deploy(&self, definition: CaseDefinition) -> Result<Arc<DeployedDefinition>, EngineError> {
        self.definitions.deploy(definition)
    }

    pub fn start_case(&self, request: StartCaseRequest) -> Result<CaseInstance, EngineError> {
        let outcome = self.execute(&CaseCommand::StartCase(request))?;
        outcome
            .case_instance
            .ok_or_else(|| EngineError::not_found("case instance", "<started>"))
    }

    /// Runs one command as one unit of work: load, drain to quiescence, commit, then flush events
    /// and job requests. Any error leaves the store and the history untouched.
    pub fn execute(&self, command: &CaseCommand) -> Result<CommandOutcome, EngineError> {
        if let CaseCommand::StartCase(request) = command {
            return self.run_start_case(request);
        }

        let case_instance_id = self.locate_case(command)?;
        let snapshot = self
            .store
            .load(&case_instance_id)?
            .ok_or_else(|| EngineError::not_found("case instance", case_instance_id.clone()))?;
        let expected_version = snapshot.version;
        let deployment = self.deployment_for(&snapshot)?;

        let mut unit = UnitOfWork::new(
            snapshot,
            &deployment.graph,
            &self.context,
            self.options.max_operations_per_unit,
        );
        unit.apply_command(command, TransitionOrigin::Command)?;
        unit.run()?;
        self.commit(unit.finish(), Some(expected_version))
    }

    /// Applies an enveloped command once per command id. While one envelope runs, another
    /// envelope with the same id fails with `CommandInFlight` instead of reporting a no-op.
    pub fn execute_envelope(&self, envelope: &CaseCommandEnvelope) -> Result<CommandOutcome, EngineError> {
        let admission = self.lock_deduper().begin(&envelope.id);
        match admission {
            CommandAdmission::Fresh => {}
            CommandAdmission::InFlight => {
                warn!(command_id = %envelope.id, "command with the same id is still running");
                return Err(EngineError::CommandInFlight {
                    command_id: envelope.id.clone(),
                });
            }
            CommandAdmission::Seen => {
                return match self.options.duplicate_command_mode {
                    DuplicateCommandMode::AcceptNoop => {
                        info!(command_id = %envelope.id, "duplicate command accepted as no-op");
                        Ok(CommandOutcome::duplicate())
                    }
                    DuplicateCommandMode::Reject => {
                        warn!(command_id = %envelope.id, "duplicate command rejected");
                        Err(EngineError::DuplicateCommand {
                            command_id: envelope.id.clone(),
                        })
                    }
                };
            }
        }
        let result = self.execute(&envelope.command);
        self.lock_deduper().finish(&envelope.id, result.is_ok());
        result
    }

    /// Re-runs `command` from fresh state while it loses optimistic-concurrency races.
    pub fn execute_with_retry(
        &self,
        command: &CaseCommand,
        max_attempts: usize,
    ) -> Result<CommandOutcome, EngineError> {
        let mut attempt = 1;
        loop {
            match self.execute(command) {
                Err(err) if err.is_concurrent_modification() && attempt < max_attempts => {
                    warn!(attempt, command = command.command_type(), "retrying after {err}");
                    attempt += 1;
                }
                result => return result,
            }
        }
    }

    pub fn case_instance(&self, case_instance_id: &str) -> Result<Option<CaseInstance>, EngineError> {
        Ok(self.store.load(case_instance_id)?)
    }

    pub fn plan_items(&self, query: &PlanItemInstanceQuery) -> Result<Vec<PlanItemInstance>, QueryError> {
        query.list(self.store.as_ref())
    }

    pub fn cases(&self, query: &CaseInstanceQuery) -> Result<Vec<CaseInstance>, QueryError> {
        query.list(self.store.as_ref())
    }

    /// Completable flag of a stage, or of the case root. Never mutates the stored case.
    pub fn is_completable(
        &self,
        case_instance_id: &str,
        stage_instance_id: Option<&str>,
    ) -> Result<bool, EngineError> {
        let case = self
            .store
            .load(case_instance_id)?
            .ok_or_else(|| EngineError::not_found("case instance", case_instance_id))?;
        let deployment = self.deployment_for(&case)?;
        let scope = match stage_instance_id {
            Some(id) => CompletionScope::Stage(id.to_string()),
            None => CompletionScope::CaseRoot,
        };
        read_completable(&case, &deployment.graph, &scope)
            .ok_or_else(|| EngineError::not_found("stage instance", scope.label()))
    }

    /// Restores a case saved in a checkpoint. The definition it ran on must be deployed.
    pub fn import_checkpoint(&self, document: &CheckpointDocument) -> Result<CaseInstance, EngineError> {
        let mut case = document.case_instance.clone();
        if self
            .definitions
            .find_by_hash(&case.definition_key, &document.definition_hash)
            .is_none()
        {
            let expected = self
                .definitions
                .latest(&case.definition_key)
                .map(|deployed| deployed.hash.clone())
                .ok_or_else(|| EngineError::UnknownDefinition {
                    key: case.definition_key.clone(),
                })?;
            return Err(EngineError::DefinitionHashMismatch {
                expected,
                actual: document.definition_hash.clone(),
            });
        }
        case.version = self.store.insert(case.clone())?;
        let mut deduper = self.lock_deduper();
        for command_id in &document.seen_command_ids {
            deduper.mark_seen(command_id.clone());
        }
        Ok(case)
    }

    pub fn seen_command_ids(&self) -> Vec<String> {
        self.lock_deduper().seen_command_ids()
    }

    fn run_start_case(&self, request: &StartCaseRequest) -> Result<CommandOutcome, EngineError> {
        let deployment = self
            .definitions
            .latest(&request.definition_key)
            .ok_or_else(|| EngineError::UnknownDefinition {
                key: request.definition_key.clone(),
            })?;
        let mut case = CaseInstance::new(
            uuid::Uuid::new_v4().to_string(),
            deployment.key.clone(),
            deployment.version,
            deployment.hash.clone(),
            self.context.clock.now(),
        );
        case.name = request.name.clone();
        case.business_key = request.business_key.clone();
        case.business_status = request.business_status.clone();
        case.callback_id = request.callback_id.clone();
        case.callback_type = request.callback_type.clone();
        case.variables = request.variables.clone();

        let mut unit = UnitOfWork::new(
            case,
            &deployment.graph,
            &self.context,
            self.options.max_operations_per_unit,
        );
        unit.begin_case();
        unit.run()?;
        self.commit(unit.finish(), None)
    }

    fn commit(
        &self,
        outcome: UnitOfWorkOutcome,
        expected_version: Option<u64>,
    ) -> Result<CommandOutcome, EngineError> {
        let UnitOfWorkOutcome {
            mut case,
            records,
            job_requests,
        } = outcome;

        if case.state.is_ended() {
            if let Some(expected) = expected_version {
                self.store
                    .remove(&case.id, expected)
                    .map_err(concurrent_modification)?;
            }
            self.context.history.record_events(&records);
            self.context.history.record_case_ended(&case);
            info!(case_instance_id = %case.id, state = ?case.state, "case left the runtime store");
        } else {
            case.version = match expected_version {
                Some(expected) => self
                    .store
                    .commit(case.clone(), expected)
                    .map_err(concurrent_modification)?,
                None => self.store.insert(case.clone())?,
            };
            self.context.history.record_events(&records);
        }

        for request in &job_requests {
            self.context.jobs.submit(request);
        }
        Ok(CommandOutcome {
            case_instance: Some(case),
            events: records,
            duplicate: false,
        })
    }

    fn locate_case(&self, command: &CaseCommand) -> Result<String, EngineError> {
        if let Some(case_instance_id) = command.case_instance_id() {
            return Ok(case_instance_id.to_string());
        }
        if let Some(id) = command
            .plan_item_target()
            .and_then(|target| target.plan_item_instance_id.as_deref())
        {
            return self
                .store
                .find_case_for_plan_item(id)?
                .ok_or_else(|| EngineError::not_found("plan item instance", id));
        }
        if let Some(job_id) = command.job_id() {
            return self
                .store
                .find_case_for_job(job_id)?
                .ok_or_else(|| EngineError::not_found("job", job_id));
        }
        Err(EngineError::not_found("case instance", "<unaddressed command>"))
    }

    fn deployment_for(&self, case: &CaseInstance) -> Result<Arc<DeployedDefinition>, EngineError> {
        self.definitions
            .get(&case.definition_key, case.definition_version)
            .ok_or_else(|| EngineError::UnknownDefinition {
                key: case.definition_key.clone(),
            })
    }

    fn lock_deduper(&self) -> MutexGuard<'_, CommandDeduper> {
        match self.deduper.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

fn concurrent_modification(err: CaseStoreError) -> EngineError {
    match err {
        CaseStoreError::VersionConflict {
            case_instance_id,
            expected,
            actual,
        } => {
            warn!(%case_instance_id, expected, actual, "concurrent modification detected");
            EngineError::ConcurrentModification {
                case_instance_id,
                expected,
                actual,
            }
        }
        other => EngineError::Store(other),
    }
}

#[cfg(test)]
#[path = "case_engine_test.rs"]
mod tests;
