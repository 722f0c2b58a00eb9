use crate::cli::{InspectCommand, OutputFormat, RunCommand, ValidateCommand};
use crate::config::{build_execution_context, load_runner_config, RunnerConfig};
use crate::io::load_case_definition;
use case_core::{
    definition_hash, validate_case_definition, IssueSeverity, PlanItemDefinition,
    StructuredIssue,
};
use case_engine::{
    create_checkpoint_document, decode_command_jsonl_line, encode_event_jsonl_line,
    load_checkpoint_from_path, save_checkpoint_to_path, CaseCommand, CaseCommandEnvelope, CaseEngine,
    CaseEventRecord, CaseInstance, CheckpointDocument, EngineError, InMemoryCaseStore,
    InMemoryHistory, PlanItemInstance, StartCaseRequest,
};
use serde_json::{json, Value};
use std::fs;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// Stands for the running case id inside command files.
pub const CASE_PLACEHOLDER: &str = "$case";

#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    #[error("read file failed `{path}`: {source}")]
    ReadFile {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("case definition rejected:\n{}", render_issue_lines(.0))]
    Definition(Vec<StructuredIssue>),
    #[error("runner config load failed: {0}")]
    ConfigLoad(String),
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error("command `{command_id}` failed: {source}")]
    Command {
        command_id: String,
        #[source]
        source: EngineError,
    },
    #[error("commands jsonl decode failed at line {line}: {reason}")]
    CommandDecode { line: usize, reason: String },
    #[error("read commands failed: {0}")]
    CommandsIo(String),
    #[error("write events JSONL failed: {0}")]
    EventsIo(String),
    #[error("checkpoint load failed `{path}`: {reason}")]
    CheckpointLoad { path: String, reason: String },
    #[error("checkpoint save failed `{path}`: {reason}")]
    CheckpointSave { path: String, reason: String },
    #[error("json encode failed: {0}")]
    JsonEncode(#[from] serde_json::Error),
}

struct RunSummary {
    case_instance: CaseInstance,
    resumed_from_checkpoint: bool,
    commands_applied: usize,
    commands_duplicate: usize,
    checkpoint_written: bool,
    events: Vec<CaseEventRecord>,
}

pub fn execute_run(command: &RunCommand) -> Result<String, RunnerError> {
    let config = match &command.config {
        Some(path) => load_runner_config(path).map_err(|error| RunnerError::ConfigLoad(error.to_string()))?,
        None => RunnerConfig::default(),
    };
    let definition = load_case_definition(&command.definition).map_err(RunnerError::Definition)?;

    let history = Arc::new(InMemoryHistory::new());
    let context = build_execution_context(&config, history.clone());
    let engine = CaseEngine::new(context, Arc::new(InMemoryCaseStore::new()), config.engine.clone());
    let deployed = engine.deploy(definition)?;

    let (mut case_instance, resumed_from_checkpoint) = match &command.resume {
        Some(path) => {
            let document = read_checkpoint(path)?;
            let case_instance = engine.import_checkpoint(&document)?;
            info!(case_instance_id = %case_instance.id, "case resumed from checkpoint");
            (case_instance, true)
        }
        None => {
            let request = StartCaseRequest {
                definition_key: deployed.key.clone(),
                variables: config.variables.clone(),
                business_key: command
                    .business_key
                    .clone()
                    .or_else(|| config.business_key.clone()),
                ..StartCaseRequest::default()
            };
            let case_instance = engine.start_case(request)?;
            info!(case_instance_id = %case_instance.id, version = deployed.version, "case started");
            (case_instance, false)
        }
    };

    let mut envelopes = Vec::<CaseCommandEnvelope>::new();
    if let Some(path) = &command.commands {
        let file = fs::File::open(path).map_err(|source| RunnerError::ReadFile {
            path: path.display().to_string(),
            source,
        })?;
        envelopes.extend(read_command_jsonl(BufReader::new(file))?);
    }
    envelopes.extend(read_commands_from_stdin(command.commands_stdin_jsonl)?);

    let mut commands_applied = 0;
    let mut commands_duplicate = 0;
    for mut envelope in envelopes {
        envelope
            .command
            .bind_case_placeholder(CASE_PLACEHOLDER, case_instance.id.as_str());
        let outcome = engine
            .execute_envelope(&envelope)
            .map_err(|source| RunnerError::Command {
                command_id: envelope.id.clone(),
                source,
            })?;
        if outcome.duplicate {
            commands_duplicate += 1;
            continue;
        }
        commands_applied += 1;
        debug!(
            command_id = %envelope.id,
            command = envelope.command.command_type(),
            events = outcome.events.len(),
            "command applied"
        );
        if let Some(snapshot) = outcome.case_instance {
            if snapshot.id == case_instance.id {
                case_instance = snapshot;
            }
        }
    }

    let checkpoint_written = maybe_save_checkpoint(command, &engine, &case_instance)?;
    let summary = RunSummary {
        case_instance,
        resumed_from_checkpoint,
        commands_applied,
        commands_duplicate,
        checkpoint_written,
        events: history.events(),
    };
    write_event_sinks(command, &summary.events)?;
    render_run_output(command, &summary)
}

pub fn execute_validate(command: &ValidateCommand) -> Result<String, RunnerError> {
    let definition = load_case_definition(&command.definition).map_err(RunnerError::Definition)?;
    let mut issues = validate_case_definition(&definition);
    StructuredIssue::sort_stable(&mut issues);
    if StructuredIssue::has_errors(&issues) {
        return Err(RunnerError::Definition(issues));
    }
    let hash = definition_hash(&definition)?;
    let plan_items = count_plan_items(&definition.plan_model) - 1;

    let output = match command.format {
        OutputFormat::Json => serde_json::to_string_pretty(&json!({
            "schema": "case-runner-validate/0.0.1",
            "key": definition.key,
            "hash": hash,
            "plan_items": plan_items,
            "issues": issues,
        }))?,
        OutputFormat::Text => {
            let mut out = format!(
                "case definition ok\nkey: {}\nhash: {}\nplan_items: {}\nwarnings: {}",
                definition.key,
                hash,
                plan_items,
                issues.len()
            );
            if !issues.is_empty() {
                out.push('\n');
                out.push_str(render_issue_lines(&issues).as_str());
            }
            out
        }
    };
    Ok(output)
}

pub fn execute_inspect(command: &InspectCommand) -> Result<String, RunnerError> {
    let document = read_checkpoint(&command.checkpoint)?;
    let case = &document.case_instance;
    let items = items_in_creation_order(case);
    let output = match command.format {
        OutputFormat::Json => serde_json::to_string_pretty(&json!({
            "schema": "case-runner-inspect/0.0.1",
            "checkpoint_schema": document.schema,
            "case_instance_id": case.id,
            "definition_key": case.definition_key,
            "definition_hash": document.definition_hash,
            "state": case.state.as_str(),
            "version": case.version,
            "business_key": case.business_key,
            "plan_items": items.iter().map(|item| plan_item_json(item)).collect::<Vec<_>>(),
            "milestones": case.milestones.iter().map(|fact| fact.name.clone()).collect::<Vec<_>>(),
            "timer_jobs": case.timer_jobs.len(),
            "seen_command_ids": document.seen_command_ids,
        }))?,
        OutputFormat::Text => {
            let mut out = format!(
                "case checkpoint\ncase: {}\ndefinition: {} ({})\nstate: {}\nversion: {}\nseen_commands: {}\ntimer_jobs: {}\nmilestones: {}",
                case.id,
                case.definition_key,
                document.definition_hash,
                case.state.as_str(),
                case.version,
                document.seen_command_ids.len(),
                case.timer_jobs.len(),
                milestone_names(case)
            );
            push_plan_item_lines(&mut out, &items);
            out
        }
    };
    Ok(output)
}

fn read_checkpoint(path: &Path) -> Result<CheckpointDocument, RunnerError> {
    load_checkpoint_from_path(path).map_err(|error| RunnerError::CheckpointLoad {
        path: path.display().to_string(),
        reason: error.to_string(),
    })
}

/// Ended cases leave nothing to resume, so only running cases are saved.
fn maybe_save_checkpoint(
    command: &RunCommand,
    engine: &CaseEngine,
    case_instance: &CaseInstance,
) -> Result<bool, RunnerError> {
    let Some(path) = &command.checkpoint else {
        return Ok(false);
    };
    if !case_instance.is_active() {
        info!(
            case_instance_id = %case_instance.id,
            state = case_instance.state.as_str(),
            "case ended, checkpoint skipped"
        );
        return Ok(false);
    }
    let document = create_checkpoint_document(case_instance, engine.seen_command_ids());
    save_checkpoint_to_path(path, &document).map_err(|error| RunnerError::CheckpointSave {
        path: path.display().to_string(),
        reason: error.to_string(),
    })?;
    Ok(true)
}

fn render_run_output(command: &RunCommand, summary: &RunSummary) -> Result<String, RunnerError> {
    if command.events_jsonl.as_deref() == Some("-") {
        let mut out = String::new();
        for event in &summary.events {
            out.push_str(
                encode_event_jsonl_line(event)
                    .map_err(|error| RunnerError::EventsIo(error.to_string()))?
                    .as_str(),
            );
        }
        return Ok(out);
    }

    let case = &summary.case_instance;
    let items = items_in_creation_order(case);
    let output = match command.format {
        OutputFormat::Json => serde_json::to_string_pretty(&json!({
            "schema": "case-runner-run/0.0.1",
            "case_instance_id": case.id,
            "definition_key": case.definition_key,
            "definition_version": case.definition_version,
            "state": case.state.as_str(),
            "business_key": case.business_key,
            "resumed_from_checkpoint": summary.resumed_from_checkpoint,
            "commands_applied": summary.commands_applied,
            "commands_duplicate": summary.commands_duplicate,
            "checkpoint_written": summary.checkpoint_written,
            "events_emitted": summary.events.len(),
            "variables": case.variables,
            "plan_items": items.iter().map(|item| plan_item_json(item)).collect::<Vec<_>>(),
            "milestones": case.milestones.iter().map(|fact| fact.name.clone()).collect::<Vec<_>>(),
        }))?,
        OutputFormat::Text => {
            let mut out = format!(
                "case run\ncase: {}\ndefinition: {} v{}\nstate: {}\nresumed_from_checkpoint: {}\ncommands_applied: {}\ncommands_duplicate: {}\ncheckpoint_written: {}\nevents: {}\nmilestones: {}",
                case.id,
                case.definition_key,
                case.definition_version,
                case.state.as_str(),
                summary.resumed_from_checkpoint,
                summary.commands_applied,
                summary.commands_duplicate,
                summary.checkpoint_written,
                summary.events.len(),
                milestone_names(case)
            );
            push_plan_item_lines(&mut out, &items);
            out
        }
    };
    Ok(output)
}

fn write_event_sinks(command: &RunCommand, events: &[CaseEventRecord]) -> Result<(), RunnerError> {
    if command.verbose {
        write_verbose_events(events);
    }
    let Some(target) = &command.events_jsonl else {
        return Ok(());
    };
    if target == "-" {
        return Ok(());
    }
    let mut file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(target)
        .map_err(|error| RunnerError::EventsIo(error.to_string()))?;
    for event in events {
        let line = encode_event_jsonl_line(event).map_err(|error| RunnerError::EventsIo(error.to_string()))?;
        file.write_all(line.as_bytes())
            .map_err(|error| RunnerError::EventsIo(error.to_string()))?;
    }
    Ok(())
}

fn write_verbose_events(events: &[CaseEventRecord]) {
    for record in events {
        let event_type = serde_json::to_value(record.event.event_type)
            .ok()
            .and_then(|value| value.as_str().map(str::to_string))
            .unwrap_or_else(|| format!("{:?}", record.event.event_type));
        let item = record.event.plan_item_instance_id.as_deref().unwrap_or("-");
        let to = record.event.data.get("to").and_then(Value::as_str).unwrap_or("-");
        eprintln!(
            "[event seq={} type={} item={} to={}]",
            record.seq, event_type, item, to
        );
    }
}

fn items_in_creation_order(case: &CaseInstance) -> Vec<&PlanItemInstance> {
    let mut items = case.plan_items.values().collect::<Vec<_>>();
    items.sort_by_key(|item| item.seq);
    items
}

fn plan_item_json(item: &PlanItemInstance) -> Value {
    json!({
        "id": item.id,
        "definition_id": item.definition_id,
        "name": item.name,
        "kind": item.kind.as_str(),
        "state": item.state.as_str(),
        "parent_id": item.parent_id,
    })
}

fn push_plan_item_lines(out: &mut String, items: &[&PlanItemInstance]) {
    out.push_str("\nplan_items:");
    for item in items {
        let depth = item_depth(items, item);
        out.push_str(
            format!(
                "\n{}{} [{}] {}",
                "  ".repeat(depth + 1),
                item.name,
                item.kind.as_str(),
                item.state.as_str()
            )
            .as_str(),
        );
    }
}

fn item_depth(items: &[&PlanItemInstance], item: &PlanItemInstance) -> usize {
    let mut depth = 0;
    let mut parent = item.parent_id.as_deref();
    while let Some(parent_id) = parent {
        depth += 1;
        parent = items
            .iter()
            .find(|candidate| candidate.id == parent_id)
            .and_then(|candidate| candidate.parent_id.as_deref());
    }
    depth
}

fn milestone_names(case: &CaseInstance) -> String {
    if case.milestones.is_empty() {
        return "none".to_string();
    }
    case.milestones
        .iter()
        .map(|fact| fact.name.as_str())
        .collect::<Vec<_>>()
        .join(",")
}

fn count_plan_items(item: &PlanItemDefinition) -> usize {
    1 + item.children.iter().map(count_plan_items).sum::<usize>()
}

fn render_issue_lines(issues: &[StructuredIssue]) -> String {
    issues
        .iter()
        .map(|issue| {
            let severity = match issue.severity {
                IssueSeverity::Error => "error",
                IssueSeverity::Warning => "warning",
                IssueSeverity::Info => "info",
            };
            let file = issue
                .related
                .as_ref()
                .and_then(|related| related.get("file"))
                .and_then(Value::as_str)
                .map(|file| format!("{file}: "))
                .unwrap_or_default();
            format!(
                "  {severity} [{}] {file}{} at {}: {}",
                issue.kind,
                issue.plan_item_id.as_deref().unwrap_or("-"),
                issue.field_path,
                issue.message
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn read_commands_from_stdin(enabled: bool) -> Result<Vec<CaseCommandEnvelope>, RunnerError> {
    if !enabled {
        return Ok(Vec::new());
    }
    let stdin = std::io::stdin();
    let reader = BufReader::new(stdin.lock());
    read_command_jsonl(reader)
}

fn read_command_jsonl(reader: impl BufRead) -> Result<Vec<CaseCommandEnvelope>, RunnerError> {
    let mut commands = Vec::<CaseCommandEnvelope>::new();
    for (line_index, line_result) in reader.lines().enumerate() {
        let line = line_result.map_err(|error| RunnerError::CommandsIo(error.to_string()))?;
        if line.trim().is_empty() {
            continue;
        }
        let envelope = decode_command_jsonl_line(line.as_str()).map_err(|error| RunnerError::CommandDecode {
            line: line_index + 1,
            reason: error.to_string(),
        })?;
        if let CaseCommand::StartCase(request) = &envelope.command {
            debug!(definition_key = %request.definition_key, "command stream starts another case");
        }
        commands.push(envelope);
    }
    Ok(commands)
}

#[cfg(test)]
#[path = "run_test.rs"]
mod tests;
