use case_core::{FieldPath, FieldPathSegment, StructuredIssue};
use case_engine::{
    EngineOptions, ExecutionContext, ExpressionConditionEvaluator, HistorySink, SetVariablesListener,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

pub const RUNNER_CONFIG_SCHEMA_0_0_1: &str = "case-runner-config/0.0.1";
pub const DEFAULT_LOG_LEVEL: &str = "warn";

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunnerConfig {
    #[serde(default = "default_runner_schema")]
    pub schema: String,
    #[serde(default)]
    pub engine: EngineOptions,
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Variables every started case begins with.
    #[serde(default)]
    pub variables: Map<String, Value>,
    #[serde(default)]
    pub business_key: Option<String>,
    /// Implementations for `delegate` listener actions, keyed by listener name.
    #[serde(default)]
    pub listeners: BTreeMap<String, ListenerBinding>,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            schema: default_runner_schema(),
            engine: EngineOptions::default(),
            logging: LoggingConfig::default(),
            variables: Map::new(),
            business_key: None,
            listeners: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ListenerBinding {
    SetVariables { variables: Map<String, Value> },
}

#[derive(Debug, thiserror::Error)]
pub enum RunnerConfigError {
    #[error("read runner config failed `{path}`: {source}")]
    ReadFile {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("runner config parse failed: {0}")]
    Parse(String),
    #[error("runner config validation failed: {0:?}")]
    Validation(Vec<StructuredIssue>),
}

pub fn load_runner_config(path: &Path) -> Result<RunnerConfig, RunnerConfigError> {
    let raw = fs::read_to_string(path).map_err(|source| RunnerConfigError::ReadFile {
        path: path.display().to_string(),
        source,
    })?;
    let expanded = expand_env_placeholders(raw.as_str()).map_err(RunnerConfigError::Parse)?;
    let config: RunnerConfig = match path.extension().and_then(|ext| ext.to_str()) {
        Some("json") => serde_json::from_str(expanded.as_str()).map_err(|error| {
            RunnerConfigError::Parse(format!("json decode error: {error}"))
        })?,
        Some("yaml") | Some("yml") => serde_yaml::from_str(expanded.as_str()).map_err(|error| {
            RunnerConfigError::Parse(format!("yaml decode error: {error}"))
        })?,
        _ => serde_yaml::from_str(expanded.as_str())
            .or_else(|_| serde_json::from_str(expanded.as_str()))
            .map_err(|error| RunnerConfigError::Parse(error.to_string()))?,
    };

    let mut issues = validate_runner_config(&config);
    StructuredIssue::sort_stable(&mut issues);
    if !issues.is_empty() {
        return Err(RunnerConfigError::Validation(issues));
    }
    Ok(config)
}

pub fn validate_runner_config(config: &RunnerConfig) -> Vec<StructuredIssue> {
    let mut issues = Vec::<StructuredIssue>::new();
    if config.schema != RUNNER_CONFIG_SCHEMA_0_0_1 {
        issues.push(config_issue(
            "runner.config.schema",
            vec![FieldPathSegment::Key("schema".to_string())],
            format!(
                "unsupported runner config schema `{}` (expected `{RUNNER_CONFIG_SCHEMA_0_0_1}`)",
                config.schema
            ),
        ));
    }
    if config.engine.max_operations_per_unit == 0 {
        issues.push(config_issue(
            "runner.config.engine.max_operations_per_unit",
            vec![
                FieldPathSegment::Key("engine".to_string()),
                FieldPathSegment::Key("max_operations_per_unit".to_string()),
            ],
            "max_operations_per_unit must be greater than zero".to_string(),
        ));
    }
    if normalize_log_level(&config.logging.level).is_none() {
        issues.push(config_issue(
            "runner.config.logging.level",
            vec![
                FieldPathSegment::Key("logging".to_string()),
                FieldPathSegment::Key("level".to_string()),
            ],
            format!(
                "unknown log level `{}` (expected one of {})",
                config.logging.level,
                LOG_LEVELS.join(", ")
            ),
        ));
    }
    for (name, binding) in &config.listeners {
        let path = vec![
            FieldPathSegment::Key("listeners".to_string()),
            FieldPathSegment::Key(name.clone()),
        ];
        if name.trim().is_empty() {
            issues.push(config_issue(
                "runner.config.listeners.name",
                path.clone(),
                "listener name must not be empty".to_string(),
            ));
        }
        let ListenerBinding::SetVariables { variables } = binding;
        if variables.is_empty() {
            issues.push(config_issue(
                "runner.config.listeners.variables",
                path,
                format!("listener `{name}` sets no variables"),
            ));
        }
    }
    issues
}

/// Engine collaborators for a runner invocation: the expression evaluator plus every configured
/// listener binding.
pub fn build_execution_context(config: &RunnerConfig, history: Arc<dyn HistorySink>) -> ExecutionContext {
    let mut context = ExecutionContext::new(Arc::new(ExpressionConditionEvaluator::new()), history);
    for (name, binding) in &config.listeners {
        let ListenerBinding::SetVariables { variables } = binding;
        context = context.with_listener(name.clone(), Arc::new(SetVariablesListener::new(variables.clone())));
    }
    context
}

/// Lowercased level when it names a known tracing level.
pub fn normalize_log_level(level: &str) -> Option<&'static str> {
    let level = level.trim().to_ascii_lowercase();
    LOG_LEVELS.into_iter().find(|known| *known == level)
}

fn config_issue(reference: &str, path: Vec<FieldPathSegment>, message: String) -> StructuredIssue {
    let mut issue = StructuredIssue::error(
        "runner_config_error",
        None,
        FieldPath::from_segments(path),
        message,
    );
    issue.related = Some(serde_json::json!({ "reference": reference }));
    issue
}

fn default_runner_schema() -> String {
    RUNNER_CONFIG_SCHEMA_0_0_1.to_string()
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn expand_env_placeholders(input: &str) -> Result<String, String> {
    let mut out = String::with_capacity(input.len());
    let mut cursor = 0;
    while let Some(start_offset) = input[cursor..].find("${") {
        let start = cursor + start_offset;
        out.push_str(&input[cursor..start]);
        let var_start = start + 2;
        let Some(end_offset) = input[var_start..].find('}') else {
            return Err("unterminated env placeholder `${...`".to_string());
        };
        let end = var_start + end_offset;
        let key = &input[var_start..end];
        if key.is_empty() {
            return Err("empty env placeholder `${}`".to_string());
        }
        let value = std::env::var(key)
            .map_err(|_| format!("missing env var for placeholder `${{{key}}}`"))?;
        out.push_str(value.as_str());
        cursor = end + 1;
    }
    out.push_str(&input[cursor..]);
    Ok(out)
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
