mod cli;
mod config;
mod io;
pub mod logging;
mod run;

pub use cli::{Cli, Commands, InspectCommand, OutputFormat, RunCommand, ValidateCommand};
pub use config::{
    build_execution_context, load_runner_config, normalize_log_level, validate_runner_config,
    ListenerBinding, LoggingConfig, RunnerConfig, RunnerConfigError, DEFAULT_LOG_LEVEL,
    RUNNER_CONFIG_SCHEMA_0_0_1,
};
pub use io::{load_case_definition, parse_case_definition, DocumentFormat};
pub use run::{execute_inspect, execute_run, execute_validate, RunnerError, CASE_PLACEHOLDER};
