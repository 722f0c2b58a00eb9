use case_runner::{
    execute_inspect, execute_run, execute_validate, load_runner_config, logging, normalize_log_level,
    Cli, Commands, DEFAULT_LOG_LEVEL,
};
use clap::Parser;

fn main() {
    let cli = Cli::parse();
    logging::init(log_level(&cli.command));

    let result = match &cli.command {
        Commands::Run(command) => execute_run(command),
        Commands::Validate(command) => execute_validate(command),
        Commands::Inspect(command) => execute_inspect(command),
    };

    match result {
        Ok(output) => {
            println!("{output}");
        }
        Err(error) => {
            eprintln!("{error}");
            std::process::exit(1);
        }
    }
}

/// `--verbose` raises the floor to `info`; otherwise the run config decides.
fn log_level(command: &Commands) -> &'static str {
    let Commands::Run(run) = command else {
        return DEFAULT_LOG_LEVEL;
    };
    if run.verbose {
        return "info";
    }
    run.config
        .as_deref()
        .and_then(|path| load_runner_config(path).ok())
        .and_then(|config| normalize_log_level(&config.logging.level))
        .unwrap_or(DEFAULT_LOG_LEVEL)
}

#[cfg(test)]
#[path = "main_test.rs"]
mod tests;
