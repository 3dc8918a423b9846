pub mod archive;
pub mod compile;
pub mod config;
pub mod deploy;
pub mod errors;
pub mod logging;
pub mod pipeline;
pub mod resources;
pub mod runtime;
pub mod source_tree;
pub mod types;
pub mod wrapper;

use clap::{error::ErrorKind, CommandFactory, Parser};
use config::{load_config, CliOverrides};
use errors::DeskpackError;
use logging::{append_run_log, init_run_log};
use pipeline::run_pipeline;
use runtime::ProductionRuntime;
use serde_json::json;

#[derive(Debug, Clone, Parser)]
#[command(name = "deskpack", version)]
#[command(about = "Compile, bundle, wrap and deploy a Java desktop application")]
pub struct Cli {
    /// TOML file overriding the built-in tool paths and names
    #[arg(long)]
    pub config: Option<std::path::PathBuf>,
    /// Project root; relative paths in the config resolve against it
    #[arg(long)]
    pub working_dir: Option<std::path::PathBuf>,
}

pub fn run() -> Result<i32, DeskpackError> {
    let args = std::env::args_os().collect::<Vec<_>>();
    let cwd = std::env::current_dir().map_err(|e| DeskpackError::Io(e.to_string()))?;
    let runtime = ProductionRuntime::new();
    run_with_runtime(&args, &cwd, &runtime)
}

pub fn run_with_runtime(
    args: &[std::ffi::OsString],
    cwd: &std::path::Path,
    runtime: &ProductionRuntime,
) -> Result<i32, DeskpackError> {
    let cli = match Cli::try_parse_from(args) {
        Ok(cli) => cli,
        Err(error) => match error.kind() {
            ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
                print!("{error}");
                return Ok(0);
            }
            _ => return Err(DeskpackError::Cli(error.to_string())),
        },
    };

    let overrides = CliOverrides {
        config_path: cli.config.clone(),
        working_dir: cli.working_dir.clone(),
    };
    let (cfg, scope) = load_config(&overrides, cwd)?;

    let log_dir = scope.resolve(&cfg.logging.dir);
    match init_run_log(
        &log_dir,
        runtime.clock.now(),
        cfg.logging.keep_runs,
        cfg.logging.max_payload_bytes,
    ) {
        Ok(path) => append_run_log(
            "info",
            "run.started",
            json!({
                "run_log": path.display().to_string(),
                "config": cli.config.as_ref().map(|p| p.display().to_string()),
                "project_root": scope.project_root.display().to_string(),
            }),
        ),
        Err(error) => runtime
            .terminal
            .write_line(&format!("WARNING: run log disabled: {error}"))?,
    }

    let report = run_pipeline(runtime, &cfg, &scope)?;
    Ok(report.exit_code)
}

pub fn render_help() -> String {
    Cli::command().render_long_help().to_string()
}
