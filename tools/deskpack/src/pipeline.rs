use crate::archive::{build_combined_archive, BundleSummary};
use crate::compile::{CompileOutcome, JavaCompiler};
use crate::config::AppConfig;
use crate::deploy::{deploy_defaults, deploy_executable, DefaultsOutcome, DeployReport};
use crate::errors::DeskpackError;
use crate::logging::append_run_log;
use crate::resources::{copy_resources, ResourceSummary};
use crate::runtime::ProductionRuntime;
use crate::types::{BuildScope, BuildStep};
use crate::wrapper::{Launch4jClient, WrapOutcome};
use serde_json::json;
use std::path::{Path, PathBuf};
use std::time::Duration;

const RULE_WIDTH: usize = 50;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildReport {
    pub exit_code: i32,
    pub compile: CompileOutcome,
    pub resources: Option<ResourceSummary>,
    pub bundle: Option<BundleSummary>,
    pub wrap: Option<WrapOutcome>,
    pub deploy: Option<DeployReport>,
    pub defaults: Option<DefaultsOutcome>,
    pub elapsed: Duration,
}

impl BuildReport {
    pub fn executable(&self) -> Option<&PathBuf> {
        self.wrap.as_ref().and_then(WrapOutcome::executable)
    }

    /// True when every step ran and nothing was skipped or reported.
    pub fn fully_deployed(&self) -> bool {
        self.executable().is_some()
            && self.deploy.as_ref().is_some_and(DeployReport::is_clean)
            && matches!(self.defaults, Some(DefaultsOutcome::Replaced { .. }))
    }
}

pub fn run_pipeline(
    runtime: &ProductionRuntime,
    cfg: &AppConfig,
    scope: &BuildScope,
) -> Result<BuildReport, DeskpackError> {
    let started = runtime.clock.now();
    let say = |line: &str| runtime.terminal.write_line(line);
    let rule = "=".repeat(RULE_WIDTH);

    say(&rule)?;
    say("  deskpack: build and deploy")?;
    say(&format!("  project: {}", scope.project_root.display()))?;
    say(&rule)?;
    say("")?;
    append_run_log(
        "info",
        "pipeline.started",
        json!({ "project_root": scope.project_root.display().to_string() }),
    );

    say(&BuildStep::Compile.header())?;
    let compile = JavaCompiler::new(runtime.process_runner.as_ref(), cfg, scope).compile_sources()?;
    let compiled = match &compile {
        CompileOutcome::Compiled {
            inventory,
            output_dir,
        } => {
            say(&format!(
                "  Compiled {} source files.",
                inventory.sources.len()
            ))?;
            Some((inventory.clone(), output_dir.clone()))
        }
        CompileOutcome::NoSources => {
            say(&format!(
                "ERROR: no source files found under {}",
                scope.resolve(&cfg.paths.source_dir).display()
            ))?;
            None
        }
        CompileOutcome::Failed {
            exit_code,
            diagnostics,
            error_log,
        } => {
            say(&format!("ERROR: compilation failed (exit code {exit_code})"))?;
            say(diagnostics.trim_end())?;
            say(&format!("  Diagnostics written to {}", error_log.display()))?;
            None
        }
    };
    let Some((inventory, output_dir)) = compiled else {
        return Ok(abort(runtime, started, compile));
    };

    say(&BuildStep::Resources.header())?;
    let resources = copy_resources(cfg, scope, &inventory, &output_dir)?;
    say(&format!(
        "  Resources copied (global: {}, from sources: {}).",
        resources.global_files, resources.source_files
    ))?;

    say(&BuildStep::Bundle.header())?;
    let combined = scope.resolve(&cfg.paths.combined_archive);
    let library = scope.resolve(&cfg.paths.library_archive);
    let bundle = build_combined_archive(&output_dir, &library, &combined)?;
    say(&format!(
        "  Archive created: {} ({:.1} KB, {} entries)",
        display_name(&bundle.archive),
        bundle.size_bytes as f64 / 1024.0,
        bundle.total_entries()
    ))?;

    say(&BuildStep::Wrap.header())?;
    let wrap = Launch4jClient::new(runtime.process_runner.as_ref(), cfg, scope).wrap_executable()?;
    match &wrap {
        WrapOutcome::Created {
            executable,
            size_bytes,
        } => say(&format!(
            "  Executable created: {} ({:.2} MB)",
            display_name(executable),
            *size_bytes as f64 / 1024.0 / 1024.0
        ))?,
        WrapOutcome::ToolMissing { tool } => {
            say(&format!("ERROR: Launch4j not found at: {}", tool.display()))?
        }
        WrapOutcome::Failed {
            exit_code,
            stdout,
            stderr,
        } => {
            say(&format!("ERROR: Launch4j failed (exit code {exit_code}):"))?;
            say(&format!("STDERR: {}", stderr.trim_end()))?;
            say(&format!("STDOUT: {}", stdout.trim_end()))?;
        }
        WrapOutcome::LaunchFailed { tool, message } => {
            say(&format!("ERROR: Launch4j could not be started: {}", tool.display()))?;
            say(&format!("  {message}"))?;
        }
    }

    say(&BuildStep::Deploy.header())?;
    let (deploy, defaults) = match wrap.executable() {
        Some(executable) => {
            let deploy = deploy_executable(cfg, scope, executable);
            report_deploy(runtime, &deploy)?;
            let defaults = deploy_defaults(cfg, scope);
            report_defaults(runtime, &defaults)?;
            (Some(deploy), Some(defaults))
        }
        None => {
            say("  Skipped: no executable to deploy.")?;
            (None, None)
        }
    };

    let report = BuildReport {
        exit_code: 0,
        compile,
        resources: Some(resources),
        bundle: Some(bundle),
        wrap: Some(wrap),
        deploy,
        defaults,
        elapsed: elapsed_since(runtime, started),
    };

    say("")?;
    say(&rule)?;
    if report.fully_deployed() {
        say("  BUILD AND DEPLOY COMPLETE")?;
    } else {
        say("  BUILD FINISHED WITH WARNINGS")?;
    }
    match report.executable() {
        Some(executable) => say(&format!("  Local file: {}", executable.display()))?,
        None => say("  Local file: none")?,
    }
    say(&format!("  Elapsed: {:.1}s", report.elapsed.as_secs_f64()))?;
    say(&rule)?;

    append_run_log(
        "info",
        "pipeline.finished",
        json!({
            "exit_code": report.exit_code,
            "fully_deployed": report.fully_deployed(),
            "elapsed_ms": report.elapsed.as_millis() as u64,
        }),
    );
    Ok(report)
}

fn abort(
    runtime: &ProductionRuntime,
    started: std::time::SystemTime,
    compile: CompileOutcome,
) -> BuildReport {
    append_run_log(
        "error",
        "pipeline.aborted",
        json!({ "step": BuildStep::Compile.as_str() }),
    );
    BuildReport {
        exit_code: 1,
        compile,
        resources: None,
        bundle: None,
        wrap: None,
        deploy: None,
        defaults: None,
        elapsed: elapsed_since(runtime, started),
    }
}

fn report_deploy(runtime: &ProductionRuntime, deploy: &DeployReport) -> Result<(), DeskpackError> {
    match deploy {
        DeployReport::TargetMissing { target_dir } => runtime.terminal.write_line(&format!(
            "WARNING: deployment directory not found: {}",
            target_dir.display()
        )),
        DeployReport::Completed { copied, errors, .. } => {
            for file in copied {
                runtime
                    .terminal
                    .write_line(&format!("  Copied to: {}", file.target.display()))?;
                if let Some(sha) = &file.sha256 {
                    runtime.terminal.write_line(&format!("    sha256 {sha}"))?;
                }
            }
            for error in errors {
                runtime
                    .terminal
                    .write_line(&format!("ERROR during copy: {error}"))?;
            }
            Ok(())
        }
    }
}

fn report_defaults(
    runtime: &ProductionRuntime,
    defaults: &DefaultsOutcome,
) -> Result<(), DeskpackError> {
    match defaults {
        DefaultsOutcome::Replaced { target, files } => runtime.terminal.write_line(&format!(
            "  Defaults updated in: {} ({files} files)",
            target.display()
        )),
        DefaultsOutcome::SourceMissing { source } => runtime.terminal.write_line(&format!(
            "WARNING: defaults folder not found: {}",
            source.display()
        )),
        DefaultsOutcome::TargetMissing { .. } => Ok(()),
        DefaultsOutcome::Failed { message } => runtime
            .terminal
            .write_line(&format!("ERROR updating defaults: {message}")),
    }
}

fn elapsed_since(runtime: &ProductionRuntime, started: std::time::SystemTime) -> Duration {
    runtime
        .clock
        .now()
        .duration_since(started)
        .unwrap_or_default()
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
