use crate::config::AppConfig;
use crate::errors::DeskpackError;
use crate::logging::append_run_log;
use crate::runtime::{ProcessOutput, ProcessRequest, ProcessRunner};
use crate::source_tree::{clean_dir, scan_sources, SourceInventory};
use crate::types::{BuildScope, CompileFailureSignal};
use serde_json::json;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompileOutcome {
    Compiled {
        inventory: SourceInventory,
        output_dir: PathBuf,
    },
    NoSources,
    Failed {
        exit_code: i32,
        diagnostics: String,
        error_log: PathBuf,
    },
}

pub struct JavaCompiler<'a> {
    runner: &'a dyn ProcessRunner,
    cfg: &'a AppConfig,
    scope: &'a BuildScope,
}

impl<'a> JavaCompiler<'a> {
    pub fn new(runner: &'a dyn ProcessRunner, cfg: &'a AppConfig, scope: &'a BuildScope) -> Self {
        Self { runner, cfg, scope }
    }

    pub fn compile_sources(&self) -> Result<CompileOutcome, DeskpackError> {
        let source_root = self.scope.resolve(&self.cfg.paths.source_dir);
        let inventory = scan_sources(&source_root, &self.cfg.compiler.source_extension)?;
        if inventory.sources.is_empty() {
            append_run_log(
                "error",
                "compile.no_sources",
                json!({ "source_root": source_root.display().to_string() }),
            );
            return Ok(CompileOutcome::NoSources);
        }

        let output_dir = self.scope.resolve(&self.cfg.paths.output_dir);
        clean_dir(&output_dir)?;

        let request = self.request(&inventory, &output_dir);
        append_run_log(
            "info",
            "compile.started",
            json!({
                "command": request.command_line(),
                "sources": inventory.sources.len(),
                "output_dir": output_dir.display().to_string(),
            }),
        );
        let out = self.runner.run(request)?;

        if compile_failed(&out, self.cfg.compiler.failure_signal) {
            let diagnostics = diagnostics_text(&out);
            let error_log = self.scope.resolve(&self.cfg.paths.error_log);
            write_error_log(&error_log, &diagnostics)?;
            append_run_log(
                "error",
                "compile.failed",
                json!({
                    "exit_code": out.exit_code,
                    "signal": self.cfg.compiler.failure_signal.as_str(),
                    "error_log": error_log.display().to_string(),
                    "stderr": out.stderr,
                }),
            );
            return Ok(CompileOutcome::Failed {
                exit_code: out.exit_code,
                diagnostics,
                error_log,
            });
        }

        append_run_log(
            "info",
            "compile.succeeded",
            json!({
                "exit_code": out.exit_code,
                "sources": inventory.sources.len(),
            }),
        );
        Ok(CompileOutcome::Compiled {
            inventory,
            output_dir,
        })
    }

    pub fn request(&self, inventory: &SourceInventory, output_dir: &Path) -> ProcessRequest {
        let compiler = &self.cfg.compiler;
        let classpath = compiler
            .classpath
            .iter()
            .map(|entry| self.scope.resolve(entry).display().to_string())
            .collect::<Vec<_>>()
            .join(classpath_separator());

        let mut args = vec![
            "-jar".to_string(),
            self.scope.resolve(&compiler.ecj_jar).display().to_string(),
        ];
        if !classpath.is_empty() {
            args.push("-classpath".to_string());
            args.push(classpath);
        }
        args.extend([
            "-source".to_string(),
            compiler.source_level.clone(),
            "-target".to_string(),
            compiler.target_level.clone(),
            "-d".to_string(),
            output_dir.display().to_string(),
            "-encoding".to_string(),
            compiler.encoding.clone(),
        ]);
        args.extend(
            inventory
                .absolute_sources()
                .into_iter()
                .map(|path| path.display().to_string()),
        );

        ProcessRequest {
            program: compiler.java.clone(),
            args,
            cwd: Some(self.scope.project_root.clone()),
        }
    }
}

/// Decides whether a finished compiler run failed under the given signal.
pub fn compile_failed(output: &ProcessOutput, signal: CompileFailureSignal) -> bool {
    match signal {
        CompileFailureSignal::ExitCode => output.exit_code != 0,
        CompileFailureSignal::DiagnosticText => output.stderr.to_lowercase().contains("error"),
    }
}

fn diagnostics_text(output: &ProcessOutput) -> String {
    if output.stderr.trim().is_empty() {
        output.stdout.clone()
    } else {
        output.stderr.clone()
    }
}

fn write_error_log(path: &Path, diagnostics: &str) -> Result<(), DeskpackError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| DeskpackError::Io(e.to_string()))?;
    }
    std::fs::write(path, diagnostics)
        .map_err(|e| DeskpackError::Io(format!("{}: {e}", path.display())))
}

fn classpath_separator() -> &'static str {
    if cfg!(windows) {
        ";"
    } else {
        ":"
    }
}

#[cfg(test)]
mod tests {
    use super::{compile_failed, CompileOutcome, JavaCompiler};
    use crate::config::AppConfig;
    use crate::runtime::{FakeProcessRunner, ProcessOutput};
    use crate::types::{BuildScope, CompileFailureSignal};
    use std::fs;
    use std::path::Path;

    fn scope(root: &Path) -> BuildScope {
        BuildScope {
            process_cwd: root.to_path_buf(),
            project_root: root.to_path_buf(),
        }
    }

    fn output(exit_code: i32, stderr: &str) -> ProcessOutput {
        ProcessOutput {
            exit_code,
            stdout: String::new(),
            stderr: stderr.to_string(),
        }
    }

    #[test]
    fn exit_code_signal_ignores_warning_text() {
        let out = output(0, "1 problem (1 warning): error-prone cast");
        assert!(!compile_failed(&out, CompileFailureSignal::ExitCode));
        assert!(compile_failed(&out, CompileFailureSignal::DiagnosticText));
        assert!(compile_failed(&output(255, ""), CompileFailureSignal::ExitCode));
    }

    #[test]
    fn no_sources_leaves_output_untouched() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::create_dir_all(dir.path().join("src/it")).expect("src");
        fs::write(dir.path().join("src/it/labels.properties"), "a=b").expect("res");
        fs::create_dir_all(dir.path().join("out")).expect("out");
        fs::write(dir.path().join("out/Keep.class"), "x").expect("keep");
        let cfg = AppConfig::default();
        let scope = scope(dir.path());
        let runner = FakeProcessRunner::default();

        let outcome = JavaCompiler::new(&runner, &cfg, &scope)
            .compile_sources()
            .expect("compile");
        assert_eq!(outcome, CompileOutcome::NoSources);
        assert!(dir.path().join("out/Keep.class").exists());
        assert!(runner.spawned().is_empty());
    }

    #[test]
    fn failing_compiler_writes_error_log() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::create_dir_all(dir.path().join("src")).expect("src");
        fs::write(dir.path().join("src/Main.java"), "class Main {").expect("java");
        let cfg = AppConfig::default();
        let scope = scope(dir.path());
        let runner = FakeProcessRunner::default();
        runner.push_response(Ok(output(1, "Main.java:1: ERROR: Syntax error")));

        let outcome = JavaCompiler::new(&runner, &cfg, &scope)
            .compile_sources()
            .expect("compile");
        let (exit_code, error_log) = match outcome {
            CompileOutcome::Failed {
                exit_code,
                error_log,
                ..
            } => (exit_code, error_log),
            other => panic!("expected failure, got {other:?}"),
        };
        assert_eq!(exit_code, 1);
        assert_eq!(error_log, dir.path().join("compile_error.txt"));
        assert!(fs::read_to_string(error_log)
            .expect("log")
            .contains("Syntax error"));
    }

    #[test]
    fn request_carries_levels_output_and_sources() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::create_dir_all(dir.path().join("src/it")).expect("src");
        fs::write(dir.path().join("src/it/A.java"), "class A {}").expect("a");
        fs::write(dir.path().join("src/it/B.java"), "class B {}").expect("b");
        fs::create_dir_all(dir.path().join("out/stale")).expect("stale");
        let cfg = AppConfig::default();
        let scope = scope(dir.path());
        let runner = FakeProcessRunner::default();
        runner.push_response(Ok(output(0, "")));

        let outcome = JavaCompiler::new(&runner, &cfg, &scope)
            .compile_sources()
            .expect("compile");
        assert!(matches!(outcome, CompileOutcome::Compiled { .. }));
        assert!(!dir.path().join("out/stale").exists());

        let spawned = runner.spawned();
        assert_eq!(spawned.len(), 1);
        let request = &spawned[0];
        assert_eq!(request.program, "java");
        let args = request.args.join(" ");
        assert!(args.starts_with("-jar "));
        assert!(args.contains("ecj_correct.jar"));
        assert!(args.contains("-source 1.8 -target 1.8"));
        assert!(args.contains("-encoding UTF-8"));
        assert!(args.contains("flatlaf-3.2.5.jar"));
        assert!(request.args[request.args.len() - 2].ends_with("A.java"));
        assert!(request.args[request.args.len() - 1].ends_with("B.java"));
    }
}
