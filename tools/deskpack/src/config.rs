use crate::errors::DeskpackError;
use crate::types::{BuildScope, CompileFailureSignal};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub config_path: Option<PathBuf>,
    pub working_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AppConfig {
    pub compiler: CompilerConfig,
    pub paths: PathsConfig,
    pub wrapper: WrapperConfig,
    pub deploy: DeployConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CompilerConfig {
    pub java: String,
    pub ecj_jar: String,
    pub classpath: Vec<String>,
    pub source_level: String,
    pub target_level: String,
    pub encoding: String,
    pub source_extension: String,
    pub failure_signal: CompileFailureSignal,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PathsConfig {
    pub source_dir: String,
    pub output_dir: String,
    pub resources_dir: String,
    pub manifest_template: String,
    pub library_archive: String,
    pub combined_archive: String,
    pub error_log: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WrapperConfig {
    pub tool: String,
    pub config_file: String,
    pub output_executable: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeployConfig {
    pub target_dir: String,
    pub launcher_script: String,
    pub defaults_dir: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LoggingConfig {
    pub dir: String,
    pub keep_runs: usize,
    pub max_payload_bytes: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            compiler: CompilerConfig {
                java: "java".to_string(),
                ecj_jar: "tools/ecj_correct.jar".to_string(),
                classpath: vec!["lib/flatlaf-3.2.5.jar".to_string()],
                source_level: "1.8".to_string(),
                target_level: "1.8".to_string(),
                encoding: "UTF-8".to_string(),
                source_extension: "java".to_string(),
                failure_signal: CompileFailureSignal::ExitCode,
            },
            paths: PathsConfig {
                source_dir: "src".to_string(),
                output_dir: "out".to_string(),
                resources_dir: "resources".to_string(),
                manifest_template: "MANIFEST.MF".to_string(),
                library_archive: "lib/flatlaf-3.2.5.jar".to_string(),
                combined_archive: "IPEDManager_combined.jar".to_string(),
                error_log: "compile_error.txt".to_string(),
            },
            wrapper: WrapperConfig {
                tool: r"C:\Program Files (x86)\Launch4j\launch4jc.exe".to_string(),
                config_file: "launch4j.xml".to_string(),
                output_executable: "IPEDManager.exe".to_string(),
            },
            deploy: DeployConfig {
                target_dir: r"c:\Users\Forensic_Dell\Desktop\nuova imo\Iped\IPED-releasee\iped-4.2.2"
                    .to_string(),
                launcher_script: "IPEDManager.bat".to_string(),
                defaults_dir: "defaults".to_string(),
            },
            logging: LoggingConfig {
                dir: ".deskpack/logs".to_string(),
                keep_runs: 10,
                max_payload_bytes: 4096,
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct PartialAppConfig {
    compiler: Option<PartialCompilerConfig>,
    paths: Option<PartialPathsConfig>,
    wrapper: Option<PartialWrapperConfig>,
    deploy: Option<PartialDeployConfig>,
    logging: Option<PartialLoggingConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct PartialCompilerConfig {
    java: Option<String>,
    ecj_jar: Option<String>,
    classpath: Option<Vec<String>>,
    source_level: Option<String>,
    target_level: Option<String>,
    encoding: Option<String>,
    source_extension: Option<String>,
    failure_signal: Option<CompileFailureSignal>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct PartialPathsConfig {
    source_dir: Option<String>,
    output_dir: Option<String>,
    resources_dir: Option<String>,
    manifest_template: Option<String>,
    library_archive: Option<String>,
    combined_archive: Option<String>,
    error_log: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct PartialWrapperConfig {
    tool: Option<String>,
    config_file: Option<String>,
    output_executable: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct PartialDeployConfig {
    target_dir: Option<String>,
    launcher_script: Option<String>,
    defaults_dir: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct PartialLoggingConfig {
    dir: Option<String>,
    keep_runs: Option<usize>,
    max_payload_bytes: Option<usize>,
}

pub fn load_config(
    overrides: &CliOverrides,
    process_cwd: &Path,
) -> Result<(AppConfig, BuildScope), DeskpackError> {
    let mut cfg = AppConfig::default();

    if let Some(path) = &overrides.config_path {
        let path = absolutize_path(process_cwd, path);
        let file_contents = std::fs::read_to_string(&path)
            .map_err(|e| DeskpackError::Io(format!("{}: {e}", path.display())))?;
        cfg = parse_config(&file_contents)?;
    }

    let scope = resolve_scope(process_cwd, overrides);
    validate_config(&cfg)?;
    Ok((cfg, scope))
}

/// Parses a TOML document on top of the built-in defaults.
pub fn parse_config(text: &str) -> Result<AppConfig, DeskpackError> {
    let partial: PartialAppConfig =
        toml::from_str(text).map_err(|e| DeskpackError::ConfigParse(e.to_string()))?;
    let mut cfg = AppConfig::default();
    merge_partial_config(&mut cfg, partial);
    Ok(cfg)
}

fn merge_partial_config(cfg: &mut AppConfig, partial: PartialAppConfig) {
    if let Some(compiler) = partial.compiler {
        if let Some(value) = compiler.java {
            cfg.compiler.java = value;
        }
        if let Some(value) = compiler.ecj_jar {
            cfg.compiler.ecj_jar = value;
        }
        if let Some(value) = compiler.classpath {
            cfg.compiler.classpath = value;
        }
        if let Some(value) = compiler.source_level {
            cfg.compiler.source_level = value;
        }
        if let Some(value) = compiler.target_level {
            cfg.compiler.target_level = value;
        }
        if let Some(value) = compiler.encoding {
            cfg.compiler.encoding = value;
        }
        if let Some(value) = compiler.source_extension {
            cfg.compiler.source_extension = value;
        }
        if let Some(value) = compiler.failure_signal {
            cfg.compiler.failure_signal = value;
        }
    }

    if let Some(paths) = partial.paths {
        if let Some(value) = paths.source_dir {
            cfg.paths.source_dir = value;
        }
        if let Some(value) = paths.output_dir {
            cfg.paths.output_dir = value;
        }
        if let Some(value) = paths.resources_dir {
            cfg.paths.resources_dir = value;
        }
        if let Some(value) = paths.manifest_template {
            cfg.paths.manifest_template = value;
        }
        if let Some(value) = paths.library_archive {
            cfg.paths.library_archive = value;
        }
        if let Some(value) = paths.combined_archive {
            cfg.paths.combined_archive = value;
        }
        if let Some(value) = paths.error_log {
            cfg.paths.error_log = value;
        }
    }

    if let Some(wrapper) = partial.wrapper {
        if let Some(value) = wrapper.tool {
            cfg.wrapper.tool = value;
        }
        if let Some(value) = wrapper.config_file {
            cfg.wrapper.config_file = value;
        }
        if let Some(value) = wrapper.output_executable {
            cfg.wrapper.output_executable = value;
        }
    }

    if let Some(deploy) = partial.deploy {
        if let Some(value) = deploy.target_dir {
            cfg.deploy.target_dir = value;
        }
        if let Some(value) = deploy.launcher_script {
            cfg.deploy.launcher_script = value;
        }
        if let Some(value) = deploy.defaults_dir {
            cfg.deploy.defaults_dir = value;
        }
    }

    if let Some(logging) = partial.logging {
        if let Some(value) = logging.dir {
            cfg.logging.dir = value;
        }
        if let Some(value) = logging.keep_runs {
            cfg.logging.keep_runs = value;
        }
        if let Some(value) = logging.max_payload_bytes {
            cfg.logging.max_payload_bytes = value;
        }
    }
}

pub fn resolve_scope(process_cwd: &Path, overrides: &CliOverrides) -> BuildScope {
    let process_cwd = process_cwd.to_path_buf();
    let project_root = match &overrides.working_dir {
        Some(path) => absolutize_path(&process_cwd, path),
        None => process_cwd.clone(),
    };

    BuildScope {
        process_cwd,
        project_root,
    }
}

fn absolutize_path(base: &Path, value: &Path) -> PathBuf {
    if value.is_absolute() {
        value.to_path_buf()
    } else {
        base.join(value)
    }
}

fn validate_config(cfg: &AppConfig) -> Result<(), DeskpackError> {
    let required = [
        ("compiler.java", &cfg.compiler.java),
        ("compiler.ecj_jar", &cfg.compiler.ecj_jar),
        ("compiler.source_extension", &cfg.compiler.source_extension),
        ("paths.source_dir", &cfg.paths.source_dir),
        ("paths.output_dir", &cfg.paths.output_dir),
        ("paths.manifest_template", &cfg.paths.manifest_template),
        ("paths.library_archive", &cfg.paths.library_archive),
        ("paths.combined_archive", &cfg.paths.combined_archive),
        ("paths.error_log", &cfg.paths.error_log),
        ("wrapper.tool", &cfg.wrapper.tool),
        ("wrapper.config_file", &cfg.wrapper.config_file),
        ("wrapper.output_executable", &cfg.wrapper.output_executable),
        ("deploy.target_dir", &cfg.deploy.target_dir),
    ];
    for (key, value) in required {
        if value.trim().is_empty() {
            return Err(DeskpackError::InvalidConfig(format!(
                "{key} must not be empty"
            )));
        }
    }

    if cfg.compiler.source_extension.starts_with('.') {
        return Err(DeskpackError::InvalidConfig(
            "compiler.source_extension must be given without a leading dot".to_string(),
        ));
    }

    if cfg.logging.keep_runs == 0 {
        return Err(DeskpackError::InvalidConfig(
            "logging.keep_runs must be greater than zero".to_string(),
        ));
    }

    if cfg.paths.source_dir == cfg.paths.output_dir {
        return Err(DeskpackError::InvalidConfig(
            "paths.output_dir must differ from paths.source_dir".to_string(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{load_config, parse_config, AppConfig, CliOverrides};
    use crate::errors::DeskpackError;
    use crate::types::CompileFailureSignal;
    use std::path::{Path, PathBuf};

    #[test]
    fn empty_document_yields_defaults() {
        let cfg = parse_config("").expect("parse");
        assert_eq!(cfg, AppConfig::default());
        assert_eq!(cfg.compiler.failure_signal, CompileFailureSignal::ExitCode);
    }

    #[test]
    fn partial_sections_override_only_named_fields() {
        let cfg = parse_config(
            r#"
[compiler]
failure_signal = "diagnostic_text"
classpath = ["lib/a.jar", "lib/b.jar"]
[deploy]
target_dir = "/srv/release"
"#,
        )
        .expect("parse");
        assert_eq!(
            cfg.compiler.failure_signal,
            CompileFailureSignal::DiagnosticText
        );
        assert_eq!(cfg.compiler.classpath.len(), 2);
        assert_eq!(cfg.compiler.source_level, "1.8");
        assert_eq!(cfg.deploy.target_dir, "/srv/release");
        assert_eq!(cfg.deploy.launcher_script, "IPEDManager.bat");
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = parse_config("[paths]\nsrc = \"x\"\n").expect_err("unknown key");
        assert!(matches!(err, DeskpackError::ConfigParse(_)));
    }

    #[test]
    fn config_file_is_read_relative_to_cwd_and_validated() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(
            dir.path().join("deskpack.toml"),
            "[paths]\noutput_dir = \"src\"\n",
        )
        .expect("write");
        let overrides = CliOverrides {
            config_path: Some(PathBuf::from("deskpack.toml")),
            working_dir: None,
        };
        let err = load_config(&overrides, dir.path()).expect_err("invalid");
        assert!(format!("{err}").contains("paths.output_dir"));
    }

    #[test]
    fn zero_keep_runs_is_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("deskpack.toml");
        std::fs::write(&path, "[logging]\nkeep_runs = 0\n").expect("write");
        let overrides = CliOverrides {
            config_path: Some(path),
            working_dir: None,
        };
        let err = load_config(&overrides, dir.path()).expect_err("invalid");
        assert!(matches!(err, DeskpackError::InvalidConfig(_)));
    }

    #[test]
    fn missing_config_file_is_an_io_error() {
        let overrides = CliOverrides {
            config_path: Some(PathBuf::from("/definitely/missing/deskpack.toml")),
            working_dir: None,
        };
        let err = load_config(&overrides, Path::new("/")).expect_err("missing");
        assert!(matches!(err, DeskpackError::Io(_)));
    }

    #[test]
    fn working_dir_override_sets_project_root() {
        let overrides = CliOverrides {
            config_path: None,
            working_dir: Some(PathBuf::from("app")),
        };
        let (_, scope) = load_config(&overrides, Path::new("/work")).expect("config");
        assert_eq!(scope.process_cwd, PathBuf::from("/work"));
        assert_eq!(scope.project_root, PathBuf::from("/work/app"));
    }
}
