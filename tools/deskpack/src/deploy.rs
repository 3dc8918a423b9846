use crate::config::AppConfig;
use crate::errors::DeskpackError;
use crate::logging::append_run_log;
use crate::source_tree::copy_tree;
use crate::types::BuildScope;
use serde_json::json;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployedFile {
    pub source: PathBuf,
    pub target: PathBuf,
    pub sha256: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeployReport {
    TargetMissing {
        target_dir: PathBuf,
    },
    Completed {
        target_dir: PathBuf,
        copied: Vec<DeployedFile>,
        errors: Vec<String>,
    },
}

impl DeployReport {
    pub fn is_clean(&self) -> bool {
        matches!(self, Self::Completed { errors, .. } if errors.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DefaultsOutcome {
    Replaced { target: PathBuf, files: usize },
    SourceMissing { source: PathBuf },
    TargetMissing { target_dir: PathBuf },
    Failed { message: String },
}

pub fn target_dir(cfg: &AppConfig, scope: &BuildScope) -> PathBuf {
    scope.resolve(&cfg.deploy.target_dir)
}

/// Copies the executable and, when present, the launcher script into the
/// deployment directory. Copy failures are collected, never propagated.
pub fn deploy_executable(cfg: &AppConfig, scope: &BuildScope, executable: &Path) -> DeployReport {
    let target_dir = target_dir(cfg, scope);
    if !target_dir.is_dir() {
        append_run_log(
            "warn",
            "deploy.target_missing",
            json!({ "target_dir": target_dir.display().to_string() }),
        );
        return DeployReport::TargetMissing { target_dir };
    }

    let mut copied = Vec::new();
    let mut errors = Vec::new();

    match copy_verified(executable, &target_dir) {
        Ok(file) => copied.push(file),
        Err(err) => errors.push(err.to_string()),
    }

    // The launcher only ships alongside a successfully copied executable.
    if errors.is_empty() {
        let launcher = scope.resolve(&cfg.deploy.launcher_script);
        if launcher.is_file() {
            match copy_into(&launcher, &target_dir) {
                Ok(target) => copied.push(DeployedFile {
                    source: launcher,
                    target,
                    sha256: None,
                }),
                Err(err) => errors.push(err.to_string()),
            }
        }
    }

    append_run_log(
        if errors.is_empty() { "info" } else { "error" },
        "deploy.executable.finished",
        json!({
            "target_dir": target_dir.display().to_string(),
            "copied": copied.iter().map(|f| f.target.display().to_string()).collect::<Vec<_>>(),
            "errors": errors,
        }),
    );
    DeployReport::Completed {
        target_dir,
        copied,
        errors,
    }
}

/// Replaces `<target>/<defaults_dir>` with a fresh copy of the local folder.
pub fn deploy_defaults(cfg: &AppConfig, scope: &BuildScope) -> DefaultsOutcome {
    let source = scope.resolve(&cfg.deploy.defaults_dir);
    if !source.is_dir() {
        append_run_log(
            "warn",
            "deploy.defaults.source_missing",
            json!({ "source": source.display().to_string() }),
        );
        return DefaultsOutcome::SourceMissing { source };
    }
    let target_dir = target_dir(cfg, scope);
    if !target_dir.is_dir() {
        return DefaultsOutcome::TargetMissing { target_dir };
    }

    let name = source
        .file_name()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("defaults"));
    let target = target_dir.join(name);
    let result = replace_tree(&source, &target);
    match result {
        Ok(files) => {
            append_run_log(
                "info",
                "deploy.defaults.replaced",
                json!({ "target": target.display().to_string(), "files": files }),
            );
            DefaultsOutcome::Replaced { target, files }
        }
        Err(err) => {
            append_run_log(
                "error",
                "deploy.defaults.failed",
                json!({ "target": target.display().to_string(), "error": err.to_string() }),
            );
            DefaultsOutcome::Failed {
                message: err.to_string(),
            }
        }
    }
}

pub fn file_sha256(path: &Path) -> Result<String, DeskpackError> {
    let bytes = fs::read(path).map_err(|e| DeskpackError::Io(format!("{}: {e}", path.display())))?;
    let digest = Sha256::digest(&bytes);
    let mut out = String::with_capacity(digest.len() * 2);
    for byte in digest {
        out.push_str(&format!("{byte:02x}"));
    }
    Ok(out)
}

fn copy_verified(source: &Path, target_dir: &Path) -> Result<DeployedFile, DeskpackError> {
    let target = copy_into(source, target_dir)?;
    let expected = file_sha256(source)?;
    let actual = file_sha256(&target)?;
    if expected != actual {
        return Err(DeskpackError::Io(format!(
            "checksum mismatch after copy to {}",
            target.display()
        )));
    }
    Ok(DeployedFile {
        source: source.to_path_buf(),
        target,
        sha256: Some(actual),
    })
}

fn copy_into(source: &Path, target_dir: &Path) -> Result<PathBuf, DeskpackError> {
    let name = source
        .file_name()
        .ok_or_else(|| DeskpackError::Io(format!("not a file: {}", source.display())))?;
    let target = target_dir.join(name);
    fs::copy(source, &target).map_err(|e| {
        DeskpackError::Io(format!(
            "copy {} -> {}: {e}",
            source.display(),
            target.display()
        ))
    })?;
    Ok(target)
}

fn replace_tree(source: &Path, target: &Path) -> Result<usize, DeskpackError> {
    if target.exists() {
        fs::remove_dir_all(target)
            .map_err(|e| DeskpackError::Io(format!("{}: {e}", target.display())))?;
    }
    copy_tree(source, target)
}
