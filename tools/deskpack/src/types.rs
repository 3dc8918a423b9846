use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// How a finished compiler run is judged a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompileFailureSignal {
    ExitCode,
    DiagnosticText,
}

impl CompileFailureSignal {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ExitCode => "exit_code",
            Self::DiagnosticText => "diagnostic_text",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum BuildStep {
    Compile,
    Resources,
    Bundle,
    Wrap,
    Deploy,
}

impl BuildStep {
    pub const ALL: [BuildStep; 5] = [
        Self::Compile,
        Self::Resources,
        Self::Bundle,
        Self::Wrap,
        Self::Deploy,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Compile => "compile",
            Self::Resources => "resources",
            Self::Bundle => "bundle",
            Self::Wrap => "wrap",
            Self::Deploy => "deploy",
        }
    }

    pub fn ordinal(self) -> usize {
        match self {
            Self::Compile => 1,
            Self::Resources => 2,
            Self::Bundle => 3,
            Self::Wrap => 4,
            Self::Deploy => 5,
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            Self::Compile => "Compiling Java sources",
            Self::Resources => "Copying resources",
            Self::Bundle => "Building combined archive",
            Self::Wrap => "Wrapping executable",
            Self::Deploy => "Deploying",
        }
    }

    pub fn header(self) -> String {
        format!(
            "[{}/{}] {}...",
            self.ordinal(),
            Self::ALL.len(),
            self.title()
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildScope {
    pub process_cwd: PathBuf,
    pub project_root: PathBuf,
}

impl BuildScope {
    pub fn resolve(&self, value: impl AsRef<Path>) -> PathBuf {
        let value = value.as_ref();
        if value.is_absolute() {
            value.to_path_buf()
        } else {
            self.project_root.join(value)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{BuildScope, BuildStep};
    use std::path::PathBuf;

    #[test]
    fn step_headers_are_numbered_out_of_five() {
        assert_eq!(BuildStep::Compile.header(), "[1/5] Compiling Java sources...");
        assert_eq!(BuildStep::Deploy.header(), "[5/5] Deploying...");
    }

    #[test]
    fn scope_resolves_relative_paths_against_project_root() {
        let scope = BuildScope {
            process_cwd: PathBuf::from("/work"),
            project_root: PathBuf::from("/work/app"),
        };
        assert_eq!(scope.resolve("out"), PathBuf::from("/work/app/out"));
        assert_eq!(scope.resolve("/abs/out"), PathBuf::from("/abs/out"));
    }
}
