use crate::config::AppConfig;
use crate::errors::DeskpackError;
use crate::logging::append_run_log;
use crate::source_tree::{copy_file_mirrored, copy_tree, SourceInventory};
use crate::types::BuildScope;
use serde_json::json;
use std::path::{Path, PathBuf};

pub const MANIFEST_ENTRY: &str = "META-INF/MANIFEST.MF";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceSummary {
    pub global_files: usize,
    pub source_files: usize,
    pub manifest_path: PathBuf,
}

/// Fills the compiled output directory with everything that is not bytecode:
/// the global resources tree, non-source files mirrored from the source tree,
/// and the manifest.
pub fn copy_resources(
    cfg: &AppConfig,
    scope: &BuildScope,
    inventory: &SourceInventory,
    output_dir: &Path,
) -> Result<ResourceSummary, DeskpackError> {
    let resources_dir = scope.resolve(&cfg.paths.resources_dir);
    let global_files = if resources_dir.is_dir() {
        copy_tree(&resources_dir, output_dir)?
    } else {
        append_run_log(
            "debug",
            "resources.global.skipped",
            json!({ "resources_dir": resources_dir.display().to_string() }),
        );
        0
    };

    for rel in &inventory.resources {
        copy_file_mirrored(&inventory.root.join(rel), &output_dir.join(rel))?;
    }

    let template = scope.resolve(&cfg.paths.manifest_template);
    if !template.is_file() {
        append_run_log(
            "error",
            "resources.manifest.missing",
            json!({ "template": template.display().to_string() }),
        );
        return Err(DeskpackError::Io(format!(
            "manifest template not found: {}",
            template.display()
        )));
    }
    let manifest_path = output_dir.join(MANIFEST_ENTRY);
    copy_file_mirrored(&template, &manifest_path)?;

    append_run_log(
        "info",
        "resources.copied",
        json!({
            "global_files": global_files,
            "source_files": inventory.resources.len(),
            "manifest": manifest_path.display().to_string(),
        }),
    );
    Ok(ResourceSummary {
        global_files,
        source_files: inventory.resources.len(),
        manifest_path,
    })
}

#[cfg(test)]
mod tests {
    use super::copy_resources;
    use crate::config::AppConfig;
    use crate::source_tree::scan_sources;
    use crate::types::BuildScope;
    use std::fs;
    use std::path::Path;

    fn touch(root: &Path, rel: &str, body: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
        fs::write(path, body).expect("write");
    }

    fn scope(root: &Path) -> BuildScope {
        BuildScope {
            process_cwd: root.to_path_buf(),
            project_root: root.to_path_buf(),
        }
    }

    #[test]
    fn mirrors_source_resources_and_writes_manifest() {
        let dir = tempfile::tempdir().expect("tempdir");
        let root = dir.path();
        touch(root, "src/it/app/Main.java", "class Main {}");
        touch(root, "src/it/app/i18n/messages.properties", "title=App");
        touch(root, "src/it/app/config.xml", "<x/>");
        touch(root, "resources/icons/app.png", "png");
        touch(root, "MANIFEST.MF", "Main-Class: it.app.Main\n");
        let out = root.join("out");
        fs::create_dir_all(&out).expect("out");

        let cfg = AppConfig::default();
        let inventory = scan_sources(&root.join("src"), "java").expect("scan");
        let summary = copy_resources(&cfg, &scope(root), &inventory, &out).expect("copy");

        assert_eq!(summary.global_files, 1);
        assert_eq!(summary.source_files, 2);
        assert!(out.join("it/app/i18n/messages.properties").is_file());
        assert!(out.join("it/app/config.xml").is_file());
        assert!(out.join("icons/app.png").is_file());
        assert!(!out.join("it/app/Main.java").exists());
        assert_eq!(
            fs::read_to_string(out.join("META-INF/MANIFEST.MF")).expect("manifest"),
            "Main-Class: it.app.Main\n"
        );
    }

    #[test]
    fn missing_manifest_template_is_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let root = dir.path();
        touch(root, "src/Main.java", "class Main {}");
        let out = root.join("out");

        let cfg = AppConfig::default();
        let inventory = scan_sources(&root.join("src"), "java").expect("scan");
        let err = copy_resources(&cfg, &scope(root), &inventory, &out).expect_err("manifest");
        assert!(format!("{err}").contains("manifest template not found"));
    }
}
