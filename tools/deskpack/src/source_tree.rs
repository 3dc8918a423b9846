use crate::errors::DeskpackError;
use crate::logging::append_run_log;
use serde_json::json;
use std::fs;
use std::path::{Path, PathBuf};

/// Files under a source root, split by extension. Paths are relative to the root.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceInventory {
    pub root: PathBuf,
    pub sources: Vec<PathBuf>,
    pub resources: Vec<PathBuf>,
}

impl SourceInventory {
    pub fn absolute_sources(&self) -> Vec<PathBuf> {
        self.sources.iter().map(|rel| self.root.join(rel)).collect()
    }
}

pub fn scan_sources(root: &Path, extension: &str) -> Result<SourceInventory, DeskpackError> {
    if !root.is_dir() {
        return Err(DeskpackError::Io(format!(
            "source directory not found: {}",
            root.display()
        )));
    }

    let mut files = Vec::new();
    walk_files(root, &mut files)?;
    files.sort();

    let mut inventory = SourceInventory {
        root: root.to_path_buf(),
        ..SourceInventory::default()
    };
    for path in files {
        let rel = path
            .strip_prefix(root)
            .map_err(|e| DeskpackError::Io(e.to_string()))?
            .to_path_buf();
        if rel.extension().and_then(|ext| ext.to_str()) == Some(extension) {
            inventory.sources.push(rel);
        } else {
            inventory.resources.push(rel);
        }
    }

    append_run_log(
        "debug",
        "source_tree.scanned",
        json!({
            "root": root.display().to_string(),
            "extension": extension,
            "sources": inventory.sources.len(),
            "resources": inventory.resources.len(),
        }),
    );
    Ok(inventory)
}

/// Recursively lists regular files under `dir`, depth-first.
pub fn walk_files(dir: &Path, out: &mut Vec<PathBuf>) -> Result<(), DeskpackError> {
    let entries = fs::read_dir(dir)
        .map_err(|e| DeskpackError::Io(format!("{}: {e}", dir.display())))?;
    for entry in entries {
        let entry = entry.map_err(|e| DeskpackError::Io(e.to_string()))?;
        let path = entry.path();
        let file_type = entry
            .file_type()
            .map_err(|e| DeskpackError::Io(e.to_string()))?;
        if file_type.is_dir() {
            walk_files(&path, out)?;
        } else if path.is_file() {
            out.push(path);
        }
    }
    Ok(())
}

/// Copies every file under `src` to the same relative path under `dst`,
/// overwriting existing files. Returns the number of files copied.
pub fn copy_tree(src: &Path, dst: &Path) -> Result<usize, DeskpackError> {
    let mut files = Vec::new();
    walk_files(src, &mut files)?;
    fs::create_dir_all(dst).map_err(|e| DeskpackError::Io(e.to_string()))?;
    for path in &files {
        let rel = path
            .strip_prefix(src)
            .map_err(|e| DeskpackError::Io(e.to_string()))?;
        copy_file_mirrored(path, &dst.join(rel))?;
    }
    append_run_log(
        "debug",
        "source_tree.copied",
        json!({
            "from": src.display().to_string(),
            "to": dst.display().to_string(),
            "files": files.len(),
        }),
    );
    Ok(files.len())
}

pub fn copy_file_mirrored(from: &Path, to: &Path) -> Result<(), DeskpackError> {
    if let Some(parent) = to.parent() {
        fs::create_dir_all(parent).map_err(|e| DeskpackError::Io(e.to_string()))?;
    }
    fs::copy(from, to).map_err(|e| {
        DeskpackError::Io(format!("copy {} -> {}: {e}", from.display(), to.display()))
    })?;
    Ok(())
}

/// Removes `dir` if present and recreates it empty.
pub fn clean_dir(dir: &Path) -> Result<(), DeskpackError> {
    if dir.exists() {
        fs::remove_dir_all(dir)
            .map_err(|e| DeskpackError::Io(format!("{}: {e}", dir.display())))?;
    }
    fs::create_dir_all(dir).map_err(|e| DeskpackError::Io(format!("{}: {e}", dir.display())))
}

/// Archive entry name for a relative path: forward slashes, no leading separator.
pub fn entry_name(rel: &Path) -> String {
    rel.components()
        .filter_map(|part| match part {
            std::path::Component::Normal(name) => Some(name.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::{clean_dir, copy_tree, entry_name, scan_sources};
    use std::fs;
    use std::path::{Path, PathBuf};

    fn touch(root: &Path, rel: &str, body: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
        fs::write(path, body).expect("write");
    }

    #[test]
    fn scan_splits_sources_from_resources() {
        let dir = tempfile::tempdir().expect("tempdir");
        touch(dir.path(), "it/app/Main.java", "class Main {}");
        touch(dir.path(), "it/app/ui/Panel.java", "class Panel {}");
        touch(dir.path(), "it/app/messages.properties", "k=v");
        touch(dir.path(), "it/app/icons/logo.png", "png");
        touch(dir.path(), "README.JAVA", "not a source");

        let inventory = scan_sources(dir.path(), "java").expect("scan");
        assert_eq!(
            inventory.sources,
            vec![
                PathBuf::from("it/app/Main.java"),
                PathBuf::from("it/app/ui/Panel.java"),
            ]
        );
        assert_eq!(inventory.resources.len(), 3);
        assert!(inventory
            .resources
            .contains(&PathBuf::from("it/app/icons/logo.png")));
        assert!(inventory.absolute_sources()[0].starts_with(dir.path()));
    }

    #[test]
    fn scan_of_missing_root_fails() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = scan_sources(&dir.path().join("src"), "java").expect_err("missing");
        assert!(format!("{err}").contains("source directory not found"));
    }

    #[test]
    fn copy_tree_overwrites_and_preserves_structure() {
        let dir = tempfile::tempdir().expect("tempdir");
        let src = dir.path().join("resources");
        let dst = dir.path().join("out");
        touch(&src, "icons/app.ico", "new");
        touch(&src, "splash.png", "png");
        touch(&dst, "icons/app.ico", "old");
        touch(&dst, "Main.class", "bytecode");

        let copied = copy_tree(&src, &dst).expect("copy");
        assert_eq!(copied, 2);
        assert_eq!(
            fs::read_to_string(dst.join("icons/app.ico")).expect("read"),
            "new"
        );
        assert!(dst.join("Main.class").exists());
        assert!(dst.join("splash.png").exists());
    }

    #[test]
    fn clean_dir_empties_existing_directory() {
        let dir = tempfile::tempdir().expect("tempdir");
        let out = dir.path().join("out");
        touch(&out, "stale/Old.class", "x");

        clean_dir(&out).expect("clean");
        assert!(out.is_dir());
        assert_eq!(fs::read_dir(&out).expect("read_dir").count(), 0);
    }

    #[test]
    fn entry_names_use_forward_slashes() {
        let rel = Path::new("META-INF").join("MANIFEST.MF");
        assert_eq!(entry_name(&rel), "META-INF/MANIFEST.MF");
    }
}
