use crate::errors::DeskpackError;
use crate::logging::append_run_log;
use crate::resources::MANIFEST_ENTRY;
use crate::source_tree::{entry_name, walk_files};
use serde_json::json;
use std::collections::BTreeSet;
use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleSummary {
    pub archive: PathBuf,
    pub app_entries: usize,
    pub library_entries: usize,
    pub overridden_entries: usize,
    pub size_bytes: u64,
}

impl BundleSummary {
    pub fn total_entries(&self) -> usize {
        self.app_entries + self.library_entries
    }
}

/// Writes `dest` as the union of the files under `output_dir` and the file
/// entries of `library`. On a name collision the `output_dir` file wins.
pub fn build_combined_archive(
    output_dir: &Path,
    library: &Path,
    dest: &Path,
) -> Result<BundleSummary, DeskpackError> {
    let app_files = app_entries(output_dir)?;
    let app_names = app_files
        .iter()
        .map(|(name, _)| name.clone())
        .collect::<BTreeSet<_>>();

    let library_file = File::open(library)
        .map_err(|e| DeskpackError::Io(format!("{}: {e}", library.display())))?;
    let mut library_archive = ZipArchive::new(library_file)?;

    if dest.exists() {
        fs::remove_file(dest).map_err(|e| DeskpackError::Io(format!("{}: {e}", dest.display())))?;
    }
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent).map_err(|e| DeskpackError::Io(e.to_string()))?;
    }
    let dest_file =
        File::create(dest).map_err(|e| DeskpackError::Io(format!("{}: {e}", dest.display())))?;
    let mut writer = ZipWriter::new(dest_file);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    for (name, path) in &app_files {
        writer.start_file(name.as_str(), options)?;
        let mut source =
            File::open(path).map_err(|e| DeskpackError::Io(format!("{}: {e}", path.display())))?;
        std::io::copy(&mut source, &mut writer).map_err(|e| DeskpackError::Io(e.to_string()))?;
    }

    let mut library_entries = 0usize;
    let mut overridden_entries = 0usize;
    let mut seen = BTreeSet::new();
    for index in 0..library_archive.len() {
        let entry = library_archive.by_index(index)?;
        if entry.is_dir() {
            continue;
        }
        let name = entry.name().to_string();
        if app_names.contains(&name) {
            overridden_entries += 1;
            continue;
        }
        if !seen.insert(name) {
            continue;
        }
        writer.raw_copy_file(entry)?;
        library_entries += 1;
    }
    writer.finish()?;

    let size_bytes = fs::metadata(dest)
        .map_err(|e| DeskpackError::Io(e.to_string()))?
        .len();
    append_run_log(
        "info",
        "archive.combined.written",
        json!({
            "archive": dest.display().to_string(),
            "library": library.display().to_string(),
            "app_entries": app_files.len(),
            "library_entries": library_entries,
            "overridden_entries": overridden_entries,
            "size_bytes": size_bytes,
        }),
    );
    Ok(BundleSummary {
        archive: dest.to_path_buf(),
        app_entries: app_files.len(),
        library_entries,
        overridden_entries,
        size_bytes,
    })
}

/// Entry names of an archive, in stored order.
pub fn list_entries(path: &Path) -> Result<Vec<String>, DeskpackError> {
    let file = File::open(path).map_err(|e| DeskpackError::Io(format!("{}: {e}", path.display())))?;
    let mut archive = ZipArchive::new(file)?;
    let mut names = Vec::with_capacity(archive.len());
    for index in 0..archive.len() {
        names.push(archive.by_index(index)?.name().to_string());
    }
    Ok(names)
}

pub fn read_entry(path: &Path, name: &str) -> Result<Vec<u8>, DeskpackError> {
    let file = File::open(path).map_err(|e| DeskpackError::Io(format!("{}: {e}", path.display())))?;
    let mut archive = ZipArchive::new(file)?;
    let mut entry = archive.by_name(name)?;
    let mut bytes = Vec::new();
    entry
        .read_to_end(&mut bytes)
        .map_err(|e| DeskpackError::Io(e.to_string()))?;
    Ok(bytes)
}

// Manifest first so JAR readers that only inspect the head still find it.
fn app_entries(output_dir: &Path) -> Result<Vec<(String, PathBuf)>, DeskpackError> {
    let mut files = Vec::new();
    walk_files(output_dir, &mut files)?;
    let mut entries = files
        .into_iter()
        .map(|path| {
            let rel = path
                .strip_prefix(output_dir)
                .map_err(|e| DeskpackError::Io(e.to_string()))?;
            Ok((entry_name(rel), path.clone()))
        })
        .collect::<Result<Vec<_>, DeskpackError>>()?;
    entries.sort_by(|(a, _), (b, _)| (a != MANIFEST_ENTRY, a).cmp(&(b != MANIFEST_ENTRY, b)));
    Ok(entries)
}
