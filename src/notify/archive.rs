//! Zip archiving of a results directory.

use anyhow::{bail, Context, Result};
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Result of a successful archive operation.
#[derive(Debug, Clone)]
pub struct ArchiveResult {
    /// Path of the written archive.
    pub path: PathBuf,
    /// Number of files stored.
    pub files: usize,
    /// Size of the archive in bytes.
    pub size: u64,
}

/// Zip every file under `source` into `output`.
///
/// Entry names are relative to `source` with `/` separators. The archive
/// itself is skipped when it lies inside `source`. Parent directories of
/// `output` are created as needed and an existing archive is replaced.
pub fn zip_directory(source: &Path, output: &Path) -> Result<ArchiveResult> {
    if !source.is_dir() {
        bail!("Directory does not exist: {}", source.display());
    }

    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }

    info!("Archiving {} into {}", source.display(), output.display());

    let file = File::create(output)
        .with_context(|| format!("Failed to create archive {}", output.display()))?;
    let own_path = fs::canonicalize(output).ok();

    let mut zip = ZipWriter::new(file);
    let options = FileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .compression_level(Some(6));

    let mut files = 0;
    for entry in WalkDir::new(source).sort_by_file_name() {
        let entry = entry.with_context(|| format!("Failed to walk {}", source.display()))?;
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        if own_path.is_some() && fs::canonicalize(path).ok() == own_path {
            continue;
        }

        let name = entry_name(source, path);
        debug!("Adding {}", name);

        zip.start_file(name.as_str(), options)
            .with_context(|| format!("Failed to add {} to archive", name))?;
        let mut input =
            File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
        io::copy(&mut input, &mut zip)
            .with_context(|| format!("Failed to write {} to archive", name))?;
        files += 1;
    }

    let file = zip.finish().context("Failed to finalize archive")?;
    let size = file.metadata().map(|m| m.len()).unwrap_or(0);

    info!("Archived {} files ({} bytes)", files, size);

    Ok(ArchiveResult {
        path: output.to_path_buf(),
        files,
        size,
    })
}

/// Archive entry name of `path` relative to `root`.
fn entry_name(root: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use tempfile::TempDir;
    use zip::ZipArchive;

    #[test]
    fn test_zip_preserves_relative_paths() {
        let temp_dir = TempDir::new().unwrap();
        let source = temp_dir.path().join("logs");
        fs::create_dir_all(source.join("run1/sub")).unwrap();
        fs::write(source.join("run1/sub/score"), "a:1\n").unwrap();
        fs::write(source.join("top.log"), "hello").unwrap();
        let output = temp_dir.path().join("out/results.zip");

        let result = zip_directory(&source, &output).unwrap();
        assert_eq!(result.files, 2);
        assert!(result.size > 0);

        let mut archive = ZipArchive::new(File::open(&output).unwrap()).unwrap();
        assert_eq!(archive.len(), 2);

        let mut content = String::new();
        archive
            .by_name("run1/sub/score")
            .unwrap()
            .read_to_string(&mut content)
            .unwrap();
        assert_eq!(content, "a:1\n");
        assert!(archive.by_name("top.log").is_ok());
    }

    #[test]
    fn test_archive_inside_source_is_skipped() {
        let temp_dir = TempDir::new().unwrap();
        let source = temp_dir.path();
        fs::write(source.join("score"), "a:1\n").unwrap();
        let output = source.join("results.zip");

        let result = zip_directory(source, &output).unwrap();

        assert_eq!(result.files, 1);
        let archive = ZipArchive::new(File::open(&output).unwrap()).unwrap();
        assert_eq!(archive.len(), 1);
    }

    #[test]
    fn test_missing_source_fails() {
        let temp_dir = TempDir::new().unwrap();
        let err = zip_directory(
            &temp_dir.path().join("missing"),
            &temp_dir.path().join("out.zip"),
        )
        .unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }

    #[test]
    fn test_entry_name_uses_forward_slashes() {
        let root = Path::new("logs");
        let path = root.join("a").join("b").join("score");
        assert_eq!(entry_name(root, &path), "a/b/score");
    }
}
