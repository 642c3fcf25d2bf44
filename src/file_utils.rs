use anyhow::{Result, Context};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;
use walkdir::WalkDir;

// @module: File and directory utilities

// @struct: File operations utility
pub struct FileManager;

// @struct: A file found under a root directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FoundFile {
    // @field: Path relative to the root, `/` separated
    pub relative: String,
    // @field: Absolute or root-joined path
    pub path: PathBuf,
    // @field: Size in bytes
    pub size: u64,
    // @field: Modification time in milliseconds since the epoch
    pub modified_ms: Option<i64>,
}

impl FileManager {
    // @checks: Directory existence
    pub fn dir_exists<P: AsRef<Path>>(path: P) -> bool {
        path.as_ref().exists() && path.as_ref().is_dir()
    }

    // @creates: Directory and parents if needed
    pub fn ensure_dir<P: AsRef<Path>>(path: P) -> Result<()> {
        let path = path.as_ref();
        if !path.exists() {
            fs::create_dir_all(path)?;
        }
        Ok(())
    }

    /// List every regular file under `dir`, sorted by relative path
    pub fn list_files<P: AsRef<Path>>(dir: P) -> Result<Vec<FoundFile>> {
        let dir = dir.as_ref();
        let mut result = Vec::new();

        for entry in WalkDir::new(dir).follow_links(true) {
            let entry = entry.context("Failed to read directory entry")?;
            if !entry.file_type().is_file() {
                continue;
            }

            let path = entry.path();
            let relative = path.strip_prefix(dir)
                .with_context(|| format!("File outside of root: {:?}", path))?
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect::<Vec<_>>()
                .join("/");

            let metadata = entry.metadata().context("Failed to read file metadata")?;
            let modified_ms = metadata.modified().ok()
                .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
                .map(|d| d.as_millis() as i64);

            result.push(FoundFile {
                relative,
                path: path.to_path_buf(),
                size: metadata.len(),
                modified_ms,
            });
        }

        result.sort_by(|a, b| a.relative.cmp(&b.relative));
        Ok(result)
    }

    // @checks: Extension matches one of `extensions`, case-insensitive
    pub fn has_extension<P: AsRef<Path>>(path: P, extensions: &[&str]) -> bool {
        path.as_ref().extension()
            .map(|ext| {
                let ext = ext.to_string_lossy();
                extensions.iter().any(|e| ext.eq_ignore_ascii_case(e.trim_start_matches('.')))
            })
            .unwrap_or(false)
    }

    /// Read a file to a string
    pub fn read_to_string<P: AsRef<Path>>(path: P) -> Result<String> {
        fs::read_to_string(&path)
            .with_context(|| format!("Failed to read file: {:?}", path.as_ref()))
    }

    /// Write a string to a file
    pub fn write_to_file<P: AsRef<Path>>(path: P, content: &str) -> Result<()> {
        if let Some(parent) = path.as_ref().parent() {
            Self::ensure_dir(parent)?;
        }

        fs::write(&path, content)
            .with_context(|| format!("Failed to write to file: {:?}", path.as_ref()))?;

        Ok(())
    }

    /// Copy a file from one location to another, ensuring the target directory exists
    pub fn copy_file<P1: AsRef<Path>, P2: AsRef<Path>>(from: P1, to: P2) -> Result<()> {
        let from = from.as_ref();
        let to = to.as_ref();

        if !from.exists() {
            return Err(anyhow::anyhow!("Source file does not exist: {:?}", from));
        }

        if let Some(parent) = to.parent() {
            Self::ensure_dir(parent)?;
        }

        fs::copy(from, to)
            .with_context(|| format!("Failed to copy {:?} to {:?}", from, to))?;

        Ok(())
    }
}
