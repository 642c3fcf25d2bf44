/*!
 * Document sources and output writing.
 *
 * A `DocumentSource` is anything that can list ordered documents, hand out
 * their content, split it into translatable fragments and put translated
 * fragments back. `TextDirectory` implements it over a directory of UTF-8
 * text files where every blank-line separated paragraph is one fragment.
 */

use anyhow::{Context, Result};
use log::{debug, info};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::file_utils::{FileManager, FoundFile};

/// Extensions treated as translatable documents
pub const DOCUMENT_EXTENSIONS: &[&str] = &["txt", "md", "html", "htm", "xhtml"];

static PARAGRAPH_BREAK: Lazy<Regex> = Lazy::new(|| Regex::new(r"\r?\n(?:[ \t]*\r?\n)+").unwrap());

static NON_TOKEN_CHARS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^A-Za-z0-9_-]+").unwrap());

/// Cheap identity of a source, used to skip rehashing unchanged input
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SourceSignature {
    /// Display name
    pub name: String,
    /// Total size in bytes
    pub size: u64,
    /// Latest modification time in milliseconds, if known
    pub modified_ms: Option<i64>,
}

/// A source of ordered, translatable documents
pub trait DocumentSource: Send + Sync {
    /// Display name of the source
    fn source_name(&self) -> &str;

    /// Name, size and modification time
    fn source_signature(&self) -> SourceSignature;

    /// Canonical bytes the task fingerprint is computed from
    fn source_bytes(&self) -> Result<Vec<u8>>;

    /// Document ids in source order
    fn document_ids(&self) -> Vec<String>;

    /// Full content of one document
    fn load(&self, document_id: &str) -> Result<String>;

    /// Translatable fragments of a document, in order
    fn extract_fragments(&self, content: &str) -> Vec<String>;

    /// Rebuild a document with `translated` in place of its fragments
    fn reinsert_fragments(&self, content: &str, translated: &[String]) -> String;

    /// Total source size in bytes
    fn source_size(&self) -> u64 {
        self.source_signature().size
    }
}

/// Split `content` on blank lines
pub fn split_paragraphs(content: &str) -> Vec<String> {
    PARAGRAPH_BREAK.split(content).map(str::to_string).collect()
}

/// Replace the paragraphs of `content` with `translated`, keeping separators
///
/// Paragraphs without a counterpart in `translated` keep their original text.
pub fn join_paragraphs(content: &str, translated: &[String]) -> String {
    let mut output = String::with_capacity(content.len());
    let mut last = 0;

    for (index, separator) in PARAGRAPH_BREAK.find_iter(content).enumerate() {
        let original = &content[last..separator.start()];
        output.push_str(translated.get(index).map(String::as_str).unwrap_or(original));
        output.push_str(separator.as_str());
        last = separator.end();
    }

    let index = PARAGRAPH_BREAK.find_iter(content).count();
    let original = &content[last..];
    output.push_str(translated.get(index).map(String::as_str).unwrap_or(original));
    output
}

/// A directory of UTF-8 text documents
#[derive(Debug, Clone)]
pub struct TextDirectory {
    /// Directory name
    name: String,
    /// Translatable files, sorted by relative path
    documents: Vec<FoundFile>,
    /// Other files, copied verbatim to the output
    assets: Vec<FoundFile>,
}

impl TextDirectory {
    /// Scan `root` for documents
    pub fn open<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        if !FileManager::dir_exists(&root) {
            return Err(anyhow::anyhow!("Input directory does not exist: {:?}", root));
        }

        let name = root.canonicalize()
            .unwrap_or_else(|_| root.clone())
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| "source".to_string());

        let (documents, assets): (Vec<_>, Vec<_>) = FileManager::list_files(&root)?
            .into_iter()
            .partition(|f| FileManager::has_extension(&f.path, DOCUMENT_EXTENSIONS));

        info!("Found {} documents and {} other files in {:?}", documents.len(), assets.len(), root);

        Ok(Self { name, documents, assets })
    }

    /// Relative paths of the non-document files
    pub fn asset_ids(&self) -> Vec<String> {
        self.assets.iter().map(|f| f.relative.clone()).collect()
    }

    fn find(&self, document_id: &str) -> Result<&FoundFile> {
        self.documents.iter()
            .find(|f| f.relative == document_id)
            .ok_or_else(|| anyhow::anyhow!("Unknown document: {}", document_id))
    }
}

impl DocumentSource for TextDirectory {
    fn source_name(&self) -> &str {
        &self.name
    }

    fn source_signature(&self) -> SourceSignature {
        SourceSignature {
            name: self.name.clone(),
            size: self.documents.iter().map(|f| f.size).sum(),
            modified_ms: self.documents.iter().filter_map(|f| f.modified_ms).max(),
        }
    }

    fn source_bytes(&self) -> Result<Vec<u8>> {
        let mut bytes = Vec::new();
        for file in &self.documents {
            let content = std::fs::read(&file.path)
                .with_context(|| format!("Failed to read document: {:?}", file.path))?;
            bytes.extend_from_slice(file.relative.as_bytes());
            bytes.push(0);
            bytes.extend_from_slice(&(content.len() as u64).to_le_bytes());
            bytes.extend_from_slice(&content);
        }
        debug!("Canonical source bytes for {}: {} bytes", self.name, bytes.len());
        Ok(bytes)
    }

    fn document_ids(&self) -> Vec<String> {
        self.documents.iter().map(|f| f.relative.clone()).collect()
    }

    fn load(&self, document_id: &str) -> Result<String> {
        FileManager::read_to_string(&self.find(document_id)?.path)
    }

    fn extract_fragments(&self, content: &str) -> Vec<String> {
        split_paragraphs(content)
    }

    fn reinsert_fragments(&self, content: &str, translated: &[String]) -> String {
        join_paragraphs(content, translated)
    }
}

/// Filesystem-safe token for a target language label
///
/// Runs of characters outside `[A-Za-z0-9_-]` become `_`, leading and
/// trailing `_` are trimmed and the result is cut to 20 characters.
pub fn language_token(label: &str) -> String {
    let replaced = NON_TOKEN_CHARS.replace_all(label, "_");
    let token: String = replaced.trim_matches('_').chars().take(20).collect();
    if token.is_empty() {
        "translated".to_string()
    } else {
        token
    }
}

/// Output directory for a source: `<output_root>/<source>.<lang token>`
pub fn output_dir_for(output_root: &Path, source_name: &str, target_language: &str) -> PathBuf {
    output_root.join(format!("{}.{}", source_name, language_token(target_language)))
}

/// Write every document and asset of `source` below `output_dir`
///
/// Documents present in `translated` are written translated, the others
/// and every asset are copied unchanged.
pub fn write_output(
    source: &TextDirectory,
    output_dir: &Path,
    translated: &BTreeMap<String, String>,
) -> Result<usize> {
    FileManager::ensure_dir(output_dir)?;
    let mut written = 0;

    for file in &source.documents {
        let target = output_dir.join(&file.relative);
        match translated.get(&file.relative) {
            Some(content) => {
                FileManager::write_to_file(&target, content)?;
                written += 1;
            }
            None => FileManager::copy_file(&file.path, &target)?,
        }
    }

    for file in &source.assets {
        FileManager::copy_file(&file.path, output_dir.join(&file.relative))?;
    }

    info!("Wrote {} translated documents to {:?}", written, output_dir);
    Ok(written)
}
