// Chunker module
// Loads markdown campaign notes and turns header-scoped segments into
// embedding-ready chunks with stable ids

#[cfg(test)]
mod tests;

pub mod markdown;

use fancy_regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::database::lancedb::ChunkMetadata;
use crate::{RagError, Result};

pub use markdown::{HeaderPath, Segment, UNTITLED, split_markdown};

const MARKDOWN_EXTENSION: &str = "md";

static SEPARATOR_RUNS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[-_. ]+").expect("valid regex"));

/// A markdown file read from the source directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceDocument {
    pub path: PathBuf,
    pub content: String,
}

/// A chunk ready to be embedded and stored
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkInput {
    pub id: String,
    /// Text that is embedded and later returned as retrieval context
    pub formatted_text: String,
    pub metadata: ChunkMetadata,
}

/// Collapse runs of `-`, `_`, `.` and spaces into one hyphen and lowercase
#[inline]
pub fn normalize(name: &str) -> String {
    SEPARATOR_RUNS.replace_all(name, "-").to_lowercase()
}

/// Normalized file name without its markdown extension
#[inline]
pub fn source_basename(path: &Path) -> String {
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy())
        .unwrap_or_default();
    let stem = file_name.strip_suffix(".md").unwrap_or(&file_name);

    normalize(stem)
}

/// Render the fixed template that gets embedded for a segment
#[inline]
pub fn format_chunk(headers: &HeaderPath, source_basename: &str, body: &str) -> String {
    format!(
        "Title: {}\nSection: {}\nSubsection: {}\nSource: {}\n\nContent:\n{}",
        headers.title(),
        headers.section(),
        headers.subsection(),
        source_basename,
        body.trim()
    )
}

/// Find every `.md` file below `dir`, sorted by path
#[inline]
pub fn discover_markdown_files(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(RagError::Chunking(format!(
            "Source directory does not exist or is not a directory: {}",
            dir.display()
        )));
    }

    let mut paths = Vec::new();
    for entry in WalkDir::new(dir).follow_links(true) {
        let entry = entry.map_err(|e| {
            RagError::Chunking(format!("Failed to walk {}: {}", dir.display(), e))
        })?;

        let is_markdown = entry.file_type().is_file()
            && entry.path().extension().is_some_and(|ext| ext == MARKDOWN_EXTENSION);
        if is_markdown {
            paths.push(entry.into_path());
        }
    }

    paths.sort();
    Ok(paths)
}

/// Read every markdown document below `dir`. Any unreadable or non UTF-8
/// file fails the whole load.
#[inline]
pub fn load_documents(dir: &Path) -> Result<Vec<SourceDocument>> {
    discover_markdown_files(dir)?
        .into_iter()
        .map(|path| {
            let content = fs::read_to_string(&path).map_err(|e| {
                RagError::Chunking(format!("Failed to read {}: {}", path.display(), e))
            })?;
            Ok(SourceDocument { path, content })
        })
        .collect()
}

/// Turn one document into chunks, numbering them from 1
#[inline]
pub fn chunk_document(document: &SourceDocument) -> Vec<ChunkInput> {
    let basename = source_basename(&document.path);
    let source = std::path::absolute(&document.path)
        .unwrap_or_else(|_| document.path.clone())
        .to_string_lossy()
        .into_owned();

    split_markdown(&document.content)
        .into_iter()
        .map(|segment| {
            let chunk_id = format!("{}-{}", basename, segment.ordinal + 1);
            let formatted_text = format_chunk(&segment.headers, &basename, &segment.body);

            ChunkInput {
                id: chunk_id.clone(),
                formatted_text,
                metadata: ChunkMetadata {
                    headers: segment.headers,
                    source: source.clone(),
                    source_basename: basename.clone(),
                    chunk_id,
                },
            }
        })
        .collect()
}

/// Chunks of a whole source directory
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirectoryChunks {
    /// Number of markdown documents that were read
    pub documents: usize,
    pub chunks: Vec<ChunkInput>,
}

/// Load and chunk a whole directory in (document, segment) order
#[inline]
pub fn split_directory(dir: &Path) -> Result<DirectoryChunks> {
    let documents = load_documents(dir)?;

    let chunks: Vec<ChunkInput> = documents.iter().flat_map(chunk_document).collect();

    info!(
        "Split {} documents from {} into {} chunks",
        documents.len(),
        dir.display(),
        chunks.len()
    );
    debug!(
        "Chunk ids: {:?}",
        chunks.iter().map(|c| c.id.as_str()).collect::<Vec<_>>()
    );

    Ok(DirectoryChunks {
        documents: documents.len(),
        chunks,
    })
}
