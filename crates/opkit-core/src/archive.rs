//! Packaged manifest archives
//!
//! An operator deployment travels as base64 text whose decoded bytes are a
//! gzip stream wrapping a tar archive of YAML manifests. This module decodes
//! that container into [`RawDocument`]s and builds it back from files.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use flate2::Compression;
use flate2::read::MultiGzDecoder;
use flate2::write::GzEncoder;
use std::io::Read;
use std::path::Path;
use tar::{Archive, Builder, Header};
use walkdir::WalkDir;

use crate::error::{CoreError, Result};

/// Gzip member header magic bytes
const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// One manifest unit read from the archive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawDocument {
    /// Archive entry name, when the document came straight from an entry
    pub name: Option<String>,
    /// Raw YAML text
    pub body: String,
}

impl RawDocument {
    pub fn new(name: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            body: body.into(),
        }
    }

    /// Name used in diagnostics
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("<inline document>")
    }
}

/// Decode a base64 gzip tar archive into its regular-file entries
///
/// Concatenated gzip members are read as one stream. Directory entries are
/// skipped and other special entries are ignored. Entry order is preserved.
/// Any read error aborts the whole extraction.
pub fn extract_documents(encoded: &str) -> Result<Vec<RawDocument>> {
    let compact: String = encoded
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .collect();
    let bytes = STANDARD.decode(compact.as_bytes())?;

    if !bytes.starts_with(&GZIP_MAGIC) {
        return Err(CoreError::archive("payload is not a gzip stream"));
    }

    let mut archive = Archive::new(MultiGzDecoder::new(bytes.as_slice()));
    let entries = archive
        .entries()
        .map_err(|e| CoreError::archive(format!("failed to read tar stream: {}", e)))?;

    let mut documents = Vec::new();
    for entry in entries {
        let mut entry =
            entry.map_err(|e| CoreError::archive(format!("failed to read tar entry: {}", e)))?;
        let entry_type = entry.header().entry_type();
        let path = entry
            .path()
            .map_err(|e| CoreError::archive(format!("invalid tar entry path: {}", e)))?
            .to_string_lossy()
            .to_string();

        if entry_type.is_dir() {
            continue;
        }
        if !entry_type.is_file() {
            tracing::debug!(entry = %path, "skipping non-regular archive entry");
            continue;
        }

        let mut data = Vec::new();
        entry
            .read_to_end(&mut data)
            .map_err(|e| CoreError::archive(format!("failed to read {}: {}", path, e)))?;
        let body = String::from_utf8(data)
            .map_err(|e| CoreError::archive(format!("{} is not valid UTF-8: {}", path, e)))?;

        documents.push(RawDocument::new(path, body));
    }

    Ok(documents)
}

/// Build a base64 gzip tar archive from named documents
pub fn create_archive<N, B>(documents: &[(N, B)]) -> Result<String>
where
    N: AsRef<str>,
    B: AsRef<[u8]>,
{
    let encoder = GzEncoder::new(Vec::new(), Compression::default());
    let mut builder = Builder::new(encoder);

    for (name, body) in documents {
        add_bytes_to_archive(&mut builder, name.as_ref(), body.as_ref())?;
    }

    let encoder = builder.into_inner()?;
    let bytes = encoder.finish()?;
    Ok(STANDARD.encode(bytes))
}

/// Package every YAML file under a directory into an archive string
///
/// Files are added in sorted path order, named relative to `dir`.
pub fn pack_directory(dir: &Path) -> Result<String> {
    let mut documents = Vec::new();

    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry.map_err(|e| CoreError::archive(e.to_string()))?;
        if !entry.file_type().is_file() || !is_manifest_file(entry.path()) {
            continue;
        }

        let rel_path = entry
            .path()
            .strip_prefix(dir)
            .unwrap_or(entry.path())
            .to_string_lossy()
            .to_string();
        documents.push((rel_path, std::fs::read(entry.path())?));
    }

    if documents.is_empty() {
        return Err(CoreError::archive(format!(
            "no YAML manifests found under {}",
            dir.display()
        )));
    }

    create_archive(&documents)
}

fn is_manifest_file(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml") | Some("yml")
    )
}

fn add_bytes_to_archive<W: std::io::Write>(
    builder: &mut Builder<W>,
    archive_path: &str,
    content: &[u8],
) -> Result<()> {
    let mut header = Header::new_gnu();
    header.set_size(content.len() as u64);
    header.set_mode(0o644);
    header.set_mtime(0);
    header.set_cksum();

    builder.append_data(&mut header, archive_path, content)?;

    Ok(())
}
