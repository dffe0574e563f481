//! Input resolution: validate a user-supplied path, or spill in-memory bytes
//! to a managed temp file.
//!
//! pdfium opens documents from a file-system path, so bytes handed to
//! [`crate::ingest::ingest_from_bytes`] are written to a
//! [`tempfile::NamedTempFile`] that lives inside [`ResolvedInput`] and is
//! removed when it is dropped. The `%PDF` magic bytes are checked up front
//! so callers get a meaningful error rather than a pdfium failure.

use crate::error::IngestError;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::debug;

const PDF_MAGIC: &[u8; 4] = b"%PDF";

/// A PDF on disk, owned or borrowed.
#[derive(Debug)]
pub enum ResolvedInput {
    /// The caller's own file.
    Local(PathBuf),
    /// Bytes spilled to a temp file, deleted on drop.
    Temp(NamedTempFile),
}

impl ResolvedInput {
    pub fn path(&self) -> &Path {
        match self {
            ResolvedInput::Local(p) => p,
            ResolvedInput::Temp(f) => f.path(),
        }
    }
}

/// Validate a local PDF path: existence, read permission, magic bytes.
pub fn resolve_input(path: impl AsRef<Path>) -> Result<ResolvedInput, IngestError> {
    let path = path.as_ref().to_path_buf();

    if !path.exists() {
        return Err(IngestError::FileNotFound { path });
    }

    match std::fs::File::open(&path) {
        Ok(mut f) => {
            let mut magic = [0u8; 4];
            let n = read_up_to(&mut f, &mut magic);
            if n < 4 || &magic != PDF_MAGIC {
                return Err(IngestError::NotAPdf { path, magic });
            }
        }
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(IngestError::PermissionDenied { path });
        }
        Err(_) => {
            return Err(IngestError::FileNotFound { path });
        }
    }

    debug!("Resolved local PDF: {}", path.display());
    Ok(ResolvedInput::Local(path))
}

/// Write `bytes` to a temp file after checking they look like a PDF.
pub fn spill_bytes(bytes: &[u8]) -> Result<ResolvedInput, IngestError> {
    let mut tmp =
        NamedTempFile::new().map_err(|e| IngestError::Internal(format!("tempfile: {e}")))?;

    if !bytes.starts_with(PDF_MAGIC) {
        let mut magic = [0u8; 4];
        let n = bytes.len().min(4);
        magic[..n].copy_from_slice(&bytes[..n]);
        return Err(IngestError::NotAPdf {
            path: tmp.path().to_path_buf(),
            magic,
        });
    }

    tmp.write_all(bytes)
        .and_then(|_| tmp.flush())
        .map_err(|e| IngestError::Internal(format!("tempfile write: {e}")))?;
    debug!("Spilled {} bytes to {}", bytes.len(), tmp.path().display());
    Ok(ResolvedInput::Temp(tmp))
}

/// Read until `buf` is full or EOF; returns bytes read.
fn read_up_to(reader: &mut impl Read, buf: &mut [u8]) -> usize {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) | Err(_) => break,
            Ok(n) => filled += n,
        }
    }
    filled
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file() {
        let err = resolve_input("/definitely/not/here.pdf").unwrap_err();
        assert!(matches!(err, IngestError::FileNotFound { .. }));
    }

    #[test]
    fn wrong_magic() {
        let mut f = NamedTempFile::new().unwrap();
        f.write_all(b"hello world").unwrap();
        let err = resolve_input(f.path()).unwrap_err();
        match err {
            IngestError::NotAPdf { magic, .. } => assert_eq!(&magic, b"hell"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn short_file_is_not_a_pdf() {
        let mut f = NamedTempFile::new().unwrap();
        f.write_all(b"%P").unwrap();
        assert!(matches!(
            resolve_input(f.path()).unwrap_err(),
            IngestError::NotAPdf { .. }
        ));
    }

    #[test]
    fn pdf_magic_is_accepted() {
        let mut f = NamedTempFile::new().unwrap();
        f.write_all(b"%PDF-1.7\n").unwrap();
        let resolved = resolve_input(f.path()).unwrap();
        assert_eq!(resolved.path(), f.path());
    }

    #[test]
    fn spilled_bytes_live_until_drop() {
        let resolved = spill_bytes(b"%PDF-1.4 rest").unwrap();
        let path = resolved.path().to_path_buf();
        assert_eq!(std::fs::read(&path).unwrap(), b"%PDF-1.4 rest");
        drop(resolved);
        assert!(!path.exists());
    }

    #[test]
    fn spill_rejects_non_pdf() {
        assert!(matches!(
            spill_bytes(b"GIF89a").unwrap_err(),
            IngestError::NotAPdf { magic, .. } if &magic == b"GIF8"
        ));
    }
}
