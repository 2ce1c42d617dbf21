//! Plain-text extraction for ingested files.
//!
//! `.txt` and `.md` are read as UTF-8. `.pdf` goes through `pdf-extract`.
//! Any other extension is rejected so the ingest pipeline can skip it.

use std::path::Path;

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    Text,
    Markdown,
    Pdf,
}

impl FileType {
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "txt" => Some(FileType::Text),
            "md" | "markdown" => Some(FileType::Markdown),
            "pdf" => Some(FileType::Pdf),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FileType::Text => "txt",
            FileType::Markdown => "md",
            FileType::Pdf => "pdf",
        }
    }
}

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("unsupported file type: {0}")]
    Unsupported(String),
    #[error("failed to read file: {0}")]
    Io(#[from] std::io::Error),
    #[error("file is not valid UTF-8")]
    Encoding,
    #[error("PDF extraction failed: {0}")]
    Pdf(String),
}

/// Extract the text of `bytes`, interpreted as `file_type`.
pub fn extract_text(bytes: &[u8], file_type: FileType) -> Result<String, ExtractError> {
    match file_type {
        FileType::Text | FileType::Markdown => std::str::from_utf8(bytes)
            .map(|s| s.to_string())
            .map_err(|_| ExtractError::Encoding),
        FileType::Pdf => {
            pdf_extract::extract_text_from_mem(bytes).map_err(|e| ExtractError::Pdf(e.to_string()))
        }
    }
}

/// Read and extract a file from disk.
pub fn load_file(path: &Path) -> Result<(FileType, String), ExtractError> {
    let file_type = FileType::from_path(path)
        .ok_or_else(|| ExtractError::Unsupported(path.display().to_string()))?;
    let bytes = std::fs::read(path)?;
    Ok((file_type, extract_text(&bytes, file_type)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_type_from_extension() {
        assert_eq!(FileType::from_path(Path::new("a/b.TXT")), Some(FileType::Text));
        assert_eq!(FileType::from_path(Path::new("notes.md")), Some(FileType::Markdown));
        assert_eq!(FileType::from_path(Path::new("paper.pdf")), Some(FileType::Pdf));
        assert_eq!(FileType::from_path(Path::new("image.png")), None);
        assert_eq!(FileType::from_path(Path::new("Makefile")), None);
    }

    #[test]
    fn test_text_extraction() {
        assert_eq!(
            extract_text("héllo".as_bytes(), FileType::Text).unwrap(),
            "héllo"
        );
        assert!(matches!(
            extract_text(&[0xff, 0xfe, 0x00], FileType::Markdown),
            Err(ExtractError::Encoding)
        ));
    }

    #[test]
    fn test_invalid_pdf() {
        assert!(matches!(
            extract_text(b"not a pdf", FileType::Pdf),
            Err(ExtractError::Pdf(_))
        ));
    }
}
