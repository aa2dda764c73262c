use serde::{Deserialize, Serialize};

pub mod comic;
pub mod epub;
pub mod pdf;

pub const UNKNOWN_AUTHOR: &str = "Unknown";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum BookFormat {
    Epub,
    Pdf,
    Cbz,
    Cbr,
}

impl BookFormat {
    /// File extension for the format
    pub fn extension(&self) -> &'static str {
        match self {
            BookFormat::Epub => "epub",
            BookFormat::Pdf => "pdf",
            BookFormat::Cbz => "cbz",
            BookFormat::Cbr => "cbr",
        }
    }

    /// Recognises an extension, with or without the leading dot
    pub fn from_extension(ext: &str) -> Option<Self> {
        let ext_lower = ext.trim_start_matches('.').to_lowercase();
        match ext_lower.as_str() {
            "epub" => Some(BookFormat::Epub),
            "pdf" => Some(BookFormat::Pdf),
            "cbz" => Some(BookFormat::Cbz),
            "cbr" => Some(BookFormat::Cbr),
            _ => None,
        }
    }

    /// Recognises a file name or path by its last extension
    pub fn from_path(path: &str) -> Option<Self> {
        let file_name = path.rsplit(['/', '\\']).next().unwrap_or(path);
        match file_name.rfind('.') {
            Some(dot_pos) if dot_pos > 0 => Self::from_extension(&file_name[dot_pos + 1..]),
            _ => None,
        }
    }

    pub fn is_comic(&self) -> bool {
        matches!(self, BookFormat::Cbz | BookFormat::Cbr)
    }

    /// CBR is recognised but there is no RAR reader behind it.
    pub fn is_importable(&self) -> bool {
        !matches!(self, BookFormat::Cbr)
    }
}

/// What the importer learns about a file before it is stored.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedMetadata {
    pub title: String,
    pub author: String,
    pub cover: Option<Vec<u8>>,
    pub total_pages: u32,
}

impl ExtractedMetadata {
    /// Used when a file cannot be read: keep the import, lose the details.
    pub fn fallback(file_name: &str) -> Self {
        Self {
            title: file_name.to_string(),
            author: UNKNOWN_AUTHOR.to_string(),
            cover: None,
            total_pages: 0,
        }
    }
}

/// File name without its final extension
pub fn file_stem(file_name: &str) -> String {
    match file_name.rfind('.') {
        Some(dot_pos) if dot_pos > 0 => file_name[..dot_pos].to_string(),
        _ => file_name.to_string(),
    }
}

/// Reads title, author, cover and page count. Never fails: a broken file
/// degrades to [`ExtractedMetadata::fallback`].
pub fn extract_metadata(file_name: &str, format: BookFormat, bytes: &[u8]) -> ExtractedMetadata {
    let result = match format {
        BookFormat::Epub => epub::extract_metadata(file_name, bytes),
        BookFormat::Pdf => pdf::extract_metadata(file_name, bytes),
        BookFormat::Cbz => comic::extract_metadata(file_name, bytes),
        BookFormat::Cbr => return ExtractedMetadata::fallback(file_name),
    };

    match result {
        Ok(meta) => meta,
        Err(e) => {
            tracing::error!(
                file = file_name,
                format = ?format,
                error = %e,
                "error extracting metadata"
            );
            ExtractedMetadata::fallback(file_name)
        }
    }
}

/// Non-empty, trimmed text or the fallback
pub(crate) fn non_empty_or(value: Option<String>, fallback: &str) -> String {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| fallback.to_string())
}
