use thiserror::Error;

/// Errors surfaced by library operations and returned from shell commands.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Archive error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("PDF error: {0}")]
    Pdf(#[from] lopdf::Error),

    #[error("PDF render error: {0}")]
    Render(#[from] pdfium_render::prelude::PdfiumError),

    #[error("Background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("Failed to load EPUB: {0}")]
    Epub(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Invalid(String),
}

impl Error {
    pub fn book_not_found() -> Self {
        Error::NotFound("Book not found".to_string())
    }

    pub fn no_images() -> Self {
        Error::Invalid("No images found".to_string())
    }
}

// Commands hand errors to the webview as plain strings.
impl serde::Serialize for Error {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::ser::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_facing_messages() {
        assert_eq!(Error::book_not_found().to_string(), "Book not found");
        assert_eq!(Error::no_images().to_string(), "No images found");
        assert_eq!(
            Error::Epub("bad container".into()).to_string(),
            "Failed to load EPUB: bad container"
        );
    }

    #[test]
    fn test_serializes_as_message() {
        let json = serde_json::to_string(&Error::book_not_found()).unwrap();
        assert_eq!(json, "\"Book not found\"");
    }
}
