use std::io::Cursor;

use epub::doc::EpubDoc;

use super::{non_empty_or, ExtractedMetadata, UNKNOWN_AUTHOR};
use crate::error::{Error, Result};

fn open(bytes: &[u8]) -> Result<EpubDoc<Cursor<Vec<u8>>>> {
    EpubDoc::from_reader(Cursor::new(bytes.to_vec())).map_err(|e| Error::Epub(e.to_string()))
}

/// Title, author and cover. Page count stays 0: the renderer paginates EPUBs.
pub fn extract_metadata(file_name: &str, bytes: &[u8]) -> Result<ExtractedMetadata> {
    let mut doc = open(bytes)?;

    let title = doc.mdata("title").map(|m| m.value.clone());
    let author = doc.mdata("creator").map(|m| m.value.clone());
    let cover = match doc.get_cover() {
        Some((data, _mime)) if !data.is_empty() => Some(data),
        _ => None,
    };

    Ok(ExtractedMetadata {
        title: non_empty_or(title, file_name),
        author: non_empty_or(author, UNKNOWN_AUTHOR),
        cover,
        total_pages: 0,
    })
}
