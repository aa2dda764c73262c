use lopdf::{Document, Object};
use pdfium_render::prelude::*;
use std::io::Cursor;
use std::path::PathBuf;

use super::{non_empty_or, ExtractedMetadata, UNKNOWN_AUTHOR};
use crate::cover::THUMBNAIL_MAX_HEIGHT;
use crate::error::{Error, Result};

/// Page count plus `Title`/`Author` from the Info dictionary. The cover is the
/// first page rendered through pdfium, when the library can be found.
pub fn extract_metadata(file_name: &str, bytes: &[u8]) -> Result<ExtractedMetadata> {
    let doc = Document::load_mem(bytes)?;
    let total_pages = doc.get_pages().len() as u32;

    let (title, author) = match info_dictionary(&doc) {
        Some(info) => (
            info.get(b"Title").ok().and_then(|o| text_value(&doc, o)),
            info.get(b"Author").ok().and_then(|o| text_value(&doc, o)),
        ),
        None => (None, None),
    };

    Ok(ExtractedMetadata {
        title: non_empty_or(title, file_name),
        author: non_empty_or(author, UNKNOWN_AUTHOR),
        cover: render_cover(bytes),
        total_pages,
    })
}

fn resolve<'a>(doc: &'a Document, obj: &'a Object) -> Option<&'a Object> {
    match obj {
        Object::Reference(id) => doc.get_object(*id).ok(),
        other => Some(other),
    }
}

fn info_dictionary(doc: &Document) -> Option<&lopdf::Dictionary> {
    let info = doc.trailer.get(b"Info").ok()?;
    resolve(doc, info)?.as_dict().ok()
}

fn text_value(doc: &Document, obj: &Object) -> Option<String> {
    match resolve(doc, obj)? {
        Object::String(bytes, _) => Some(decode_text_string(bytes)),
        _ => None,
    }
}

/// PDF text strings are UTF-16BE with a BOM, or PDFDocEncoding (close enough to Latin-1).
fn decode_text_string(bytes: &[u8]) -> String {
    if bytes.starts_with(&[0xFE, 0xFF]) {
        let units: Vec<u16> = bytes[2..]
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        String::from_utf16_lossy(&units)
    } else if let Ok(utf8) = std::str::from_utf8(bytes) {
        utf8.to_string()
    } else {
        bytes.iter().map(|&b| b as char).collect()
    }
}

fn library_dirs() -> Vec<PathBuf> {
    let mut dirs = Vec::new();
    if let Ok(dir) = std::env::var("PDFIUM_LIB_DIR") {
        dirs.push(PathBuf::from(dir));
    }
    let exe_dir = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(PathBuf::from));
    if let Some(dir) = exe_dir {
        dirs.push(dir);
    }
    if let Ok(cwd) = std::env::current_dir() {
        dirs.push(cwd);
    }
    dirs.push(PathBuf::from("./resources"));
    dirs.push(PathBuf::from("./pdfium"));
    dirs
}

/// Looks next to the executable and in `PDFIUM_LIB_DIR` before the system paths.
fn bind_pdfium() -> Option<Pdfium> {
    for dir in library_dirs() {
        let path = Pdfium::pdfium_platform_library_name_at_path(&dir);
        if let Ok(bindings) = Pdfium::bind_to_library(path) {
            return Some(Pdfium::new(bindings));
        }
    }
    Pdfium::bind_to_system_library().ok().map(Pdfium::new)
}

/// First page as a PNG, [`THUMBNAIL_MAX_HEIGHT`] pixels tall. `None` when pdfium
/// is missing or the page cannot be rendered; the book is imported without a cover.
pub fn render_cover(bytes: &[u8]) -> Option<Vec<u8>> {
    let Some(pdfium) = bind_pdfium() else {
        tracing::debug!("pdfium not available, importing PDF without a cover");
        return None;
    };
    match render_first_page(&pdfium, bytes) {
        Ok(png) => Some(png),
        Err(e) => {
            tracing::warn!(error = %e, "failed to render PDF cover");
            None
        }
    }
}

fn render_first_page(pdfium: &Pdfium, bytes: &[u8]) -> Result<Vec<u8>> {
    let document = pdfium.load_pdf_from_byte_slice(bytes, None)?;
    let page = document.pages().get(0)?;
    let config = PdfRenderConfig::new().set_target_height(THUMBNAIL_MAX_HEIGHT as i32);
    let bitmap = page.render_with_config(&config)?;

    let width = bitmap.width().max(0) as u32;
    let height = bitmap.height().max(0) as u32;
    let rgba = image::RgbaImage::from_raw(width, height, bitmap.as_rgba_bytes())
        .ok_or_else(|| Error::Invalid("Rendered page has an unexpected size".to_string()))?;

    let mut png = Cursor::new(Vec::new());
    image::DynamicImage::ImageRgba8(rgba).write_to(&mut png, image::ImageOutputFormat::Png)?;
    Ok(png.into_inner())
}
