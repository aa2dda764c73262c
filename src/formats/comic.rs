use std::cmp::Ordering;
use std::io::{Cursor, Read};

use once_cell::sync::Lazy;
use regex::Regex;
use zip::ZipArchive;

use super::{file_stem, ExtractedMetadata, UNKNOWN_AUTHOR};
use crate::error::{Error, Result};

static IMAGE_ENTRY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\.(jpg|jpeg|png|webp|gif|bmp)$").expect("valid image pattern"));

pub fn is_image_entry(name: &str) -> bool {
    IMAGE_ENTRY.is_match(name)
}

pub fn mime_for(name: &str) -> &'static str {
    let lower = name.to_lowercase();
    if lower.ends_with(".png") {
        "image/png"
    } else if lower.ends_with(".webp") {
        "image/webp"
    } else if lower.ends_with(".gif") {
        "image/gif"
    } else if lower.ends_with(".bmp") {
        "image/bmp"
    } else {
        "image/jpeg"
    }
}

/// Orders file names the way a reader expects: `page2` before `page10`,
/// letters compared without case.
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let mut left = a.chars().peekable();
    let mut right = b.chars().peekable();

    loop {
        match (left.peek().copied(), right.peek().copied()) {
            (None, None) => return a.cmp(b),
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(l), Some(r)) if l.is_ascii_digit() && r.is_ascii_digit() => {
                let l_num = take_digits(&mut left);
                let r_num = take_digits(&mut right);
                let l_trim = l_num.trim_start_matches('0');
                let r_trim = r_num.trim_start_matches('0');
                let ord = l_trim
                    .len()
                    .cmp(&r_trim.len())
                    .then_with(|| l_trim.cmp(r_trim));
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            (Some(l), Some(r)) => {
                let ord = l.to_lowercase().cmp(r.to_lowercase());
                if ord != Ordering::Equal {
                    return ord;
                }
                left.next();
                right.next();
            }
        }
    }
}

fn take_digits(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> String {
    let mut digits = String::new();
    while let Some(c) = chars.peek().copied() {
        if !c.is_ascii_digit() {
            break;
        }
        digits.push(c);
        chars.next();
    }
    digits
}

#[derive(Debug, Clone)]
pub struct ComicPage {
    pub index: usize,
    pub name: String,
    pub mime_type: &'static str,
    pub data: Vec<u8>,
}

// Declared entry sizes come from the archive itself, so they only seed the buffer.
const MAX_PREALLOC: usize = 8 * 1024 * 1024;

fn initial_capacity(declared: u64) -> usize {
    usize::try_from(declared).unwrap_or(usize::MAX).min(MAX_PREALLOC)
}

/// A CBZ opened for reading. Pages are the image entries in natural order.
pub struct ComicArchive {
    archive: ZipArchive<Cursor<Vec<u8>>>,
    pages: Vec<String>,
}

impl ComicArchive {
    /// Lists image entries without checking that there are any.
    pub fn open_unchecked(bytes: Vec<u8>) -> Result<Self> {
        let archive = ZipArchive::new(Cursor::new(bytes))?;
        let mut pages: Vec<String> = archive
            .file_names()
            .filter(|name| !name.ends_with('/') && is_image_entry(name))
            .map(|name| name.to_string())
            .collect();
        pages.sort_by(|a, b| natural_cmp(a, b));
        Ok(Self { archive, pages })
    }

    pub fn open(bytes: Vec<u8>) -> Result<Self> {
        let comic = Self::open_unchecked(bytes)?;
        if comic.pages.is_empty() {
            return Err(Error::no_images());
        }
        Ok(comic)
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn page_names(&self) -> &[String] {
        &self.pages
    }

    /// Zero-based page
    pub fn read_page(&mut self, index: usize) -> Result<ComicPage> {
        let name = self.pages.get(index).cloned().ok_or_else(|| {
            Error::NotFound(format!("Page {} not found ({} pages)", index + 1, self.pages.len()))
        })?;

        let mut entry = self.archive.by_name(&name)?;
        let mut data = Vec::with_capacity(initial_capacity(entry.size()));
        entry.read_to_end(&mut data)?;

        Ok(ComicPage {
            index,
            mime_type: mime_for(&name),
            name,
            data,
        })
    }
}

/// Title from the file name, first image as cover, image count as page count.
pub fn extract_metadata(file_name: &str, bytes: &[u8]) -> Result<ExtractedMetadata> {
    let mut comic = ComicArchive::open_unchecked(bytes.to_vec())?;
    let cover = if comic.page_count() > 0 {
        Some(comic.read_page(0)?.data)
    } else {
        None
    };

    Ok(ExtractedMetadata {
        title: file_stem(file_name),
        author: UNKNOWN_AUTHOR.to_string(),
        cover,
        total_pages: comic.page_count() as u32,
    })
}
