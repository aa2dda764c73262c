// Fixture builders for tests: small EPUB, CBZ and PDF files made in memory.

use std::io::{Cursor, Write};

use lopdf::{dictionary, Document, Object, Stream};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = image::RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x % 256) as u8, (y % 256) as u8, 128])
    });
    let mut buf = Cursor::new(Vec::new());
    image::DynamicImage::ImageRgb8(img)
        .write_to(&mut buf, image::ImageOutputFormat::Png)
        .unwrap();
    buf.into_inner()
}

const CONTAINER_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<container version="1.0" xmlns="urn:oasis:names:tc:opendocument:xmlns:container">
  <rootfiles>
    <rootfile full-path="OEBPS/content.opf" media-type="application/oebps-package+xml"/>
  </rootfiles>
</container>"#;

const CHAPTER_XHTML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<html xmlns="http://www.w3.org/1999/xhtml"><head><title>One</title></head>
<body><p>It was a bright cold day in April.</p></body></html>"#;

const TOC_NCX: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<ncx xmlns="http://www.daisy.org/z3986/2005/ncx/" version="2005-1">
  <head><meta name="dtb:uid" content="urn:uuid:0f1e2d3c"/></head>
  <docTitle><text>Fixture</text></docTitle>
  <navMap>
    <navPoint id="np1" playOrder="1">
      <navLabel><text>Chapter One</text></navLabel>
      <content src="chapter1.xhtml"/>
    </navPoint>
  </navMap>
</ncx>"#;

pub fn build_epub(title: &str, author: Option<&str>, cover_png: Option<&[u8]>) -> Vec<u8> {
    let creator = author
        .map(|a| format!(r#"<dc:creator opf:role="aut">{}</dc:creator>"#, a))
        .unwrap_or_default();
    let (cover_meta, cover_item) = if cover_png.is_some() {
        (
            r#"<meta name="cover" content="cover-img"/>"#,
            r#"<item id="cover-img" href="images/cover.png" media-type="image/png"/>"#,
        )
    } else {
        ("", "")
    };
    let opf = format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<package xmlns="http://www.idpf.org/2007/opf" version="2.0" unique-identifier="bookid">
  <metadata xmlns:dc="http://purl.org/dc/elements/1.1/" xmlns:opf="http://www.idpf.org/2007/opf">
    <dc:title>{title}</dc:title>
    {creator}
    <dc:identifier id="bookid">urn:uuid:0f1e2d3c</dc:identifier>
    <dc:language>en</dc:language>
    {cover_meta}
  </metadata>
  <manifest>
    <item id="ncx" href="toc.ncx" media-type="application/x-dtbncx+xml"/>
    <item id="chapter1" href="chapter1.xhtml" media-type="application/xhtml+xml"/>
    {cover_item}
  </manifest>
  <spine toc="ncx">
    <itemref idref="chapter1"/>
  </spine>
</package>"#
    );

    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let stored = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
    let deflated = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    zip.start_file("mimetype", stored).unwrap();
    zip.write_all(b"application/epub+zip").unwrap();
    zip.start_file("META-INF/container.xml", deflated).unwrap();
    zip.write_all(CONTAINER_XML.as_bytes()).unwrap();
    zip.start_file("OEBPS/content.opf", deflated).unwrap();
    zip.write_all(opf.as_bytes()).unwrap();
    zip.start_file("OEBPS/toc.ncx", deflated).unwrap();
    zip.write_all(TOC_NCX.as_bytes()).unwrap();
    zip.start_file("OEBPS/chapter1.xhtml", deflated).unwrap();
    zip.write_all(CHAPTER_XHTML.as_bytes()).unwrap();
    if let Some(cover) = cover_png {
        zip.start_file("OEBPS/images/cover.png", stored).unwrap();
        zip.write_all(cover).unwrap();
    }
    zip.finish().unwrap().into_inner()
}

/// Image-looking names get a real PNG, anything else a line of text.
pub fn build_cbz(names: &[&str]) -> Vec<u8> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    for (i, name) in names.iter().enumerate() {
        zip.start_file(*name, options).unwrap();
        if crate::formats::comic::is_image_entry(name) {
            zip.write_all(&png_bytes(8 + i as u32, 12)).unwrap();
        } else {
            zip.write_all(b"not an image").unwrap();
        }
    }
    zip.finish().unwrap().into_inner()
}

pub fn build_pdf(pages: u32, title: Option<&str>, author: Option<&str>) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let mut kids = Vec::new();
    for _ in 0..pages {
        let content = Stream::new(dictionary! {}, b"0.5 g 100 100 200 200 re f".to_vec());
        let content_id = doc.add_object(content);
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => Object::Reference(pages_id),
            "MediaBox" => Object::Array(vec![0.into(), 0.into(), 300.into(), 400.into()]),
            "Resources" => dictionary! {},
            "Contents" => Object::Reference(content_id),
        });
        kids.push(Object::Reference(page_id));
    }

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => Object::Array(kids),
            "Count" => pages as i64,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => Object::Reference(pages_id),
    });
    doc.trailer.set("Root", Object::Reference(catalog_id));

    if title.is_some() || author.is_some() {
        let mut info = lopdf::Dictionary::new();
        if let Some(t) = title {
            info.set("Title", Object::string_literal(t));
        }
        if let Some(a) = author {
            info.set("Author", Object::string_literal(a));
        }
        let info_id = doc.add_object(info);
        doc.trailer.set("Info", Object::Reference(info_id));
    }

    let mut buf = Vec::new();
    doc.save_to(&mut buf).unwrap();
    buf
}
