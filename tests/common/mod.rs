//! EPUB fixtures built in memory and written to disk for end-to-end tests.

#![allow(dead_code)]

use std::io::Write;
use std::path::Path;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

const CONTAINER: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<container version="1.0" xmlns="urn:oasis:names:tc:opendocument:xmlns:container">
  <rootfiles>
    <rootfile full-path="OEBPS/content.opf" media-type="application/oebps-package+xml"/>
  </rootfiles>
</container>"#;

/// One spine document: optional TOC label and the `<body>` markup.
pub struct FixtureChapter {
    pub label: Option<String>,
    pub body: String,
}

pub fn chapter(label: Option<&str>, body: &str) -> FixtureChapter {
    FixtureChapter {
        label: label.map(str::to_string),
        body: body.to_string(),
    }
}

/// Write an EPUB 2 book with an NCX table of contents to `path`.
pub fn write_epub(path: &Path, title: Option<&str>, chapters: &[FixtureChapter]) {
    let file = std::fs::File::create(path).unwrap();
    let mut zip = ZipWriter::new(file);
    let stored = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
    let deflated = SimpleFileOptions::default();

    zip.start_file("mimetype", stored).unwrap();
    zip.write_all(b"application/epub+zip").unwrap();

    zip.start_file("META-INF/container.xml", deflated).unwrap();
    zip.write_all(CONTAINER.as_bytes()).unwrap();

    zip.start_file("OEBPS/content.opf", deflated).unwrap();
    zip.write_all(package(title, chapters.len()).as_bytes()).unwrap();

    zip.start_file("OEBPS/toc.ncx", deflated).unwrap();
    zip.write_all(ncx(chapters).as_bytes()).unwrap();

    for (i, ch) in chapters.iter().enumerate() {
        zip.start_file(format!("OEBPS/text/ch{}.xhtml", i + 1), deflated)
            .unwrap();
        zip.write_all(xhtml(&ch.body).as_bytes()).unwrap();
    }
    zip.finish().unwrap();
}

/// Write an EPUB from explicit entries after the standard mimetype and container.
/// The package document must live at `OEBPS/content.opf`.
pub fn write_raw_epub(path: &Path, entries: &[(&str, &str)]) {
    let file = std::fs::File::create(path).unwrap();
    let mut zip = ZipWriter::new(file);
    let stored = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
    let deflated = SimpleFileOptions::default();

    zip.start_file("mimetype", stored).unwrap();
    zip.write_all(b"application/epub+zip").unwrap();
    zip.start_file("META-INF/container.xml", deflated).unwrap();
    zip.write_all(CONTAINER.as_bytes()).unwrap();
    for (name, contents) in entries {
        zip.start_file(*name, deflated).unwrap();
        zip.write_all(contents.as_bytes()).unwrap();
    }
    zip.finish().unwrap();
}

fn package(title: Option<&str>, count: usize) -> String {
    let title = title
        .map(|t| format!("<dc:title>{}</dc:title>", t))
        .unwrap_or_default();
    let mut manifest = String::from(
        r#"<item id="ncx" href="toc.ncx" media-type="application/x-dtbncx+xml"/>"#,
    );
    let mut spine = String::new();
    for i in 1..=count {
        manifest.push_str(&format!(
            r#"<item id="ch{i}" href="text/ch{i}.xhtml" media-type="application/xhtml+xml"/>"#
        ));
        spine.push_str(&format!(r#"<itemref idref="ch{i}"/>"#));
    }
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<package xmlns="http://www.idpf.org/2007/opf" version="2.0" unique-identifier="id">
  <metadata xmlns:dc="http://purl.org/dc/elements/1.1/">{title}<dc:language>en</dc:language></metadata>
  <manifest>{manifest}</manifest>
  <spine toc="ncx">{spine}</spine>
</package>"#
    )
}

fn ncx(chapters: &[FixtureChapter]) -> String {
    let points: String = chapters
        .iter()
        .enumerate()
        .filter_map(|(i, ch)| {
            ch.label.as_ref().map(|label| {
                format!(
                    r#"<navPoint id="p{n}" playOrder="{n}"><navLabel><text>{label}</text></navLabel><content src="text/ch{n}.xhtml"/></navPoint>"#,
                    n = i + 1
                )
            })
        })
        .collect();
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<ncx xmlns="http://www.daisy.org/z3986/2005/ncx/" version="2005-1"><navMap>{points}</navMap></ncx>"#
    )
}

fn xhtml(body: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<html xmlns="http://www.w3.org/1999/xhtml"><head><title>x</title></head><body>{body}</body></html>"#
    )
}
