//! EPUB reader. Opens the zip container, follows container.xml to the OPF
//! package, and exposes metadata, the spine as content documents, TOC labels,
//! and UTF-8 entry reads.

mod error;
mod package;
mod toc;
pub(crate) mod xml;

pub use error::EpubError;
pub use package::PackageMetadata;
pub use toc::TableOfContents;

use package::Package;
use percent_encoding::percent_decode_str;
use std::fs::File;
use std::io::{Read, Seek};
use std::path::Path;
use tracing::{debug, warn};
use zip::result::ZipError;
use zip::ZipArchive;

const CONTAINER_PATH: &str = "META-INF/container.xml";

/// Media types read as chapters. Anything else in the spine is skipped.
const DOCUMENT_MEDIA_TYPES: &[&str] = &["application/xhtml+xml", "text/html"];

/// A spine entry that points at a content document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpineItem {
    /// 1-based position among the spine's content documents.
    pub index: usize,
    pub idref: String,
    /// Archive path of the document.
    pub href: String,
}

/// An opened EPUB: package already parsed, content read on demand.
pub struct EpubArchive<R> {
    zip: ZipArchive<R>,
    metadata: PackageMetadata,
    spine: Vec<SpineItem>,
    toc: TableOfContents,
}

impl EpubArchive<File> {
    pub fn open(path: &Path) -> Result<Self, EpubError> {
        let file = File::open(path).map_err(|source| EpubError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_reader(file)
    }
}

impl<R: Read + Seek> EpubArchive<R> {
    pub fn from_reader(reader: R) -> Result<Self, EpubError> {
        let mut zip = ZipArchive::new(reader)?;

        let container = match read_entry(&mut zip, CONTAINER_PATH) {
            Err(EpubError::MissingEntry { .. }) => return Err(EpubError::MissingContainer),
            other => other?,
        };
        let opf_path = resolve_href("", &package::find_rootfile(&container)?);
        let opf = match read_entry(&mut zip, &opf_path) {
            Err(EpubError::MissingEntry { path }) => return Err(EpubError::MissingPackage { path }),
            other => other?,
        };
        let package = package::parse_package(&opf, &opf_path)?;

        let spine = build_spine(&package);
        let toc = load_toc(&mut zip, &package);
        debug!(
            opf = %opf_path,
            spine = spine.len(),
            toc_labels = toc.len(),
            "Parsed EPUB package"
        );

        Ok(Self {
            zip,
            metadata: package.metadata,
            spine,
            toc,
        })
    }

    pub fn metadata(&self) -> &PackageMetadata {
        &self.metadata
    }

    /// Content documents in reading order.
    pub fn spine(&self) -> &[SpineItem] {
        &self.spine
    }

    pub fn toc(&self) -> &TableOfContents {
        &self.toc
    }

    /// Read an archive entry as UTF-8 text (BOM stripped).
    pub fn read_text(&mut self, path: &str) -> Result<String, EpubError> {
        read_entry(&mut self.zip, path)
    }
}

fn build_spine(package: &Package) -> Vec<SpineItem> {
    let mut spine = Vec::with_capacity(package.spine.len());
    for idref in &package.spine {
        let Some(item) = package.manifest.get(idref) else {
            warn!(idref = %idref, "Spine entry has no manifest item; skipping");
            continue;
        };
        if !DOCUMENT_MEDIA_TYPES.contains(&item.media_type.as_str()) {
            debug!(
                idref = %idref,
                media_type = %item.media_type,
                "Spine entry is not a content document; skipping"
            );
            continue;
        }
        spine.push(SpineItem {
            index: spine.len() + 1,
            idref: idref.clone(),
            href: item.href.clone(),
        });
    }
    spine
}

/// NCX labels first, nav document fills gaps. Failures only cost titles.
fn load_toc<R: Read + Seek>(zip: &mut ZipArchive<R>, package: &Package) -> TableOfContents {
    let mut toc = TableOfContents::default();

    if let Some(ncx) = package.ncx() {
        match read_entry(zip, &ncx.href) {
            Ok(content) => match toc::parse_ncx(&content, &ncx.href) {
                Ok(entries) => toc.extend(entries),
                Err(e) => warn!(path = %ncx.href, "Ignoring unreadable NCX: {e}"),
            },
            Err(e) => warn!(path = %ncx.href, "Ignoring unreadable NCX: {e}"),
        }
    }

    if let Some(nav) = package.nav() {
        match read_entry(zip, &nav.href) {
            Ok(content) => toc.extend(toc::parse_nav(&content, &nav.href)),
            Err(e) => warn!(path = %nav.href, "Ignoring unreadable nav document: {e}"),
        }
    }

    toc
}

fn read_entry<R: Read + Seek>(zip: &mut ZipArchive<R>, path: &str) -> Result<String, EpubError> {
    let bytes = read_entry_bytes(zip, path)?;
    let bytes = strip_bom(&bytes);
    String::from_utf8(bytes.to_vec()).map_err(|_| EpubError::Encoding {
        path: path.to_string(),
    })
}

fn read_entry_bytes<R: Read + Seek>(
    zip: &mut ZipArchive<R>,
    path: &str,
) -> Result<Vec<u8>, EpubError> {
    // Some producers disagree with their own manifest on case.
    let name = if zip.index_for_name(path).is_some() {
        path.to_string()
    } else {
        zip.file_names()
            .find(|n| n.eq_ignore_ascii_case(path))
            .map(str::to_string)
            .ok_or_else(|| EpubError::MissingEntry {
                path: path.to_string(),
            })?
    };

    let read_err = |source: ZipError| EpubError::Read {
        path: path.to_string(),
        source,
    };
    let mut file = zip.by_name(&name).map_err(read_err)?;
    let mut contents = Vec::new();
    file.read_to_end(&mut contents)
        .map_err(|e| read_err(ZipError::Io(e)))?;
    Ok(contents)
}

fn strip_bom(data: &[u8]) -> &[u8] {
    data.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(data)
}

/// Resolve `href` (as written inside `base`) to a normalized archive path.
/// Fragments are dropped and percent-escapes decoded.
pub(crate) fn resolve_href(base: &str, href: &str) -> String {
    let href = href.split('#').next().unwrap_or_default();
    let href = percent_decode_str(href).decode_utf8_lossy();

    let mut segments: Vec<&str> = Vec::new();
    if !href.starts_with('/') {
        if let Some((dir, _)) = base.rsplit_once('/') {
            segments.extend(dir.split('/').filter(|s| !s.is_empty()));
        }
    }
    for segment in href.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            s => segments.push(s),
        }
    }
    segments.join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Write};
    use zip::write::SimpleFileOptions;
    use zip::ZipWriter;

    fn build(entries: &[(&str, &[u8])]) -> Cursor<Vec<u8>> {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default();
        for (name, data) in entries {
            zip.start_file(*name, options).unwrap();
            zip.write_all(data).unwrap();
        }
        let mut cursor = zip.finish().unwrap();
        cursor.set_position(0);
        cursor
    }

    const CONTAINER: &[u8] = br#"<?xml version="1.0"?>
<container version="1.0" xmlns="urn:oasis:names:tc:opendocument:xmlns:container">
  <rootfiles><rootfile full-path="OEBPS/content.opf" media-type="application/oebps-package+xml"/></rootfiles>
</container>"#;

    const OPF: &[u8] = br#"<?xml version="1.0"?>
<package xmlns="http://www.idpf.org/2007/opf" version="2.0">
  <metadata xmlns:dc="http://purl.org/dc/elements/1.1/"><dc:title>Sample</dc:title></metadata>
  <manifest>
    <item id="ncx" href="toc.ncx" media-type="application/x-dtbncx+xml"/>
    <item id="a" href="a.xhtml" media-type="application/xhtml+xml"/>
    <item id="img" href="cover.png" media-type="image/png"/>
    <item id="b" href="Text/B.xhtml" media-type="application/xhtml+xml"/>
  </manifest>
  <spine toc="ncx">
    <itemref idref="a"/>
    <itemref idref="img"/>
    <itemref idref="ghost"/>
    <itemref idref="b"/>
  </spine>
</package>"#;

    const NCX: &[u8] = br#"<ncx><navMap>
  <navPoint><navLabel><text>First</text></navLabel><content src="a.xhtml"/></navPoint>
</navMap></ncx>"#;

    #[test]
    fn resolve_href_relative_and_parent() {
        assert_eq!(resolve_href("OEBPS/content.opf", "text/a.xhtml"), "OEBPS/text/a.xhtml");
        assert_eq!(resolve_href("OEBPS/nav/nav.xhtml", "../a.xhtml#x"), "OEBPS/a.xhtml");
        assert_eq!(resolve_href("content.opf", "./a%20b.xhtml"), "a b.xhtml");
        assert_eq!(resolve_href("OEBPS/content.opf", "/root.xhtml"), "root.xhtml");
        assert_eq!(resolve_href("", "OEBPS/content.opf"), "OEBPS/content.opf");
    }

    #[test]
    fn strip_bom_only_when_present() {
        assert_eq!(strip_bom(b"\xEF\xBB\xBFabc"), b"abc");
        assert_eq!(strip_bom(b"abc"), b"abc");
    }

    #[test]
    fn open_reads_spine_metadata_and_toc() {
        let cursor = build(&[
            ("META-INF/container.xml", CONTAINER),
            ("OEBPS/content.opf", OPF),
            ("OEBPS/toc.ncx", NCX),
            ("OEBPS/a.xhtml", b"\xEF\xBB\xBF<html><body>A</body></html>"),
            ("OEBPS/text/b.xhtml", b"<html><body>B</body></html>"),
        ]);
        let mut epub = EpubArchive::from_reader(cursor).unwrap();
        assert_eq!(epub.metadata().title.as_deref(), Some("Sample"));

        let hrefs: Vec<_> = epub.spine().iter().map(|s| s.href.clone()).collect();
        assert_eq!(hrefs, vec!["OEBPS/a.xhtml", "OEBPS/Text/B.xhtml"]);
        assert_eq!(epub.spine()[1].index, 2);
        assert_eq!(epub.toc().label("OEBPS/a.xhtml"), Some("First"));

        assert_eq!(epub.read_text("OEBPS/a.xhtml").unwrap(), "<html><body>A</body></html>");
        // Case-insensitive fallback.
        assert!(epub.read_text("OEBPS/Text/B.xhtml").unwrap().contains('B'));
    }

    #[test]
    fn missing_chapter_entry_is_reported() {
        let cursor = build(&[
            ("META-INF/container.xml", CONTAINER),
            ("OEBPS/content.opf", OPF),
        ]);
        let mut epub = EpubArchive::from_reader(cursor).unwrap();
        assert!(epub.toc().is_empty());
        assert!(matches!(
            epub.read_text("OEBPS/a.xhtml"),
            Err(EpubError::MissingEntry { .. })
        ));
    }

    #[test]
    fn non_utf8_entry_is_encoding_error() {
        let cursor = build(&[
            ("META-INF/container.xml", CONTAINER),
            ("OEBPS/content.opf", OPF),
            ("OEBPS/a.xhtml", b"\xff\xfe\x00bad"),
        ]);
        let mut epub = EpubArchive::from_reader(cursor).unwrap();
        assert!(matches!(
            epub.read_text("OEBPS/a.xhtml"),
            Err(EpubError::Encoding { .. })
        ));
    }

    #[test]
    fn not_a_zip_is_archive_error() {
        let err = EpubArchive::from_reader(Cursor::new(b"plain text".to_vec()))
            .err()
            .unwrap();
        assert!(matches!(err, EpubError::Archive { .. }));
    }

    #[test]
    fn missing_container_and_package() {
        let err = EpubArchive::from_reader(build(&[("mimetype", b"application/epub+zip")]))
            .err()
            .unwrap();
        assert!(matches!(err, EpubError::MissingContainer));

        let err = EpubArchive::from_reader(build(&[("META-INF/container.xml", CONTAINER)]))
            .err()
            .unwrap();
        assert!(matches!(err, EpubError::MissingPackage { ref path } if path == "OEBPS/content.opf"));
    }

    #[test]
    fn toc_label_matches_spine_href_across_case() {
        let ncx: &[u8] = br#"<ncx><navMap>
  <navPoint><navLabel><text>Second</text></navLabel><content src="text/b.xhtml"/></navPoint>
</navMap></ncx>"#;
        let cursor = build(&[
            ("META-INF/container.xml", CONTAINER),
            ("OEBPS/content.opf", OPF),
            ("OEBPS/toc.ncx", ncx),
            ("OEBPS/text/b.xhtml", b"<html><body>B</body></html>"),
        ]);
        let epub = EpubArchive::from_reader(cursor).unwrap();
        let href = &epub.spine()[1].href;
        assert_eq!(href, "OEBPS/Text/B.xhtml");
        assert_eq!(epub.toc().label(href), Some("Second"));
    }
}
