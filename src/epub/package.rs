//! container.xml and OPF package document parsing.

use super::error::EpubError;
use super::resolve_href;
use super::xml::{attr, local_name, resolve_entity};
use quick_xml::events::Event;
use quick_xml::Reader;
use std::collections::HashMap;

/// Descriptive metadata from the package `<metadata>` block.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackageMetadata {
    /// First non-empty `dc:title`.
    pub title: Option<String>,
    pub creators: Vec<String>,
    pub language: Option<String>,
}

/// One manifest `<item>`. `href` is already resolved to an archive path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ManifestItem {
    pub href: String,
    pub media_type: String,
    pub properties: Vec<String>,
}

#[derive(Debug, Default)]
pub(crate) struct Package {
    pub metadata: PackageMetadata,
    pub manifest: HashMap<String, ManifestItem>,
    /// Manifest ids in document order, for deterministic fallbacks.
    pub manifest_order: Vec<String>,
    /// `itemref@idref` values in reading order.
    pub spine: Vec<String>,
    /// `spine@toc`: manifest id of the NCX.
    pub toc_id: Option<String>,
}

impl Package {
    pub fn ncx(&self) -> Option<&ManifestItem> {
        self.toc_id
            .as_ref()
            .and_then(|id| self.manifest.get(id))
            .or_else(|| {
                self.items()
                    .find(|item| item.media_type == "application/x-dtbncx+xml")
            })
    }

    pub fn nav(&self) -> Option<&ManifestItem> {
        self.items()
            .find(|item| item.properties.iter().any(|p| p == "nav"))
    }

    fn items(&self) -> impl Iterator<Item = &ManifestItem> {
        self.manifest_order
            .iter()
            .filter_map(|id| self.manifest.get(id))
    }
}

fn malformed(e: impl std::fmt::Display) -> EpubError {
    EpubError::MalformedPackage {
        reason: e.to_string(),
    }
}

/// Return the `full-path` of the first `<rootfile>` in container.xml.
pub(crate) fn find_rootfile(container: &str) -> Result<String, EpubError> {
    let mut reader = Reader::from_str(container);

    loop {
        match reader.read_event() {
            Ok(Event::Empty(e)) | Ok(Event::Start(e))
                if local_name(e.name().as_ref()) == b"rootfile" =>
            {
                if let Some(path) = attr(&e, b"full-path").filter(|p| !p.trim().is_empty()) {
                    return Ok(path.trim().to_string());
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(malformed(format!("container.xml: {}", e))),
            _ => {}
        }
    }

    Err(malformed("no rootfile in container.xml"))
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum DcField {
    Title,
    Creator,
    Language,
}

/// Parse an OPF package. `opf_path` is the package's own archive path; manifest
/// hrefs are resolved against its directory.
pub(crate) fn parse_package(opf: &str, opf_path: &str) -> Result<Package, EpubError> {
    let mut reader = Reader::from_str(opf);
    let mut package = Package::default();

    let mut saw_package = false;
    let mut saw_spine = false;
    let mut in_metadata = false;
    let mut field: Option<DcField> = None;
    let mut buf = String::new();

    loop {
        let event = reader
            .read_event()
            .map_err(|e| malformed(format!("{}: {}", opf_path, e)))?;
        match event {
            Event::Start(ref e) | Event::Empty(ref e) => {
                let is_empty = matches!(event, Event::Empty(_));
                match local_name(e.name().as_ref()) {
                    b"package" => saw_package = true,
                    b"metadata" if !is_empty => in_metadata = true,
                    b"title" if in_metadata && !is_empty && field.is_none() => {
                        field = Some(DcField::Title);
                        buf.clear();
                    }
                    b"creator" if in_metadata && !is_empty && field.is_none() => {
                        field = Some(DcField::Creator);
                        buf.clear();
                    }
                    b"language" if in_metadata && !is_empty && field.is_none() => {
                        field = Some(DcField::Language);
                        buf.clear();
                    }
                    b"item" => {
                        let (Some(id), Some(href)) = (attr(e, b"id"), attr(e, b"href")) else {
                            continue;
                        };
                        let item = ManifestItem {
                            href: resolve_href(opf_path, &href),
                            media_type: attr(e, b"media-type").unwrap_or_default(),
                            properties: attr(e, b"properties")
                                .map(|p| p.split_ascii_whitespace().map(str::to_string).collect())
                                .unwrap_or_default(),
                        };
                        if package.manifest.insert(id.clone(), item).is_none() {
                            package.manifest_order.push(id);
                        }
                    }
                    b"spine" => {
                        saw_spine = true;
                        package.toc_id = attr(e, b"toc");
                    }
                    b"itemref" => {
                        if let Some(idref) = attr(e, b"idref") {
                            package.spine.push(idref);
                        }
                    }
                    _ => {}
                }
            }
            Event::Text(e) => {
                if field.is_some() {
                    buf.push_str(&String::from_utf8_lossy(e.as_ref()));
                }
            }
            Event::CData(e) => {
                if field.is_some() {
                    buf.push_str(&String::from_utf8_lossy(e.as_ref()));
                }
            }
            Event::GeneralRef(e) => {
                if field.is_some() {
                    if let Some(c) = resolve_entity(e.as_ref()) {
                        buf.push(c);
                    }
                }
            }
            Event::End(e) => {
                let name = e.name();
                let local = local_name(name.as_ref());
                if local == b"metadata" {
                    in_metadata = false;
                }
                if let Some(current) = field {
                    let matches_field = matches!(
                        (current, local),
                        (DcField::Title, b"title")
                            | (DcField::Creator, b"creator")
                            | (DcField::Language, b"language")
                    );
                    if matches_field {
                        let value = buf.trim().to_string();
                        if !value.is_empty() {
                            let meta = &mut package.metadata;
                            match current {
                                DcField::Title => {
                                    meta.title.get_or_insert(value);
                                }
                                DcField::Creator => meta.creators.push(value),
                                DcField::Language => {
                                    meta.language.get_or_insert(value);
                                }
                            }
                        }
                        field = None;
                        buf.clear();
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !saw_package {
        return Err(malformed(format!("{}: no <package> element", opf_path)));
    }
    if !saw_spine || package.spine.is_empty() {
        return Err(EpubError::EmptySpine);
    }
    Ok(package)
}
