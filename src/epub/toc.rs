//! Table-of-contents labels from the EPUB 2 NCX and the EPUB 3 nav document.

use super::resolve_href;
use super::xml::{attr, collapse_whitespace, expand_self_closing, local_name, resolve_entity};
use quick_xml::events::Event;
use quick_xml::Reader;
use scraper::{Html, Selector};
use std::collections::HashMap;

/// One TOC entry. `href` is an archive path without fragment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct TocEntry {
    pub label: String,
    pub href: String,
}

/// Archive path (lowercased) -> label. The first label recorded for a path wins.
#[derive(Debug, Default, Clone)]
pub struct TableOfContents {
    labels: HashMap<String, String>,
}

impl TableOfContents {
    pub(crate) fn extend(&mut self, entries: Vec<TocEntry>) {
        for entry in entries {
            if entry.label.is_empty() {
                continue;
            }
            self.labels
                .entry(entry.href.to_lowercase())
                .or_insert(entry.label);
        }
    }

    /// Label for an archive path. Paths compare case-insensitively, like entry reads.
    pub fn label(&self, href: &str) -> Option<&str> {
        self.labels.get(&href.to_lowercase()).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

#[derive(Default)]
struct NavPoint {
    label: Option<String>,
    src: Option<String>,
    emitted: bool,
}

/// Flatten NCX `navPoint`s in document order.
pub(crate) fn parse_ncx(content: &str, ncx_path: &str) -> Result<Vec<TocEntry>, quick_xml::Error> {
    let mut reader = Reader::from_str(content);
    let mut entries = Vec::new();
    let mut stack: Vec<NavPoint> = Vec::new();
    let mut in_label_text = false;
    let mut in_nav_label = false;
    let mut text = String::new();

    let emit = |point: &mut NavPoint, entries: &mut Vec<TocEntry>| {
        if point.emitted {
            return;
        }
        if let (Some(label), Some(src)) = (&point.label, &point.src) {
            entries.push(TocEntry {
                label: label.clone(),
                href: resolve_href(ncx_path, src),
            });
            point.emitted = true;
        }
    };

    loop {
        match reader.read_event()? {
            Event::Start(e) => match local_name(e.name().as_ref()) {
                b"navPoint" => stack.push(NavPoint::default()),
                b"navLabel" => in_nav_label = true,
                b"text" if in_nav_label => {
                    in_label_text = true;
                    text.clear();
                }
                b"content" => {
                    if let Some(point) = stack.last_mut() {
                        point.src = attr(&e, b"src");
                        emit(point, &mut entries);
                    }
                }
                _ => {}
            },
            Event::Empty(e) => {
                if local_name(e.name().as_ref()) == b"content" {
                    if let Some(point) = stack.last_mut() {
                        point.src = attr(&e, b"src");
                        emit(point, &mut entries);
                    }
                }
            }
            Event::Text(e) if in_label_text => {
                text.push_str(&String::from_utf8_lossy(e.as_ref()));
            }
            Event::CData(e) if in_label_text => {
                text.push_str(&String::from_utf8_lossy(e.as_ref()));
            }
            Event::GeneralRef(e) if in_label_text => {
                if let Some(c) = resolve_entity(e.as_ref()) {
                    text.push(c);
                }
            }
            Event::End(e) => match local_name(e.name().as_ref()) {
                b"text" if in_label_text => {
                    in_label_text = false;
                    if let Some(point) = stack.last_mut() {
                        if point.label.is_none() {
                            point.label = Some(collapse_whitespace(&text));
                        }
                        emit(point, &mut entries);
                    }
                }
                b"navLabel" => in_nav_label = false,
                b"navPoint" => {
                    stack.pop();
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(entries)
}

/// Anchors of the EPUB 3 nav document's `toc` nav, in document order. Falls back
/// to the first `<nav>` when none is typed `toc`.
pub(crate) fn parse_nav(content: &str, nav_path: &str) -> Vec<TocEntry> {
    let (Ok(nav_sel), Ok(anchor_sel)) = (Selector::parse("nav"), Selector::parse("a[href]")) else {
        return Vec::new();
    };
    let doc = Html::parse_document(&expand_self_closing(content));

    let navs: Vec<_> = doc.select(&nav_sel).collect();
    let toc_nav = navs
        .iter()
        .find(|nav| {
            nav.value()
                .attr("epub:type")
                .is_some_and(|t| t.split_ascii_whitespace().any(|v| v == "toc"))
        })
        .or_else(|| navs.first());

    let Some(nav) = toc_nav else {
        return Vec::new();
    };

    nav.select(&anchor_sel)
        .filter_map(|a| {
            let href = a.value().attr("href")?;
            let label = collapse_whitespace(&a.text().collect::<String>());
            Some(TocEntry {
                label,
                href: resolve_href(nav_path, href),
            })
        })
        .collect()
}
