//! Small quick-xml helpers shared by the container, package, and NCX parsers,
//! plus the XHTML fixup applied before documents reach the HTML parser.

use quick_xml::escape::unescape;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::borrow::Cow;

/// HTML void elements. An HTML parser reads any other `<x/>` as an open tag.
const VOID_ELEMENTS: &[&[u8]] = &[
    b"area", b"base", b"br", b"col", b"embed", b"hr", b"img", b"input", b"link", b"meta",
    b"param", b"source", b"track", b"wbr",
];

/// Strip a namespace prefix (`dc:title` -> `title`).
pub(crate) fn local_name(name: &[u8]) -> &[u8] {
    match name.iter().rposition(|&b| b == b':') {
        Some(pos) => &name[pos + 1..],
        None => name,
    }
}

/// Value of the first attribute whose local name matches `key`, with entities resolved.
pub(crate) fn attr(e: &BytesStart<'_>, key: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| local_name(a.key.as_ref()) == key)
        .map(|a| decode_value(&a.value))
}

fn decode_value(value: &[u8]) -> String {
    let raw = String::from_utf8_lossy(value).into_owned();
    let unescaped = unescape(&raw).ok().and_then(|c| match c {
        Cow::Owned(s) => Some(s),
        Cow::Borrowed(_) => None,
    });
    unescaped.unwrap_or(raw)
}

/// Resolve the body of a general reference event (`amp`, `#8217`, `#x2019`).
pub(crate) fn resolve_entity(name: &[u8]) -> Option<char> {
    match name {
        b"amp" => Some('&'),
        b"lt" => Some('<'),
        b"gt" => Some('>'),
        b"quot" => Some('"'),
        b"apos" => Some('\''),
        b"nbsp" => Some('\u{a0}'),
        [b'#', b'x' | b'X', hex @ ..] => std::str::from_utf8(hex)
            .ok()
            .and_then(|h| u32::from_str_radix(h, 16).ok())
            .and_then(char::from_u32),
        [b'#', dec @ ..] => std::str::from_utf8(dec)
            .ok()
            .and_then(|d| d.parse::<u32>().ok())
            .and_then(char::from_u32),
        _ => None,
    }
}

/// Rewrite self-closing non-void tags (`<title/>`, `<script src="a.js"/>`) as
/// start/end pairs so an HTML5 parser sees the same tree an XML parser would.
///
/// Stops rewriting at the first XML error and keeps the rest of the input as is;
/// tag-soup HTML is left for the HTML parser.
pub(crate) fn expand_self_closing(source: &str) -> Cow<'_, str> {
    let mut reader = Reader::from_str(source);
    reader.config_mut().check_end_names = false;

    let mut out = String::new();
    let mut copied = 0;
    loop {
        let before = reader.buffer_position() as usize;
        match reader.read_event() {
            Ok(Event::Empty(e)) => {
                let name = e.name();
                let local = local_name(name.as_ref()).to_ascii_lowercase();
                if VOID_ELEMENTS.contains(&local.as_slice()) {
                    continue;
                }
                let after = reader.buffer_position() as usize;
                let Some(raw) = source.get(before..after) else {
                    continue;
                };
                let (Some(lt), Some(open)) = (raw.find('<'), raw.strip_suffix("/>")) else {
                    continue;
                };
                out.push_str(&source[copied..before + lt]);
                out.push_str(open[lt..].trim_end());
                out.push_str("></");
                out.push_str(&String::from_utf8_lossy(name.as_ref()));
                out.push('>');
                copied = after;
            }
            Ok(Event::Eof) | Err(_) => break,
            Ok(_) => {}
        }
    }

    if copied == 0 {
        Cow::Borrowed(source)
    } else {
        out.push_str(&source[copied..]);
        Cow::Owned(out)
    }
}

/// Collapse whitespace runs to single spaces and trim.
pub(crate) fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}
