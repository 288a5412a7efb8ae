//! XHTML chapter documents to plain text, plus in-document title detection.

use crate::epub::xml::expand_self_closing;
use scraper::node::Node;
use scraper::{ElementRef, Html, Selector};

/// Elements whose content is never visible.
const HIDDEN: &[&str] = &["head", "script", "style", "template", "noscript"];

/// Elements that start a new paragraph.
const BLOCKS: &[&str] = &[
    "address", "article", "aside", "blockquote", "body", "caption", "center", "dd", "details",
    "dialog", "div", "dl", "dt", "fieldset", "figcaption", "figure", "footer", "form", "h1", "h2",
    "h3", "h4", "h5", "h6", "header", "hgroup", "hr", "html", "li", "main", "nav", "ol", "p",
    "pre", "section", "summary", "table", "tbody", "thead", "tfoot", "tr", "ul",
];

/// Table cells stay on their row's line.
const CELLS: &[&str] = &["td", "th"];

/// Parent elements that make an `<em>` look like a title.
const TITLE_EM_PARENTS: &[&str] = &["h1", "h2", "h3", "div", "header", "title", "nav"];

/// Minimum length for an `<em>` to be taken as a title (skips "e.g." and friends).
const TITLE_EM_MIN_CHARS: usize = 5;

/// A parsed chapter document.
pub struct ChapterDocument {
    html: Html,
}

impl ChapterDocument {
    /// Parse an XHTML (or HTML) chapter. Self-closing non-void tags are
    /// expanded first so `<title/>` cannot swallow the body.
    pub fn parse(source: &str) -> Self {
        Self {
            html: Html::parse_document(&expand_self_closing(source)),
        }
    }

    /// Visible text.
    ///
    /// Paragraphs are separated by a blank line, `<br>` ends a line, whitespace
    /// elsewhere collapses to single spaces. Returns an empty string when the
    /// document has no visible text.
    pub fn text(&self) -> String {
        let mut out = TextBuilder::default();
        walk(self.html.root_element(), &mut out);
        out.finish()
    }

    /// Best-effort chapter title from the document itself: first `h1`-`h4`, then
    /// `p.title` / `div.chapter-title` / `span.chapter-title`, then a title-like `<em>`.
    pub fn heading_title(&self) -> Option<String> {
        let candidates = ["h1, h2, h3, h4", "p.title", "div.chapter-title", "span.chapter-title"];
        for css in candidates {
            let Ok(selector) = Selector::parse(css) else {
                continue;
            };
            let found = self
                .html
                .select(&selector)
                .map(element_text)
                .find(|t| !t.is_empty());
            if found.is_some() {
                return found;
            }
        }

        let em = Selector::parse("em").ok()?;
        self.html
            .select(&em)
            .find(|el| is_likely_title(*el))
            .map(element_text)
    }
}

/// Shorthand for `ChapterDocument::parse(html).text()`.
pub fn extract_text(html: &str) -> String {
    ChapterDocument::parse(html).text()
}

fn walk(element: ElementRef<'_>, out: &mut TextBuilder) {
    let name = element.value().name();
    if HIDDEN.contains(&name) {
        return;
    }
    let is_block = BLOCKS.contains(&name);
    let is_pre = name == "pre";

    if is_block {
        out.paragraph();
    } else if CELLS.contains(&name) {
        out.space();
    }
    if is_pre {
        out.pre_depth += 1;
    }

    for child in element.children() {
        match child.value() {
            Node::Text(text) => out.push(text),
            Node::Element(el) if el.name() == "br" => out.line_break(),
            Node::Element(_) => {
                if let Some(child) = ElementRef::wrap(child) {
                    walk(child, out);
                }
            }
            _ => {}
        }
    }

    if is_pre {
        out.pre_depth -= 1;
    }
    if is_block {
        out.paragraph();
    }
}

/// Accumulates lines; separators are only written between non-empty lines,
/// so leading and trailing breaks never reach the output.
#[derive(Default)]
struct TextBuilder {
    out: String,
    line: String,
    /// Newlines owed before the next committed line (1 = line break, 2 = paragraph).
    pending: usize,
    space: bool,
    pre_depth: usize,
}

impl TextBuilder {
    fn push(&mut self, text: &str) {
        if self.pre_depth > 0 {
            let mut lines = text.split('\n');
            if let Some(first) = lines.next() {
                self.line.push_str(first.trim_end_matches('\r'));
            }
            for line in lines {
                self.commit(1);
                self.line.push_str(line.trim_end_matches('\r'));
            }
            return;
        }
        for c in text.chars() {
            if c.is_whitespace() && c != '\u{a0}' {
                self.space = true;
            } else {
                if self.space && !self.line.is_empty() {
                    self.line.push(' ');
                }
                self.space = false;
                self.line.push(c);
            }
        }
    }

    fn space(&mut self) {
        self.space = true;
    }

    fn line_break(&mut self) {
        if self.line.trim().is_empty() {
            self.line.clear();
            // A break on an empty line deepens the gap, at most to a blank line.
            if !self.out.is_empty() {
                self.pending = (self.pending + 1).min(2);
            }
        } else {
            self.commit(1);
        }
    }

    fn paragraph(&mut self) {
        if self.line.trim().is_empty() {
            self.line.clear();
            if !self.out.is_empty() {
                self.pending = 2;
            }
        } else {
            self.commit(2);
        }
    }

    /// Write the current line and owe `next` newlines before the following one.
    fn commit(&mut self, next: usize) {
        let line = self.line.trim_end();
        if !line.is_empty() {
            if !self.out.is_empty() {
                for _ in 0..self.pending.max(1) {
                    self.out.push('\n');
                }
            }
            self.out.push_str(line);
            self.pending = next;
        } else if !self.out.is_empty() {
            self.pending = self.pending.max(next);
        }
        self.line.clear();
        self.space = false;
    }

    fn finish(mut self) -> String {
        self.commit(0);
        self.out
            .replace('\u{a0}', " ")
            .lines()
            .map(str::trim_end)
            .collect::<Vec<_>>()
            .join("\n")
            .trim()
            .to_string()
    }
}

fn element_text(el: ElementRef<'_>) -> String {
    el.text()
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn is_likely_title(em: ElementRef<'_>) -> bool {
    if element_text(em).chars().count() <= TITLE_EM_MIN_CHARS {
        return false;
    }
    let Some(parent) = em.parent().and_then(ElementRef::wrap) else {
        return false;
    };
    if TITLE_EM_PARENTS.contains(&parent.value().name()) {
        return true;
    }
    // First meaningful child of its parent.
    parent
        .children()
        .find(|child| match child.value() {
            Node::Text(text) => !text.trim().is_empty(),
            Node::Comment(_) => false,
            _ => true,
        })
        .is_some_and(|first| first.id() == em.id())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn find_heading_title(html: &str) -> Option<String> {
        ChapterDocument::parse(html).heading_title()
    }

    fn doc(body: &str) -> String {
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<html xmlns="http://www.w3.org/1999/xhtml"><head><title>Ignored</title>
<style>p {{ color: red; }}</style></head><body>{}</body></html>"#,
            body
        )
    }

    #[test]
    fn extract_text_paragraphs_separated_by_blank_line() {
        let text = extract_text(&doc("<h1>Title</h1><p>First  para\n graph.</p><p>Second.</p>"));
        assert_eq!(text, "Title\n\nFirst para graph.\n\nSecond.");
    }

    #[test]
    fn extract_text_drops_head_script_and_style() {
        let text = extract_text(&doc("<script>var x = 1;</script><p>Visible</p>"));
        assert_eq!(text, "Visible");
        assert!(!text.contains("Ignored"));
        assert!(!text.contains("color"));
    }

    #[test]
    fn extract_text_inline_elements_keep_spacing() {
        let text = extract_text(&doc("<p>A <b>bold</b> and <i>it</i>alic word.</p>"));
        assert_eq!(text, "A bold and italic word.");
    }

    #[test]
    fn extract_text_br_breaks_lines() {
        let text = extract_text(&doc("<p>Roses are red,<br/>violets are blue.<br/><br/>Fin.</p>"));
        assert_eq!(text, "Roses are red,\nviolets are blue.\n\nFin.");
    }

    #[test]
    fn extract_text_nested_blocks_do_not_stack_blank_lines() {
        let text = extract_text(&doc("<div><div><p>One</p></div></div><section><p>Two</p></section>"));
        assert_eq!(text, "One\n\nTwo");
    }

    #[test]
    fn extract_text_preformatted_keeps_lines() {
        let text = extract_text(&doc("<pre>line one\n  line two</pre>"));
        assert_eq!(text, "line one\n  line two");
    }

    #[test]
    fn extract_text_table_cells_share_a_line() {
        let text = extract_text(&doc("<table><tr><td>a</td><td>b</td></tr><tr><td>c</td></tr></table>"));
        assert_eq!(text, "a b\n\nc");
    }

    #[test]
    fn extract_text_markup_only_is_empty() {
        assert_eq!(extract_text(&doc(r#"<div><img src="x.png"/></div><p> </p>"#)), "");
        assert_eq!(extract_text(""), "");
    }

    #[test]
    fn extract_text_decodes_entities() {
        assert_eq!(extract_text(&doc("<p>Tom &amp; Jerry&#8217;s</p>")), "Tom & Jerry\u{2019}s");
    }

    #[test]
    fn extract_text_is_deterministic() {
        let html = doc("<p>a</p><ul><li>x</li><li>y</li></ul>");
        assert_eq!(extract_text(&html), extract_text(&html));
        assert_eq!(extract_text(&html), "a\n\nx\n\ny");
    }

    #[test]
    fn extract_text_survives_self_closing_head_elements() {
        let html = r#"<?xml version="1.0" encoding="UTF-8"?>
<html xmlns="http://www.w3.org/1999/xhtml"><head><title/></head><body><p>Hello world.</p></body></html>"#;
        assert_eq!(extract_text(html), "Hello world.");

        let html = r#"<?xml version="1.0" encoding="UTF-8"?>
<html xmlns="http://www.w3.org/1999/xhtml"><head><title>T</title>
<script type="text/javascript" src="a.js"/></head><body><h2>Two</h2><p>Hello world.</p></body></html>"#;
        assert_eq!(extract_text(html), "Two\n\nHello world.");
        assert_eq!(find_heading_title(html).as_deref(), Some("Two"));
    }

    #[test]
    fn extract_text_self_closing_anchor_keeps_following_text() {
        let text = extract_text(&doc(r#"<p><a id="page5"/>Text after anchor.</p><div/><p>Next.</p>"#));
        assert_eq!(text, "Text after anchor.\n\nNext.");
    }

    #[test]
    fn heading_title_prefers_first_heading() {
        let html = doc("<p>intro</p><h2>Chapter  Two</h2><h1>Later</h1>");
        assert_eq!(find_heading_title(&html).as_deref(), Some("Chapter Two"));
    }

    #[test]
    fn heading_title_class_fallbacks() {
        let html = doc(r#"<span class="chapter-title">Span</span><div class="chapter-title">Div</div>"#);
        assert_eq!(find_heading_title(&html).as_deref(), Some("Div"));
        let html = doc(r#"<p class="title">The Title</p>"#);
        assert_eq!(find_heading_title(&html).as_deref(), Some("The Title"));
    }

    #[test]
    fn heading_title_em_heuristic() {
        let html = doc("<p><em>The Long Night</em> fell quickly over the town.</p>");
        assert_eq!(find_heading_title(&html).as_deref(), Some("The Long Night"));

        let html = doc("<p>See <em>e.g.</em> this and <em>emphasised words</em> here.</p>");
        assert_eq!(find_heading_title(&html), None);

        let html = doc("<div>Some text <em>inside a div</em></div>");
        assert_eq!(find_heading_title(&html).as_deref(), Some("inside a div"));
    }

    #[test]
    fn heading_title_none_for_plain_paragraphs() {
        assert_eq!(find_heading_title(&doc("<p>Just text.</p>")), None);
    }
}
