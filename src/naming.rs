//! Output file and directory names: sanitizing titles and resolving collisions.

use std::collections::HashSet;

/// Default cap on a sanitized name, in characters.
pub const DEFAULT_MAX_NAME_LEN: usize = 100;

/// File that collects chapters shorter than `min_chapter_chars`.
pub const NON_CHAPTER_STEM: &str = "non_chapter_content";

/// How chapter files are named.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NamingScheme {
    /// `<title>.txt`
    #[default]
    Title,
    /// `<index:03>_<title>.txt`, sorts in spine order.
    Numbered,
}

/// Make `name` safe as a single path component.
///
/// Path separators, reserved punctuation and control characters become `_`.
/// Surrounding whitespace and trailing dots are trimmed, and the result is cut to
/// `max_len` characters. Returns `None` when nothing usable remains.
pub fn sanitize(name: &str, max_len: usize) -> Option<String> {
    let replaced: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    let mut s = replaced.trim().trim_end_matches('.').trim_end().to_string();
    if s.chars().count() > max_len {
        s = s.chars().take(max_len).collect();
        s = s
            .trim_end_matches(|c: char| c == '_' || c == '.' || c.is_whitespace())
            .to_string();
    }

    if s.is_empty() || s == "." || s == ".." {
        None
    } else {
        Some(s)
    }
}

/// Stem for a chapter file before collision handling.
pub fn chapter_stem(scheme: NamingScheme, index: usize, title: &str, max_len: usize) -> String {
    let fallback = format!("{:03}", index);
    match scheme {
        NamingScheme::Title => sanitize(title, max_len).unwrap_or(fallback),
        NamingScheme::Numbered => {
            let prefix = format!("{:03}_", index);
            let budget = max_len.saturating_sub(prefix.chars().count()).max(1);
            match sanitize(title, budget) {
                Some(t) if t != fallback => format!("{}{}", prefix, t),
                _ => fallback,
            }
        }
    }
}

/// Stem for the short-chapter collection file.
pub fn non_chapter_stem(scheme: NamingScheme) -> String {
    match scheme {
        NamingScheme::Title => NON_CHAPTER_STEM.to_string(),
        NamingScheme::Numbered => format!("000_{}", NON_CHAPTER_STEM),
    }
}

/// Claims names case-insensitively so that no two outputs share a path, even on
/// case-folding filesystems.
#[derive(Debug, Default)]
pub struct NameRegistry {
    taken: HashSet<String>,
}

impl NameRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve a name up front (e.g. the short-chapter file).
    pub fn reserve(&mut self, name: &str) {
        self.taken.insert(name.to_lowercase());
    }

    pub fn is_taken(&self, name: &str) -> bool {
        self.taken.contains(&name.to_lowercase())
    }

    /// Claim `stem`; on collision append ` (<index>)`, then ` (<index>-2)`, ... until free.
    /// Suffixed names are cut to fit `max_len`.
    pub fn claim_chapter(&mut self, stem: &str, index: usize, max_len: usize) -> String {
        if self.try_claim(stem) {
            return stem.to_string();
        }
        let with_index = with_suffix(stem, &format!(" ({})", index), max_len);
        if self.try_claim(&with_index) {
            return with_index;
        }
        let mut n = 2;
        loop {
            let candidate = with_suffix(stem, &format!(" ({}-{})", index, n), max_len);
            if self.try_claim(&candidate) {
                return candidate;
            }
            n += 1;
        }
    }

    /// Claim a book directory; on collision append ` (<file stem>)`, then ` (2)`, ` (3)`, ...
    /// Suffixed names are cut to fit `max_len`.
    pub fn claim_book(&mut self, name: &str, file_stem: &str, max_len: usize) -> String {
        if self.try_claim(name) {
            return name.to_string();
        }
        if let Some(stem) = sanitize(file_stem, max_len).filter(|s| s != name) {
            let with_stem = with_suffix(name, &format!(" ({})", stem), max_len);
            if self.try_claim(&with_stem) {
                return with_stem;
            }
        }
        let mut n = 2;
        loop {
            let candidate = with_suffix(name, &format!(" ({})", n), max_len);
            if self.try_claim(&candidate) {
                return candidate;
            }
            n += 1;
        }
    }

    fn try_claim(&mut self, name: &str) -> bool {
        self.taken.insert(name.to_lowercase())
    }
}

/// `base` plus `suffix`, with `base` shortened so the result fits in `max_len`
/// characters. At least one character of `base` is kept.
fn with_suffix(base: &str, suffix: &str, max_len: usize) -> String {
    let budget = max_len.saturating_sub(suffix.chars().count()).max(1);
    if base.chars().count() <= budget {
        return format!("{}{}", base, suffix);
    }
    let cut: String = base.chars().take(budget).collect();
    let trimmed = cut.trim_end_matches(|c: char| c == '_' || c == '.' || c.is_whitespace());
    let head = if trimmed.is_empty() { cut.as_str() } else { trimmed };
    format!("{}{}", head, suffix)
}
