//! Stylesheet utilities built on lightningcss.
//!
//! - **Media split**: separate `@media` blocks from the rest of a stylesheet
//! - **Unused-rule stripping**: drop selectors that match nothing in the
//!   compiled documents

use anyhow::{Result, anyhow};
use lightningcss::{
    rules::{CssRule, CssRuleList},
    stylesheet::{ParserOptions, PrinterOptions, StyleSheet},
    traits::ToCss,
};
use regex::Regex;
use rustc_hash::FxHashSet;
use std::sync::OnceLock;

// ============================================================================
// Media split
// ============================================================================

/// A stylesheet split into inlinable rules and media queries.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct SplitStylesheet {
    /// Everything except `@media` blocks.
    pub rules: String,
    /// Only the `@media` blocks, in source order.
    pub media: String,
}

/// Split `css` into its media queries and the remaining rules.
pub fn split_media_queries(css: &str) -> Result<SplitStylesheet> {
    let mut sheet = parse(css)?;
    let (media, rules): (Vec<_>, Vec<_>) = std::mem::take(&mut sheet.rules.0)
        .into_iter()
        .partition(|rule| matches!(rule, CssRule::Media(_)));

    sheet.rules = CssRuleList(rules);
    let rules = print(&sheet)?;
    sheet.rules = CssRuleList(media);
    let media = print(&sheet)?;

    Ok(SplitStylesheet { rules, media })
}

// ============================================================================
// Unused-rule stripping
// ============================================================================

/// Tags, classes and ids present in a set of documents.
#[derive(Debug, Default)]
pub struct UsedTokens {
    tags: FxHashSet<String>,
    classes: FxHashSet<String>,
    ids: FxHashSet<String>,
}

impl UsedTokens {
    /// Collect the tokens of every document.
    pub fn from_documents<'a>(documents: impl IntoIterator<Item = &'a str>) -> Self {
        let mut used = Self::default();
        for html in documents {
            used.add_document(html);
        }
        used
    }

    pub fn add_document(&mut self, html: &str) {
        let (tag_re, class_re, id_re) = document_patterns();
        for cap in tag_re.captures_iter(html) {
            self.tags.insert(cap[1].to_ascii_lowercase());
        }
        for cap in class_re.captures_iter(html) {
            self.classes
                .extend(cap[1].split_ascii_whitespace().map(str::to_owned));
        }
        for cap in id_re.captures_iter(html) {
            self.ids.insert(cap[1].trim().to_owned());
        }
    }

    /// Whether a single selector can match these documents.
    ///
    /// Pseudo-classes, pseudo-elements and attribute conditions are ignored,
    /// so `a:hover` is kept whenever an `a` exists. A selector left with
    /// nothing to check (`*`, `:root`) is always kept.
    pub fn matches(&self, selector: &str) -> bool {
        let (pseudo_re, attr_re, token_re) = selector_patterns();
        let bare = pseudo_re.replace_all(selector, "");
        let bare = attr_re.replace_all(&bare, "");

        token_re.captures_iter(&bare).all(|cap| {
            let name = &cap[2];
            match &cap[1] {
                "." => self.classes.contains(name),
                "#" => self.ids.contains(name),
                _ => self.tags.contains(&name.to_ascii_lowercase()),
            }
        })
    }
}

fn document_patterns() -> &'static (Regex, Regex, Regex) {
    static RE: OnceLock<(Regex, Regex, Regex)> = OnceLock::new();
    RE.get_or_init(|| {
        (
            Regex::new(r"<([A-Za-z][A-Za-z0-9-]*)").unwrap(),
            Regex::new(r#"class[ \t\r\n]*=[ \t\r\n]*["']([^"']*)["']"#).unwrap(),
            Regex::new(r#"id[ \t\r\n]*=[ \t\r\n]*["']([^"']*)["']"#).unwrap(),
        )
    })
}

fn selector_patterns() -> &'static (Regex, Regex, Regex) {
    static RE: OnceLock<(Regex, Regex, Regex)> = OnceLock::new();
    RE.get_or_init(|| {
        (
            Regex::new(r"::?[A-Za-z-]+(\([^)]*\))?").unwrap(),
            Regex::new(r"\[[^\]]*\]").unwrap(),
            Regex::new(r"([.#]?)([A-Za-z_][A-Za-z0-9_-]*)").unwrap(),
        )
    })
}

/// Remove every selector of `css` that matches nothing in `used`.
///
/// Rules losing all their selectors are dropped, and so are `@media`
/// blocks left empty. Other at-rules are kept as they are.
pub fn strip_unused(css: &str, used: &UsedTokens) -> Result<String> {
    let mut sheet = parse(css)?;
    retain_used(&mut sheet.rules.0, used);
    print(&sheet)
}

fn retain_used(rules: &mut Vec<CssRule<'_>>, used: &UsedTokens) {
    rules.retain_mut(|rule| match rule {
        CssRule::Style(style) => {
            style.selectors.0.retain(|selector| {
                selector
                    .to_css_string(PrinterOptions::default())
                    .map(|text| used.matches(&text))
                    .unwrap_or(true)
            });
            !style.selectors.0.is_empty()
        }
        CssRule::Media(media) => {
            retain_used(&mut media.rules.0, used);
            !media.rules.0.is_empty()
        }
        _ => true,
    });
}

// ============================================================================
// Parse / print
// ============================================================================

fn parse(css: &str) -> Result<StyleSheet<'_>> {
    StyleSheet::parse(css, ParserOptions::default()).map_err(|e| anyhow!("invalid CSS: {e}"))
}

fn print(sheet: &StyleSheet<'_>) -> Result<String> {
    sheet
        .to_css(PrinterOptions::default())
        .map(|out| out.code)
        .map_err(|e| anyhow!("failed to print CSS: {e}"))
}
