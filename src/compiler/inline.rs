//! CSS inlining for production documents.
//!
//! Per document, in order:
//!
//! 1. Inline every non-media rule into `style` attributes, drop `<style>` tags
//! 2. Replace the placeholder comment with a `<style>` holding the media queries
//! 3. Remove the stylesheet `<link>`
//! 4. Strip `=""` left behind by valueless attributes
//! 5. Rewrite template tokens
//!
//! Template tokens travel through the HTML parser as numbered comments.
//! Comments stay where they are written, even between table rows, whereas
//! unknown elements there get moved in front of the table.
//!
//! Development builds skip the stage and keep the external stylesheet link.

use super::collect_documents;
use crate::{
    config::BuildConfig,
    log,
    logger::ProgressBars,
    utils::{
        css::{SplitStylesheet, split_media_queries},
        tokens::rewrite_tokens,
    },
};
use anyhow::{Context, Result, anyhow, bail};
use css_inline::CSSInliner;
use rayon::prelude::*;
use regex::Regex;
use std::{
    borrow::Cow,
    fs,
    path::Path,
    sync::{
        OnceLock,
        atomic::{AtomicUsize, Ordering},
    },
};

/// Inline styles into every compiled document, in place.
///
/// Returns the number of documents rewritten; zero outside production.
pub fn inline_documents(build: &BuildConfig) -> Result<usize> {
    if !build.mode.is_production() {
        log!("inline"; "skipped in {} mode", build.mode.name());
        return Ok(0);
    }

    let stylesheet = build.stylesheet_path();
    let css = fs::read_to_string(&stylesheet)
        .with_context(|| format!("Failed to read stylesheet {}", stylesheet.display()))?;
    let inliner = Inliner::new(
        split_media_queries(&css)?,
        &build.inline.placeholder,
        &build.stylesheet_href(),
    )?;

    let documents = collect_documents(&build.output);
    let progress = ProgressBars::new_filtered(&[("inline", documents.len())]);
    let failed = AtomicUsize::new(0);

    documents.par_iter().for_each(|path| {
        if let Err(e) = inline_file(path, &inliner) {
            failed.fetch_add(1, Ordering::Relaxed);
            log!("error"; "{}: {:#}", path.display(), e);
        }
        if let Some(progress) = &progress {
            progress.inc("inline");
        }
    });

    if let Some(progress) = &progress {
        progress.finish();
    }

    let failed = failed.into_inner();
    if failed > 0 {
        bail!("{failed} of {} documents failed to inline", documents.len());
    }
    Ok(documents.len())
}

fn inline_file(path: &Path, inliner: &Inliner) -> Result<()> {
    let html = fs::read_to_string(path)?;
    fs::write(path, inliner.inline(&html)?)?;
    Ok(())
}

/// Per-build inlining state: the split stylesheet and the link to remove.
pub struct Inliner {
    rules: String,
    media_block: String,
    placeholder: String,
    link: Regex,
}

impl Inliner {
    pub fn new(stylesheet: SplitStylesheet, placeholder: &str, href: &str) -> Result<Self> {
        let pattern = format!(
            r#"<link[^>]*href=["']?{}["']?[^>]*>"#,
            regex::escape(href)
        );
        Ok(Self {
            rules: stylesheet.rules,
            media_block: format!("<style>{}</style>", stylesheet.media),
            placeholder: placeholder.to_owned(),
            link: Regex::new(&pattern)?,
        })
    }

    /// Run every inlining step on one document.
    pub fn inline(&self, html: &str) -> Result<String> {
        let inliner = CSSInliner::options()
            .inline_style_tags(false)
            .keep_style_tags(false)
            .keep_link_tags(true)
            .load_remote_stylesheets(false)
            .extra_css(Some(Cow::Borrowed(self.rules.as_str())))
            .build();
        let (html, tokens) = protect_tokens(html);
        let html = inliner.inline(&html).map_err(|e| anyhow!("{e}"))?;
        let html = restore_tokens(&html, &tokens);

        let html = html.replace(&self.placeholder, &self.media_block);
        let html = self.link.replace_all(&html, "");
        let html = html.replace("=\"\"", "");
        Ok(rewrite_tokens(&html))
    }
}

// ============================================================================
// Token shielding
// ============================================================================

fn token_tag_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?s)<!--.*?-->|(</?)([Tt][Mm][Pp][Ll]_[A-Za-z]+)([^>]*>)").unwrap()
    })
}

fn token_comment_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"<!--inkpot-token-([0-9]+)-->|&lt;!--inkpot-token-([0-9]+)--&gt;").unwrap()
    })
}

/// Swap every template tag outside comments for a numbered comment.
///
/// Tag names are stored lowercased, the way the HTML parser would emit them.
fn protect_tokens(html: &str) -> (String, Vec<String>) {
    let mut tokens = Vec::new();
    let out = token_tag_regex().replace_all(html, |caps: &regex::Captures<'_>| {
        let (Some(open), Some(name), Some(rest)) = (caps.get(1), caps.get(2), caps.get(3)) else {
            return caps[0].to_owned();
        };
        let marker = format!("<!--inkpot-token-{}-->", tokens.len());
        tokens.push(format!(
            "{}{}{}",
            open.as_str(),
            name.as_str().to_ascii_lowercase(),
            rest.as_str()
        ));
        marker
    });
    (out.into_owned(), tokens)
}

/// Put the tags back, including markers escaped as text inside `<title>`.
fn restore_tokens(html: &str, tokens: &[String]) -> String {
    if tokens.is_empty() {
        return html.to_owned();
    }
    token_comment_regex()
        .replace_all(html, |caps: &regex::Captures<'_>| {
            caps.get(1)
                .or_else(|| caps.get(2))
                .and_then(|index| index.as_str().parse::<usize>().ok())
                .and_then(|index| tokens.get(index))
                .map_or_else(|| caps[0].to_owned(), Clone::clone)
        })
        .into_owned()
}
