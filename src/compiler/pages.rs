//! Page rendering.
//!
//! Every page under `pages` (minus excluded subtrees) is rendered through
//! its layout, expanded with Inky, and written to the output directory at
//! the same relative path.

use super::collect_files_with_ext;
use super::templates::{BODY_PARTIAL, PageSource, TemplateCache, layout_name};
use crate::{config::BuildConfig, log, logger::ProgressBars, utils::inky::Inky};
use anyhow::{Context, Result, bail};
use handlebars::Handlebars;
use rayon::prelude::*;
use std::{
    fs,
    path::{Path, PathBuf},
    sync::atomic::{AtomicUsize, Ordering},
};

/// Pages to compile, sorted.
pub fn collect_pages(build: &BuildConfig) -> Vec<PathBuf> {
    collect_files_with_ext(&build.pages, "html")
        .into_iter()
        .filter(|path| !build.is_excluded(path))
        .collect()
}

/// Render every page and write it to the output directory.
///
/// Pages render in parallel. A failing page does not stop the others; each
/// failure is logged and the stage fails at the end.
pub fn compile_pages(build: &BuildConfig, templates: &TemplateCache) -> Result<usize> {
    let pages = collect_pages(build);
    let registry = templates.registry(build)?;
    let inky = build.inky.enable.then(|| Inky::new(build.inky.column_count));

    let progress = ProgressBars::new_filtered(&[("pages", pages.len())]);
    let failed = AtomicUsize::new(0);

    pages.par_iter().for_each(|path| {
        if let Err(e) = compile_page(path, build, &registry, inky.as_ref()) {
            failed.fetch_add(1, Ordering::Relaxed);
            log!("error"; "{}: {:#}", path.display(), e);
        }
        if let Some(progress) = &progress {
            progress.inc("pages");
        }
    });

    if let Some(progress) = &progress {
        progress.finish();
    }

    let failed = failed.into_inner();
    if failed > 0 {
        bail!("{failed} of {} pages failed to compile", pages.len());
    }
    Ok(pages.len())
}

/// Render a single page to its output file.
fn compile_page(
    path: &Path,
    build: &BuildConfig,
    registry: &Handlebars<'static>,
    inky: Option<&Inky>,
) -> Result<()> {
    let page = PageSource::load(path, build)?;
    let html = render_page(&page, registry)?;
    let html = match inky {
        Some(inky) => inky.expand(&html)?,
        None => html,
    };

    let output = build.output.join(&page.relative);
    if let Some(parent) = output.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&output, html).with_context(|| format!("Failed to write {}", output.display()))
}

/// Render a page through its layout.
///
/// The page body is itself a template: it is registered as the `body`
/// partial of a per-page copy of the registry, so it sees the same data,
/// partials and helpers as the layout.
pub fn render_page(page: &PageSource, registry: &Handlebars<'static>) -> Result<String> {
    let layout = layout_name(&page.layout);
    if !registry.has_template(&layout) {
        bail!("layout `{}` not found", page.layout);
    }

    let mut registry = registry.clone();
    registry
        .register_partial(BODY_PARTIAL, page.body.as_str())
        .context("Invalid page template")?;
    registry
        .render(&layout, &page.data)
        .with_context(|| format!("Failed to render with layout `{}`", page.layout))
}
