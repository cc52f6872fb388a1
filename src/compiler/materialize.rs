//! Copy compiled documents into the template directory under the template
//! extension: `dist/promo/sale.html` becomes `templates/promo/sale.tmpl`.

use super::collect_documents;
use crate::{config::BuildConfig, log};
use anyhow::{Context, Result};
use std::{fs, path::PathBuf};

/// Materialize every compiled document, returning the written paths.
pub fn materialize_templates(build: &BuildConfig) -> Result<Vec<PathBuf>> {
    let documents = collect_documents(&build.output);
    let mut written = Vec::with_capacity(documents.len());

    for document in documents {
        let relative = document.strip_prefix(&build.output)?;
        let target = build
            .templates
            .join(relative)
            .with_extension(&build.template_ext);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::copy(&document, &target).with_context(|| {
            format!("Failed to copy {} to {}", document.display(), target.display())
        })?;
        written.push(target);
    }

    log!("templates"; "materialized {} templates", written.len());
    Ok(written)
}
