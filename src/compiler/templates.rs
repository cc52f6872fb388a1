//! Layout, partial and helper registry shared by every page.
//!
//! Loading the registry parses every layout and partial, so it is cached
//! across builds. The cache is only dropped by [`TemplateCache::refresh`]:
//! when layouts, partials or helpers change, the watch pipelines refresh
//! before rendering, otherwise stale fragments would be reused.

use super::{collect_all_files, collect_files_with_ext, helpers};
use crate::{config::BuildConfig, log};
use anyhow::{Context, Result, bail};
use handlebars::Handlebars;
use parking_lot::RwLock;
use serde_json::{Map, Value};
use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};

/// Template name prefix for layouts, keeps them apart from partial names.
const LAYOUT_PREFIX: &str = "layouts/";

/// Name of the partial each layout renders the page through.
pub const BODY_PARTIAL: &str = "body";

const FRONT_MATTER_DELIMITER: &str = "---";

// ============================================================================
// Registry cache
// ============================================================================

/// Lazily loaded registry of layouts, partials and helpers.
#[derive(Default)]
pub struct TemplateCache {
    registry: RwLock<Option<Arc<Handlebars<'static>>>>,
}

impl TemplateCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop the cached registry; the next render reloads from disk.
    pub fn refresh(&self) {
        *self.registry.write() = None;
    }

    pub fn is_loaded(&self) -> bool {
        self.registry.read().is_some()
    }

    /// Cached registry, loading it first if needed.
    pub fn registry(&self, build: &BuildConfig) -> Result<Arc<Handlebars<'static>>> {
        if let Some(registry) = self.registry.read().as_ref() {
            return Ok(Arc::clone(registry));
        }

        let mut slot = self.registry.write();
        if let Some(registry) = slot.as_ref() {
            return Ok(Arc::clone(registry));
        }
        let registry = Arc::new(load_registry(build)?);
        *slot = Some(Arc::clone(&registry));
        Ok(registry)
    }
}

/// Template name of a layout.
pub fn layout_name(layout: &str) -> String {
    format!("{LAYOUT_PREFIX}{layout}")
}

fn load_registry(build: &BuildConfig) -> Result<Handlebars<'static>> {
    let mut registry = Handlebars::new();
    helpers::register_builtin(&mut registry);

    for path in collect_files_with_ext(&build.layouts, "html") {
        let name = layout_name(&file_stem(&path)?);
        registry
            .register_template_file(&name, &path)
            .with_context(|| format!("Invalid layout `{}`", path.display()))?;
    }

    if build.partials.is_dir() {
        for path in collect_files_with_ext(&build.partials, "html") {
            let source = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            registry
                .register_partial(&file_stem(&path)?, source)
                .with_context(|| format!("Invalid partial `{}`", path.display()))?;
        }
    }

    if build.helpers.is_dir() {
        for path in collect_all_files(&build.helpers) {
            if path.extension().is_none_or(|ext| ext != "rhai") {
                log!("pages"; "skipping helper {} (only .rhai scripts are loaded)", path.display());
                continue;
            }
            registry
                .register_script_helper_file(&file_stem(&path)?, &path)
                .with_context(|| format!("Invalid helper `{}`", path.display()))?;
        }
    }

    Ok(registry)
}

fn file_stem(path: &Path) -> Result<String> {
    path.file_stem()
        .and_then(|s| s.to_str())
        .map(str::to_owned)
        .with_context(|| format!("Invalid file name: {}", path.display()))
}

// ============================================================================
// Page sources
// ============================================================================

/// A page split into template data and body.
#[derive(Debug)]
pub struct PageSource {
    pub source: PathBuf,
    /// Path relative to the pages directory (`welcome.html`, `promo/sale.html`).
    pub relative: PathBuf,
    pub layout: String,
    pub data: Value,
    pub body: String,
}

impl PageSource {
    /// Read a page and build its template data.
    ///
    /// Front-matter keys come first; `page`, `layout` and `root` are always
    /// computed and override same-named keys.
    pub fn load(path: &Path, build: &BuildConfig) -> Result<Self> {
        let content =
            fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
        let relative = path
            .strip_prefix(&build.pages)
            .with_context(|| format!("{} is outside the pages directory", path.display()))?
            .to_path_buf();

        let (front_matter, body) = split_front_matter(&content);
        let mut data = match front_matter {
            Some(yaml) => parse_front_matter(yaml)
                .with_context(|| format!("Invalid front matter in {}", path.display()))?,
            None => Map::new(),
        };

        let layout = data
            .get("layout")
            .and_then(Value::as_str)
            .unwrap_or(build.default_layout.as_str())
            .to_owned();

        data.insert("page".into(), Value::String(file_stem(path)?));
        data.insert("layout".into(), Value::String(layout.clone()));
        data.insert("root".into(), Value::String(root_prefix(&relative)));

        Ok(Self {
            source: path.to_path_buf(),
            relative,
            layout,
            data: Value::Object(data),
            body: body.to_owned(),
        })
    }
}

/// Split `---`-delimited YAML front matter from the body.
///
/// Returns `(None, content)` when the file does not open with a delimiter
/// line or the block is never closed.
pub fn split_front_matter(content: &str) -> (Option<&str>, &str) {
    let Some(rest) = content.strip_prefix(FRONT_MATTER_DELIMITER) else {
        return (None, content);
    };
    let Some(rest) = rest.strip_prefix("\r\n").or_else(|| rest.strip_prefix('\n')) else {
        return (None, content);
    };

    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        if line.trim_end() == FRONT_MATTER_DELIMITER {
            return (Some(&rest[..offset]), &rest[offset + line.len()..]);
        }
        offset += line.len();
    }
    (None, content)
}

fn parse_front_matter(yaml: &str) -> Result<Map<String, Value>> {
    if yaml.trim().is_empty() {
        return Ok(Map::new());
    }
    match serde_yaml_ng::from_str::<Value>(yaml)? {
        Value::Object(map) => Ok(map),
        Value::Null => Ok(Map::new()),
        other => bail!("front matter must be a mapping, found `{other}`"),
    }
}

/// Relative prefix from a page back to the output root: `""`, `"../"`, ...
fn root_prefix(relative: &Path) -> String {
    let depth = relative.components().count().saturating_sub(1);
    "../".repeat(depth)
}
