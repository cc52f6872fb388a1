//! `[build]` section configuration.
//!
//! Source and output locations, the stylesheet toolchain, inlining and the
//! responsive-email markup expander.

use super::defaults;
use educe::Educe;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

// ============================================================================
// Enums
// ============================================================================

/// Whether a build targets local preview or delivery.
///
/// Decided once from the `--production` flag and never changed afterwards.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BuildMode {
    /// Source maps, no CSS stripping, no inlining (default).
    #[default]
    Development,
    /// Unused CSS stripped, styles inlined, template tokens rewritten.
    Production,
}

impl BuildMode {
    pub const fn is_production(self) -> bool {
        matches!(self, Self::Production)
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
        }
    }
}

// ============================================================================
// Main BuildConfig
// ============================================================================

/// `[build]` section in inkpot.toml.
///
/// # Example
/// ```toml
/// [build]
/// pages = "src/pages"
/// output = "dist"
/// templates = "templates"
/// template_ext = "tmpl"
///
/// [build.sass]
/// entry = "src/assets/scss/app.scss"
/// include = ["node_modules/foundation-emails/scss"]
/// ```
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(default, deny_unknown_fields)]
pub struct BuildConfig {
    /// Selected with `--production`, not configurable from the file.
    #[serde(skip)]
    pub mode: BuildMode,

    /// Project root directory (usually set via CLI `--root`).
    #[serde(default = "defaults::build::root")]
    #[educe(Default = defaults::build::root())]
    pub root: Option<PathBuf>,

    /// Page sources (`**/*.html`).
    #[serde(default = "defaults::build::pages")]
    #[educe(Default = defaults::build::pages())]
    pub pages: PathBuf,

    /// Subtrees of `pages` that are never compiled.
    #[serde(default = "defaults::build::exclude")]
    #[educe(Default = defaults::build::exclude())]
    pub exclude: Vec<PathBuf>,

    /// Layout templates, each wrapping a page via `{{> body}}`.
    #[serde(default = "defaults::build::layouts")]
    #[educe(Default = defaults::build::layouts())]
    pub layouts: PathBuf,

    /// Partials, registered by file stem.
    #[serde(default = "defaults::build::partials")]
    #[educe(Default = defaults::build::partials())]
    pub partials: PathBuf,

    /// Script helpers (`*.rhai`), registered by file stem.
    #[serde(default = "defaults::build::helpers")]
    #[educe(Default = defaults::build::helpers())]
    pub helpers: PathBuf,

    /// Layout used when a page has no `layout` in its front matter.
    #[serde(default = "defaults::build::default_layout")]
    #[educe(Default = defaults::build::default_layout())]
    pub default_layout: String,

    /// Compiled documents and the stylesheet.
    #[serde(default = "defaults::build::output")]
    #[educe(Default = defaults::build::output())]
    pub output: PathBuf,

    /// Materialized templates, ready for deploy.
    #[serde(default = "defaults::build::templates")]
    #[educe(Default = defaults::build::templates())]
    pub templates: PathBuf,

    /// Extension of materialized templates, without the dot.
    #[serde(default = "defaults::build::template_ext")]
    #[educe(Default = defaults::build::template_ext())]
    pub template_ext: String,

    /// Sass compilation settings.
    #[serde(default)]
    pub sass: SassConfig,

    /// CSS inlining settings.
    #[serde(default)]
    pub inline: InlineConfig,

    /// Inky markup expansion settings.
    #[serde(default)]
    pub inky: InkyConfig,
}

impl BuildConfig {
    /// Absolute path of the compiled stylesheet.
    pub fn stylesheet_path(&self) -> PathBuf {
        self.output.join(&self.sass.output)
    }

    /// Href of the stylesheet as written in compiled documents (`css/app.css`).
    pub fn stylesheet_href(&self) -> String {
        self.sass
            .output
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/")
    }

    /// Whether `path` lies inside an excluded subtree of `pages`.
    pub fn is_excluded(&self, path: &Path) -> bool {
        let Ok(rel) = path.strip_prefix(&self.pages) else {
            return false;
        };
        self.exclude.iter().any(|ex| rel.starts_with(ex))
    }
}

// ============================================================================
// Sub-configurations
// ============================================================================

/// `[build.sass]` section.
///
/// With an empty `command` the builtin compiler is used and no source map is
/// written. A command such as `["sass"]` (dart-sass) gets an embedded source
/// map in development builds.
///
/// # Example
/// ```toml
/// [build.sass]
/// entry = "src/assets/scss/app.scss"
/// include = ["node_modules/foundation-emails/scss"]
/// watch = ["src/assets/scss", "../scss"]
/// command = ["sass"]
/// ```
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(deny_unknown_fields)]
pub struct SassConfig {
    /// Entry stylesheet.
    #[serde(default = "defaults::build::sass::entry")]
    #[educe(Default = defaults::build::sass::entry())]
    pub entry: PathBuf,

    /// Load paths for `@import`.
    #[serde(default = "defaults::build::sass::include")]
    #[educe(Default = defaults::build::sass::include())]
    pub include: Vec<PathBuf>,

    /// Directories whose `.scss`/`.sass` changes trigger a style rebuild.
    #[serde(default = "defaults::build::sass::watch")]
    #[educe(Default = defaults::build::sass::watch())]
    pub watch: Vec<PathBuf>,

    /// Stylesheet location relative to the output directory.
    #[serde(default = "defaults::build::sass::output")]
    #[educe(Default = defaults::build::sass::output())]
    pub output: PathBuf,

    /// External compiler command. Empty selects the builtin compiler.
    #[serde(default = "defaults::build::sass::command")]
    #[educe(Default = defaults::build::sass::command())]
    pub command: Vec<String>,
}

/// `[build.inline]` section.
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(deny_unknown_fields)]
pub struct InlineConfig {
    /// Comment replaced by the media-query `<style>` block.
    #[serde(default = "defaults::build::inline::placeholder")]
    #[educe(Default = defaults::build::inline::placeholder())]
    pub placeholder: String,
}

/// `[build.inky]` section.
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(deny_unknown_fields)]
pub struct InkyConfig {
    /// Expand `<row>`, `<columns>`, `<button>` and friends into tables.
    #[serde(default = "defaults::r#true")]
    #[educe(Default = true)]
    pub enable: bool,

    /// Grid size used for column widths.
    #[serde(default = "defaults::build::inky::column_count")]
    #[educe(Default = defaults::build::inky::column_count())]
    pub column_count: u32,
}

#[cfg(test)]
mod tests {
    use super::super::SiteConfig;
    use super::*;

    #[test]
    fn test_build_config_defaults() {
        let config: SiteConfig = toml::from_str("").unwrap();

        assert_eq!(config.build.mode, BuildMode::Development);
        assert_eq!(config.build.pages, PathBuf::from("src/pages"));
        assert_eq!(config.build.exclude, vec![PathBuf::from("archive")]);
        assert_eq!(config.build.output, PathBuf::from("dist"));
        assert_eq!(config.build.templates, PathBuf::from("templates"));
        assert_eq!(config.build.template_ext, "tmpl");
        assert_eq!(config.build.default_layout, "default");
        assert_eq!(config.build.sass.output, PathBuf::from("css/app.css"));
        assert!(config.build.sass.command.is_empty());
        assert_eq!(config.build.inline.placeholder, "<!-- <style> -->");
        assert!(config.build.inky.enable);
        assert_eq!(config.build.inky.column_count, 12);
    }

    #[test]
    fn test_build_config_custom() {
        let config = r#"
            [build]
            pages = "emails"
            output = "out"
            template_ext = "tpl"

            [build.sass]
            entry = "scss/main.scss"
            include = ["vendor/scss"]
            command = ["sass"]

            [build.inky]
            column_count = 16
        "#;
        let config: SiteConfig = toml::from_str(config).unwrap();

        assert_eq!(config.build.pages, PathBuf::from("emails"));
        assert_eq!(config.build.output, PathBuf::from("out"));
        assert_eq!(config.build.template_ext, "tpl");
        assert_eq!(config.build.sass.entry, PathBuf::from("scss/main.scss"));
        assert_eq!(config.build.sass.include, vec![PathBuf::from("vendor/scss")]);
        assert_eq!(config.build.sass.command, vec!["sass".to_string()]);
        assert_eq!(config.build.inky.column_count, 16);
    }

    #[test]
    fn test_mode_is_not_configurable_from_file() {
        let config = r#"
            [build]
            mode = "production"
        "#;
        let result: Result<SiteConfig, _> = toml::from_str(config);
        assert!(result.is_err());
    }

    #[test]
    fn test_sass_unknown_field_rejection() {
        let config = r#"
            [build.sass]
            sourcemaps = true
        "#;
        let result: Result<SiteConfig, _> = toml::from_str(config);
        assert!(result.is_err());
    }

    #[test]
    fn test_stylesheet_href_and_path() {
        let mut build = BuildConfig::default();
        build.output = PathBuf::from("/proj/dist");
        assert_eq!(build.stylesheet_href(), "css/app.css");
        assert_eq!(build.stylesheet_path(), PathBuf::from("/proj/dist/css/app.css"));
    }

    #[test]
    fn test_is_excluded() {
        let mut build = BuildConfig::default();
        build.pages = PathBuf::from("/proj/src/pages");

        assert!(build.is_excluded(Path::new("/proj/src/pages/archive/old.html")));
        assert!(!build.is_excluded(Path::new("/proj/src/pages/welcome.html")));
        assert!(!build.is_excluded(Path::new("/proj/src/pages/archived.html")));
        assert!(!build.is_excluded(Path::new("/elsewhere/archive/x.html")));
    }

    #[test]
    fn test_build_mode() {
        assert!(BuildMode::Production.is_production());
        assert!(!BuildMode::default().is_production());
        assert_eq!(BuildMode::Development.name(), "development");
    }
}
