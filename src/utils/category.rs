//! Classification of changed source files into watch scopes.
//!
//! # Scopes
//!
//! | Scope     | Sources                                 | Rebuild                                   |
//! |-----------|-----------------------------------------|-------------------------------------------|
//! | `Pages`   | `pages/**/*.html` (not excluded)        | pages, inline, materialize                |
//! | `Layouts` | `layouts/**`, `partials/**`, `helpers/**`| refresh, pages, inline, materialize       |
//! | `Styles`  | `*.scss`/`*.sass` under the sass watch dirs | refresh, styles, pages, inline, materialize |
//!
//! A broader scope includes everything a narrower one rebuilds, so a batch
//! of changes only needs its broadest scope.

use crate::config::BuildConfig;
use std::{
    env,
    path::{Path, PathBuf},
};

/// Which part of the sources changed.
///
/// Ordered from narrowest to broadest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum WatchScope {
    Pages,
    Layouts,
    Styles,
}

impl WatchScope {
    pub const ALL: [Self; 3] = [Self::Pages, Self::Layouts, Self::Styles];

    /// Short name for logs.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Pages => "pages",
            Self::Layouts => "layouts",
            Self::Styles => "styles",
        }
    }

    /// Directories to watch for this scope.
    pub fn paths(self, build: &BuildConfig) -> Vec<PathBuf> {
        match self {
            Self::Pages => vec![build.pages.clone()],
            Self::Layouts => vec![
                build.layouts.clone(),
                build.partials.clone(),
                build.helpers.clone(),
            ],
            Self::Styles => build.sass.watch.clone(),
        }
    }
}

const STYLE_EXTENSIONS: &[&str] = &["scss", "sass"];

/// Scope of a changed path, `None` when no pipeline cares about it.
pub fn classify(path: &Path, build: &BuildConfig) -> Option<WatchScope> {
    let path = normalize_path(path);
    let has_ext = |exts: &[&str]| {
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| exts.contains(&e))
    };

    if [&build.layouts, &build.partials, &build.helpers]
        .iter()
        .any(|dir| path.starts_with(dir))
    {
        Some(WatchScope::Layouts)
    } else if build.sass.watch.iter().any(|dir| path.starts_with(dir)) && has_ext(STYLE_EXTENSIONS)
    {
        Some(WatchScope::Styles)
    } else if path.starts_with(&build.pages) && has_ext(&["html"]) && !build.is_excluded(&path) {
        Some(WatchScope::Pages)
    } else {
        None
    }
}

/// Broadest scope among `paths`.
pub fn broadest_scope<'a>(
    paths: impl IntoIterator<Item = &'a PathBuf>,
    build: &BuildConfig,
) -> Option<WatchScope> {
    paths.into_iter().filter_map(|p| classify(p, build)).max()
}

/// Make a path absolute so it compares against the resolved config paths.
///
/// Deleted files can no longer be canonicalized; their parent still can.
pub fn normalize_path(path: &Path) -> PathBuf {
    if let Ok(path) = path.canonicalize() {
        return path;
    }
    if let (Some(parent), Some(name)) = (path.parent(), path.file_name())
        && let Ok(parent) = parent.canonicalize()
    {
        return parent.join(name);
    }
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        env::current_dir().map_or_else(|_| path.to_path_buf(), |cwd| cwd.join(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn make_build(root: &Path) -> BuildConfig {
        let root = root.canonicalize().unwrap();
        let mut build = BuildConfig::default();
        build.pages = root.join("src/pages");
        build.layouts = root.join("src/layouts");
        build.partials = root.join("src/partials");
        build.helpers = root.join("src/helpers");
        build.sass.watch = vec![root.join("src/assets/scss")];
        for dir in [&build.pages, &build.layouts, &build.partials, &build.helpers] {
            fs::create_dir_all(dir).unwrap();
        }
        fs::create_dir_all(&build.sass.watch[0]).unwrap();
        build
    }

    #[test]
    fn test_classify_scopes() {
        let dir = TempDir::new().unwrap();
        let build = make_build(dir.path());

        let page = build.pages.join("welcome.html");
        let layout = build.layouts.join("default.html");
        let partial = build.partials.join("footer.html");
        let helper = build.helpers.join("shout.rhai");
        let style = build.sass.watch[0].join("_settings.scss");
        for path in [&page, &layout, &partial, &helper, &style] {
            fs::write(path, "").unwrap();
        }

        assert_eq!(classify(&page, &build), Some(WatchScope::Pages));
        assert_eq!(classify(&layout, &build), Some(WatchScope::Layouts));
        assert_eq!(classify(&partial, &build), Some(WatchScope::Layouts));
        assert_eq!(classify(&helper, &build), Some(WatchScope::Layouts));
        assert_eq!(classify(&style, &build), Some(WatchScope::Styles));
    }

    #[test]
    fn test_classify_ignores_unrelated() {
        let dir = TempDir::new().unwrap();
        let build = make_build(dir.path());

        let archived = build.pages.join("archive/old.html");
        let notes = build.pages.join("notes.txt");
        let css = build.sass.watch[0].join("plain.css");
        let outside = dir.path().join("README.md");

        assert_eq!(classify(&archived, &build), None);
        assert_eq!(classify(&notes, &build), None);
        assert_eq!(classify(&css, &build), None);
        assert_eq!(classify(&outside, &build), None);
    }

    #[test]
    fn test_classify_deleted_file() {
        let dir = TempDir::new().unwrap();
        let build = make_build(dir.path());
        // Never created: classification must still work for removals
        let gone = build.pages.join("gone.html");
        assert_eq!(classify(&gone, &build), Some(WatchScope::Pages));
    }

    #[test]
    fn test_broadest_scope() {
        let dir = TempDir::new().unwrap();
        let build = make_build(dir.path());
        let changes = vec![
            build.pages.join("a.html"),
            build.sass.watch[0].join("app.scss"),
            build.layouts.join("default.html"),
        ];
        assert_eq!(broadest_scope(&changes, &build), Some(WatchScope::Styles));
        assert_eq!(broadest_scope(&changes[..1], &build), Some(WatchScope::Pages));
        assert_eq!(broadest_scope(&[], &build), None);
    }

    #[test]
    fn test_scope_order() {
        assert!(WatchScope::Pages < WatchScope::Layouts);
        assert!(WatchScope::Layouts < WatchScope::Styles);
        assert_eq!(WatchScope::ALL.len(), 3);
    }
}
