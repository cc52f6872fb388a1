//! Build stages.
//!
//! - **reset**: Clear compiled output and materialized templates
//! - **templates**: Layout/partial/helper registry with explicit invalidation
//! - **helpers**: Built-in block helpers available to every page
//! - **pages**: Render pages through their layout, then expand Inky markup
//! - **styles**: Compile Sass, strip unused selectors in production
//! - **inline**: Inline CSS and rewrite template tokens in production
//! - **materialize**: Copy compiled documents to `.tmpl` files
//!
//! # Build Flow
//!
//! ```text
//! reset ──► pages ──► styles ──► inline ──► materialize
//!             │          │          │            │
//!             ▼          ▼          ▼            ▼
//!        dist/*.html  dist/css  dist/*.html  templates/*.tmpl
//! ```

pub mod helpers;
pub mod inline;
pub mod materialize;
pub mod pages;
pub mod reset;
pub mod styles;
pub mod templates;

use std::path::{Path, PathBuf};
use walkdir::WalkDir;

// ============================================================================
// Shared utilities
// ============================================================================

/// Files to ignore during directory traversal
const IGNORED_FILES: &[&str] = &[".DS_Store"];

/// Collect all files from a directory recursively, sorted for stable output.
pub fn collect_all_files(dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<_> = WalkDir::new(dir)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .filter(|e| {
            let name = e.file_name().to_str().unwrap_or_default();
            !IGNORED_FILES.contains(&name)
        })
        .map(walkdir::DirEntry::into_path)
        .collect();
    files.sort();
    files
}

/// Collect files under `dir` whose extension is `ext`.
pub fn collect_files_with_ext(dir: &Path, ext: &str) -> Vec<PathBuf> {
    collect_all_files(dir)
        .into_iter()
        .filter(|p| p.extension().is_some_and(|e| e == ext))
        .collect()
}

/// Compiled documents currently under the output directory.
pub fn collect_documents(output: &Path) -> Vec<PathBuf> {
    collect_files_with_ext(output, "html")
}
