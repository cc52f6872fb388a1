//! Stylesheet compilation.
//!
//! The entry stylesheet is compiled with the builtin Sass compiler, or with
//! `[build.sass.command]` when one is configured. Production builds then
//! drop every selector that matches nothing in the compiled documents.

use super::collect_documents;
use crate::{
    config::{BuildConfig, BuildMode},
    log,
    utils::{
        css::{UsedTokens, strip_unused},
        exec::{FilterRule, exec},
    },
};
use anyhow::{Context, Result, anyhow, bail};
use std::{ffi::OsString, fs, path::Path};

/// Dart Sass deprecation chatter.
const SASS_FILTER: FilterRule =
    FilterRule::new(&["Deprecation Warning", "More info and automated migrator"]);

/// Compile the stylesheet into the output directory.
///
/// # Errors
/// Fails on Sass errors, and in production when there are no compiled
/// documents to check selectors against.
pub fn compile_styles(build: &BuildConfig, root: &Path) -> Result<()> {
    let output = build.stylesheet_path();
    if let Some(parent) = output.parent() {
        fs::create_dir_all(parent)?;
    }

    if build.sass.command.is_empty() {
        let css = compile_builtin(build)?;
        fs::write(&output, css).with_context(|| format!("Failed to write {}", output.display()))?;
    } else {
        compile_external(build, root, &output)?;
    }

    if build.mode.is_production() {
        let removed = strip_stylesheet(build, &output)?;
        log!("styles"; "stripped {removed} bytes of unused CSS");
    }
    Ok(())
}

fn compile_builtin(build: &BuildConfig) -> Result<String> {
    let options = grass::Options::default()
        .load_paths(&build.sass.include)
        .style(grass::OutputStyle::Expanded);
    grass::from_path(&build.sass.entry, &options).map_err(|e| anyhow!("{e}"))
}

fn compile_external(build: &BuildConfig, root: &Path, output: &Path) -> Result<()> {
    let mut args: Vec<OsString> = build
        .sass
        .include
        .iter()
        .map(|dir| {
            let mut arg = OsString::from("--load-path=");
            arg.push(dir);
            arg
        })
        .collect();
    args.push("--style=expanded".into());
    args.push(source_map_flag(build.mode).into());
    args.push(build.sass.entry.clone().into());
    args.push(output.to_path_buf().into());

    exec(Some(root), &build.sass.command, &args, &SASS_FILTER)?;
    Ok(())
}

/// Source maps help while previewing and leak sources when shipped.
const fn source_map_flag(mode: BuildMode) -> &'static str {
    match mode {
        BuildMode::Development => "--embed-source-map",
        BuildMode::Production => "--no-source-map",
    }
}

/// Rewrite the stylesheet without unused selectors, returning the bytes saved.
fn strip_stylesheet(build: &BuildConfig, stylesheet: &Path) -> Result<usize> {
    let documents = collect_documents(&build.output);
    if documents.is_empty() {
        bail!(
            "no compiled documents in {}, pages must be compiled before styles in production",
            build.output.display()
        );
    }

    let sources = documents
        .iter()
        .map(|path| {
            fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
        })
        .collect::<Result<Vec<_>>>()?;
    let used = UsedTokens::from_documents(sources.iter().map(String::as_str));

    let css = fs::read_to_string(stylesheet)?;
    let stripped = strip_unused(&css, &used)?;
    fs::write(stylesheet, &stripped)?;
    Ok(css.len().saturating_sub(stripped.len()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn scaffold(root: &Path, scss: &str) -> BuildConfig {
        let mut build = BuildConfig::default();
        build.output = root.join("dist");
        build.sass.entry = root.join("scss/app.scss");
        build.sass.include = vec![root.join("vendor")];
        fs::create_dir_all(root.join("scss")).unwrap();
        fs::create_dir_all(root.join("vendor")).unwrap();
        fs::write(&build.sass.entry, scss).unwrap();
        build
    }

    #[test]
    fn test_compile_builtin_with_include_path() {
        let dir = TempDir::new().unwrap();
        let build = scaffold(
            dir.path(),
            "@import 'settings';\n.header { text-align: $align; }\n",
        );
        fs::write(dir.path().join("vendor/_settings.scss"), "$align: center;\n").unwrap();

        compile_styles(&build, dir.path()).unwrap();

        let css = fs::read_to_string(build.stylesheet_path()).unwrap();
        assert!(css.contains(".header"));
        assert!(css.contains("text-align: center"));
    }

    #[test]
    fn test_compile_error_is_reported() {
        let dir = TempDir::new().unwrap();
        let build = scaffold(dir.path(), ".header { text-align: $undefined; }\n");
        assert!(compile_styles(&build, dir.path()).is_err());
    }

    #[test]
    fn test_production_strips_unused() {
        let dir = TempDir::new().unwrap();
        let mut build = scaffold(
            dir.path(),
            ".header { text-align: center; }\n.callout { text-align: left; }\n",
        );
        build.mode = BuildMode::Production;
        fs::create_dir_all(&build.output).unwrap();
        fs::write(build.output.join("welcome.html"), "<p class=\"header\">Hi</p>").unwrap();

        compile_styles(&build, dir.path()).unwrap();

        let css = fs::read_to_string(build.stylesheet_path()).unwrap();
        assert!(css.contains(".header"));
        assert!(!css.contains(".callout"));
    }

    #[test]
    fn test_production_requires_documents() {
        let dir = TempDir::new().unwrap();
        let mut build = scaffold(dir.path(), ".header { text-align: center; }\n");
        build.mode = BuildMode::Production;

        let err = compile_styles(&build, dir.path()).unwrap_err();
        assert!(format!("{err}").contains("no compiled documents"));
    }

    #[test]
    fn test_development_keeps_everything() {
        let dir = TempDir::new().unwrap();
        let build = scaffold(dir.path(), ".unused { text-align: left; }\n");

        compile_styles(&build, dir.path()).unwrap();

        let css = fs::read_to_string(build.stylesheet_path()).unwrap();
        assert!(css.contains(".unused"));
    }

    #[test]
    fn test_source_map_flag() {
        assert_eq!(source_map_flag(BuildMode::Development), "--embed-source-map");
        assert_eq!(source_map_flag(BuildMode::Production), "--no-source-map");
    }

    #[cfg(unix)]
    #[test]
    fn test_external_command_receives_arguments() {
        let dir = TempDir::new().unwrap();
        let mut build = scaffold(dir.path(), "");
        // Stand-in compiler: record the arguments, write the last one
        let script = dir.path().join("fake-sass.sh");
        fs::write(
            &script,
            "#!/bin/sh\necho \"$@\" > args.txt\nfor last; do :; done\necho 'a { text-align: center; }' > \"$last\"\n",
        )
        .unwrap();
        build.sass.command = vec!["sh".into(), script.to_string_lossy().into_owned()];

        compile_styles(&build, dir.path()).unwrap();

        let args = fs::read_to_string(dir.path().join("args.txt")).unwrap();
        assert!(args.contains("--load-path="));
        assert!(args.contains("--style=expanded"));
        assert!(args.contains("--embed-source-map"));
        assert!(build.stylesheet_path().is_file());
    }
}
