//! Build pipelines as validated stage lists.
//!
//! Each stage declares the artifacts it needs and the ones it produces.
//! Before anything runs, [`Pipeline::validate`] walks the stages in order
//! and checks that every requirement is produced by an earlier stage or is
//! already on disk. A pipeline that cannot succeed is rejected up front
//! instead of failing halfway.
//!
//! ```text
//! compile:  reset → pages → styles → inline → materialize
//! pages:            pages → inline → materialize
//! layouts:  refresh → pages → inline → materialize
//! styles:   refresh → styles → pages → inline → materialize
//! ```

use crate::{
    compiler::collect_documents,
    config::{BuildConfig, BuildMode},
    utils::category::WatchScope,
};
use std::fmt;
use thiserror::Error;

/// Something a stage writes and a later stage reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Artifact {
    /// Compiled `.html` documents in the output directory.
    Documents,
    /// The compiled stylesheet.
    Stylesheet,
    /// Materialized templates.
    Templates,
}

impl Artifact {
    const ALL: [Self; 3] = [Self::Documents, Self::Stylesheet, Self::Templates];

    pub const fn name(self) -> &'static str {
        match self {
            Self::Documents => "compiled documents",
            Self::Stylesheet => "stylesheet",
            Self::Templates => "materialized templates",
        }
    }

    /// Whether the artifact is already present from an earlier build.
    pub fn exists(self, build: &BuildConfig) -> bool {
        match self {
            Self::Documents => !collect_documents(&build.output).is_empty(),
            Self::Stylesheet => build.stylesheet_path().is_file(),
            Self::Templates => build.templates.is_dir(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Remove output and templates.
    Reset,
    /// Drop cached layouts and partials.
    RefreshTemplates,
    /// Render pages.
    Pages,
    /// Compile the stylesheet.
    Styles,
    /// Inline styles, rewrite template tokens.
    Inline,
    /// Copy documents to templates.
    Materialize,
}

impl Stage {
    pub const fn name(self) -> &'static str {
        match self {
            Self::Reset => "reset",
            Self::RefreshTemplates => "refresh",
            Self::Pages => "pages",
            Self::Styles => "styles",
            Self::Inline => "inline",
            Self::Materialize => "materialize",
        }
    }

    /// Artifacts that must exist before the stage runs.
    ///
    /// Styles only reads documents in production, where unused selectors are
    /// stripped; the inliner only reads the stylesheet in production.
    pub fn requires(self, mode: BuildMode) -> &'static [Artifact] {
        match (self, mode) {
            (Self::Styles, BuildMode::Production) => &[Artifact::Documents],
            (Self::Inline, BuildMode::Production) => &[Artifact::Documents, Artifact::Stylesheet],
            (Self::Inline, BuildMode::Development) | (Self::Materialize, _) => {
                &[Artifact::Documents]
            }
            _ => &[],
        }
    }

    pub const fn produces(self) -> &'static [Artifact] {
        match self {
            Self::Pages => &[Artifact::Documents],
            Self::Styles => &[Artifact::Stylesheet],
            Self::Materialize => &[Artifact::Templates],
            _ => &[],
        }
    }

    /// Artifacts the stage deletes.
    pub const fn removes(self) -> &'static [Artifact] {
        match self {
            Self::Reset => &Artifact::ALL,
            _ => &[],
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PipelineError {
    #[error("pipeline `{0}` has no stages")]
    Empty(&'static str),

    #[error("stage `{stage}` needs {} but no earlier stage produces it and none exist on disk", .artifact.name())]
    MissingArtifact { stage: Stage, artifact: Artifact },

    #[error("stage `{stage}` appears more than once")]
    Duplicate { stage: Stage },
}

/// A named, ordered list of stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pipeline {
    pub name: &'static str,
    pub stages: &'static [Stage],
}

impl Pipeline {
    /// Full one-shot build.
    pub const COMPILE: Self = Self {
        name: "compile",
        stages: &[
            Stage::Reset,
            Stage::Pages,
            Stage::Styles,
            Stage::Inline,
            Stage::Materialize,
        ],
    };

    /// Rebuild for a change in one watch scope.
    pub const fn for_scope(scope: WatchScope) -> Self {
        match scope {
            WatchScope::Pages => Self {
                name: "pages",
                stages: &[Stage::Pages, Stage::Inline, Stage::Materialize],
            },
            WatchScope::Layouts => Self {
                name: "layouts",
                stages: &[
                    Stage::RefreshTemplates,
                    Stage::Pages,
                    Stage::Inline,
                    Stage::Materialize,
                ],
            },
            WatchScope::Styles => Self {
                name: "styles",
                stages: &[
                    Stage::RefreshTemplates,
                    Stage::Styles,
                    Stage::Pages,
                    Stage::Inline,
                    Stage::Materialize,
                ],
            },
        }
    }

    /// Check that every stage's requirements are met, in order.
    ///
    /// `on_disk` reports artifacts left by previous builds; anything a
    /// `Reset` stage runs before no longer counts.
    pub fn validate(
        &self,
        mode: BuildMode,
        on_disk: impl Fn(Artifact) -> bool,
    ) -> Result<(), PipelineError> {
        if self.stages.is_empty() {
            return Err(PipelineError::Empty(self.name));
        }

        let mut available: Vec<Artifact> =
            Artifact::ALL.into_iter().filter(|a| on_disk(*a)).collect();

        for (i, stage) in self.stages.iter().enumerate() {
            if self.stages[..i].contains(stage) {
                return Err(PipelineError::Duplicate { stage: *stage });
            }
            if let Some(missing) = stage
                .requires(mode)
                .iter()
                .find(|a| !available.contains(a))
            {
                return Err(PipelineError::MissingArtifact {
                    stage: *stage,
                    artifact: *missing,
                });
            }
            available.retain(|a| !stage.removes().contains(a));
            available.extend(stage.produces().iter().copied());
        }
        Ok(())
    }

    /// Validate against the artifacts currently on disk.
    pub fn validate_for(&self, build: &BuildConfig) -> Result<(), PipelineError> {
        self.validate(build.mode, |artifact| artifact.exists(build))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const NOTHING: fn(Artifact) -> bool = |_| false;
    const EVERYTHING: fn(Artifact) -> bool = |_| true;

    #[test]
    fn test_compile_is_valid_from_scratch() {
        for mode in [BuildMode::Development, BuildMode::Production] {
            assert_eq!(Pipeline::COMPILE.validate(mode, NOTHING), Ok(()));
        }
    }

    #[test]
    fn test_production_styles_before_pages_needs_documents() {
        let pipeline = Pipeline {
            name: "bad",
            stages: &[Stage::Reset, Stage::Styles, Stage::Pages],
        };
        assert_eq!(
            pipeline.validate(BuildMode::Production, EVERYTHING),
            Err(PipelineError::MissingArtifact {
                stage: Stage::Styles,
                artifact: Artifact::Documents,
            })
        );
        assert_eq!(pipeline.validate(BuildMode::Development, NOTHING), Ok(()));
    }

    #[test]
    fn test_reset_discards_disk_state() {
        let pipeline = Pipeline {
            name: "bad",
            stages: &[Stage::Reset, Stage::Materialize],
        };
        assert!(pipeline.validate(BuildMode::Development, EVERYTHING).is_err());
    }

    #[test]
    fn test_watch_pipelines_need_previous_build() {
        for scope in WatchScope::ALL {
            let pipeline = Pipeline::for_scope(scope);
            assert_eq!(pipeline.validate(BuildMode::Development, NOTHING), Ok(()));
            assert_eq!(pipeline.validate(BuildMode::Production, EVERYTHING), Ok(()));
        }

        // Production inline needs a stylesheet the pages scope never builds
        assert_eq!(
            Pipeline::for_scope(WatchScope::Pages).validate(BuildMode::Production, NOTHING),
            Err(PipelineError::MissingArtifact {
                stage: Stage::Inline,
                artifact: Artifact::Stylesheet,
            })
        );

        // Production styles strip against the documents of the last build
        let only_stylesheet = |a: Artifact| a == Artifact::Stylesheet;
        assert!(
            Pipeline::for_scope(WatchScope::Styles)
                .validate(BuildMode::Production, only_stylesheet)
                .is_err()
        );
    }

    #[test]
    fn test_empty_and_duplicate_pipelines() {
        let empty = Pipeline { name: "empty", stages: &[] };
        assert_eq!(
            empty.validate(BuildMode::Development, NOTHING),
            Err(PipelineError::Empty("empty"))
        );

        let twice = Pipeline {
            name: "twice",
            stages: &[Stage::Pages, Stage::Pages],
        };
        assert_eq!(
            twice.validate(BuildMode::Development, NOTHING),
            Err(PipelineError::Duplicate { stage: Stage::Pages })
        );
    }

    #[test]
    fn test_artifact_exists_on_disk() {
        let dir = TempDir::new().unwrap();
        let mut build = BuildConfig::default();
        build.output = dir.path().join("dist");
        build.templates = dir.path().join("templates");

        for artifact in Artifact::ALL {
            assert!(!artifact.exists(&build));
        }

        fs::create_dir_all(build.output.join("css")).unwrap();
        fs::write(build.output.join("a.html"), "").unwrap();
        fs::write(build.stylesheet_path(), "").unwrap();
        fs::create_dir_all(&build.templates).unwrap();

        for artifact in Artifact::ALL {
            assert!(artifact.exists(&build));
        }
        assert_eq!(Pipeline::COMPILE.validate_for(&build), Ok(()));
    }

    #[test]
    fn test_error_message() {
        let err = PipelineError::MissingArtifact {
            stage: Stage::Inline,
            artifact: Artifact::Stylesheet,
        };
        assert_eq!(
            err.to_string(),
            "stage `inline` needs stylesheet but no earlier stage produces it and none exist on disk"
        );
    }
}
