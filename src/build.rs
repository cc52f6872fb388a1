//! Pipeline execution.
//!
//! # Architecture
//!
//! ```text
//! compile_all()
//!     │
//!     └── run_pipeline(COMPILE)
//!             │
//!             ├── validate stage requirements
//!             │
//!             └── for each stage ──► run_stage()
//!                     reset | refresh | pages | styles | inline | materialize
//! ```
//!
//! Stages are strictly sequential: a stage starts only after the previous
//! one succeeded. The first failing stage aborts the pipeline.

use crate::{
    compiler::{
        inline::inline_documents, materialize::materialize_templates, pages::compile_pages,
        reset::reset_workspace, styles::compile_styles, templates::TemplateCache,
    },
    config::SiteConfig,
    log,
    pipeline::{Pipeline, Stage},
};
use anyhow::{Context, Result};
use std::time::Instant;

/// Everything a pipeline run needs: the configuration and the template
/// cache that survives between runs.
pub struct BuildContext {
    pub config: &'static SiteConfig,
    pub templates: TemplateCache,
}

impl BuildContext {
    pub fn new(config: &'static SiteConfig) -> Self {
        Self {
            config,
            templates: TemplateCache::new(),
        }
    }
}

/// Validate and run a pipeline.
pub fn run_pipeline(ctx: &BuildContext, pipeline: Pipeline) -> Result<()> {
    pipeline
        .validate_for(&ctx.config.build)
        .with_context(|| format!("Invalid `{}` pipeline", pipeline.name))?;

    let started = Instant::now();
    for stage in pipeline.stages {
        run_stage(ctx, *stage).with_context(|| format!("Stage `{stage}` failed"))?;
    }

    log!(
        "build";
        "{} done in {} mode ({} ms)",
        pipeline.name,
        ctx.config.mode().name(),
        started.elapsed().as_millis()
    );
    Ok(())
}

fn run_stage(ctx: &BuildContext, stage: Stage) -> Result<()> {
    let build = &ctx.config.build;
    match stage {
        Stage::Reset => reset_workspace(build),
        Stage::RefreshTemplates => ctx.templates.refresh(),
        Stage::Pages => {
            let count = compile_pages(build, &ctx.templates)?;
            log!("pages"; "compiled {count} pages");
        }
        Stage::Styles => {
            compile_styles(build, ctx.config.get_root())?;
            log!("styles"; "compiled {}", build.stylesheet_href());
        }
        Stage::Inline => {
            inline_documents(build)?;
        }
        Stage::Materialize => {
            materialize_templates(build)?;
        }
    }
    Ok(())
}

/// Reset the workspace and run the full build once.
pub fn compile_all(ctx: &BuildContext) -> Result<()> {
    run_pipeline(ctx, Pipeline::COMPILE)
}
