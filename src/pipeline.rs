//! Staged processing over one extracted container.
//!
//! A [`Pipeline`] is an ordered list of named stages sharing a single
//! [`Container`]. Stages run strictly in order and the first failure
//! stops the run, wrapped with the stage name so callers can tell which
//! step broke. [`process_epub`] composes the whole unpack, polish,
//! repack job on top of it.

use std::fs;
use std::path::Path;

use tracing::info;

use crate::archive::{extract_archive, pack_archive};
use crate::container::Container;
use crate::error::{Error, Result};
use crate::manifest::ManifestIndex;
use crate::polish::{
    CoverLink, add_cover_to_nav, add_cover_to_ncx, fix_xhtml_dir, set_cover_linear,
    update_summary_page,
};
use crate::toc::TocFiles;

/// Spine id conventionally given to the cover page.
const COVER_IDREF: &str = "cover";

/// Knobs for the polish stages.
#[derive(Debug, Clone, Default)]
pub struct PolishOptions {
    /// Target and label for injected cover links.
    pub cover: CoverLink,
    /// Href of a summary page to refresh, relative to the content
    /// directory. `None` skips the summary stage.
    pub summary: Option<String>,
    /// Keep the working directory after a successful run.
    pub keep_work_dir: bool,
}

type StageFn<'a> = Box<dyn FnMut(&Container) -> Result<()> + 'a>;

struct Stage<'a> {
    name: &'static str,
    run: StageFn<'a>,
}

/// Ordered list of named stages over one container.
pub struct Pipeline<'a> {
    stages: Vec<Stage<'a>>,
}

impl<'a> Pipeline<'a> {
    pub fn new() -> Self {
        Self { stages: Vec::new() }
    }

    /// Append a named stage.
    pub fn stage(mut self, name: &'static str, run: impl FnMut(&Container) -> Result<()> + 'a) -> Self {
        self.stages.push(Stage {
            name,
            run: Box::new(run),
        });
        self
    }

    /// Run all stages in order, stopping at the first failure.
    pub fn run(mut self, container: &Container) -> Result<()> {
        for stage in &mut self.stages {
            info!(stage = stage.name, "running stage");
            (stage.run)(container).map_err(|source| Error::Stage {
                stage: stage.name,
                source: Box::new(source),
            })?;
        }
        Ok(())
    }
}

impl Default for Pipeline<'_> {
    fn default() -> Self {
        Self::new()
    }
}

/// Apply the polish stages to an opened container.
pub fn polish_container(container: &Container, options: &PolishOptions) -> Result<()> {
    let cover = &options.cover;

    let mut pipeline = Pipeline::new()
        .stage("fix-xhtml", |c: &Container| {
            fix_xhtml_dir(&c.content_path())?;
            Ok(())
        })
        .stage("cover-linear", |c: &Container| {
            set_cover_linear(c.package_path(), COVER_IDREF)?;
            Ok(())
        })
        .stage("toc-cover", move |c: &Container| {
            let manifest = ManifestIndex::parse(&c.package_doc()?);
            let toc = TocFiles::discover(c, &manifest);
            if let Some(nav) = &toc.epub3_nav {
                add_cover_to_nav(nav, cover)?;
            }
            if let Some(ncx) = &toc.epub2_ncx {
                add_cover_to_ncx(ncx, cover)?;
            }
            Ok(())
        });

    if let Some(summary) = &options.summary {
        let path = container.content_path().join(summary);
        pipeline = pipeline.stage("summary", move |_: &Container| {
            update_summary_page(&path, cover)?;
            Ok(())
        });
    }

    pipeline.run(container)
}

/// Run the full unpack, polish, repack job.
///
/// The working directory is removed after a successful pack unless the
/// options keep it; on failure it is left behind for inspection.
pub fn process_epub(
    input: &Path,
    output: &Path,
    work_dir: &Path,
    options: &PolishOptions,
) -> Result<()> {
    info!(input = %input.display(), output = %output.display(), "processing book");

    extract_archive(input, work_dir)?;
    let container = Container::open(work_dir)?;
    polish_container(&container, options)?;
    pack_archive(work_dir, output)?;

    if options.keep_work_dir {
        info!(dir = %work_dir.display(), "working directory kept");
    } else {
        fs::remove_dir_all(work_dir).map_err(|e| Error::io(work_dir, e))?;
    }

    Ok(())
}
