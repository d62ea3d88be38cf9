//! Writing merged notebooks and run reports.
//!
//! Every file is written to a temp file beside its destination and renamed
//! into place, so an interrupted run never leaves half a notebook behind.
use crate::aggregate::{EventKind, Extraction, ExtractionEvent};
use crate::notebook::Notebook;
use anyhow::{anyhow, Context, Result};
use serde::Serialize;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

pub const RESPONSES_SUFFIX: &str = "_responses";
pub const ATTRIBUTED_SUFFIX: &str = "_responses_with_names";

/// `<out_dir>/<stem><suffix>.ipynb`.
pub fn responses_path(out_dir: &Path, stem: &str, attribution: bool) -> PathBuf {
    let suffix = if attribution {
        ATTRIBUTED_SUFFIX
    } else {
        RESPONSES_SUFFIX
    };
    out_dir.join(format!("{stem}{suffix}.ipynb"))
}

pub fn write_notebook(path: &Path, notebook: &Notebook) -> Result<()> {
    let bytes = serde_json::to_vec_pretty(&notebook.to_value()).context("serialize notebook")?;
    write_atomic(path, &bytes)
}

pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let bytes = serde_json::to_vec_pretty(value).context("serialize JSON")?;
    write_atomic(path, &bytes)
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
    let mut tmp = tempfile::NamedTempFile::new_in(parent)
        .with_context(|| format!("create temp file in {}", parent.display()))?;
    tmp.write_all(bytes).with_context(|| format!("write {}", path.display()))?;
    tmp.persist(path).map_err(|err| anyhow!("publish {}: {}", path.display(), err.error))?;
    Ok(())
}

/// Machine-readable summary of one extraction run.
#[derive(Debug, Serialize)]
pub struct ExtractionReport<'a> {
    pub template: String,
    pub output: String,
    pub attribution: bool,
    pub match_threshold: usize,
    pub prompt_count: usize,
    pub submission_count: usize,
    pub kept: usize,
    pub missed: usize,
    pub blank: usize,
    pub duplicate: usize,
    pub absent: usize,
    pub events: &'a [ExtractionEvent],
}

impl<'a> ExtractionReport<'a> {
    pub fn new(
        template: &Path,
        output: &Path,
        extraction: &'a Extraction,
        attribution: bool,
        match_threshold: usize,
        prompt_count: usize,
        submission_count: usize,
    ) -> Self {
        Self {
            template: template.display().to_string(),
            output: output.display().to_string(),
            attribution,
            match_threshold,
            prompt_count,
            submission_count,
            kept: extraction.kept,
            missed: extraction.count(EventKind::Missed),
            blank: extraction.count(EventKind::Blank),
            duplicate: extraction.count(EventKind::Duplicate),
            absent: extraction.count(EventKind::Absent),
            events: &extraction.events,
        }
    }
}
