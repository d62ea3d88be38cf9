//! Strip a submission down to what the respondent actually wrote.
//!
//! Any cell whose text and outputs are identical to a non-question template
//! cell is unchanged boilerplate and is dropped. Question cells are always
//! kept so each answer stays next to its prompt.
use crate::notebook::{Notebook, FLAG_QUESTION};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

pub fn strip_untouched(template: &Notebook, submission: &Notebook) -> Notebook {
    let boilerplate: HashSet<(&str, &str)> = template
        .blocks
        .iter()
        .filter(|block| !block.flag(FLAG_QUESTION))
        .map(|block| block.content_key())
        .collect();
    let kept = submission
        .blocks
        .iter()
        .filter(|block| !boilerplate.contains(&block.content_key()))
        .cloned()
        .collect();
    submission.with_blocks(kept)
}

/// `<out_dir>/<stem>_<id>.ipynb`.
pub fn diff_path(out_dir: &Path, stem: &str, id: &str) -> PathBuf {
    out_dir.join(format!("{stem}_{id}.ipynb"))
}
