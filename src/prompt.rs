//! Compile a template notebook into the ordered list of question prompts.
//!
//! Every block flagged `is_question` becomes one prompt. By default an answer
//! is the question block plus the single block after it. A block flagged
//! `allow_multi_cell` instead stays open until the next question's text is
//! found, or runs to the end of the notebook when nothing follows it.
use crate::notebook::{Notebook, FLAG_MULTI_BLOCK, FLAG_POLL, FLAG_QUESTION};
use serde::Serialize;

/// Where an answer ends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "marker")]
pub enum StopMarker {
    /// Matched block plus exactly one following block.
    NextBlock,
    /// Matched block through the end of the notebook.
    ToEnd,
    /// Up to, not including, the block best matching this text.
    Marker(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Prompt {
    pub heading: String,
    pub start_marker: String,
    pub stop_marker: StopMarker,
    pub is_poll: bool,
}

impl Prompt {
    pub fn new(start_marker: impl Into<String>, stop_marker: StopMarker) -> Self {
        Self {
            heading: String::new(),
            start_marker: start_marker.into(),
            stop_marker,
            is_poll: false,
        }
    }
}

pub fn compile(template: &Notebook) -> Vec<Prompt> {
    let last_idx = template.blocks.len().saturating_sub(1);
    let mut prompts: Vec<Prompt> = Vec::new();
    // Only one multi-block prompt is ever awaiting its closing marker. With two
    // multi-block questions in a row, the first is closed by the second and the
    // second by whatever question comes next.
    let mut open: Option<usize> = None;

    for (idx, block) in template.blocks.iter().enumerate() {
        if !block.flag(FLAG_QUESTION) {
            continue;
        }
        if let Some(open_idx) = open {
            // An empty closing question cannot be located, so run to the end.
            prompts[open_idx].stop_marker = if block.source_text.is_empty() {
                StopMarker::ToEnd
            } else {
                StopMarker::Marker(block.source_text.clone())
            };
        }
        let mut prompt = Prompt::new(block.source_text.clone(), StopMarker::NextBlock);
        prompt.is_poll = block.flag(FLAG_POLL);

        open = if block.flag(FLAG_MULTI_BLOCK) {
            if idx == last_idx {
                prompt.stop_marker = StopMarker::ToEnd;
            }
            Some(prompts.len())
        } else {
            None
        };
        prompts.push(prompt);
    }

    if prompts.is_empty() {
        tracing::warn!("template has no blocks flagged {FLAG_QUESTION}");
    }
    prompts
}
