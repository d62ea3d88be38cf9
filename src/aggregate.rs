//! Merge every submission's answers into one block sequence.
//!
//! Prompts are visited in template order and, within a prompt, submissions in
//! arrival order (or by id when answers are attributed). The first accepted
//! answer for a prompt carries the question block; later ones contribute only
//! their answer blocks.
use crate::distance::DistanceOracle;
use crate::matcher::{find_answer, MatchOptions};
use crate::notebook::Block;
use crate::prompt::Prompt;
use crate::source::FetchedSubmission;
use serde::Serialize;
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// Notebook could not be fetched or parsed.
    Absent,
    /// Question (or the question closing it) not found within threshold.
    Missed,
    /// Answer left unfilled.
    Blank,
    /// Answer identical to one already kept.
    Duplicate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExtractionEvent {
    pub kind: EventKind,
    pub submission: String,
    /// Prompt index; absent notebooks are reported once for all prompts.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct AggregateOptions<'a> {
    pub matching: MatchOptions<'a>,
    /// Label every answer with its submission id and keep duplicates.
    pub attribution: bool,
    pub label_prefix: &'a str,
}

#[derive(Debug, Default)]
pub struct Extraction {
    pub blocks: Vec<Block>,
    pub events: Vec<ExtractionEvent>,
    pub kept: usize,
}

impl Extraction {
    pub fn count(&self, kind: EventKind) -> usize {
        self.events.iter().filter(|event| event.kind == kind).count()
    }

    fn record(&mut self, kind: EventKind, submission: &str, prompt: Option<usize>) {
        self.events.push(ExtractionEvent {
            kind,
            submission: submission.to_string(),
            prompt,
        });
    }
}

pub fn extract(
    oracle: &dyn DistanceOracle,
    prompts: &[Prompt],
    submissions: &[FetchedSubmission],
    options: &AggregateOptions<'_>,
) -> Extraction {
    let mut extraction = Extraction::default();
    let mut order: Vec<&FetchedSubmission> = submissions.iter().collect();
    if options.attribution {
        order.sort_by(|a, b| a.submission.id.cmp(&b.submission.id));
    }

    for fetched in &order {
        if fetched.notebook.is_none() {
            tracing::warn!(submission = %fetched.submission.id, "skipping absent notebook");
            extraction.record(EventKind::Absent, &fetched.submission.id, None);
        }
    }

    for (prompt_idx, prompt) in prompts.iter().enumerate() {
        let mut suppress = false;
        let mut seen: HashSet<String> = HashSet::new();

        for fetched in &order {
            let Some(notebook) = &fetched.notebook else {
                continue;
            };
            let id = fetched.submission.id.as_str();
            let Some(found) = find_answer(
                oracle,
                prompt,
                &notebook.blocks,
                &options.matching,
                suppress,
            ) else {
                tracing::info!(prompt = prompt_idx, submission = id, "missed");
                extraction.record(EventKind::Missed, id, Some(prompt_idx));
                continue;
            };
            tracing::debug!(
                prompt = prompt_idx,
                submission = id,
                index = found.index,
                distance = found.distance,
                "matched"
            );
            if found.last_block().is_some_and(|block| block.source_text.is_empty()) {
                tracing::info!(prompt = prompt_idx, submission = id, "blank");
                extraction.record(EventKind::Blank, id, Some(prompt_idx));
                continue;
            }

            let answer = found.answer_string();
            if options.attribution {
                extraction.blocks.push(Block::heading(options.label_prefix, id));
            } else if (suppress && answer.is_empty())
                || (!prompt.is_poll && seen.contains(&answer))
            {
                tracing::debug!(prompt = prompt_idx, submission = id, "duplicate answer");
                extraction.record(EventKind::Duplicate, id, Some(prompt_idx));
                continue;
            }

            seen.insert(answer);
            extraction.blocks.extend(found.into_blocks());
            extraction.kept += 1;
            suppress = true;
        }
    }

    tracing::info!(
        prompts = prompts.len(),
        submissions = submissions.len(),
        kept = extraction.kept,
        missed = extraction.count(EventKind::Missed),
        blank = extraction.count(EventKind::Blank),
        duplicate = extraction.count(EventKind::Duplicate),
        absent = extraction.count(EventKind::Absent),
        "extraction complete"
    );
    extraction
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distance::Levenshtein;
    use crate::notebook::tests::{flagged, md};
    use crate::notebook::{Notebook, FLAG_QUESTION};
    use crate::prompt::{compile, StopMarker};
    use crate::source::Submission;

    fn options(attribution: bool) -> AggregateOptions<'static> {
        AggregateOptions {
            matching: MatchOptions {
                threshold: 10,
                heading_prefix: "##",
            },
            attribution,
            label_prefix: "####",
        }
    }

    fn notebook(texts: &[&str]) -> Notebook {
        Notebook {
            blocks: texts.iter().map(|text| md(text)).collect(),
            metadata: Default::default(),
        }
    }

    fn fetched(id: &str, texts: &[&str]) -> FetchedSubmission {
        FetchedSubmission {
            submission: Submission::new(id, format!("{id}.ipynb")),
            notebook: Some(notebook(texts)),
        }
    }

    fn absent(id: &str) -> FetchedSubmission {
        FetchedSubmission {
            submission: Submission::new(id, format!("{id}.ipynb")),
            notebook: None,
        }
    }

    fn run(prompts: &[Prompt], subs: &[FetchedSubmission], attribution: bool) -> Extraction {
        extract(&Levenshtein, prompts, subs, &options(attribution))
    }

    fn texts(extraction: &Extraction) -> Vec<&str> {
        extraction
            .blocks
            .iter()
            .map(|block| block.source_text.as_str())
            .collect()
    }

    #[test]
    fn single_submission_end_to_end() {
        let template = Notebook {
            blocks: vec![flagged("Q1?", &[FLAG_QUESTION]), md("answer placeholder")],
            metadata: Default::default(),
        };
        let prompts = compile(&template);
        let out = run(&prompts, &[fetched("alice", &["Q1?", "my answer"])], false);
        assert_eq!(texts(&out), vec!["Q1?", "my answer"]);
        assert!(out.events.is_empty());
        assert_eq!(out.kept, 1);
    }

    #[test]
    fn identical_answers_are_kept_once() {
        let prompts = vec![Prompt::new("Q1?", StopMarker::NextBlock)];
        let subs = [
            fetched("alice", &["Q1?", "42"]),
            fetched("bob", &["Q1?", "  42\n"]),
        ];
        let out = run(&prompts, &subs, false);
        assert_eq!(texts(&out), vec!["Q1?", "42"]);
        assert_eq!(
            out.events,
            vec![ExtractionEvent {
                kind: EventKind::Duplicate,
                submission: "bob".to_string(),
                prompt: Some(0),
            }]
        );
    }

    #[test]
    fn later_answers_omit_the_question() {
        let prompts = vec![Prompt::new("Q1?", StopMarker::NextBlock)];
        let subs = [
            fetched("alice", &["Q1?", "42"]),
            fetched("bob", &["Q1 ?", "43"]),
        ];
        let out = run(&prompts, &subs, false);
        assert_eq!(texts(&out), vec!["Q1?", "42", "43"]);
    }

    #[test]
    fn question_without_answer_block_is_kept() {
        let prompts = vec![Prompt::new("Q1?", StopMarker::NextBlock)];
        let subs = [
            fetched("alice", &["intro", "Q1?"]),
            fetched("bob", &["Q1?"]),
            fetched("carol", &["Q1?", "42"]),
        ];
        let out = run(&prompts, &subs, false);
        assert_eq!(texts(&out), vec!["Q1?", "42"]);
        assert_eq!(out.kept, 2);
        // Once the question is shown, a bare question block carries nothing.
        assert_eq!(
            out.events,
            vec![ExtractionEvent {
                kind: EventKind::Missed,
                submission: "bob".to_string(),
                prompt: Some(0),
            }]
        );
    }

    #[test]
    fn polls_keep_duplicates() {
        let mut prompt = Prompt::new("Favourite editor?", StopMarker::NextBlock);
        prompt.is_poll = true;
        let subs = [
            fetched("alice", &["Favourite editor?", "vim"]),
            fetched("bob", &["Favourite editor?", "vim"]),
        ];
        let out = run(&[prompt], &subs, false);
        assert_eq!(texts(&out), vec!["Favourite editor?", "vim", "vim"]);
    }

    #[test]
    fn missing_question_is_recorded() {
        let prompts = vec![Prompt::new("Q1?", StopMarker::NextBlock)];
        let unrelated = "z".repeat(50);
        let subs = [
            fetched("alice", &[unrelated.as_str(), unrelated.as_str()]),
            fetched("bob", &["Q1?", "7"]),
        ];
        let out = run(&prompts, &subs, false);
        assert_eq!(texts(&out), vec!["Q1?", "7"]);
        assert_eq!(out.count(EventKind::Missed), 1);
        assert_eq!(out.events[0].submission, "alice");
    }

    #[test]
    fn blank_answers_are_skipped_and_do_not_suppress() {
        let prompts = vec![Prompt::new("Q1?", StopMarker::NextBlock)];
        let subs = [
            fetched("alice", &["Q1?", ""]),
            fetched("bob", &["Q1?", "answer"]),
        ];
        let out = run(&prompts, &subs, false);
        assert_eq!(texts(&out), vec!["Q1?", "answer"]);
        assert_eq!(out.count(EventKind::Blank), 1);
    }

    #[test]
    fn absent_notebooks_are_reported_once() {
        let prompts = vec![
            Prompt::new("Q1?", StopMarker::NextBlock),
            Prompt::new("Q2?", StopMarker::NextBlock),
        ];
        let subs = [
            absent("alice"),
            fetched("bob", &["Q1?", "a", "Q2?", "b"]),
        ];
        let out = run(&prompts, &subs, false);
        assert_eq!(texts(&out), vec!["Q1?", "a", "Q2?", "b"]);
        assert_eq!(out.count(EventKind::Absent), 1);
        assert_eq!(out.events[0].prompt, None);
    }

    #[test]
    fn attribution_labels_every_answer_in_id_order() {
        let prompts = vec![Prompt::new("Q1?", StopMarker::NextBlock)];
        let subs = [
            fetched("zoe", &["Q1?", "42"]),
            fetched("alice", &["Q1?", "42"]),
            absent("mia"),
        ];
        let out = run(&prompts, &subs, true);
        assert_eq!(texts(&out), vec!["#### alice", "Q1?", "42", "#### zoe", "42"]);
        assert_eq!(out.count(EventKind::Duplicate), 0);
        assert_eq!(out.kept, 2);
    }

    #[test]
    fn output_is_prompt_major() {
        let prompts = vec![
            Prompt::new("Q1?", StopMarker::NextBlock),
            Prompt::new("Q2?", StopMarker::NextBlock),
        ];
        let subs = [
            fetched("alice", &["Q2?", "a2", "Q1?", "a1"]),
            fetched("bob", &["Q1?", "b1", "Q2?", "b2"]),
        ];
        let out = run(&prompts, &subs, false);
        assert_eq!(texts(&out), vec!["Q1?", "a1", "b1", "Q2?", "a2", "b2"]);
    }
}
