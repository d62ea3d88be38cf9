//! Locate one prompt's answer inside a submitted notebook.
use crate::distance::DistanceOracle;
use crate::notebook::Block;
use crate::prompt::{Prompt, StopMarker};

/// Blocks extracted for one (prompt, submission) pair.
#[derive(Debug, Clone, PartialEq)]
pub struct Match {
    /// Synthesized heading, then the question block, both omitted when
    /// suppressed.
    pub lead: Vec<Block>,
    /// The respondent's answer: every block after the question up to the
    /// stop boundary.
    pub answer: Vec<Block>,
    /// Index of the question block in the submission.
    pub index: usize,
    pub distance: usize,
}

impl Match {
    pub fn into_blocks(self) -> Vec<Block> {
        let mut blocks = self.lead;
        blocks.extend(self.answer);
        blocks
    }

    pub fn last_block(&self) -> Option<&Block> {
        self.answer.last().or_else(|| self.lead.last())
    }

    /// Trimmed answer text, used to spot identical answers.
    pub fn answer_string(&self) -> String {
        self.answer
            .iter()
            .map(|block| block.source_text.as_str())
            .collect::<Vec<_>>()
            .join("\n")
            .trim()
            .to_string()
    }
}

/// Matching knobs that stay fixed for a whole run.
#[derive(Debug, Clone)]
pub struct MatchOptions<'a> {
    pub threshold: usize,
    pub heading_prefix: &'a str,
}

/// Earliest block with the smallest distance to `marker`.
pub fn closest_block(
    oracle: &dyn DistanceOracle,
    marker: &str,
    blocks: &[Block],
) -> Option<(usize, usize)> {
    let mut best: Option<(usize, usize)> = None;
    for (idx, block) in blocks.iter().enumerate() {
        let distance = oracle.distance(marker, &block.source_text);
        match best {
            Some((_, best_distance)) if distance >= best_distance => {}
            _ => best = Some((idx, distance)),
        }
    }
    best
}

/// Find `prompt` in `blocks`. `None` when the question, or the marker that
/// closes a multi-block answer, is further than `threshold` from every block.
pub fn find_answer(
    oracle: &dyn DistanceOracle,
    prompt: &Prompt,
    blocks: &[Block],
    options: &MatchOptions<'_>,
    suppress_heading: bool,
) -> Option<Match> {
    let (best, distance) = closest_block(oracle, &prompt.start_marker, blocks)?;
    tracing::debug!(index = best, distance, "closest question block");
    if distance > options.threshold {
        return None;
    }

    let end_offset = match &prompt.stop_marker {
        StopMarker::NextBlock => 2,
        StopMarker::ToEnd => blocks.len() - best,
        StopMarker::Marker(marker) => {
            let (offset, stop_distance) = closest_block(oracle, marker, &blocks[best..])?;
            tracing::debug!(offset, distance = stop_distance, "closest stop block");
            if stop_distance > options.threshold {
                return None;
            }
            offset
        }
    };

    let mut lead = Vec::new();
    if !suppress_heading {
        if !prompt.heading.is_empty() {
            lead.push(Block::heading(options.heading_prefix, &prompt.heading));
        }
        lead.push(blocks[best].clone());
    }
    let answer_end = (best + end_offset).min(blocks.len());
    let answer = blocks
        .get(best + 1..answer_end)
        .map(<[Block]>::to_vec)
        .unwrap_or_default();

    if lead.is_empty() && answer.is_empty() {
        return None;
    }
    Some(Match {
        lead,
        answer,
        index: best,
        distance,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distance::Levenshtein;
    use crate::notebook::tests::md;
    use crate::notebook::BlockKind;

    const OPTIONS: MatchOptions<'static> = MatchOptions {
        threshold: 10,
        heading_prefix: "##",
    };

    fn doc(texts: &[&str]) -> Vec<Block> {
        texts.iter().map(|text| md(text)).collect()
    }

    fn texts(m: &Match) -> Vec<String> {
        m.clone()
            .into_blocks()
            .into_iter()
            .map(|block| block.source_text)
            .collect()
    }

    fn find(prompt: &Prompt, blocks: &[Block], suppress: bool) -> Option<Match> {
        find_answer(&Levenshtein, prompt, blocks, &OPTIONS, suppress)
    }

    #[test]
    fn next_block_takes_question_and_one_answer() {
        let blocks = doc(&["intro", "Q1?", "my answer", "unrelated", "more"]);
        let m = find(&Prompt::new("Q1?", StopMarker::NextBlock), &blocks, false).unwrap();
        assert_eq!(texts(&m), vec!["Q1?", "my answer"]);
        assert_eq!(m.index, 1);
        assert_eq!(m.distance, 0);
    }

    #[test]
    fn tolerates_small_edits_to_the_question() {
        let blocks = doc(&["### Exercise 3 \n\nType help() ", "answer"]);
        let prompt = Prompt::new("### Exercise 3\n\nType `help()`", StopMarker::NextBlock);
        let m = find(&prompt, &blocks, false).unwrap();
        assert_eq!(m.index, 0);
        assert!(m.distance <= OPTIONS.threshold);
    }

    #[test]
    fn ties_resolve_to_earliest_block() {
        let blocks = doc(&["Q1!", "first", "Q1.", "second"]);
        let m = find(&Prompt::new("Q1?", StopMarker::NextBlock), &blocks, false).unwrap();
        assert_eq!(m.index, 0);
        assert_eq!(texts(&m), vec!["Q1!", "first"]);
    }

    #[test]
    fn beyond_threshold_is_no_match() {
        let far = "x".repeat(50);
        let blocks = doc(&[&far, &far]);
        assert!(find(&Prompt::new("Q1?", StopMarker::NextBlock), &blocks, false).is_none());
    }

    #[test]
    fn raising_threshold_only_adds_matches() {
        let blocks = doc(&["What is the volume of a sphere?", "523.6"]);
        let prompt = Prompt::new("What is the area of a circle?", StopMarker::NextBlock);
        let mut matched_before = false;
        for threshold in 0..40 {
            let options = MatchOptions {
                threshold,
                heading_prefix: "##",
            };
            let matched = find_answer(&Levenshtein, &prompt, &blocks, &options, false).is_some();
            assert!(matched || !matched_before, "threshold {threshold} lost a match");
            matched_before = matched;
        }
        assert!(matched_before);
    }

    #[test]
    fn empty_document_is_no_match() {
        assert!(find(&Prompt::new("Q1?", StopMarker::NextBlock), &[], false).is_none());
    }

    #[test]
    fn next_block_at_document_end_keeps_question_only() {
        let blocks = doc(&["intro", "Q1?"]);
        let m = find(&Prompt::new("Q1?", StopMarker::NextBlock), &blocks, false).unwrap();
        assert_eq!(texts(&m), vec!["Q1?"]);
        assert!(find(&Prompt::new("Q1?", StopMarker::NextBlock), &blocks, true).is_none());
    }

    #[test]
    fn to_end_takes_everything_after_question() {
        let blocks = doc(&["Q1?", "a1", "Notes", "n1", "n2"]);
        let m = find(&Prompt::new("Notes", StopMarker::ToEnd), &blocks, false).unwrap();
        assert_eq!(texts(&m), vec!["Notes", "n1", "n2"]);
    }

    #[test]
    fn marker_stops_before_next_question() {
        let blocks = doc(&["Q1", "a", "b", "c", "Q2", "d"]);
        let prompt = Prompt::new("Q1", StopMarker::Marker("Q2".to_string()));
        let m = find(&prompt, &blocks, false).unwrap();
        assert_eq!(texts(&m), vec!["Q1", "a", "b", "c"]);
        assert_eq!(m.answer_string(), "a\nb\nc");
    }

    #[test]
    fn missing_stop_marker_discards_answer() {
        let blocks = doc(&["Q1", "a", "b"]);
        let prompt = Prompt::new(
            "Q1",
            StopMarker::Marker("An entirely different closing question".to_string()),
        );
        assert!(find(&prompt, &blocks, false).is_none());
    }

    #[test]
    fn suppressed_match_drops_question_and_heading() {
        let blocks = doc(&["Q1?", "42"]);
        let mut prompt = Prompt::new("Q1?", StopMarker::NextBlock);
        prompt.heading = "Chapter 1".to_string();

        let shown = find(&prompt, &blocks, false).unwrap();
        assert_eq!(texts(&shown), vec!["## Chapter 1", "Q1?", "42"]);
        assert_eq!(shown.lead[0].kind, BlockKind::Heading);

        let suppressed = find(&prompt, &blocks, true).unwrap();
        assert_eq!(texts(&suppressed), vec!["42"]);
        assert_eq!(shown.answer_string(), suppressed.answer_string());
    }

    #[test]
    fn closest_block_prefers_strictly_smaller() {
        let blocks = doc(&["abd", "abc", "abc"]);
        assert_eq!(closest_block(&Levenshtein, "abc", &blocks), Some((1, 0)));
        assert_eq!(closest_block(&Levenshtein, "abc", &[]), None);
    }
}
