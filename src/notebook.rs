//! In-memory notebook model.
//!
//! A notebook is an ordered list of blocks plus whatever top-level metadata
//! came with it. Blocks keep their original cell JSON so that extracted
//! answers are written back exactly as the respondent saved them.
use anyhow::{anyhow, Context, Result};
use regex::Regex;
use serde_json::{json, Map, Value};
use std::sync::OnceLock;

/// Template flag marking a block as a question.
pub const FLAG_QUESTION: &str = "is_question";
/// Template flag letting an answer run until the next question.
pub const FLAG_MULTI_BLOCK: &str = "allow_multi_cell";
/// Template flag disabling duplicate-answer suppression.
pub const FLAG_POLL: &str = "is_poll";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    Text,
    Heading,
    Other,
}

impl BlockKind {
    fn classify(cell_type: &str, source_text: &str) -> Self {
        match cell_type {
            "heading" => BlockKind::Heading,
            "markdown" if atx_heading_re().is_match(source_text) => BlockKind::Heading,
            "markdown" => BlockKind::Text,
            _ => BlockKind::Other,
        }
    }
}

fn atx_heading_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^#{1,6}\s").expect("regex for ATX headings"))
}

#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub kind: BlockKind,
    pub source_text: String,
    pub output_text: String,
    pub flags: Map<String, Value>,
    cell: Value,
}

impl Block {
    /// Build a block from one serialized notebook cell.
    pub fn from_cell(cell: Value) -> Result<Self> {
        let obj = cell
            .as_object()
            .ok_or_else(|| anyhow!("notebook cell is not a JSON object"))?;
        let cell_type = obj
            .get("cell_type")
            .and_then(Value::as_str)
            .unwrap_or("raw");
        let source_text = join_lines(obj.get("source"));
        let output_text = obj
            .get("outputs")
            .and_then(Value::as_array)
            .map(|outputs| outputs.iter().map(output_string).collect::<String>())
            .unwrap_or_default();
        let flags = obj
            .get("metadata")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();
        Ok(Self {
            kind: BlockKind::classify(cell_type, &source_text),
            source_text,
            output_text,
            flags,
            cell,
        })
    }

    /// Synthesize a markdown block, used for headings and attribution labels.
    pub fn markdown(text: impl Into<String>) -> Self {
        let text = text.into();
        let cell = json!({
            "cell_type": "markdown",
            "metadata": {},
            "source": text.clone(),
        });
        Self {
            kind: BlockKind::classify("markdown", &text),
            source_text: text,
            output_text: String::new(),
            flags: Map::new(),
            cell,
        }
    }

    /// Markdown block rendered as `<prefix> <text>`.
    pub fn heading(prefix: &str, text: &str) -> Self {
        let mut block = Self::markdown(format!("{prefix} {text}"));
        block.kind = BlockKind::Heading;
        block
    }

    /// Whether a metadata flag is set. Templates in the wild store these
    /// as JSON booleans or as the string `"true"`.
    pub fn flag(&self, name: &str) -> bool {
        match self.flags.get(name) {
            Some(Value::Bool(value)) => *value,
            Some(Value::String(value)) => value.eq_ignore_ascii_case("true"),
            _ => false,
        }
    }

    /// Key used to tell whether a respondent touched a cell.
    pub fn content_key(&self) -> (&str, &str) {
        (&self.source_text, &self.output_text)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Notebook {
    pub blocks: Vec<Block>,
    /// Every top-level key except `cells`, carried through untouched.
    pub metadata: Map<String, Value>,
}

impl Notebook {
    pub fn from_value(value: Value) -> Result<Self> {
        let Value::Object(mut top) = value else {
            return Err(anyhow!("notebook is not a JSON object"));
        };
        let cells = match top.remove("cells") {
            Some(Value::Array(cells)) => cells,
            Some(_) => return Err(anyhow!("notebook `cells` is not an array")),
            None => return Err(anyhow!("notebook has no `cells` (nbformat 4 required)")),
        };
        let blocks = cells
            .into_iter()
            .enumerate()
            .map(|(idx, cell)| Block::from_cell(cell).with_context(|| format!("cell {idx}")))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            blocks,
            metadata: top,
        })
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let value: Value = serde_json::from_slice(bytes).context("parse notebook JSON")?;
        Self::from_value(value)
    }

    /// Text of the first heading block, with its `#` markers removed.
    pub fn title(&self) -> Option<&str> {
        self.blocks
            .iter()
            .find(|block| block.kind == BlockKind::Heading)
            .and_then(|block| block.source_text.lines().next())
            .map(|line| line.trim_start_matches('#').trim())
            .filter(|title| !title.is_empty())
    }

    /// Same metadata, new block list.
    pub fn with_blocks(&self, blocks: Vec<Block>) -> Self {
        Self {
            blocks,
            metadata: self.metadata.clone(),
        }
    }

    pub fn to_value(&self) -> Value {
        let mut top = self.metadata.clone();
        let cells = self.blocks.iter().map(|block| block.cell.clone()).collect();
        top.insert("cells".to_string(), Value::Array(cells));
        Value::Object(top)
    }
}

fn join_lines(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(text)) => text.clone(),
        Some(Value::Array(lines)) => lines.iter().filter_map(Value::as_str).collect(),
        _ => String::new(),
    }
}

fn output_string(output: &Value) -> String {
    let mut text = join_lines(output.get("text"));
    text.push_str(&join_lines(
        output.get("data").and_then(|data| data.get("text/plain")),
    ));
    text
}
