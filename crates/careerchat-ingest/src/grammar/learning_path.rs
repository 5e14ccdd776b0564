use super::scanner::parse_literal;
use super::{GrammarParser, clean_item};
use crate::render::{FieldValue, ListKind, Record};

pub const LEARNING_PATH_TAG: &str = "LearningPath";

/// `[LearningPath(stage='...', topics=['...', ...])]` learning stages.
///
/// Every accepted record is normalised to exactly `stage` (text) followed by
/// `topics` (non-empty list). Blocks missing either are skipped.
#[derive(Debug, Clone, Copy, Default)]
pub struct LearningPathParser;

impl GrammarParser for LearningPathParser {
    fn kind(&self) -> ListKind {
        ListKind::LearningStage
    }

    fn parse(&self, input: &str) -> Option<Vec<Record>> {
        let stages: Vec<Record> = parse_literal(input, LEARNING_PATH_TAG)?
            .iter()
            .filter_map(normalise_stage)
            .collect();
        (!stages.is_empty()).then_some(stages)
    }
}

fn normalise_stage(record: &Record) -> Option<Record> {
    let stage = record.get_str("stage").map(str::trim).filter(|s| !s.is_empty())?;
    let topics: Vec<String> = record
        .get_list("topics")?
        .iter()
        .filter_map(|topic| clean_item(topic))
        .collect();
    if topics.is_empty() {
        return None;
    }
    let mut normalised = Record::new();
    normalised.insert("stage", FieldValue::Text(stage.to_string()));
    normalised.insert("topics", FieldValue::List(topics));
    Some(normalised)
}
