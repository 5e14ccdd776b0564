//! Render units handed to the view layer, plus the ordered transcript they form.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde::ser::SerializeMap as _;

/// A field value recovered from the literal grammar.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldValue {
    /// Single- or double-quoted string.
    Text(String),
    /// Bracketed list of items.
    List(Vec<String>),
    /// Bare unquoted token (`N/A`, numbers, booleans).
    Scalar(String),
}

impl FieldValue {
    /// String view of a text or scalar value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) | Self::Scalar(s) => Some(s),
            Self::List(_) => None,
        }
    }

    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }
}

/// Ordered field mapping; insertion order is the order of appearance in the
/// source text and keys are unique.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Record {
    fields: Vec<(String, FieldValue)>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a field. A repeated key keeps its first position and takes the
    /// new value; the previous value is returned.
    pub fn insert(&mut self, key: impl Into<String>, value: FieldValue) -> Option<FieldValue> {
        let key = key.into();
        if let Some((_, slot)) = self.fields.iter_mut().find(|(k, _)| *k == key) {
            return Some(std::mem::replace(slot, value));
        }
        self.fields.push((key, value));
        None
    }

    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        self.fields.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(FieldValue::as_str)
    }

    pub fn get_list(&self, key: &str) -> Option<&[String]> {
        self.get(key).and_then(FieldValue::as_list)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// True when `key` holds a text or scalar value that is not blank.
    pub fn has_non_empty(&self, key: &str) -> bool {
        self.get_str(key).is_some_and(|s| !s.trim().is_empty())
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl Serialize for Record {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (key, value) in &self.fields {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

/// Which grammar a structured list came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ListKind {
    Job,
    Event,
    LearningStage,
}

/// Fields pre-filled into the email composer.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct EmailDraft {
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// Fixed widgets the view layer knows how to draw.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Widget {
    Calendar,
    EmailComposer { draft: EmailDraft },
    FilePreview,
    PdfPreview,
}

/// Externally visible output of one exchange.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RenderUnit {
    PlainText {
        text: String,
    },
    /// Replaceable progress indicator.
    TransientIndicator {
        label: String,
    },
    StructuredList {
        kind: ListKind,
        records: Vec<Record>,
    },
    FixedWidget {
        widget: Widget,
    },
    ErrorCard {
        resource: String,
        reason: String,
        timestamp: DateTime<Utc>,
    },
}

impl RenderUnit {
    pub fn plain_text(text: impl Into<String>) -> Self {
        Self::PlainText { text: text.into() }
    }

    pub fn transient(label: impl Into<String>) -> Self {
        Self::TransientIndicator {
            label: label.into(),
        }
    }

    /// Error card stamped with the current time.
    pub fn error_card(resource: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ErrorCard {
            resource: resource.into(),
            reason: reason.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn widget(widget: Widget) -> Self {
        Self::FixedWidget { widget }
    }

    /// True for units a successor may replace in place.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::TransientIndicator { .. })
    }

    /// Text of a plain-text unit.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::PlainText { text } => Some(text),
            _ => None,
        }
    }
}

/// One edit to the emitted unit sequence.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "op", content = "unit", rename_all = "snake_case")]
pub enum RenderOp {
    Append(RenderUnit),
    ReplaceTail(RenderUnit),
}

impl RenderOp {
    pub fn unit(&self) -> &RenderUnit {
        match self {
            Self::Append(unit) | Self::ReplaceTail(unit) => unit,
        }
    }
}

/// Ordered sequence of units as the view layer sees it.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Transcript {
    units: Vec<RenderUnit>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies one edit. Replacing the tail of an empty transcript appends.
    pub fn apply(&mut self, op: RenderOp) {
        match op {
            RenderOp::Append(unit) => self.units.push(unit),
            RenderOp::ReplaceTail(unit) => match self.units.last_mut() {
                Some(tail) => *tail = unit,
                None => self.units.push(unit),
            },
        }
    }

    pub fn units(&self) -> &[RenderUnit] {
        &self.units
    }

    pub fn last(&self) -> Option<&RenderUnit> {
        self.units.last()
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Number of transient indicators anywhere in the sequence.
    pub fn transient_count(&self) -> usize {
        self.units.iter().filter(|u| u.is_transient()).count()
    }

    pub fn into_units(self) -> Vec<RenderUnit> {
        self.units
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_keeps_first_position_for_repeated_keys() {
        let mut record = Record::new();
        record.insert("title", FieldValue::Text("A".into()));
        record.insert("company", FieldValue::Text("B".into()));
        let previous = record.insert("title", FieldValue::Text("C".into()));
        assert_eq!(previous, Some(FieldValue::Text("A".into())));
        assert_eq!(record.keys().collect::<Vec<_>>(), vec!["title", "company"]);
        assert_eq!(record.get_str("title"), Some("C"));
    }

    #[test]
    fn record_serializes_as_ordered_map() {
        let mut record = Record::new();
        record.insert("stage", FieldValue::Text("Foundations".into()));
        record.insert("topics", FieldValue::List(vec!["Math".into()]));
        let json = serde_json::to_string(&record).expect("serialize");
        assert_eq!(
            json,
            r#"{"stage":{"text":"Foundations"},"topics":{"list":["Math"]}}"#
        );
    }

    #[test]
    fn transcript_replaces_tail_in_place() {
        let mut transcript = Transcript::new();
        transcript.apply(RenderOp::ReplaceTail(RenderUnit::transient("one")));
        transcript.apply(RenderOp::ReplaceTail(RenderUnit::transient("two")));
        transcript.apply(RenderOp::Append(RenderUnit::plain_text("hi")));
        assert_eq!(
            transcript.units(),
            &[RenderUnit::transient("two"), RenderUnit::plain_text("hi")]
        );
        assert_eq!(transcript.transient_count(), 1);
    }

    #[test]
    fn render_unit_serializes_with_type_tag() {
        let unit = RenderUnit::widget(Widget::EmailComposer {
            draft: EmailDraft {
                to: "a@b.c".into(),
                ..EmailDraft::default()
            },
        });
        let value = serde_json::to_value(&unit).expect("serialize");
        assert_eq!(value["type"], "fixed_widget");
        assert_eq!(value["widget"]["kind"], "email_composer");
        assert_eq!(value["widget"]["draft"]["to"], "a@b.c");
    }
}
