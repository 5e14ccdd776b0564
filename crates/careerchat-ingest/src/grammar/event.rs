use super::scanner::parse_literal;
use super::{GrammarParser, clean_item};
use crate::render::{FieldValue, ListKind, Record};

pub const EVENT_TAG: &str = "EventResponse";

/// Sentinel the backend uses for "no value".
const NOT_AVAILABLE: &str = "N/A";

/// Optional event fields, in the order defaults are appended.
pub const EVENT_DEFAULT_FIELDS: [&str; 8] = [
    "image",
    "categories",
    "mode",
    "date",
    "time",
    "venue",
    "price",
    "register_url",
];

/// `[EventResponse(title=..., event_url=..., ...)]` event listings.
///
/// `title` and `event_url` are required. Missing optional fields are filled
/// in after the fields that were present: `categories` as an empty list,
/// everything else as `N/A`.
#[derive(Debug, Clone, Copy, Default)]
pub struct EventListParser;

impl GrammarParser for EventListParser {
    fn kind(&self) -> ListKind {
        ListKind::Event
    }

    fn parse(&self, input: &str) -> Option<Vec<Record>> {
        let events: Vec<Record> = parse_literal(input, EVENT_TAG)?
            .into_iter()
            .filter(|record| record.has_non_empty("title") && record.has_non_empty("event_url"))
            .map(fill_defaults)
            .collect();
        (!events.is_empty()).then_some(events)
    }
}

fn fill_defaults(mut record: Record) -> Record {
    let categories = categories_of(record.get("categories"));
    record.insert("categories", FieldValue::List(categories));
    for field in EVENT_DEFAULT_FIELDS {
        if !record.contains_key(field) {
            record.insert(field, FieldValue::Scalar(NOT_AVAILABLE.to_string()));
        }
    }
    record
}

fn categories_of(value: Option<&FieldValue>) -> Vec<String> {
    match value {
        Some(FieldValue::List(items)) => items.iter().filter_map(|i| clean_item(i)).collect(),
        Some(FieldValue::Text(raw) | FieldValue::Scalar(raw)) => {
            let raw = raw.trim();
            if let Some(inner) = raw.strip_prefix('[').and_then(|r| r.strip_suffix(']')) {
                inner.split(',').filter_map(clean_item).collect()
            } else if raw.is_empty() || raw == NOT_AVAILABLE {
                Vec::new()
            } else {
                vec![raw.to_string()]
            }
        }
        None => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_optional_fields_are_defaulted() {
        let events = EventListParser
            .parse("[EventResponse(title='Meetup', event_url='http://x')]")
            .expect("events");
        assert_eq!(events.len(), 1);
        let event = &events[0];
        for field in ["mode", "date", "time", "venue", "price"] {
            assert_eq!(event.get_str(field), Some("N/A"), "field {field}");
        }
        assert_eq!(event.get_list("categories"), Some(&[][..]));
        assert_eq!(
            event.keys().take(3).collect::<Vec<_>>(),
            vec!["title", "event_url", "categories"]
        );
    }

    #[test]
    fn present_fields_keep_source_values() {
        let events = EventListParser
            .parse("[EventResponse(title='Rust Meetup', mode='Online', categories=['Tech', 'Community'], date='2025-03-01', event_url='https://example.org/e/1', price=Free)]")
            .expect("events");
        let event = &events[0];
        assert_eq!(event.get_str("mode"), Some("Online"));
        assert_eq!(event.get_str("price"), Some("Free"));
        assert_eq!(event.get_str("venue"), Some("N/A"));
        assert_eq!(
            event.get_list("categories"),
            Some(&["Tech".to_string(), "Community".to_string()][..])
        );
    }

    #[test]
    fn categories_from_strings() {
        let events = EventListParser
            .parse("[EventResponse(title='A', event_url='u', categories=\"['Career', 'Women in Tech']\"), EventResponse(title='B', event_url='u', categories='Networking'), EventResponse(title='C', event_url='u', categories=N/A)]")
            .expect("events");
        assert_eq!(
            events[0].get_list("categories"),
            Some(&["Career".to_string(), "Women in Tech".to_string()][..])
        );
        assert_eq!(
            events[1].get_list("categories"),
            Some(&["Networking".to_string()][..])
        );
        assert_eq!(events[2].get_list("categories"), Some(&[][..]));
    }

    #[test]
    fn events_require_title_and_url() {
        assert_eq!(
            EventListParser.parse("[EventResponse(title='No link'), EventResponse(event_url='http://x')]"),
            None
        );
    }
}
