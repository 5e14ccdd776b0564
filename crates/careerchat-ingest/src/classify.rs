//! Final-text classification into a single render unit.

use tracing::debug;

use crate::grammar::GRAMMARS;
use crate::render::{EmailDraft, RenderUnit, Widget};

/// Placeholder shown when an exchange produced no text at all.
pub const NO_RESPONSE_TEXT: &str = "(No specific response generated)";

/// Exact final texts that open a fixed widget.
pub const WIDGET_KEYWORDS: [&str; 4] = [
    "show_calendar",
    "email_composer",
    "file_preview",
    "pdf_preview",
];

/// Classifies the final accumulated text.
///
/// Priority: learning path, job list, event list, exact keyword, plain text,
/// and finally the no-response placeholder for blank text. The first match
/// wins.
pub fn classify(text: &str) -> RenderUnit {
    for grammar in GRAMMARS.iter() {
        if let Some(records) = grammar.parse(text) {
            debug!(kind = ?grammar.kind(), records = records.len(), "final text matched grammar");
            return RenderUnit::StructuredList {
                kind: grammar.kind(),
                records,
            };
        }
    }
    if let Some(widget) = keyword_widget(text) {
        return RenderUnit::widget(widget);
    }
    if text.trim().is_empty() {
        return RenderUnit::plain_text(NO_RESPONSE_TEXT);
    }
    RenderUnit::plain_text(text)
}

fn keyword_widget(text: &str) -> Option<Widget> {
    match text {
        "show_calendar" => Some(Widget::Calendar),
        "email_composer" => Some(Widget::EmailComposer {
            draft: EmailDraft::default(),
        }),
        "file_preview" => Some(Widget::FilePreview),
        "pdf_preview" => Some(Widget::PdfPreview),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::ListKind;

    fn list_kind(unit: &RenderUnit) -> Option<ListKind> {
        match unit {
            RenderUnit::StructuredList { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    #[test]
    fn each_grammar_is_recognized() {
        assert_eq!(
            list_kind(&classify("[JobResponse(title='Data Analyst', company='Acme')]")),
            Some(ListKind::Job)
        );
        assert_eq!(
            list_kind(&classify(
                "[LearningPath(stage='Foundations', topics=['Math', 'Stats'])]"
            )),
            Some(ListKind::LearningStage)
        );
        assert_eq!(
            list_kind(&classify(
                "[EventResponse(title='Meetup', event_url='http://x')]"
            )),
            Some(ListKind::Event)
        );
    }

    #[test]
    fn learning_path_wins_when_text_also_carries_job_blocks() {
        let text = "[LearningPath(stage='Foundations', topics=['Math']), JobResponse(title='Data Analyst', company='Acme'), LearningPath(stage='Tools', topics=['SQL'])]";
        let unit = classify(text);
        let RenderUnit::StructuredList { kind, records } = unit else {
            panic!("expected structured list");
        };
        assert_eq!(kind, ListKind::LearningStage);
        assert_eq!(records.len(), 2);
    }

    #[test]
    fn keywords_match_exactly() {
        for keyword in WIDGET_KEYWORDS {
            assert!(matches!(classify(keyword), RenderUnit::FixedWidget { .. }));
        }
        assert_eq!(
            classify("show_calendar"),
            RenderUnit::widget(Widget::Calendar)
        );
        assert_eq!(
            classify("email_composer"),
            RenderUnit::widget(Widget::EmailComposer {
                draft: EmailDraft::default()
            })
        );
        assert_eq!(classify("pdf_preview"), RenderUnit::widget(Widget::PdfPreview));
        assert_eq!(
            classify("file_preview"),
            RenderUnit::widget(Widget::FilePreview)
        );
        assert_eq!(
            classify("please show_calendar"),
            RenderUnit::plain_text("please show_calendar")
        );
    }

    #[test]
    fn grammar_mismatch_falls_back_to_plain_text() {
        let text = "[JobResponse(company='Acme')]";
        assert_eq!(classify(text), RenderUnit::plain_text(text));
    }

    #[test]
    fn blank_text_is_the_no_response_placeholder() {
        assert_eq!(classify(""), RenderUnit::plain_text(NO_RESPONSE_TEXT));
        assert_eq!(classify("  \n"), RenderUnit::plain_text(NO_RESPONSE_TEXT));
    }
}
