use std::io::Write;

use careerchat_ingest::{ExchangeEvent, FieldValue, ListKind, Record, RenderOp, RenderUnit, Widget};

/// Human-readable rendering of one unit.
pub fn describe_unit(unit: &RenderUnit) -> String {
    match unit {
        RenderUnit::PlainText { text } => text.clone(),
        RenderUnit::TransientIndicator { label } => format!("… {label}"),
        RenderUnit::StructuredList { kind, records } => {
            let mut out = format!("{} ({}):", list_title(*kind), records.len());
            for record in records {
                out.push_str("\n  - ");
                out.push_str(&describe_record(record));
            }
            out
        }
        RenderUnit::FixedWidget { widget } => match widget {
            Widget::Calendar => "[calendar]".to_string(),
            Widget::FilePreview => "[file preview]".to_string(),
            Widget::PdfPreview => "[pdf preview]".to_string(),
            Widget::EmailComposer { draft } => format!(
                "[email composer] to: {} | subject: {}\n{}",
                draft.to, draft.subject, draft.body
            ),
        },
        RenderUnit::ErrorCard {
            resource,
            reason,
            timestamp,
        } => format!("[{resource}] {reason} ({})", timestamp.to_rfc3339()),
    }
}

fn list_title(kind: ListKind) -> &'static str {
    match kind {
        ListKind::Job => "Jobs",
        ListKind::Event => "Events",
        ListKind::LearningStage => "Learning path",
    }
}

fn describe_record(record: &Record) -> String {
    record
        .iter()
        .map(|(key, value)| match value {
            FieldValue::List(items) => format!("{key}: [{}]", items.join(", ")),
            FieldValue::Text(text) | FieldValue::Scalar(text) => format!("{key}: {text}"),
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// Writes one exchange event either as a JSON line or as text.
pub fn write_event(out: &mut impl Write, event: &ExchangeEvent, json: bool) -> anyhow::Result<()> {
    if json {
        writeln!(out, "{}", serde_json::to_string(event)?)?;
        return Ok(());
    }
    match event {
        ExchangeEvent::Render(RenderOp::Append(unit)) => {
            writeln!(out, "{}", describe_unit(unit))?
        }
        ExchangeEvent::Render(RenderOp::ReplaceTail(unit)) => {
            writeln!(out, "~ {}", describe_unit(unit))?
        }
        ExchangeEvent::ReportOpened => writeln!(out, "--- report ---")?,
        ExchangeEvent::ReportDelta(text) => write!(out, "{text}")?,
        ExchangeEvent::ReportFinalized(_) => writeln!(out, "\n--- end of report ---")?,
        ExchangeEvent::Finished(end) => writeln!(out, "({end:?})")?,
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use careerchat_ingest::{EmailDraft, ExchangeEnd, classify};

    use super::*;

    #[test]
    fn describes_structured_lists_in_field_order() {
        let unit = classify("[LearningPath(stage='Foundations', topics=['Math', 'Stats'])]");
        assert_eq!(
            describe_unit(&unit),
            "Learning path (1):\n  - stage: Foundations, topics: [Math, Stats]"
        );
    }

    #[test]
    fn describes_widgets_and_text() {
        assert_eq!(describe_unit(&RenderUnit::widget(Widget::Calendar)), "[calendar]");
        assert_eq!(describe_unit(&RenderUnit::plain_text("hi")), "hi");
        let composer = RenderUnit::widget(Widget::EmailComposer {
            draft: EmailDraft {
                to: "a@b.c".into(),
                subject: "Hi".into(),
                body: "Hello".into(),
            },
        });
        assert!(describe_unit(&composer).starts_with("[email composer] to: a@b.c"));
    }

    #[test]
    fn json_mode_writes_one_line_per_event() {
        let mut out = Vec::new();
        write_event(
            &mut out,
            &ExchangeEvent::Render(RenderOp::Append(RenderUnit::plain_text("hi"))),
            true,
        )
        .expect("write");
        write_event(&mut out, &ExchangeEvent::Finished(ExchangeEnd::Completed), true)
            .expect("write");
        let text = String::from_utf8(out).expect("utf8");
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        let first: serde_json::Value = serde_json::from_str(lines[0]).expect("json");
        assert_eq!(first["event"], "render");
        assert_eq!(first["data"]["op"], "append");
        assert_eq!(first["data"]["unit"]["text"], "hi");
        let last: serde_json::Value = serde_json::from_str(lines[1]).expect("json");
        assert_eq!(last["data"], "completed");
    }

    #[test]
    fn text_mode_marks_replacements() {
        let mut out = Vec::new();
        write_event(
            &mut out,
            &ExchangeEvent::Render(RenderOp::ReplaceTail(RenderUnit::transient("Running X..."))),
            false,
        )
        .expect("write");
        assert_eq!(String::from_utf8(out).expect("utf8"), "~ … Running X...\n");
    }
}
