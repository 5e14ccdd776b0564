use super::GrammarParser;
use super::scanner::parse_literal;
use crate::render::{ListKind, Record};

pub const JOB_TAG: &str = "JobResponse";

/// `[JobResponse(title=..., company=..., ...)]` job listings.
///
/// A block is accepted only when it carries a non-empty `title`; all other
/// fields are kept as written.
#[derive(Debug, Clone, Copy, Default)]
pub struct JobListParser;

impl GrammarParser for JobListParser {
    fn kind(&self) -> ListKind {
        ListKind::Job
    }

    fn parse(&self, input: &str) -> Option<Vec<Record>> {
        let jobs: Vec<Record> = parse_literal(input, JOB_TAG)?
            .into_iter()
            .filter(|record| record.has_non_empty("title"))
            .collect();
        (!jobs.is_empty()).then_some(jobs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::FieldValue;

    #[test]
    fn single_job_keeps_field_order() {
        let jobs = JobListParser
            .parse("[JobResponse(title='Data Analyst', company='Acme')]")
            .expect("jobs");
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].keys().collect::<Vec<_>>(), vec!["title", "company"]);
        assert_eq!(jobs[0].get_str("title"), Some("Data Analyst"));
        assert_eq!(jobs[0].get_str("company"), Some("Acme"));
    }

    #[test]
    fn job_without_title_is_no_match() {
        assert_eq!(JobListParser.parse("[JobResponse(company='Acme')]"), None);
        assert_eq!(JobListParser.parse("[JobResponse(title='', company='Acme')]"), None);
    }

    #[test]
    fn untitled_blocks_are_filtered_from_a_list() {
        let jobs = JobListParser
            .parse(
                "[JobResponse(title='Backend Engineer', company='Initech', location='Remote', work_mode='remote', experience='3-5 years', skills='Rust, SQL'),\n JobResponse(company='Nameless'),\n JobResponse(title=\"Data Scientist\", company='Globex', experience=N/A)]",
            )
            .expect("jobs");
        assert_eq!(jobs.len(), 2);
        assert_eq!(jobs[0].get_str("skills"), Some("Rust, SQL"));
        assert_eq!(
            jobs[1].get("experience"),
            Some(&FieldValue::Scalar("N/A".into()))
        );
    }

    #[test]
    fn other_grammars_are_not_jobs() {
        assert_eq!(
            JobListParser.parse("[EventResponse(title='Meetup', event_url='http://x')]"),
            None
        );
    }
}
