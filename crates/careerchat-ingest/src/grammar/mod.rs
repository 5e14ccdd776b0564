//! Parsers for the backend's literal result encodings.
//!
//! The backend emits structured results as Python-repr-like text rather than
//! JSON:
//!
//! ```text
//! [Tag(field='value', other=[ 'a', 'b' ], flag=N/A), Tag(...)]
//! ```
//!
//! Each grammar first checks the `[Tag(` ... `)]` envelope. A mismatch means
//! "not this grammar" and is reported as `None`, never as an error. Inside
//! the envelope parsing is best-effort: a malformed block is skipped and the
//! scanner resynchronises on the next `Tag(`.
//!
//! Quoted strings honour backslash escapes (`\'`, `\"`, `\\`, `\n`, `\t`);
//! any other escaped character is kept verbatim with its backslash.

mod event;
mod job;
mod learning_path;
mod scanner;

pub use event::{EVENT_DEFAULT_FIELDS, EVENT_TAG, EventListParser};
pub use job::{JOB_TAG, JobListParser};
pub use learning_path::{LEARNING_PATH_TAG, LearningPathParser};

use crate::render::{ListKind, Record};

/// One literal grammar that can recover structured records from final text.
pub trait GrammarParser: Send + Sync {
    /// Kind of list this grammar produces.
    fn kind(&self) -> ListKind;

    /// Returns the accepted records, or `None` when the text is not this
    /// grammar or no block survived validation.
    fn parse(&self, input: &str) -> Option<Vec<Record>>;
}

/// Grammars in classification priority order.
pub static GRAMMARS: [&dyn GrammarParser; 3] =
    [&LearningPathParser, &JobListParser, &EventListParser];

/// Removes one layer of surrounding quotes and whitespace from a list item.
pub(crate) fn clean_item(raw: &str) -> Option<String> {
    let item = raw
        .trim()
        .trim_start_matches(['\'', '"'])
        .trim_end_matches(['\'', '"'])
        .trim();
    (!item.is_empty()).then(|| item.to_string())
}
