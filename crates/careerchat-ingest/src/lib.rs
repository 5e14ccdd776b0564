//! Ingestion engine for streamed assistant replies.
//!
//! A reply arrives as a chunked body of `data:`-prefixed JSON frames. The
//! crate splits the body into frames, decodes each frame into a typed
//! payload, and drives a per-exchange state machine that emits ordered
//! render edits. When the stream ends, the accumulated text is classified
//! against the backend's literal list grammars or a fixed keyword set.
//!
//! # Usage
//!
//! ```no_run
//! use careerchat_ingest::prelude::*;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), SessionError> {
//! let config = ChatClientConfig::from_env()?;
//! let session = StreamSession::from_config(&config)?;
//! let mut stream = session.start(ChatRequest::new("Find data analyst jobs")).await?;
//! while let Some(event) = stream.next_event().await {
//!     println!("{event:?}");
//! }
//! let outcome = stream.finish().await?;
//! println!("{} units", outcome.transcript.len());
//! # Ok(())
//! # }
//! ```

/// Final-text classification into a render unit.
pub mod classify;
/// Client configuration.
pub mod config;
/// Public error types.
pub mod errors;
/// Per-exchange state machine.
pub mod exchange;
/// Incremental `data:` frame splitting.
pub mod frame;
/// Literal list grammars emitted by the backend.
pub mod grammar;
/// Process-wide logging setup.
pub mod observability;
/// Frame body decoding into typed payloads.
pub mod payload;
/// Common imports for typical usage.
pub mod prelude;
/// Render units, edits and the transcript they build.
pub mod render;
/// Exchange orchestration, streaming handle and cancellation.
pub mod session;
/// Transport seam and the HTTP implementation.
pub mod transport;

pub use classify::classify;
pub use config::ChatClientConfig;
pub use errors::{PayloadError, SessionError, TransportError};
pub use exchange::{Effect, ExchangeMode, ExchangeState, ExchangeStateMachine};
pub use frame::{Frame, FrameSplitter};
pub use grammar::{EventListParser, GrammarParser, JobListParser, LearningPathParser};
pub use payload::{
    CallArguments, MessagePayload, Payload, ValidationErrorPayload, ValuesPayload, parse_payload,
};
pub use render::{
    EmailDraft, FieldValue, ListKind, Record, RenderOp, RenderUnit, Transcript, Widget,
};
pub use session::{
    AbortHandle, ExchangeEnd, ExchangeEvent, ExchangeOutcome, ExchangeStream, StreamSession,
};
pub use transport::{ByteStream, ChatRequest, ChatTransport, ReqwestTransport};
