//! Common imports for typical usage.
pub use crate::{
    AbortHandle, ChatClientConfig, ChatRequest, ChatTransport, ExchangeEnd, ExchangeEvent,
    ExchangeOutcome, ExchangeStream, RenderOp, RenderUnit, SessionError, StreamSession,
    Transcript, TransportError,
};
