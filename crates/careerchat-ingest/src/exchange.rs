//! Per-exchange state machine turning payloads into render edits.
//!
//! The machine owns the exchange's buffers and decides, for every payload,
//! which `RenderOp` (if any) to emit and whether the read loop must stop. It
//! never performs I/O; the session forwards its `Effect`s.

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::classify::{NO_RESPONSE_TEXT, classify};
use crate::payload::{
    CallArguments, MessagePayload, Payload, ValidationErrorPayload, ValuesPayload,
};
use crate::render::{EmailDraft, RenderOp, RenderUnit, Widget};

/// Function whose complete arguments open the email composer.
pub const EMAIL_FUNCTION: &str = "GenerateEmail";

/// Progress labels for known function calls.
const FUNCTION_LABELS: &[(&str, &str)] = &[
    ("RouteQuery", "Retrieving relevant documents..."),
    ("GradeDocuments", "Re-ranking documents..."),
];

pub const ACTION_DENIED_RESOURCE: &str = "Action Denied";
pub const BIAS_RESOURCE: &str = "Biased Language Detected";
pub const NETWORK_FAILURE_TEXT: &str =
    "Sorry, something went wrong while connecting or processing your request.";
pub const EMPTY_RESPONSE_TEXT: &str = "Received an empty response from the server.";
pub const CANCELLED_TEXT: &str = "(Response cancelled)";

/// Lifecycle of one exchange.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExchangeMode {
    Normal,
    /// Content is routed to the report surface instead of the chat.
    GeneratingReport,
    /// A terminal signal was seen; nothing further is processed.
    Terminated,
}

/// Units this exchange currently owns at the tail of the transcript.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Tail {
    Transient,
    Text,
    /// Classified final unit; takes the place of the streamed text.
    Final,
    /// Terminal unit; never replaced.
    Settled,
}

/// What the session must do in response to a payload.
#[derive(Clone, Debug, PartialEq)]
pub enum Effect {
    Render(RenderOp),
    /// Open the report surface (its buffer was reset).
    OpenReport,
    /// Text appended to the report buffer.
    ReportDelta(String),
    /// Report generation ended normally with the full buffer.
    FinalizeReport(String),
    /// Stop reading and release the underlying stream.
    Cancel,
}

/// Mutable state of a single exchange.
#[derive(Debug, Clone)]
pub struct ExchangeState {
    text_buffer: String,
    report_buffer: String,
    mode: ExchangeMode,
    last_unit_is_transient: bool,
    tail: Option<Tail>,
    closed: bool,
}

impl Default for ExchangeState {
    fn default() -> Self {
        Self {
            text_buffer: String::new(),
            report_buffer: String::new(),
            mode: ExchangeMode::Normal,
            last_unit_is_transient: false,
            tail: None,
            closed: false,
        }
    }
}

impl ExchangeState {
    pub fn text_buffer(&self) -> &str {
        &self.text_buffer
    }

    pub fn report_buffer(&self) -> &str {
        &self.report_buffer
    }

    pub fn mode(&self) -> ExchangeMode {
        self.mode
    }

    pub fn last_unit_is_transient(&self) -> bool {
        self.last_unit_is_transient
    }
}

/// Drives one `ExchangeState` from payloads to effects.
#[derive(Debug, Default)]
pub struct ExchangeStateMachine {
    state: ExchangeState,
}

impl ExchangeStateMachine {
    /// Creates a machine for a fresh exchange.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &ExchangeState {
        &self.state
    }

    pub fn is_terminated(&self) -> bool {
        self.state.mode == ExchangeMode::Terminated
    }

    /// True once the exchange was finished, failed or terminated.
    pub fn is_closed(&self) -> bool {
        self.state.closed || self.is_terminated()
    }

    /// Applies one payload. Returns no effects once the exchange is closed.
    pub fn apply(&mut self, payload: Payload) -> Vec<Effect> {
        if self.is_closed() {
            debug!(payload_type = payload.type_name(), "ignoring payload after exchange closed");
            return Vec::new();
        }
        match payload {
            Payload::ValidationError(validation) => self.apply_validation(validation),
            Payload::Values(ValuesPayload::Error(reason)) => {
                info!(reason = %reason, "backend declared an error, terminating exchange");
                self.terminate(RenderUnit::error_card(ACTION_DENIED_RESOURCE, reason))
            }
            Payload::Values(ValuesPayload::GenerateReport) => {
                info!("report generation started");
                self.state.report_buffer.clear();
                self.state.mode = ExchangeMode::GeneratingReport;
                vec![Effect::OpenReport]
            }
            Payload::Values(ValuesPayload::Other) => Vec::new(),
            Payload::Message(message) => match self.state.mode {
                ExchangeMode::GeneratingReport => self.apply_report_message(message),
                ExchangeMode::Normal => self.apply_chat_message(message),
                ExchangeMode::Terminated => Vec::new(),
            },
            Payload::Unknown { payload_type } => {
                debug!(payload_type = ?payload_type, "ignoring unknown payload type");
                Vec::new()
            }
        }
    }

    /// Handles normal end of data.
    ///
    /// In chat mode the accumulated text is classified into the final unit.
    /// In report mode the report is finalized and no chat unit is produced.
    /// A dangling transient indicator is always replaced.
    pub fn finish(&mut self) -> Vec<Effect> {
        if self.is_closed() {
            return Vec::new();
        }
        self.state.closed = true;
        match self.state.mode {
            ExchangeMode::GeneratingReport => {
                let mut effects = Vec::new();
                if self.state.tail == Some(Tail::Transient) {
                    effects.push(Effect::Render(
                        self.place(RenderUnit::plain_text(NO_RESPONSE_TEXT), Tail::Final),
                    ));
                }
                effects.push(Effect::FinalizeReport(self.state.report_buffer.clone()));
                effects
            }
            ExchangeMode::Normal => {
                let unit = classify(&self.state.text_buffer);
                if self.state.tail == Some(Tail::Text)
                    && unit.as_text() == Some(self.state.text_buffer.as_str())
                {
                    return Vec::new();
                }
                vec![Effect::Render(self.place(unit, Tail::Final))]
            }
            ExchangeMode::Terminated => Vec::new(),
        }
    }

    /// Handles a transport-level failure with a single terminal message.
    pub fn fail(&mut self, message: impl Into<String>) -> Vec<Effect> {
        if self.is_closed() {
            return Vec::new();
        }
        self.state.mode = ExchangeMode::Terminated;
        vec![Effect::Render(
            self.place(RenderUnit::plain_text(message), Tail::Settled),
        )]
    }

    /// Handles cancellation requested from outside the exchange.
    pub fn abort(&mut self) -> Vec<Effect> {
        if self.is_closed() {
            return Vec::new();
        }
        self.state.mode = ExchangeMode::Terminated;
        if self.state.tail == Some(Tail::Transient) {
            return vec![Effect::Render(
                self.place(RenderUnit::plain_text(CANCELLED_TEXT), Tail::Settled),
            )];
        }
        Vec::new()
    }

    fn apply_validation(&mut self, validation: ValidationErrorPayload) -> Vec<Effect> {
        if !validation.is_bias() {
            warn!(validator = %validation.validator, "ignoring non-bias validation error");
            return Vec::new();
        }
        info!(validator = %validation.validator, "bias validator rejected output, terminating exchange");
        if let Some(flagged) = validation.validated_output() {
            debug!(flagged_output = flagged, "flagged output withheld from chat");
        }
        let reason = format!(
            "The model attempted to generate content that may contain bias ({}). \
             Please be mindful of potentially harmful stereotypes or generalizations.",
            validation.validator
        );
        self.terminate(RenderUnit::error_card(BIAS_RESOURCE, reason))
    }

    fn apply_report_message(&mut self, message: MessagePayload) -> Vec<Effect> {
        match message {
            MessagePayload::Content(text) => {
                self.state.report_buffer.push_str(&text);
                vec![Effect::ReportDelta(text)]
            }
            _ => Vec::new(),
        }
    }

    fn apply_chat_message(&mut self, message: MessagePayload) -> Vec<Effect> {
        match message {
            MessagePayload::FunctionCall { name, arguments } => {
                if name == EMAIL_FUNCTION
                    && let CallArguments::Complete(args) = &arguments
                {
                    info!("email arguments complete, opening composer");
                    let draft = email_draft(args);
                    return self.terminate(RenderUnit::widget(Widget::EmailComposer { draft }));
                }
                debug!(function_name = %name, "function call in progress");
                let label = function_label(&name, &arguments);
                vec![Effect::Render(
                    self.place(RenderUnit::transient(label), Tail::Transient),
                )]
            }
            MessagePayload::ToolCall { name } => {
                let label = format!("Using tool: {}...", name.as_deref().unwrap_or("Processing"));
                vec![Effect::Render(
                    self.place(RenderUnit::transient(label), Tail::Transient),
                )]
            }
            MessagePayload::Content(text) => {
                self.state.text_buffer.push_str(&text);
                let unit = RenderUnit::plain_text(self.state.text_buffer.clone());
                vec![Effect::Render(self.place(unit, Tail::Text))]
            }
            MessagePayload::Empty => Vec::new(),
        }
    }

    /// Emits a terminal unit and asks the session to cancel the stream.
    fn terminate(&mut self, unit: RenderUnit) -> Vec<Effect> {
        self.state.mode = ExchangeMode::Terminated;
        vec![
            Effect::Render(self.place(unit, Tail::Settled)),
            Effect::Cancel,
        ]
    }

    /// Places a unit at the tail.
    ///
    /// Transient, text and final units replace a transient or text tail
    /// owned by this exchange. Settled units only replace a live transient.
    fn place(&mut self, unit: RenderUnit, tail: Tail) -> RenderOp {
        let replace = match (self.state.tail, tail) {
            (Some(Tail::Transient), _) => true,
            (Some(Tail::Text), Tail::Transient | Tail::Text | Tail::Final) => true,
            _ => false,
        };
        self.state.last_unit_is_transient = unit.is_transient();
        self.state.tail = Some(tail);
        if replace {
            RenderOp::ReplaceTail(unit)
        } else {
            RenderOp::Append(unit)
        }
    }
}

fn function_label(name: &str, arguments: &CallArguments) -> String {
    if name == EMAIL_FUNCTION {
        return match arguments {
            CallArguments::Incomplete(_) => "Generating email (gathering details)...".to_string(),
            CallArguments::Partial(_) => "Generating email (processing details)...".to_string(),
            _ => "Generating email...".to_string(),
        };
    }
    FUNCTION_LABELS
        .iter()
        .find(|(known, _)| *known == name)
        .map(|(_, label)| (*label).to_string())
        .unwrap_or_else(|| format!("Running {name}..."))
}

fn email_draft(args: &serde_json::Map<String, Value>) -> EmailDraft {
    let field = |key: &str| {
        args.get(key)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    };
    EmailDraft {
        to: field("to"),
        subject: field("subject"),
        body: field("body"),
    }
}
