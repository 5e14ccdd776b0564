//! Decodes one frame body into a tagged `Payload`.

use serde::Deserialize;
use serde_json::Value;

use crate::errors::PayloadError;

/// Validator names that flag biased output.
const BIAS_VALIDATORS: &[&str] = &["customdetectbias", "detect-bias"];

/// One decoded event of the reply stream.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// Content fragment, function call or tool call.
    Message(MessagePayload),
    /// Backend-side action or error.
    Values(ValuesPayload),
    /// Output rejected by a backend validator.
    ValidationError(ValidationErrorPayload),
    /// Any other `payload_type` (or none at all); ignored by the state machine.
    Unknown { payload_type: Option<String> },
}

impl Payload {
    /// Wire name of the payload type, for logging.
    pub fn type_name(&self) -> &str {
        match self {
            Self::Message(_) => "message",
            Self::Values(_) => "values",
            Self::ValidationError(_) => "validation_error",
            Self::Unknown { payload_type } => payload_type.as_deref().unwrap_or("<none>"),
        }
    }
}

/// The single role carried by a `message` payload.
///
/// The wire record may set several fields; the role is picked in the order
/// function call, tool call, content.
#[derive(Debug, Clone, PartialEq)]
pub enum MessagePayload {
    FunctionCall {
        name: String,
        arguments: CallArguments,
    },
    ToolCall {
        name: Option<String>,
    },
    Content(String),
    /// Nothing renderable (for example an empty content chunk).
    Empty,
}

/// Arguments attached to a function call, classified by completeness.
#[derive(Debug, Clone, PartialEq)]
pub enum CallArguments {
    Absent,
    /// Raw argument text still streaming in.
    Partial(String),
    /// Object the backend flagged with `"status": "incomplete"`.
    Incomplete(serde_json::Map<String, Value>),
    /// Fully decoded argument object.
    Complete(serde_json::Map<String, Value>),
}

impl CallArguments {
    fn from_value(value: Option<Value>) -> Self {
        match value {
            None | Some(Value::Null) => Self::Absent,
            Some(Value::String(text)) => Self::Partial(text),
            Some(Value::Object(map)) => {
                if map.get("status").and_then(Value::as_str) == Some("incomplete") {
                    Self::Incomplete(map)
                } else {
                    Self::Complete(map)
                }
            }
            Some(other) => Self::Partial(other.to_string()),
        }
    }

    /// True when the arguments are a complete, decoded object.
    pub fn is_complete(&self) -> bool {
        matches!(self, Self::Complete(_))
    }
}

/// Body of a `values` payload.
#[derive(Debug, Clone, PartialEq)]
pub enum ValuesPayload {
    /// Backend-declared error (non-empty).
    Error(String),
    /// `action == "generate_report"`.
    GenerateReport,
    /// Any other values record (unknown action, final answers, ...).
    Other,
}

/// Body of a `validation_error` payload.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationErrorPayload {
    pub validator: String,
    pub details: Value,
}

impl ValidationErrorPayload {
    /// True for the bias-detection validator.
    pub fn is_bias(&self) -> bool {
        let name = self.validator.trim().to_ascii_lowercase();
        BIAS_VALIDATORS.contains(&name.as_str())
    }

    /// The output text the validator flagged, when present.
    pub fn validated_output(&self) -> Option<&str> {
        self.details.get("validatedOutput").and_then(Value::as_str)
    }
}

#[derive(Deserialize)]
struct WireMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    function_call: Option<bool>,
    #[serde(default)]
    function_name: Option<String>,
    #[serde(default)]
    arguments: Option<Value>,
    #[serde(default)]
    tool_call: Option<bool>,
    #[serde(default)]
    tool_name: Option<String>,
}

#[derive(Deserialize)]
struct WireValues {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    action: Option<String>,
}

#[derive(Deserialize)]
struct WireValidationError {
    #[serde(default)]
    validator: String,
    #[serde(default)]
    details: Value,
}

/// Parses a frame body with strict JSON decoding.
///
/// Unknown payload types decode to `Payload::Unknown` rather than an error.
pub fn parse_payload(frame_body: &str) -> Result<Payload, PayloadError> {
    let value: Value = serde_json::from_str(frame_body)
        .map_err(|e| PayloadError::InvalidJson(e.to_string()))?;
    payload_from_value(value)
}

/// Classifies an already decoded JSON value by its `payload_type` field.
pub fn payload_from_value(value: Value) -> Result<Payload, PayloadError> {
    let payload_type = value
        .get("payload_type")
        .and_then(Value::as_str)
        .map(ToOwned::to_owned);
    match payload_type.as_deref() {
        Some("message") => {
            let wire: WireMessage = decode_shape("message", value)?;
            Ok(Payload::Message(message_from_wire(wire)))
        }
        Some("values") => {
            let wire: WireValues = decode_shape("values", value)?;
            Ok(Payload::Values(values_from_wire(wire)))
        }
        Some("validation_error") => {
            let wire: WireValidationError = decode_shape("validation_error", value)?;
            Ok(Payload::ValidationError(ValidationErrorPayload {
                validator: wire.validator,
                details: wire.details,
            }))
        }
        _ => Ok(Payload::Unknown { payload_type }),
    }
}

fn decode_shape<T: serde::de::DeserializeOwned>(
    payload_type: &str,
    value: Value,
) -> Result<T, PayloadError> {
    serde_json::from_value(value).map_err(|e| PayloadError::InvalidShape {
        payload_type: payload_type.to_string(),
        message: e.to_string(),
    })
}

fn message_from_wire(wire: WireMessage) -> MessagePayload {
    if wire.function_call.unwrap_or(false) {
        return MessagePayload::FunctionCall {
            name: wire
                .function_name
                .filter(|n| !n.trim().is_empty())
                .unwrap_or_else(|| "unknown".to_string()),
            arguments: CallArguments::from_value(wire.arguments),
        };
    }
    if wire.tool_call.unwrap_or(false) {
        return MessagePayload::ToolCall {
            name: wire.tool_name.filter(|n| !n.trim().is_empty()),
        };
    }
    match wire.content {
        Some(content) if !content.is_empty() => MessagePayload::Content(content),
        _ => MessagePayload::Empty,
    }
}

fn values_from_wire(wire: WireValues) -> ValuesPayload {
    if let Some(error) = wire.error.filter(|e| !e.trim().is_empty()) {
        return ValuesPayload::Error(error);
    }
    match wire.action.as_deref() {
        Some("generate_report") => ValuesPayload::GenerateReport,
        _ => ValuesPayload::Other,
    }
}
