use std::pin::Pin;

use futures::StreamExt as _;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::ChatClientConfig;
use crate::errors::TransportError;

/// Raw body chunks of one streamed reply.
pub type ByteStream =
    Pin<Box<dyn futures::Stream<Item = Result<bytes::Bytes, TransportError>> + Send + 'static>>;

/// Body posted to the chat endpoint.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub query: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidentiality: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<String>,
}

impl ChatRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Self::default()
        }
    }

    /// Sets the confidentiality level forwarded to the backend.
    pub fn confidentiality(mut self, level: impl Into<String>) -> Self {
        self.confidentiality = Some(level.into());
        self
    }

    /// Appends a source identifier the backend may restrict retrieval to.
    pub fn source(mut self, source: impl Into<String>) -> Self {
        self.sources.push(source.into());
        self
    }
}

/// Seam between the session and the network.
///
/// `Ok(None)` means the endpoint answered successfully but with no body.
#[async_trait::async_trait]
pub trait ChatTransport: Send + Sync {
    async fn open(&self, request: &ChatRequest) -> Result<Option<ByteStream>, TransportError>;
}

/// `ChatTransport` over HTTP using `reqwest`.
pub struct ReqwestTransport {
    client: reqwest::Client,
    url: String,
}

impl ReqwestTransport {
    pub fn new(config: &ChatClientConfig) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| TransportError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            url: config.chat_url(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait::async_trait]
impl ChatTransport for ReqwestTransport {
    async fn open(&self, request: &ChatRequest) -> Result<Option<ByteStream>, TransportError> {
        debug!(url = %self.url, "posting chat request");
        let response = self
            .client
            .post(&self.url)
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .json(request)
            .send()
            .await
            .map_err(|e| TransportError::connect(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TransportError::status(status.as_u16(), body.trim()));
        }
        if response.content_length() == Some(0) {
            return Ok(None);
        }

        let stream = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(|e| TransportError::read(e.to_string())));
        Ok(Some(Box::pin(stream)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_omits_unset_metadata() {
        let body = serde_json::to_value(ChatRequest::new("find jobs")).expect("serialize");
        assert_eq!(body, serde_json::json!({"query": "find jobs"}));
    }

    #[test]
    fn request_carries_metadata_when_set() {
        let request = ChatRequest::new("q")
            .confidentiality("internal")
            .source("resume.pdf");
        let body = serde_json::to_value(&request).expect("serialize");
        assert_eq!(
            body,
            serde_json::json!({
                "query": "q",
                "confidentiality": "internal",
                "sources": ["resume.pdf"]
            })
        );
    }

    #[test]
    fn reqwest_transport_targets_configured_chat_url() {
        let config = ChatClientConfig::new("http://localhost:8000/");
        let transport = ReqwestTransport::new(&config).expect("client");
        assert_eq!(transport.url(), "http://localhost:8000/api/users/chat");
    }
}
