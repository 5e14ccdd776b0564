use std::time::Duration;

use crate::errors::SessionError;

pub const DEFAULT_CHAT_PATH: &str = "/api/users/chat";
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;
pub const DEFAULT_STREAM_BUFFER_CAPACITY: usize = 64;

/// Configuration for talking to the chat backend.
#[derive(Clone, Debug)]
pub struct ChatClientConfig {
    /// Backend origin, for example `http://localhost:8000`.
    pub base_url: String,
    /// Path of the streaming chat endpoint.
    pub chat_path: String,
    /// Whole-request HTTP timeout, applied by the transport.
    pub timeout: Duration,
    /// Bounded channel size between the read loop and the consumer.
    pub stream_buffer_capacity: usize,
    pub user_agent: String,
}

impl ChatClientConfig {
    /// Creates a config with defaults for everything but the base URL.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            chat_path: DEFAULT_CHAT_PATH.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            stream_buffer_capacity: DEFAULT_STREAM_BUFFER_CAPACITY,
            user_agent: concat!("careerchat/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }

    /// Builds a config from `CAREERCHAT_BASE_URL`, `CAREERCHAT_CHAT_PATH`
    /// and `CAREERCHAT_TIMEOUT_SECS`.
    pub fn from_env() -> Result<Self, SessionError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as `from_env`, reading variables through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, SessionError> {
        let base_url = lookup("CAREERCHAT_BASE_URL").unwrap_or_default();
        if base_url.trim().is_empty() {
            return Err(SessionError::Config(
                "missing CAREERCHAT_BASE_URL for chat client".into(),
            ));
        }
        let mut config = Self::new(base_url.trim());
        if let Some(path) = lookup("CAREERCHAT_CHAT_PATH").filter(|p| !p.trim().is_empty()) {
            config = config.chat_path(path.trim());
        }
        if let Some(raw) = lookup("CAREERCHAT_TIMEOUT_SECS") {
            let secs: u64 = raw.trim().parse().map_err(|_| {
                SessionError::Config(format!("invalid CAREERCHAT_TIMEOUT_SECS: {raw}"))
            })?;
            config = config.timeout(Duration::from_secs(secs));
        }
        Ok(config)
    }

    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn chat_path(mut self, path: impl Into<String>) -> Self {
        self.chat_path = path.into();
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn stream_buffer_capacity(mut self, capacity: usize) -> Self {
        self.stream_buffer_capacity = capacity;
        self
    }

    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Full URL of the chat endpoint.
    pub fn chat_url(&self) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            self.chat_path.trim_start_matches('/')
        )
    }
}
