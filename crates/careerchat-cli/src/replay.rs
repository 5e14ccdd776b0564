use std::path::Path;

use anyhow::Context as _;
use bytes::Bytes;
use careerchat_ingest::{ByteStream, ChatRequest, ChatTransport, TransportError};
use futures::stream;

/// Serves a captured reply body from memory in fixed-size chunks.
pub struct FileReplayTransport {
    body: Bytes,
    chunk_size: usize,
}

impl FileReplayTransport {
    pub fn new(body: impl Into<Bytes>, chunk_size: usize) -> Self {
        Self {
            body: body.into(),
            chunk_size: chunk_size.max(1),
        }
    }

    pub fn from_path(path: &Path, chunk_size: usize) -> anyhow::Result<Self> {
        let body = std::fs::read(path)
            .with_context(|| format!("failed to read captured body {}", path.display()))?;
        Ok(Self::new(body, chunk_size))
    }

    fn chunks(&self) -> Vec<Bytes> {
        (0..self.body.len())
            .step_by(self.chunk_size)
            .map(|start| {
                let end = (start + self.chunk_size).min(self.body.len());
                self.body.slice(start..end)
            })
            .collect()
    }
}

#[async_trait::async_trait]
impl ChatTransport for FileReplayTransport {
    async fn open(&self, _request: &ChatRequest) -> Result<Option<ByteStream>, TransportError> {
        if self.body.is_empty() {
            return Ok(None);
        }
        let chunks: Vec<Result<Bytes, TransportError>> =
            self.chunks().into_iter().map(Ok).collect();
        Ok(Some(Box::pin(stream::iter(chunks))))
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write as _;
    use std::sync::Arc;

    use careerchat_ingest::{ExchangeEnd, RenderUnit, StreamSession};

    use super::*;

    #[test]
    fn chunks_cover_the_body_in_order() {
        let transport = FileReplayTransport::new(&b"abcdefg"[..], 3);
        let chunks = transport.chunks();
        assert_eq!(chunks, vec![Bytes::from("abc"), Bytes::from("def"), Bytes::from("g")]);
    }

    #[test]
    fn zero_chunk_size_is_clamped() {
        let transport = FileReplayTransport::new(&b"ab"[..], 0);
        assert_eq!(transport.chunks().len(), 2);
    }

    #[tokio::test]
    async fn replays_captured_body_through_session() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        write!(
            file,
            "data: {{\"payload_type\":\"message\",\"function_call\":true,\"function_name\":\"RouteQuery\"}}\n\n\
             data: {{\"payload_type\":\"message\",\"content\":\"show_calendar\"}}\n\n"
        )
        .expect("write body");

        let transport = FileReplayTransport::from_path(file.path(), 5).expect("load");
        let session = StreamSession::new(Arc::new(transport));
        let outcome = session
            .run(ChatRequest::new("replay"))
            .await
            .expect("run");
        assert_eq!(outcome.end, ExchangeEnd::Completed);
        assert_eq!(
            outcome.transcript.units(),
            &[RenderUnit::widget(careerchat_ingest::Widget::Calendar)]
        );
    }

    #[tokio::test]
    async fn empty_file_is_an_absent_body() {
        let file = tempfile::NamedTempFile::new().expect("temp file");
        let transport = FileReplayTransport::from_path(file.path(), 16).expect("load");
        assert!(transport
            .open(&ChatRequest::new("q"))
            .await
            .expect("open")
            .is_none());
    }

    #[test]
    fn missing_file_reports_path() {
        let err = match FileReplayTransport::from_path(Path::new("/no/such/body.sse"), 8) {
            Ok(_) => panic!("missing file should fail"),
            Err(err) => err,
        };
        assert!(err.to_string().contains("/no/such/body.sse"));
    }
}
