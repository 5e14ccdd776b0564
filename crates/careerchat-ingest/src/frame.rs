//! Splits the incrementally delivered reply body into `data:` frames.

use tracing::trace;

/// Prefix that marks a frame as carrying a payload.
pub const DATA_PREFIX: &str = "data:";

/// One complete frame body with the `data:` prefix stripped and trimmed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub body: String,
}

impl Frame {
    /// Creates a frame from an already stripped body.
    pub fn new(body: impl Into<String>) -> Self {
        Self { body: body.into() }
    }
}

/// Incremental frame splitter with a carry-over buffer.
///
/// Bytes are buffered raw and only complete frames are decoded, so a UTF-8
/// sequence split across two reads is reassembled before decoding.
#[derive(Debug, Default)]
pub struct FrameSplitter {
    buf: Vec<u8>,
    /// Prefix of `buf` already searched without finding a delimiter.
    scanned: usize,
}

impl FrameSplitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds a text chunk and returns the frames it completed.
    pub fn feed(&mut self, chunk: &str) -> Vec<Frame> {
        self.push_chunk(chunk.as_bytes())
    }

    /// Feeds a raw byte chunk and returns the frames it completed.
    ///
    /// The trailing segment after the last delimiter is kept as carry-over
    /// for the next call. Segments without the `data:` prefix, or that trim to
    /// nothing, are dropped. The search resumes near where the previous call
    /// stopped, so a long frame arriving in many small reads is scanned once.
    pub fn push_chunk(&mut self, chunk: &[u8]) -> Vec<Frame> {
        self.buf.extend_from_slice(chunk);
        let mut frames = Vec::new();
        let mut consumed = 0;
        // A delimiter may straddle the previous read.
        let mut from = self.scanned.saturating_sub(LONGEST_DELIMITER - 1);
        while let Some((idx, delim_len)) = find_frame_delimiter(&self.buf[consumed..], from) {
            let segment = &self.buf[consumed..consumed + idx];
            if let Some(frame) = parse_frame(segment) {
                frames.push(frame);
            }
            consumed += idx + delim_len;
            from = 0;
        }
        self.buf.drain(..consumed);
        self.scanned = self.buf.len();
        frames
    }

    /// Flushes the carry-over at end of data.
    ///
    /// Returns a frame when the body ended without a trailing delimiter.
    pub fn finish(&mut self) -> Option<Frame> {
        let rest = std::mem::take(&mut self.buf);
        self.scanned = 0;
        parse_frame(&rest)
    }

    /// Number of carried-over bytes not yet part of a complete frame.
    pub fn pending_len(&self) -> usize {
        self.buf.len()
    }
}

const FRAME_DELIMITERS: [&[u8]; 2] = [b"\n\n", b"\r\n\r\n"];
const LONGEST_DELIMITER: usize = 4;

/// Finds the first frame delimiter starting at or after `from`.
///
/// Returns its offset in `buf` and its length.
fn find_frame_delimiter(buf: &[u8], from: usize) -> Option<(usize, usize)> {
    (from..buf.len()).find_map(|i| {
        FRAME_DELIMITERS
            .iter()
            .find(|delim| buf[i..].starts_with(delim))
            .map(|delim| (i, delim.len()))
    })
}

fn parse_frame(bytes: &[u8]) -> Option<Frame> {
    if bytes.is_empty() {
        return None;
    }
    let text = String::from_utf8_lossy(bytes);
    let Some(rest) = text.trim_start().strip_prefix(DATA_PREFIX) else {
        trace!(segment_len = bytes.len(), "dropping non-data segment");
        return None;
    };
    let body = rest.trim();
    if body.is_empty() {
        return None;
    }
    Some(Frame::new(body))
}
