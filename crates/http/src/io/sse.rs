use std::collections::VecDeque;

use super::{Chunks, ChunksError};

const BOM: &[u8] = b"\xEF\xBB\xBF";

#[derive(Debug, PartialEq, Eq)]
pub enum Error {
    ChunksError(ChunksError),
}

/// A dispatched server-sent event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SseFrame {
    /// The event name, `message` when the server did not set one.
    pub event: String,
    /// Data lines joined with `\n`.
    pub data: String,
    /// The last event id seen on the stream.
    pub id: Option<String>,
}

#[derive(Default)]
struct PendingFrame {
    event: Option<String>,
    data: String,
}

/// A type for reading server-sent events from a chunk stream.
///
/// Chunks may split lines, fields and even UTF-8 sequences anywhere;
/// bytes are buffered until a full line is available. A frame that is
/// not terminated by a blank line before the end of the stream is
/// discarded.
pub struct Sse {
    chunks: Chunks,
    buf: Vec<u8>,
    // Leading bytes of `buf` known to hold no line ending.
    scanned: usize,
    bom_checked: bool,
    pending: PendingFrame,
    last_event_id: Option<String>,
    frames: VecDeque<SseFrame>,
    ended: bool,
}

impl Sse {
    #[inline]
    pub fn new(chunks: Chunks) -> Self {
        Self {
            chunks,
            buf: Vec::new(),
            scanned: 0,
            bom_checked: false,
            pending: PendingFrame::default(),
            last_event_id: None,
            frames: VecDeque::new(),
            ended: false,
        }
    }

    /// Returns the next frame, reading more chunks as needed.
    ///
    /// `Ok(None)` means the stream has ended. After an error the reader
    /// is finished as well.
    pub async fn next_frame(&mut self) -> Result<Option<SseFrame>, Error> {
        loop {
            if let Some(frame) = self.frames.pop_front() {
                return Ok(Some(frame));
            }
            if self.ended {
                return Ok(None);
            }

            match self.chunks.next_chunk().await {
                Ok(Some(bytes)) => self.feed(&bytes),
                Ok(None) => {
                    self.ended = true;
                    self.finish();
                }
                Err(err) => {
                    self.ended = true;
                    return Err(Error::ChunksError(err));
                }
            }
        }
    }

    fn feed(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);

        if !self.bom_checked {
            if self.buf.len() < BOM.len() && BOM.starts_with(&self.buf) {
                // Not enough bytes to tell yet.
                return;
            }
            if self.buf.starts_with(BOM) {
                self.buf.drain(..BOM.len());
            }
            self.bom_checked = true;
        }

        let mut consumed = 0;
        let mut from = self.scanned;
        while let Some((line_len, advance)) =
            find_line_end(&self.buf[consumed..], from)
        {
            from = 0;
            // Line breaks are ASCII, so a complete line never ends in the
            // middle of a UTF-8 sequence.
            let line = String::from_utf8_lossy(
                &self.buf[consumed..consumed + line_len],
            )
            .into_owned();
            consumed += advance;
            self.process_line(&line);
        }
        self.buf.drain(..consumed);
        // Only a trailing CR may still turn out to end a line.
        let pending_cr = self.buf.last() == Some(&b'\r');
        self.scanned = self.buf.len() - usize::from(pending_cr);
    }

    fn finish(&mut self) {
        // A trailing CR is a complete line ending once nothing can follow.
        if self.buf.last() == Some(&b'\r') {
            let line =
                String::from_utf8_lossy(&self.buf[..self.buf.len() - 1])
                    .into_owned();
            self.process_line(&line);
        }
        if !self.buf.is_empty() || !self.pending.data.is_empty() {
            trace!("dropping an unterminated frame at the end of stream");
        }
        self.buf.clear();
        self.scanned = 0;
    }

    // event         = *( comment / field ) end-of-line
    // comment       = colon *any-char end-of-line
    // field         = 1*name-char [ colon [ space ] *any-char ] end-of-line
    fn process_line(&mut self, line: &str) {
        if line.is_empty() {
            self.dispatch();
            return;
        }
        if line.starts_with(':') {
            return;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => {
                (field, value.strip_prefix(' ').unwrap_or(value))
            }
            None => (line, ""),
        };
        match field {
            "event" => self.pending.event = Some(value.to_owned()),
            "data" => {
                self.pending.data.push_str(value);
                self.pending.data.push('\n');
            }
            "id" => {
                if !value.contains('\0') {
                    self.last_event_id = Some(value.to_owned());
                }
            }
            // Streams are never reconnected, so the hint is unused.
            "retry" => {}
            _ => trace!("ignoring unknown sse field: {field}"),
        }
    }

    fn dispatch(&mut self) {
        let PendingFrame { event, mut data } =
            std::mem::take(&mut self.pending);
        if data.is_empty() {
            return;
        }
        data.pop();
        self.frames.push_back(SseFrame {
            event: event.unwrap_or_else(|| "message".to_owned()),
            data,
            id: self.last_event_id.clone(),
        });
    }
}

/// Finds the first line ending in `buf`, searching from `from`, and
/// returns the line length and the number of bytes to skip past the
/// ending.
///
/// A CR at the very end is ambiguous (a LF may follow in the next
/// chunk), so it does not count as a line ending yet.
fn find_line_end(buf: &[u8], from: usize) -> Option<(usize, usize)> {
    let pos = from
        + buf[from..]
            .iter()
            .position(|&b| b == b'\n' || b == b'\r')?;
    if buf[pos] == b'\n' {
        return Some((pos, pos + 1));
    }
    match buf.get(pos + 1) {
        Some(b'\n') => Some((pos, pos + 2)),
        Some(_) => Some((pos, pos + 1)),
        None => None,
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;

    fn sse_from(chunks: &[&'static [u8]]) -> Sse {
        let chunks = chunks.iter().map(|c| Bytes::from_static(*c)).collect();
        Sse::new(Chunks::from_vec_deque(chunks))
    }

    async fn next_data(sse: &mut Sse) -> Option<String> {
        sse.next_frame().await.unwrap().map(|frame| frame.data)
    }

    #[tokio::test]
    async fn test_normal_events() {
        let mut sse = sse_from(&[b"data: hello\n\n", b"data: bye\n\n"]);
        let frame = sse.next_frame().await.unwrap().unwrap();
        assert_eq!(frame.event, "message");
        assert_eq!(frame.data, "hello");
        assert_eq!(next_data(&mut sse).await.unwrap(), "bye");
        assert_eq!(sse.next_frame().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_quirk_streaming() {
        let mut sse = sse_from(&[b"da", b"ta:", b" hello\n", b"\n"]);
        assert_eq!(next_data(&mut sse).await.unwrap(), "hello");
        assert_eq!(sse.next_frame().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_several_frames_in_one_chunk() {
        let mut sse = sse_from(&[b"data: a\n\ndata: b\n\ndata: c"]);
        assert_eq!(next_data(&mut sse).await.unwrap(), "a");
        assert_eq!(next_data(&mut sse).await.unwrap(), "b");
        // `c` is never terminated.
        assert_eq!(sse.next_frame().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_named_event_and_id() {
        let mut sse = sse_from(&[
            b"id: 7\nevent: update\ndata: one\n\n",
            b"data: two\n\n",
        ]);
        let frame = sse.next_frame().await.unwrap().unwrap();
        assert_eq!(
            frame,
            SseFrame {
                event: "update".to_owned(),
                data: "one".to_owned(),
                id: Some("7".to_owned()),
            }
        );
        // The event name resets, the id persists.
        let frame = sse.next_frame().await.unwrap().unwrap();
        assert_eq!(frame.event, "message");
        assert_eq!(frame.id.as_deref(), Some("7"));
    }

    #[tokio::test]
    async fn test_multiline_data_and_comments() {
        let mut sse = sse_from(&[
            b": keep-alive\n\n",
            b"data: first\n: interleaved\ndata:second\n\n",
        ]);
        assert_eq!(next_data(&mut sse).await.unwrap(), "first\nsecond");
        assert_eq!(sse.next_frame().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_line_endings() {
        let mut sse = sse_from(&[b"data: crlf\r", b"\n\r\n", b"data: cr\r\r"]);
        assert_eq!(next_data(&mut sse).await.unwrap(), "crlf");
        assert_eq!(next_data(&mut sse).await.unwrap(), "cr");
        assert_eq!(sse.next_frame().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_split_utf8_and_bom() {
        // "é" is 0xC3 0xA9.
        let mut sse =
            sse_from(&[b"\xEF\xBB", b"\xBFdata: caf\xC3", b"\xA9\n\n"]);
        assert_eq!(next_data(&mut sse).await.unwrap(), "café");
    }

    #[tokio::test]
    async fn test_invalid_data() {
        let mut sse = sse_from(&[b"xxxxxx\n\n"]);
        assert_eq!(sse.next_frame().await.unwrap(), None);

        let mut sse = sse_from(&[b"xxxxxx\n"]);
        assert_eq!(sse.next_frame().await.unwrap(), None);

        let mut sse = sse_from(&[b"data: hello\n", b"data: bye\n"]);
        assert_eq!(sse.next_frame().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_long_line_in_small_chunks() {
        let line = format!("data: {}\r\n\r\n", "x".repeat(4096));
        let chunks = line
            .as_bytes()
            .chunks(3)
            .map(Bytes::copy_from_slice)
            .collect();
        let mut sse = Sse::new(Chunks::from_vec_deque(chunks));
        assert_eq!(next_data(&mut sse).await.unwrap(), "x".repeat(4096));
        assert_eq!(sse.next_frame().await.unwrap(), None);
    }

    #[test]
    fn test_find_line_end_from_offset() {
        assert_eq!(find_line_end(b"abc\ndef\n", 0), Some((3, 4)));
        assert_eq!(find_line_end(b"abcdef\n", 4), Some((6, 7)));
        assert_eq!(find_line_end(b"abc\r", 2), None);
        assert_eq!(find_line_end(b"abc\r\n", 3), Some((3, 5)));
        assert_eq!(find_line_end(b"abc", 3), None);
    }

    #[tokio::test]
    async fn test_empty_data_field() {
        let mut sse = sse_from(&[b"event: ping\n\ndata:\n\n"]);
        let frame = sse.next_frame().await.unwrap().unwrap();
        assert_eq!(frame.event, "message");
        assert_eq!(frame.data, "");
        assert_eq!(sse.next_frame().await.unwrap(), None);
    }
}
