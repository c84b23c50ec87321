use super::{Chunks, ChunksError};

#[derive(Debug, PartialEq, Eq)]
pub enum Error {
    ChunksError(ChunksError),
    InvalidPayload,
}

/// A type for reading server-sent events from a chunk stream.
pub struct Sse {
    buf: String,
    // Trailing bytes of a character split across chunks.
    partial: Vec<u8>,
    chunks: Chunks,
}

impl Sse {
    #[inline]
    pub fn new(chunks: Chunks) -> Self {
        Self {
            buf: String::new(),
            partial: Vec::new(),
            chunks,
        }
    }

    /// Returns the data of the next event, or `None` when the stream ends.
    pub async fn next_event(&mut self) -> Result<Option<String>, Error> {
        loop {
            // Drain what is already buffered before waiting on the network.
            if let Some(event) = self.try_parse_event()? {
                return Ok(Some(event));
            }

            let Some(bytes) =
                self.chunks.next_chunk().await.map_err(Error::ChunksError)?
            else {
                return Ok(None);
            };
            self.partial.extend_from_slice(&bytes);
            let valid_len = match str::from_utf8(&self.partial) {
                Ok(s) => s.len(),
                Err(err) if err.error_len().is_none() => err.valid_up_to(),
                Err(_) => return Err(Error::InvalidPayload),
            };
            let rest = self.partial.split_off(valid_len);
            let text = String::from_utf8(std::mem::replace(&mut self.partial, rest))
                .map_err(|_| Error::InvalidPayload)?;
            // Only line feeds are treated as line terminators.
            self.buf.push_str(&text.replace('\r', ""));
        }
    }

    fn try_parse_event(&mut self) -> Result<Option<String>, Error> {
        // event         = *( comment / field ) end-of-line
        // comment       = colon *any-char end-of-line
        // field         = 1*name-char [ colon [ space ] *any-char ] end-of-line
        while let Some(eol_idx) = self.buf.find("\n\n") {
            let mut data: Option<String> = None;
            for line in self.buf[0..eol_idx].lines() {
                if line.starts_with(':') {
                    continue;
                }
                let Some((name, value)) = line.split_once(':') else {
                    return Err(Error::InvalidPayload);
                };
                // Fields other than `data` (`event`, `id`, `retry`) are
                // irrelevant to completion streams.
                if name != "data" {
                    continue;
                }
                let value = value.strip_prefix(' ').unwrap_or(value);
                match &mut data {
                    Some(data) => {
                        data.push('\n');
                        data.push_str(value);
                    }
                    None => data = Some(value.to_owned()),
                }
            }

            // Consume the bytes from the buffer.
            self.buf.drain(0..eol_idx + 2);

            // Keepalive comments produce events without data.
            if data.is_some() {
                return Ok(data);
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;

    #[tokio::test]
    async fn test_normal_events() {
        let chunks = Chunks::from_vec_deque(
            vec![
                Bytes::from_static(b"data: hello\n\n"),
                Bytes::from_static(b"data: bye\n\n"),
            ]
            .into(),
        );
        let mut sse = Sse::new(chunks);
        assert_eq!(sse.next_event().await.unwrap().unwrap(), "hello");
        assert_eq!(sse.next_event().await.unwrap().unwrap(), "bye");
        assert_eq!(sse.next_event().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_many_events_in_one_chunk() {
        let chunks = Chunks::from_vec_deque(
            vec![Bytes::from_static(b"data: a\n\ndata: b\n\ndata: c\n\n")]
                .into(),
        );
        let mut sse = Sse::new(chunks);
        assert_eq!(sse.next_event().await.unwrap().unwrap(), "a");
        assert_eq!(sse.next_event().await.unwrap().unwrap(), "b");
        assert_eq!(sse.next_event().await.unwrap().unwrap(), "c");
        assert_eq!(sse.next_event().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_quirk_streaming() {
        let chunks = Chunks::from_vec_deque(
            vec![
                Bytes::from_static(b"data:"),
                Bytes::from_static(b" hello\r\n"),
                Bytes::from_static(b"\r\n"),
            ]
            .into(),
        );
        let mut sse = Sse::new(chunks);
        assert_eq!(sse.next_event().await.unwrap().unwrap(), "hello");
        assert_eq!(sse.next_event().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_split_utf8() {
        let bytes = "data: héllo\n\n".as_bytes();
        let chunks = Chunks::from_vec_deque(
            vec![
                Bytes::copy_from_slice(&bytes[..8]),
                Bytes::copy_from_slice(&bytes[8..]),
            ]
            .into(),
        );
        let mut sse = Sse::new(chunks);
        assert_eq!(sse.next_event().await.unwrap().unwrap(), "héllo");
    }

    #[tokio::test]
    async fn test_comments_and_other_fields() {
        let chunks = Chunks::from_vec_deque(
            vec![Bytes::from_static(
                b": PROCESSING\n\nevent: message\nid: 7\ndata: {}\n\n",
            )]
            .into(),
        );
        let mut sse = Sse::new(chunks);
        assert_eq!(sse.next_event().await.unwrap().unwrap(), "{}");
        assert_eq!(sse.next_event().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_invalid_data() {
        let chunks = Chunks::from_vec_deque(
            vec![Bytes::from_static(b"xxxxxx\n\n")].into(),
        );
        let mut sse = Sse::new(chunks);
        assert_eq!(sse.next_event().await.unwrap_err(), Error::InvalidPayload);

        let chunks = Chunks::from_vec_deque(
            vec![Bytes::from_static(b"xxxxxx\n")].into(),
        );
        let mut sse = Sse::new(chunks);
        assert_eq!(sse.next_event().await.unwrap(), None);

        let chunks = Chunks::from_vec_deque(
            vec![
                Bytes::from_static(b"data: hello\n"),
                Bytes::from_static(b"data: bye\n"),
            ]
            .into(),
        );
        let mut sse = Sse::new(chunks);
        assert_eq!(sse.next_event().await.unwrap(), None);
    }
}
