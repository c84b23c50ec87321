use std::pin::Pin;
use std::task::{Context, Poll, ready};

use loupe_model::{ErrorKind, ModelResponse, ResponseChunk};
use pin_project_lite::pin_project;

use crate::Error;
use crate::io::Sse;
use crate::proto::ChatCompletionChunk;

type PinnedFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;
type NextChunk = Result<(Option<ResponseChunk>, Sse), Error>;

pin_project! {
    /// A streamed chat completion, one model chunk per server event.
    pub struct OpenAIResponse {
        next_chunk_fut: Option<PinnedFuture<NextChunk>>,
    }
}

impl OpenAIResponse {
    #[inline]
    pub fn from_sse(sse: Sse) -> Self {
        Self {
            next_chunk_fut: Some(Box::pin(next_chunk(sse))),
        }
    }
}

impl ModelResponse for OpenAIResponse {
    type Error = crate::Error;

    fn poll_next_chunk(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Result<Option<ResponseChunk>, Self::Error>> {
        let this = self.project();
        let Some(next_chunk_fut) = this.next_chunk_fut else {
            return Poll::Ready(Ok(None));
        };
        let (chunk, sse) = match ready!(next_chunk_fut.as_mut().poll(cx)) {
            Ok((Some(chunk), sse)) => (chunk, sse),
            Ok((None, _)) => {
                // Dropping the reader releases the connection.
                *this.next_chunk_fut = None;
                return Poll::Ready(Ok(None));
            }
            Err(err) => {
                *this.next_chunk_fut = None;
                return Poll::Ready(Err(err));
            }
        };

        // The stream may still have more data to pull, create a new future for
        // the next chunk.
        *this.next_chunk_fut = Some(Box::pin(next_chunk(sse)));

        Poll::Ready(Ok(Some(chunk)))
    }
}

async fn next_chunk(mut sse: Sse) -> NextChunk {
    let sse_event = match sse.next_event().await {
        Ok(Some(event)) => event,
        Ok(None) => return Ok((None, sse)),
        Err(err) => {
            return Err(Error::new(
                format!("failed to read event stream: {err:?}"),
                ErrorKind::Other,
            ));
        }
    };
    trace!("got sse event: {sse_event}");
    if sse_event == "[DONE]" {
        return Ok((None, sse));
    }

    let chunk = serde_json::from_str::<ChatCompletionChunk>(&sse_event)
        .map_err(|err| {
            Error::new(format!("malformed chunk: {err}"), ErrorKind::Other)
        })?;
    Ok((Some(chunk.into_response_chunk()), sse))
}

#[cfg(test)]
mod tests {
    use std::future::poll_fn;
    use std::pin::pin;

    use bytes::Bytes;
    use loupe_model::{ChunkDelta, ToolCallDelta};

    use super::*;
    use crate::io::Chunks;

    const TOOL_CALL_STREAM: &str = concat!(
        "data: {\"id\":\"a\",\"choices\":[{\"index\":0,\"delta\":{\"role\":\"assistant\",\"reasoning_content\":\"Let me check.\"}}]}\n\n",
        "data: {\"id\":\"a\",\"choices\":[{\"index\":0,\"delta\":{\"tool_calls\":[{\"index\":0,\"id\":\"c1\",\"type\":\"function\",\"function\":{\"name\":\"get_current_time\",\"arguments\":\"\"}}]}}]}\n\n",
        "data: {\"id\":\"a\",\"choices\":[{\"index\":0,\"delta\":{\"tool_calls\":[{\"index\":0,\"function\":{\"arguments\":\"{\\\"timezone\\\":\"}}]}}]}\n\n",
        "data: {\"id\":\"a\",\"choices\":[{\"index\":0,\"delta\":{\"tool_calls\":[{\"index\":0,\"function\":{\"arguments\":\"\\\"UTC\\\"}\"}}]}}]}\n\n",
        "data: {\"id\":\"a\",\"choices\":[{\"index\":0,\"delta\":{},\"finish_reason\":\"tool_calls\"}]}\n\n",
        "data: [DONE]\n\n",
    );

    async fn collect(chunks: Chunks) -> Result<Vec<ResponseChunk>, Error> {
        let mut resp = pin!(OpenAIResponse::from_sse(Sse::new(chunks)));
        let mut collected = vec![];
        while let Some(chunk) =
            poll_fn(|cx| resp.as_mut().poll_next_chunk(cx)).await?
        {
            collected.push(chunk);
        }
        Ok(collected)
    }

    #[tokio::test]
    async fn test_tool_call_stream() {
        let chunks = Chunks::from_vec_deque(
            vec![Bytes::from_static(TOOL_CALL_STREAM.as_bytes())].into(),
        );
        let collected = collect(chunks).await.unwrap();
        assert_eq!(collected.len(), 5);
        assert_eq!(collected[0], ResponseChunk::reasoning("Let me check."));
        assert_eq!(
            collected[1],
            ResponseChunk::tool_calls([ToolCallDelta {
                index: 0,
                id: Some("c1".to_owned()),
                name: Some("get_current_time".to_owned()),
                arguments: Some(String::new()),
            }])
        );
        assert_eq!(
            collected[2],
            ResponseChunk::tool_calls([ToolCallDelta::arguments(
                0,
                "{\"timezone\":"
            )])
        );
        assert_eq!(
            collected[4],
            ResponseChunk::with_delta(ChunkDelta::default())
        );
    }

    #[tokio::test]
    async fn test_stream_ends_without_done() {
        let chunks = Chunks::from_vec_deque(
            vec![Bytes::from_static(
                b"data: {\"choices\":[{\"delta\":{\"content\":\"Hi\"}}]}\n\n",
            )]
            .into(),
        );
        let collected = collect(chunks).await.unwrap();
        assert_eq!(collected, vec![ResponseChunk::content("Hi")]);
    }

    #[tokio::test]
    async fn test_malformed_chunk() {
        let chunks = Chunks::from_vec_deque(
            vec![Bytes::from_static(b"data: {not json\n\n")].into(),
        );
        let err = collect(chunks).await.unwrap_err();
        assert!(err.message().starts_with("malformed chunk"));
    }
}
