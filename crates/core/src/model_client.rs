use std::pin::Pin;
use std::sync::Arc;
use std::task::{Poll, ready};

use futures_util::Stream;
use futures_util::stream::poll_fn;
use loupe_model::{
    ModelProvider, ModelProviderError, ModelRequest, ModelResponse,
    ResponseChunk,
};
use tracing::Instrument;

/// A type-erased stream of response chunks.
pub type ChunkStream = Pin<
    Box<
        dyn Stream<Item = Result<ResponseChunk, Box<dyn ModelProviderError>>>
            + Send,
    >,
>;

type SendRequestResult = Result<ChunkStream, Box<dyn ModelProviderError>>;
type BoxedSendRequestFuture =
    Pin<Box<dyn Future<Output = SendRequestResult> + Send>>;
type HandlerFn =
    Arc<dyn Fn(ModelRequest) -> BoxedSendRequestFuture + Send + Sync>;

/// A wrapper around a model provider that provides a type-erased interface
/// for the other modules.
#[derive(Clone)]
pub struct ModelClient {
    model_id: Arc<str>,
    handler_fn: HandlerFn,
}

impl ModelClient {
    #[inline]
    pub fn new<P: ModelProvider + 'static>(provider: P) -> Self {
        let model_id = Arc::from(provider.model_id());
        // We have to erase the type `P`, since `ModelClient` doesn't have a
        // generic parameter and we don't want it either.
        let handler_fn: HandlerFn = Arc::new(move |req| {
            let fut = provider.send_request(&req);
            Box::pin(
                async move {
                    trace!(
                        "sending a request with {} messages",
                        req.messages.len()
                    );
                    match fut.await {
                        Ok(resp) => Ok(into_chunk_stream(resp)),
                        Err(err) => {
                            debug!("request failed: {err}");
                            Err(Box::new(err) as Box<dyn ModelProviderError>)
                        }
                    }
                }
                .instrument(trace_span!("model client req")),
            )
        });
        Self {
            model_id,
            handler_fn,
        }
    }

    /// Returns the identifier of the model behind this client.
    #[inline]
    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    /// Sends a request and returns the stream of its response.
    ///
    /// Dropping the stream releases the response, at any point.
    #[inline]
    pub async fn send_request(&self, req: ModelRequest) -> SendRequestResult {
        (self.handler_fn)(req).await
    }
}

fn into_chunk_stream<R: ModelResponse>(resp: R) -> ChunkStream {
    let mut resp = Box::pin(resp);
    let mut done = false;
    Box::pin(poll_fn(move |cx| {
        if done {
            return Poll::Ready(None);
        }
        let item = match ready!(resp.as_mut().poll_next_chunk(cx)) {
            Ok(Some(chunk)) => Some(Ok(chunk)),
            Ok(None) => None,
            Err(err) => {
                debug!("response failed: {err}");
                Some(Err(Box::new(err) as Box<dyn ModelProviderError>))
            }
        };
        done = !matches!(item, Some(Ok(_)));
        Poll::Ready(item)
    }))
}
