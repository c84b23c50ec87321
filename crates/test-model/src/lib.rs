//! A local fake model for testing purpose.

mod preset;

use std::collections::VecDeque;
use std::error::Error as StdError;
use std::fmt::{self, Display, Formatter};
use std::future::ready;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll, ready};
use std::time::Duration;

use loupe_model::{
    ErrorKind, ModelProvider, ModelProviderError, ModelRequest, ModelResponse,
    ResponseChunk,
};
use parking_lot::Mutex;
use tokio::time::{Sleep, sleep};

pub use preset::*;

#[derive(Debug)]
pub struct Error {
    message: String,
    kind: ErrorKind,
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl StdError for Error {}

impl ModelProviderError for Error {
    #[inline]
    fn kind(&self) -> ErrorKind {
        self.kind
    }
}

pub struct TestModelResponse {
    chunks: VecDeque<PresetChunk>,
    delay: Duration,
    sleep: Option<Pin<Box<Sleep>>>,
}

impl ModelResponse for TestModelResponse {
    type Error = crate::Error;

    fn poll_next_chunk(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Result<Option<ResponseChunk>, Self::Error>> {
        let this = self.get_mut();

        if let Some(sleep) = &mut this.sleep {
            let sleep = sleep.as_mut();
            ready!(sleep.poll(cx));
            this.sleep = None;

            // Completed responses keep returning `None`.
            let Some(preset) = this.chunks.pop_front() else {
                return Poll::Ready(Ok(None));
            };
            return Poll::Ready(match preset {
                PresetChunk::Fail(message) => {
                    this.chunks.clear();
                    Err(Error {
                        message,
                        kind: ErrorKind::Other,
                    })
                }
                preset => Ok(preset.to_chunk()),
            });
        }
        this.sleep = Some(Box::pin(sleep(this.delay)));
        Pin::new(this).poll_next_chunk(cx)
    }
}

#[derive(Default)]
struct Script {
    responses: VecDeque<PresetResponse>,
    requests: Vec<ModelRequest>,
}

/// A local fake model for testing purpose.
///
/// Before sending requests, you need to setup the script, which is how the
/// model should respond to each request, in order. Every request consumes
/// one response. If the script runs out, an error will be returned.
///
/// Clones share the same script, so a test can keep a handle and inspect
/// the requests after handing the provider to a chat.
///
/// # Note
///
/// This type is not optimized for production use, there are heavy memory
/// copies involved. You should only use it for testing.
#[derive(Clone)]
pub struct TestModelProvider {
    script: Arc<Mutex<Script>>,
    delay: Duration,
}

impl Default for TestModelProvider {
    fn default() -> Self {
        Self {
            script: Default::default(),
            delay: Duration::from_millis(1),
        }
    }
}

impl TestModelProvider {
    #[inline]
    pub fn add_response(&mut self, preset: PresetResponse) {
        self.script.lock().responses.push_back(preset);
    }

    #[inline]
    pub fn set_delay(&mut self, duration: Duration) {
        self.delay = duration;
    }

    /// Returns all requests received so far.
    #[inline]
    pub fn requests(&self) -> Vec<ModelRequest> {
        self.script.lock().requests.clone()
    }

    /// Returns the number of responses not consumed yet.
    #[inline]
    pub fn remaining(&self) -> usize {
        self.script.lock().responses.len()
    }
}

impl ModelProvider for TestModelProvider {
    type Error = crate::Error;
    type Response = TestModelResponse;

    fn model_id(&self) -> &str {
        "test-model"
    }

    fn send_request(
        &self,
        req: &ModelRequest,
    ) -> impl Future<Output = Result<Self::Response, Self::Error>> + Send + 'static
    {
        let mut script = self.script.lock();
        script.requests.push(req.clone());
        let result = match script.responses.pop_front() {
            None => Err(Error {
                message: "no enough responses".to_owned(),
                kind: ErrorKind::RateLimitExceeded,
            }),
            Some(PresetResponse {
                rejection: Some(message),
                ..
            }) => Err(Error {
                message,
                kind: ErrorKind::Other,
            }),
            Some(preset) => Ok(TestModelResponse {
                chunks: preset.chunks.into(),
                delay: self.delay,
                sleep: None,
            }),
        };
        ready(result)
    }
}
