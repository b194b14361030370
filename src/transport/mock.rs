use crate::error::TransportError;
use crate::transport::{HttpResponse, HttpTransport, JsonRequest};
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

/// Scripted transport for tests and dry runs
///
/// Records every request it receives and answers with the configured
/// responses in order. After the last response, the transport cycles back
/// to the first one.
#[derive(Clone)]
pub struct MockTransport {
    responses: Vec<Result<HttpResponse, TransportError>>,
    current_index: Arc<Mutex<usize>>,
    requests: Arc<Mutex<Vec<JsonRequest>>>,
}

impl MockTransport {
    /// Create a mock transport that always gives the same answer
    ///
    /// # Example
    /// ```
    /// use lookout::transport::{HttpResponse, MockTransport};
    ///
    /// let transport = MockTransport::with_response(Ok(HttpResponse::new(201, "{}")));
    /// assert_eq!(transport.call_count(), 0);
    /// ```
    pub fn with_response(response: Result<HttpResponse, TransportError>) -> Self {
        Self::with_responses(vec![response])
    }

    /// Create a mock transport answering with `responses` in order
    pub fn with_responses(responses: Vec<Result<HttpResponse, TransportError>>) -> Self {
        Self {
            responses,
            current_index: Arc::new(Mutex::new(0)),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Always answer with `status` and a JSON body
    pub fn status(status: u16, body: serde_json::Value) -> Self {
        Self::with_response(Ok(HttpResponse::new(status, body.to_string())))
    }

    /// Always fail with a connection error
    pub fn unreachable() -> Self {
        Self::with_response(Err(TransportError::Request(
            "connection refused".to_string(),
        )))
    }

    /// Number of requests received so far
    pub fn call_count(&self) -> usize {
        self.lock_requests().len()
    }

    /// All requests received so far, oldest first
    pub fn requests(&self) -> Vec<JsonRequest> {
        self.lock_requests().clone()
    }

    /// The most recent request, if any
    pub fn last_request(&self) -> Option<JsonRequest> {
        self.lock_requests().last().cloned()
    }

    fn lock_requests(&self) -> std::sync::MutexGuard<'_, Vec<JsonRequest>> {
        self.requests
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn next_response(&self) -> Result<HttpResponse, TransportError> {
        if self.responses.is_empty() {
            return Err(TransportError::Request(
                "mock transport has no scripted responses".to_string(),
            ));
        }

        let mut index = self
            .current_index
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let response_index = *index % self.responses.len();
        *index += 1;

        self.responses[response_index].clone()
    }
}

impl HttpTransport for MockTransport {
    fn post_json<'a>(
        &'a self,
        request: &'a JsonRequest,
    ) -> Pin<Box<dyn Future<Output = Result<HttpResponse, TransportError>> + Send + 'a>> {
        Box::pin(async move {
            self.lock_requests().push(request.clone());
            self.next_response()
        })
    }
}
