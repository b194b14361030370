/// HTTP transport trait, request types and the reqwest implementation
pub mod http;
/// Scripted transport for tests
pub mod mock;
/// Bounded retry with exponential backoff
pub mod retry;

pub use http::{BasicAuth, Endpoint, HttpResponse, HttpTransport, JsonRequest, ReqwestTransport};
pub use mock::MockTransport;
pub use retry::RetryPolicy;
