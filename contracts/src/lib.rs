// Shared service contracts for the SDLC core
//
// Everything that travels between the orchestrator, the agent hub and the
// workers lives here: the invoke/ask wire shapes, the JSON error envelope,
// health payloads and the bounded retry executor both HTTP clients share.

pub mod ask;
pub mod error;
pub mod health;
pub mod invoke;
pub mod retry;

pub use ask::{AskExpertRequest, AskExpertResponse, AskStatus};
pub use error::{ErrorBody, ErrorDetail};
pub use health::HealthResponse;
pub use invoke::{HubInvokeResponse, InvokeRequest, InvokeResponse};
pub use retry::{RetryExecutor, RetryPolicy};
