// vesync-api: Async Rust client for the VeSync cloud API
//
// Owns everything that speaks the vendor's wire protocol: regional endpoint
// tables, request bodies and headers, the single-exchange transport, JWT
// hint decoding, and the two-step / legacy login engine. Account state
// (sticky endpoint, token, devices) lives in `vesync-core`.

pub mod auth;
pub mod codes;
pub mod error;
pub mod region;
pub mod request;
pub mod token;
pub mod transport;

pub use auth::{AuthFlow, AuthSession, Authenticator, LoginError, LoginParams, RetryPolicy};
pub use error::Error;
pub use region::{Endpoints, Region};
pub use request::RequestBuilder;
pub use token::TokenHints;
pub use transport::{ApiClient, ApiRequest, ApiResponse, HttpMethod, TransportConfig};
