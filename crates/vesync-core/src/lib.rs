// vesync-core: account state and session lifecycle for the VeSync cloud
//
// `Manager` is the single owner of mutable account state. It drives the
// login engine from `vesync-api`, keeps the endpoint that issued the token
// sticky, recovers from token expiry and cross-region errors on the device
// list, and hands device-level code an authenticated request primitive.

pub mod config;
pub mod device;
pub mod error;
pub mod exclusion;
pub mod manager;
pub mod session;

pub use config::ManagerConfig;
pub use device::{DetailRefresher, DeviceRecord};
pub use error::CoreError;
pub use exclusion::{ExclusionFilter, Exclusions};
pub use manager::{CallOptions, Manager, ManagerBuilder};
pub use session::{MemorySessionStore, Session, SessionStore};

// Re-exports so consumers need only this crate.
pub use vesync_api::{
    ApiRequest, ApiResponse, AuthFlow, Endpoints, HttpMethod, Region, RetryPolicy,
    transport::TlsMode,
};
