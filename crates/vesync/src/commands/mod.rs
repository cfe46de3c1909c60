//! Command handlers.

pub mod config_cmd;
pub mod devices;
pub mod login;
pub mod session;
pub mod util;
