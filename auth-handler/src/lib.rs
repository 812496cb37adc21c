//! Authorization-to-connector coordinator for an EV charging station.
//!
//! [`AuthHandler`] receives token presentations and physical session events
//! from any number of threads and decides, for every token, which EVSE it
//! authorizes, whether it stops a running transaction, or why it is turned
//! away. Presenting a token blocks the caller until a verdict is reached or
//! the connection timeout elapses.

mod drivers;
mod handler;
mod interfaces;
mod state_machine;

pub use evauth_core::types;
pub use handler::{
    config::{AuthHandlerConfig, ConfigError},
    error::Error,
    AuthHandler,
};
pub use interfaces::{AuthInterface, Clock, SystemClock};
