//! Transport layer for the NLQ server.
//!
//! The service is reached over plain HTTP; [`routes`] defines the endpoints and
//! [`http`] owns the listener and the shutdown sequence.

pub mod http;
pub mod routes;

pub use http::HttpTransport;
pub use routes::{AppState, ERROR_DETAIL, WELCOME_MESSAGE, router};
