//! Observability for the GeoNames API
//!
//! Structured logging via `tracing`. Request spans are added by the HTTP
//! server's trace layer.

mod logging;

pub use logging::{init_logging, Verbosity, LOG_ENV_VAR};
