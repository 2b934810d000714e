//! The `utils` module collects the pieces shared across the `infocenter`
//! application: error types, logging setup and the diagnostic tracer.

pub mod error;
pub mod logging;
pub mod trace;
