//! smm-core: shared identifiers, course enums, the unified error type, and
//! configuration.
//!
//! Every other smm-* crate depends on this one. Failures from sniffing,
//! decoding, persistence and delivery all funnel into [`Error`], which knows
//! how the transport layer should report them.

pub mod config;
pub mod course;
pub mod error;
pub mod ids;

pub use course::*;
pub use error::{Error, Result};
pub use ids::*;
