//! Database gateway layer
//!
//! The HTTP adapter talks to a [`DatabaseGateway`]; each supported engine
//! provides one implementation.

pub mod traits;

#[cfg(feature = "postgres")]
pub mod postgres;

#[cfg(feature = "postgres")]
mod scan;

pub use traits::{DatabaseGateway, ErrorKind, GatewayError};
