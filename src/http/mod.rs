//! HTTP value types.
//!
//! The proxy does not parse or forward traffic itself; these types carry
//! the headers the identity simulation reads and writes, and the small
//! responses the proxy produces on its own.

pub mod request;
pub mod response;

pub use request::{Method, Request};
pub use response::{Response, ResponseBuilder, StatusCode};
