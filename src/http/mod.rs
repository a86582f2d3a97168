//! # Módulo HTTP
//! src/http/mod.rs
//!
//! Subconjunto de HTTP/1.0 (RFC 1945) para el punto de sumisión: una request
//! por conexión, sin chunked encoding y con `Connection: close`.

pub mod request;
pub mod response;
pub mod status;

pub use request::{Method, ParseError, Request};
pub use response::Response;
pub use status::StatusCode;
