//! # Módulo del Servidor HTTP
//! src/server/mod.rs
//!
//! Punto de sumisión HTTP/1.0 sobre el dispatcher:
//! - [`tcp`]: listener, acceptor y un thread por conexión
//! - [`handlers`]: traducción request → sumisión → status code

pub mod handlers;
pub mod tcp;

pub use handlers::{AppState, SubmitLimits};
pub use tcp::Server;
