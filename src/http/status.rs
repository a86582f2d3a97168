//! # Códigos de Estado HTTP
//! src/http/status.rs
//!
//! Códigos que usa el dispatcher:
//!
//! - **2xx**: job aceptado (202), consultas (200)
//! - **4xx**: payload inválido (400), ruta o método (404, 405), body
//!   demasiado grande (413), saturación (429)
//! - **5xx**: fallo interno (500), apagado en curso (503)

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusCode {
    Ok = 200,
    Accepted = 202,
    BadRequest = 400,
    NotFound = 404,
    MethodNotAllowed = 405,
    PayloadTooLarge = 413,
    /// Cola llena: el cliente puede reintentar
    TooManyRequests = 429,
    InternalServerError = 500,
    /// Apagado en curso: no reintentar contra esta instancia
    ServiceUnavailable = 503,
}

impl StatusCode {
    pub fn as_u16(&self) -> u16 {
        *self as u16
    }

    pub fn reason_phrase(&self) -> &'static str {
        match self {
            StatusCode::Ok => "OK",
            StatusCode::Accepted => "Accepted",
            StatusCode::BadRequest => "Bad Request",
            StatusCode::NotFound => "Not Found",
            StatusCode::MethodNotAllowed => "Method Not Allowed",
            StatusCode::PayloadTooLarge => "Payload Too Large",
            StatusCode::TooManyRequests => "Too Many Requests",
            StatusCode::InternalServerError => "Internal Server Error",
            StatusCode::ServiceUnavailable => "Service Unavailable",
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.as_u16())
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.as_u16(), self.reason_phrase())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_and_phrases() {
        assert_eq!(StatusCode::Accepted.as_u16(), 202);
        assert_eq!(StatusCode::TooManyRequests.to_string(), "429 Too Many Requests");
        assert_eq!(StatusCode::ServiceUnavailable.to_string(), "503 Service Unavailable");
        assert_eq!(StatusCode::PayloadTooLarge.to_string(), "413 Payload Too Large");
        assert!(StatusCode::Accepted.is_success());
        assert!(!StatusCode::MethodNotAllowed.is_success());
    }
}
