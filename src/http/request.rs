//! # Parsing de Requests HTTP/1.0
//! src/http/request.rs
//!
//! ```text
//! POST /jobs HTTP/1.0\r\n
//! Content-Type: application/json\r\n
//! Content-Length: 28\r\n
//! \r\n
//! {"kind":"sleep","ms":250}
//! ```
//!
//! El body solo se conserva en `POST` y se recorta a `Content-Length`.

use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    GET,
    HEAD,
    POST,
}

impl Method {
    fn parse(s: &str) -> Result<Self, ParseError> {
        match s {
            "GET" => Ok(Method::GET),
            "HEAD" => Ok(Method::HEAD),
            "POST" => Ok(Method::POST),
            other => Err(ParseError::UnsupportedMethod(other.to_string())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Method::GET => "GET",
            Method::HEAD => "HEAD",
            Method::POST => "POST",
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("empty request")]
    Empty,

    #[error("request head is not terminated")]
    Incomplete,

    #[error("request is not valid UTF-8")]
    NotUtf8,

    #[error("invalid request line")]
    InvalidRequestLine,

    #[error("unsupported HTTP method: {0}")]
    UnsupportedMethod(String),

    #[error("invalid HTTP version: {0}")]
    InvalidVersion(String),

    #[error("invalid header: {0}")]
    InvalidHeader(String),
}

#[derive(Debug, Clone)]
pub struct Request {
    method: Method,
    path: String,
    query: HashMap<String, String>,
    /// Nombres normalizados a minúsculas
    headers: HashMap<String, String>,
    body: Vec<u8>,
}

/// Posición donde termina la cabecera (después de `\r\n\r\n`)
pub fn head_end(buffer: &[u8]) -> Option<usize> {
    buffer.windows(4).position(|w| w == b"\r\n\r\n").map(|i| i + 4)
}

impl Request {
    pub fn parse(buffer: &[u8]) -> Result<Self, ParseError> {
        if buffer.iter().all(|b| b.is_ascii_whitespace()) {
            return Err(ParseError::Empty);
        }

        let end = head_end(buffer).ok_or(ParseError::Incomplete)?;
        let head = std::str::from_utf8(&buffer[..end - 4]).map_err(|_| ParseError::NotUtf8)?;

        let mut lines = head.split("\r\n");
        let request_line = lines.next().ok_or(ParseError::InvalidRequestLine)?;

        let mut parts = request_line.split_whitespace();
        let (method, target, version) = match (parts.next(), parts.next(), parts.next(), parts.next()) {
            (Some(m), Some(t), Some(v), None) => (m, t, v),
            _ => return Err(ParseError::InvalidRequestLine),
        };

        let method = Method::parse(method)?;
        if version != "HTTP/1.0" && version != "HTTP/1.1" {
            return Err(ParseError::InvalidVersion(version.to_string()));
        }

        let (path, query) = match target.split_once('?') {
            Some((path, qs)) => (path.to_string(), parse_query(qs)),
            None => (target.to_string(), HashMap::new()),
        };

        let mut headers = HashMap::new();
        for line in lines {
            let (name, value) = line
                .split_once(':')
                .ok_or_else(|| ParseError::InvalidHeader(line.to_string()))?;
            headers.insert(name.trim().to_ascii_lowercase(), value.trim().to_string());
        }

        let body = if method == Method::POST {
            let rest = &buffer[end..];
            let len = headers
                .get("content-length")
                .and_then(|v| v.parse::<usize>().ok())
                .unwrap_or(rest.len())
                .min(rest.len());
            rest[..len].to_vec()
        } else {
            Vec::new()
        };

        Ok(Request {
            method,
            path,
            query,
            headers,
            body,
        })
    }

    pub fn method(&self) -> Method {
        self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn query(&self, key: &str) -> Option<&str> {
        self.query.get(key).map(String::as_str)
    }

    pub fn query_params(&self) -> &HashMap<String, String> {
        &self.query
    }

    /// Búsqueda de header sin distinguir mayúsculas
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Longitud esperada del body según la cabecera ya recibida
    pub fn content_length(head: &[u8]) -> usize {
        let Ok(text) = std::str::from_utf8(head) else {
            return 0;
        };
        text.split("\r\n")
            .filter_map(|line| line.split_once(':'))
            .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
            .and_then(|(_, value)| value.trim().parse().ok())
            .unwrap_or(0)
    }
}

fn parse_query(qs: &str) -> HashMap<String, String> {
    qs.split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| match pair.split_once('=') {
            Some((k, v)) => (percent_decode(k), percent_decode(v)),
            None => (percent_decode(pair), String::new()),
        })
        .collect()
}

/// Decodifica `%XX` y `+`; secuencias inválidas se dejan tal cual
fn percent_decode(s: &str) -> String {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            let decoded = std::str::from_utf8(&bytes[i + 1..i + 3])
                .ok()
                .and_then(|h| u8::from_str_radix(h, 16).ok());
            if let Some(byte) = decoded {
                out.push(byte);
                i += 3;
                continue;
            }
        }

        out.push(if bytes[i] == b'+' { b' ' } else { bytes[i] });
        i += 1;
    }

    String::from_utf8_lossy(&out).into_owned()
}
