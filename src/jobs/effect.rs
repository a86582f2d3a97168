//! # Efectos de los Jobs
//! src/jobs/effect.rs
//!
//! El efecto concreto de un job es un colaborador intercambiable: el pool
//! solo conoce el trait [`JobEffect`]. [`BuiltinEffect`] implementa los
//! payloads que expone el servidor:
//!
//! - `sleep`: duerme la duración pedida
//! - `fetch`: GET HTTP/1.0 a una URL `http://`, reporta bytes recibidos
//! - `hash`: SHA256 iterado `rounds` veces

use crate::error::JobError;
use crate::jobs::job::JobPayload;
use regex::Regex;
use sha2::{Digest, Sha256};
use std::io::{self, BufRead, BufReader, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::sync::OnceLock;
use std::thread;
use std::time::Duration;

/// Tope de la cabecera de una respuesta fetch
const MAX_HEAD_BYTES: usize = 16 * 1024;

/// Bytes de body que se cuentan como máximo; el resto no se lee
const MAX_BODY_BYTES: u64 = 64 * 1024 * 1024;

/// Ejecuta el trabajo descrito por un payload
///
/// Retorna un resumen corto en caso de éxito. Un `Err` se convierte en un
/// registro `Failure`; nunca afecta al worker.
pub trait JobEffect: Send + Sync {
    fn run(&self, payload: &JobPayload) -> Result<String, JobError>;
}

impl<F> JobEffect for F
where
    F: Fn(&JobPayload) -> Result<String, JobError> + Send + Sync,
{
    fn run(&self, payload: &JobPayload) -> Result<String, JobError> {
        self(payload)
    }
}

/// Destino de un fetch ya validado
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpTarget {
    pub host: String,
    pub port: u16,
    pub path: String,
}

fn url_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^(?P<scheme>[a-zA-Z][a-zA-Z0-9+.-]*)://(?P<host>[A-Za-z0-9.-]+)(?::(?P<port>\d{1,5}))?(?P<path>/[^\s#]*)?$")
            .expect("URL pattern is valid")
    })
}

/// Valida una URL y la descompone en host, puerto y path
///
/// Solo se soporta `http`; el servidor la usa también para rechazar con 400
/// antes de encolar.
pub fn parse_http_url(url: &str) -> Result<HttpTarget, JobError> {
    let caps = url_pattern()
        .captures(url.trim())
        .ok_or_else(|| JobError::InvalidUrl(url.to_string()))?;

    let scheme = caps["scheme"].to_ascii_lowercase();
    if scheme != "http" {
        return Err(JobError::UnsupportedScheme(scheme));
    }

    let port = match caps.name("port") {
        Some(p) => p
            .as_str()
            .parse()
            .map_err(|_| JobError::InvalidUrl(url.to_string()))?,
        None => 80,
    };

    Ok(HttpTarget {
        host: caps["host"].to_string(),
        port,
        path: caps.name("path").map_or("/", |p| p.as_str()).to_string(),
    })
}

/// Efectos incluidos en el servidor
#[derive(Debug, Clone)]
pub struct BuiltinEffect {
    fetch_timeout: Duration,
}

impl BuiltinEffect {
    pub fn new(fetch_timeout: Duration) -> Self {
        Self { fetch_timeout }
    }

    fn fetch(&self, url: &str) -> Result<String, JobError> {
        let target = parse_http_url(url)?;

        let addr = (target.host.as_str(), target.port)
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| JobError::InvalidUrl(url.to_string()))?;

        let mut stream = TcpStream::connect_timeout(&addr, self.fetch_timeout)?;
        stream.set_read_timeout(Some(self.fetch_timeout))?;
        stream.set_write_timeout(Some(self.fetch_timeout))?;

        let request = format!(
            "GET {} HTTP/1.0\r\nHost: {}\r\nUser-Agent: job-dispatcher/0.1\r\nConnection: close\r\n\r\n",
            target.path, target.host
        );
        stream.write_all(request.as_bytes())?;

        let (status, body_len) = read_response(BufReader::new(stream))?;
        if status >= 400 {
            return Err(JobError::HttpStatus(status));
        }

        Ok(format!("fetched {}: {} bytes", url, body_len))
    }
}

/// Lee la cabecera de la respuesta y descarta el body contando sus bytes
///
/// El body nunca se guarda en memoria; se cuentan como máximo
/// `MAX_BODY_BYTES`.
fn read_response<R: BufRead>(mut reader: R) -> Result<(u16, u64), JobError> {
    let mut line = String::new();
    reader.read_line(&mut line)?;
    let status = parse_status_line(&line)?;

    let mut head_bytes = 0;
    loop {
        head_bytes += line.len();
        if head_bytes > MAX_HEAD_BYTES {
            return Err(JobError::MalformedResponse);
        }

        line.clear();
        if reader.read_line(&mut line)? == 0 {
            return Err(JobError::MalformedResponse);
        }
        if line == "\r\n" || line == "\n" {
            break;
        }
    }

    let body_len = io::copy(&mut reader.take(MAX_BODY_BYTES), &mut io::sink())?;
    Ok((status, body_len))
}

fn parse_status_line(line: &str) -> Result<u16, JobError> {
    let mut parts = line.split_whitespace();
    match parts.next() {
        Some(version) if version.starts_with("HTTP/") => {}
        _ => return Err(JobError::MalformedResponse),
    }
    parts
        .next()
        .and_then(|code| code.parse().ok())
        .ok_or(JobError::MalformedResponse)
}

fn iterated_sha256(text: &str, rounds: u32) -> String {
    let mut digest = Sha256::digest(text.as_bytes());
    for _ in 1..rounds {
        digest = Sha256::digest(digest);
    }
    format!("{:x}", digest)
}

impl JobEffect for BuiltinEffect {
    fn run(&self, payload: &JobPayload) -> Result<String, JobError> {
        match payload {
            JobPayload::Sleep { ms } => {
                thread::sleep(Duration::from_millis(*ms));
                Ok(format!("slept {} ms", ms))
            }
            JobPayload::Fetch { url } => self.fetch(url),
            JobPayload::Hash { text, rounds } => {
                Ok(format!("sha256^{} = {}", rounds, iterated_sha256(text, (*rounds).max(1))))
            }
        }
    }
}
